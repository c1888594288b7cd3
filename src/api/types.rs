use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A multiple-choice listening question. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
  pub id: String,
  pub prompt: String,
  /// Answer options, addressed by index
  pub choices: Vec<String>,
  pub correct_choice: usize,
  /// Opaque audio reference, resolved to a URL by the client
  pub audio_ref: Option<String>,
  pub explanation: Option<String>,
}

impl Question {
  pub fn is_correct(&self, choice: usize) -> bool {
    choice == self.correct_choice
  }

  /// The correct index points at an existing choice.
  pub fn is_well_formed(&self) -> bool {
    self.correct_choice < self.choices.len()
  }
}

/// Questions returned for one piece of content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
  pub content_id: String,
  pub title: Option<String>,
  /// Difficulty level, e.g. "intermediate"
  pub level: Option<String>,
  pub questions: Vec<Question>,
}

/// Content listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSummary {
  pub id: String,
  pub title: String,
  pub level: Option<String>,
}

/// Result of submitting new source content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedContent {
  pub content_id: String,
  pub level: Option<String>,
  pub question_count: usize,
}

/// Aggregate practice metrics reported by the server, rendered for display
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
  pub metrics: BTreeMap<String, String>,
}
