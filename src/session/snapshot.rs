use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::Question;

/// One scored answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
  pub question_index: usize,
  pub choice_index: usize,
  pub is_correct: bool,
}

/// Serializable point-in-time copy of a practice session.
///
/// Invariants, checked by [`SessionSnapshot::validate`]:
/// - `current_index == answers.len()`
/// - `completed == (current_index == questions.len())`
/// - `score` counts the correct answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
  pub content_id: String,
  #[serde(default)]
  pub level: Option<String>,
  pub questions: Vec<Question>,
  pub current_index: usize,
  pub answers: Vec<AnswerRecord>,
  pub score: usize,
  pub completed: bool,
  /// The final score of a completed run has been posted
  #[serde(default)]
  pub score_reported: bool,
  /// When the snapshot was written; set by the session store
  #[serde(default)]
  pub saved_at: Option<DateTime<Utc>>,
}

/// A snapshot that cannot describe a reachable session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
  #[error("snapshot has no questions")]
  NoQuestions,
  #[error("current index {current} does not match {answers} recorded answers")]
  IndexMismatch { current: usize, answers: usize },
  #[error("more answers ({answers}) than questions ({questions})")]
  TooManyAnswers { answers: usize, questions: usize },
  #[error("completed flag is {completed} with {answers} of {questions} answered")]
  CompletionMismatch {
    completed: bool,
    answers: usize,
    questions: usize,
  },
  #[error("answer at position {position} is recorded for question {question}")]
  OutOfOrderAnswer { position: usize, question: usize },
  #[error("answer for question {question} is inconsistent with the question")]
  InvalidAnswer { question: usize },
  #[error("score {score} does not match {correct} correct answers")]
  ScoreMismatch { score: usize, correct: usize },
  #[error("question {question} is malformed")]
  MalformedQuestion { question: usize },
}

impl SessionSnapshot {
  pub fn correct_count(&self) -> usize {
    self.answers.iter().filter(|a| a.is_correct).count()
  }

  /// Check every invariant of a persisted session.
  pub fn validate(&self) -> Result<(), SnapshotError> {
    let questions = self.questions.len();
    let answers = self.answers.len();

    if questions == 0 {
      return Err(SnapshotError::NoQuestions);
    }
    if let Some(question) = self.questions.iter().position(|q| !q.is_well_formed()) {
      return Err(SnapshotError::MalformedQuestion { question });
    }
    if answers > questions {
      return Err(SnapshotError::TooManyAnswers { answers, questions });
    }
    if self.current_index != answers {
      return Err(SnapshotError::IndexMismatch {
        current: self.current_index,
        answers,
      });
    }
    if self.completed != (self.current_index == questions) {
      return Err(SnapshotError::CompletionMismatch {
        completed: self.completed,
        answers,
        questions,
      });
    }

    for (position, answer) in self.answers.iter().enumerate() {
      if answer.question_index != position {
        return Err(SnapshotError::OutOfOrderAnswer {
          position,
          question: answer.question_index,
        });
      }
      let question = &self.questions[position];
      if answer.choice_index >= question.choices.len()
        || answer.is_correct != question.is_correct(answer.choice_index)
      {
        return Err(SnapshotError::InvalidAnswer { question: position });
      }
    }

    let correct = self.correct_count();
    if self.score != correct {
      return Err(SnapshotError::ScoreMismatch {
        score: self.score,
        correct,
      });
    }

    Ok(())
  }
}
