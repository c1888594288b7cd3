//! Serde-deserializable types matching the practice API responses.
//!
//! Kept apart from the domain types so that quirks of the wire format
//! (numeric ids, options stored as a JSON string, empty audio paths)
//! stay out of the rest of the application.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::error::ApiError;
use super::types::{ContentSummary, ProcessedContent, Question, QuestionSet, Stats};

// ============================================================================
// Shared helpers
// ============================================================================

/// Ids arrive as numbers or strings depending on the endpoint.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  match Value::deserialize(deserializer)? {
    Value::String(s) => Ok(s),
    Value::Number(n) => Ok(n.to_string()),
    other => Err(serde::de::Error::custom(format!(
      "expected string or number id, got {}",
      other
    ))),
  }
}

/// Options arrive either as an array or as a string holding a JSON array.
fn deserialize_choices<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Choices {
    List(Vec<String>),
    Encoded(String),
  }

  match Choices::deserialize(deserializer)? {
    Choices::List(list) => Ok(list),
    Choices::Encoded(raw) => serde_json::from_str(&raw).map_err(serde::de::Error::custom),
  }
}

fn non_empty(value: Option<String>) -> Option<String> {
  value.filter(|s| !s.trim().is_empty())
}

/// Render a JSON `details` value as text for display.
fn details_text(value: Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) => Some(s),
    other => Some(other.to_string()),
  }
}

// ============================================================================
// Error bodies
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
  pub error: Option<String>,
  #[serde(default)]
  pub details: Value,
}

impl ApiErrorBody {
  /// Parse an error payload, tolerating bodies that are not JSON.
  pub fn parse(body: &[u8]) -> Self {
    serde_json::from_slice(body).unwrap_or_default()
  }

  pub fn into_parts(self) -> (Option<String>, Option<String>) {
    (non_empty(self.error), details_text(self.details))
  }
}

// ============================================================================
// Questions endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiQuestion {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  #[serde(alias = "prompt")]
  pub question: String,
  #[serde(alias = "choices", deserialize_with = "deserialize_choices")]
  pub options: Vec<String>,
  #[serde(alias = "correct_answer")]
  pub correct: usize,
  #[serde(default, alias = "audio_path")]
  pub audio_url: Option<String>,
  #[serde(default)]
  pub explanation: Option<String>,
}

impl ApiQuestion {
  pub fn into_question(self) -> Question {
    Question {
      id: self.id,
      prompt: self.question,
      choices: self.options,
      correct_choice: self.correct,
      audio_ref: non_empty(self.audio_url),
      explanation: non_empty(self.explanation),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiQuestionsResponse {
  pub success: bool,
  #[serde(default)]
  pub questions: Vec<ApiQuestion>,
  pub error: Option<String>,
  pub level: Option<String>,
  #[serde(alias = "title")]
  pub video_title: Option<String>,
}

impl ApiQuestionsResponse {
  /// Convert into a question set.
  ///
  /// `success: false` is a semantic failure even on HTTP 200, and so is a
  /// question whose correct index points past its options.
  pub fn into_question_set(self, content_id: &str) -> Result<QuestionSet, ApiError> {
    if !self.success {
      let message = non_empty(self.error).unwrap_or_else(|| "Failed to load questions".to_string());
      return Err(ApiError::fatal(message));
    }

    let questions: Vec<Question> = self
      .questions
      .into_iter()
      .map(ApiQuestion::into_question)
      .collect();

    if let Some(bad) = questions.iter().find(|q| !q.is_well_formed()) {
      return Err(
        ApiError::fatal("Received a malformed question").with_details(format!(
          "question {} marks choice {} correct but has {} choices",
          bad.id,
          bad.correct_choice,
          bad.choices.len()
        )),
      );
    }

    Ok(QuestionSet {
      content_id: content_id.to_string(),
      title: non_empty(self.video_title),
      level: non_empty(self.level),
      questions,
    })
  }
}

// ============================================================================
// Content endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiContent {
  #[serde(alias = "video_id", deserialize_with = "deserialize_id")]
  pub id: String,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(alias = "difficulty_level", default)]
  pub level: Option<String>,
}

impl From<ApiContent> for ContentSummary {
  fn from(content: ApiContent) -> Self {
    let title = non_empty(content.title).unwrap_or_else(|| content.id.clone());
    Self {
      id: content.id,
      title,
      level: non_empty(content.level),
    }
  }
}

/// The listing endpoint returns either a bare array or `{ videos: [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiContentList {
  Bare(Vec<ApiContent>),
  Wrapped { videos: Vec<ApiContent> },
}

impl ApiContentList {
  pub fn into_summaries(self) -> Vec<ContentSummary> {
    let items = match self {
      ApiContentList::Bare(items) => items,
      ApiContentList::Wrapped { videos } => videos,
    };
    items.into_iter().map(ContentSummary::from).collect()
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiProcessResponse {
  #[serde(default)]
  pub success: bool,
  #[serde(deserialize_with = "deserialize_id")]
  pub video_id: String,
  #[serde(default)]
  pub questions: Vec<Value>,
  pub level: Option<String>,
}

impl From<ApiProcessResponse> for ProcessedContent {
  fn from(response: ApiProcessResponse) -> Self {
    Self {
      content_id: response.video_id,
      level: non_empty(response.level),
      question_count: response.questions.len(),
    }
  }
}

// ============================================================================
// Metrics endpoints
// ============================================================================

/// Stats come back either bare or as `{ stats: {...} }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiStats {
  Wrapped { stats: Map<String, Value> },
  Bare(Map<String, Value>),
}

impl From<ApiStats> for Stats {
  fn from(stats: ApiStats) -> Self {
    let fields = match stats {
      ApiStats::Wrapped { stats } => stats,
      ApiStats::Bare(fields) => fields,
    };
    let metrics = fields
      .into_iter()
      .filter(|(key, value)| key != "success" && !value.is_null())
      .map(|(key, value)| {
        let shown = match value {
          Value::String(s) => s,
          other => other.to_string(),
        };
        (key, shown)
      })
      .collect();
    Self { metrics }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_question_with_encoded_options_and_numeric_id() {
    let raw = r#"{
      "id": 12,
      "question": "What did the speaker buy?",
      "options": "[\"apples\", \"bread\", \"milk\", \"eggs\"]",
      "correct": 1,
      "audio_url": "/audio/q12.mp3"
    }"#;

    let q: ApiQuestion = serde_json::from_str(raw).unwrap();
    let q = q.into_question();

    assert_eq!(q.id, "12");
    assert_eq!(q.choices.len(), 4);
    assert_eq!(q.correct_choice, 1);
    assert_eq!(q.audio_ref.as_deref(), Some("/audio/q12.mp3"));
    assert!(q.explanation.is_none());
  }

  #[test]
  fn test_empty_audio_path_is_none() {
    let raw = r#"{"id": "a", "question": "q", "options": ["x", "y"], "correct_answer": 0, "audio_url": ""}"#;
    let q: ApiQuestion = serde_json::from_str(raw).unwrap();
    assert!(q.into_question().audio_ref.is_none());
  }

  #[test]
  fn test_stored_question_row_keeps_audio() {
    let raw = r#"{"success": true, "level": "beginner", "questions": [{
      "id": 1,
      "video_id": "seg",
      "question": "Where is the station?",
      "audio_path": "/api/audio/seg1.wav",
      "options": "[\"left\", \"right\"]",
      "correct_answer": 0,
      "difficulty_level": "beginner"
    }]}"#;
    let resp: ApiQuestionsResponse = serde_json::from_str(raw).unwrap();

    let set = resp.into_question_set("seg").unwrap();
    let q = &set.questions[0];
    assert_eq!(q.id, "1");
    assert_eq!(q.choices, vec!["left", "right"]);
    assert_eq!(q.audio_ref.as_deref(), Some("/api/audio/seg1.wav"));
  }

  #[test]
  fn test_unsuccessful_response_is_fatal() {
    let raw = r#"{"success": false, "error": "Video not found"}"#;
    let resp: ApiQuestionsResponse = serde_json::from_str(raw).unwrap();

    let err = resp.into_question_set("abc").unwrap_err();
    assert!(!crate::retry::Retryable::is_retryable(&err));
    assert_eq!(err.message, "Video not found");
  }

  #[test]
  fn test_malformed_question_rejects_whole_set() {
    let raw = r#"{"success": true, "questions": [
      {"id": 1, "question": "q", "options": ["x", "y"], "correct": 2}
    ]}"#;
    let resp: ApiQuestionsResponse = serde_json::from_str(raw).unwrap();

    let err = resp.into_question_set("abc").unwrap_err();
    assert_eq!(err.message, "Received a malformed question");
  }

  #[test]
  fn test_content_list_shapes() {
    let bare: ApiContentList =
      serde_json::from_str(r#"[{"video_id": "v1", "title": "Market"}]"#).unwrap();
    let wrapped: ApiContentList =
      serde_json::from_str(r#"{"videos": [{"id": "v2", "difficulty_level": "beginner"}]}"#).unwrap();

    let bare = bare.into_summaries();
    let wrapped = wrapped.into_summaries();
    assert_eq!(bare[0].title, "Market");
    assert_eq!(wrapped[0].title, "v2");
    assert_eq!(wrapped[0].level.as_deref(), Some("beginner"));
  }

  #[test]
  fn test_stats_shapes() {
    let wrapped: ApiStats = serde_json::from_str(
      r#"{"success": true, "stats": {"sessions": 4, "average_score": 72.5, "level": "beginner"}}"#,
    )
    .unwrap();
    let bare: ApiStats =
      serde_json::from_str(r#"{"success": true, "sessions": 2, "last": null}"#).unwrap();

    let wrapped = Stats::from(wrapped);
    assert_eq!(wrapped.metrics["sessions"], "4");
    assert_eq!(wrapped.metrics["average_score"], "72.5");
    assert_eq!(wrapped.metrics["level"], "beginner");

    let bare = Stats::from(bare);
    assert_eq!(bare.metrics.len(), 1);
    assert_eq!(bare.metrics["sessions"], "2");
  }

  #[test]
  fn test_error_body_parsing() {
    let (message, details) =
      ApiErrorBody::parse(br#"{"error": "Server Error", "details": "db locked"}"#).into_parts();
    assert_eq!(message.as_deref(), Some("Server Error"));
    assert_eq!(details.as_deref(), Some("db locked"));

    let (message, details) = ApiErrorBody::parse(b"<html>bad gateway</html>").into_parts();
    assert!(message.is_none());
    assert!(details.is_none());
  }
}
