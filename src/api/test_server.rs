//! Throwaway practice API used by tests.
//!
//! Content ids with special behavior:
//! - `missing`: 404 with `success: false`
//! - `soft-fail`: 200 with `success: false`
//! - `flaky`: 503 for the first two requests, then questions
//! - `empty`: success with no questions
//! - `slow`: questions after a 300ms delay
//!
//! Any other id gets three questions whose correct choices are 0, 1 and 2.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Hits(Arc<Mutex<HashMap<String, usize>>>);

impl Hits {
  fn bump(&self, key: String) -> usize {
    let mut map = self.0.lock().unwrap();
    let count = map.entry(key).or_insert(0);
    *count += 1;
    *count
  }
}

pub struct TestServer {
  pub base_url: String,
  hits: Hits,
  _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
  /// Number of requests seen for `<route>:<id>`.
  pub fn hits(&self, key: &str) -> usize {
    self.hits.0.lock().unwrap().get(key).copied().unwrap_or(0)
  }
}

pub fn sample_questions(content_id: &str) -> Value {
  let questions: Vec<Value> = (0..3)
    .map(|n| {
      json!({
        "id": n + 1,
        "question": format!("Question {} for {}", n + 1, content_id),
        "options": ["first", "second", "third", "fourth"],
        "correct": n,
        "audio_url": format!("/audio/{}/{}.mp3", content_id, n + 1),
      })
    })
    .collect();

  json!({
    "success": true,
    "video_title": format!("Content {}", content_id),
    "level": "intermediate",
    "questions": questions,
  })
}

async fn questions(State(hits): State<Hits>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
  let count = hits.bump(format!("questions:{}", id));
  match id.as_str() {
    "missing" => (
      StatusCode::NOT_FOUND,
      Json(json!({ "success": false, "error": "Video not found" })),
    ),
    "soft-fail" => (
      StatusCode::OK,
      Json(json!({ "success": false, "error": "Questions are not ready" })),
    ),
    "flaky" if count < 3 => (
      StatusCode::SERVICE_UNAVAILABLE,
      Json(json!({ "error": "Service busy" })),
    ),
    "empty" => (
      StatusCode::OK,
      Json(json!({ "success": true, "questions": [] })),
    ),
    "slow" => {
      tokio::time::sleep(Duration::from_millis(300)).await;
      (StatusCode::OK, Json(sample_questions(&id)))
    }
    _ => (StatusCode::OK, Json(sample_questions(&id))),
  }
}

async fn content(State(hits): State<Hits>, Path(id): Path<String>) -> Json<Value> {
  hits.bump(format!("content:{}", id));
  Json(json!({ "video_id": id, "title": format!("Content {}", id) }))
}

async fn delete_content(State(hits): State<Hits>, Path(id): Path<String>) -> StatusCode {
  hits.bump(format!("delete:{}", id));
  StatusCode::NO_CONTENT
}

async fn answer(State(hits): State<Hits>, Path(id): Path<String>) -> Json<Value> {
  hits.bump(format!("answer:{}", id));
  Json(json!({ "success": true }))
}

async fn score(State(hits): State<Hits>, Json(body): Json<Value>) -> Json<Value> {
  let level = body["difficulty_level"].as_str().unwrap_or_default();
  hits.bump(format!("score:{}", level));
  Json(json!({ "success": true }))
}

async fn stats(State(hits): State<Hits>) -> Json<Value> {
  hits.bump("stats".to_string());
  let sessions: usize = {
    let map = hits.0.lock().unwrap();
    map
      .iter()
      .filter(|(key, _)| key.starts_with("score:"))
      .map(|(_, count)| count)
      .sum()
  };
  Json(json!({ "success": true, "stats": { "sessions": sessions } }))
}

pub async fn spawn() -> TestServer {
  let hits = Hits::default();
  let app = Router::new()
    .route("/api/questions/:id", get(questions))
    .route("/api/questions/:id/answer", post(answer))
    .route("/api/videos/:id", get(content).delete(delete_content))
    .route("/api/metrics/comprehension", post(score))
    .route("/api/metrics/stats", get(stats))
    .with_state(hits.clone());

  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  let handle = tokio::spawn(async move {
    axum::serve(listener, app).await.unwrap();
  });

  TestServer {
    base_url: format!("http://{}", addr),
    hits,
    _handle: handle,
  }
}
