use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::cache::TtlCache;
use crate::config::ApiConfig;

use super::api_types::{
  ApiContent, ApiContentList, ApiErrorBody, ApiProcessResponse, ApiQuestionsResponse, ApiStats,
};
use super::error::ApiError;
use super::types::{ContentSummary, ProcessedContent, QuestionSet, Stats};

/// HTTP gateway to the practice API.
///
/// GET responses are served from an in-memory TTL cache keyed by the full
/// URL; only successful reads are stored. Requests that mutate a resource
/// drop its cached entries. Failures come back as [`ApiError`], already
/// classified as retryable or fatal. Retries are left to the caller.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
  cache: Arc<Mutex<TtlCache<Vec<u8>>>>,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    Self::with_base_url(&config.base_url, Duration::from_secs(config.cache_ttl_secs))
  }

  pub fn with_base_url(base_url: &str, cache_ttl: Duration) -> Result<Self> {
    let base_url =
      Url::parse(base_url).map_err(|e| eyre!("Invalid API base URL {}: {}", base_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("Invalid API base URL {}: not a base URL", base_url));
    }

    let http = reqwest::Client::builder()
      .user_agent(concat!("listen-drill/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      cache: Arc::new(Mutex::new(TtlCache::new(cache_ttl))),
    })
  }

  /// Build an endpoint URL below the base URL, escaping each segment.
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  fn cache(&self) -> MutexGuard<'_, TtlCache<Vec<u8>>> {
    // Entries are replaced whole, so a poisoned map is still consistent
    self.cache.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Drop the cached response for a URL.
  pub fn invalidate(&self, url: &Url) {
    if self.cache().invalidate(url.as_str()) {
      debug!(url = %url, "cache entry invalidated");
    }
  }

  /// Issue a request and return the raw response body.
  pub async fn request(
    &self,
    method: Method,
    url: Url,
    body: Option<&Value>,
  ) -> std::result::Result<Vec<u8>, ApiError> {
    let key = url.as_str().to_string();
    let idempotent = method.is_idempotent();

    if method == Method::GET {
      if let Some(cached) = self.cache().get(&key) {
        debug!(url = %key, "cache hit");
        return Ok(cached);
      }
      debug!(url = %key, "cache miss");
    } else {
      self.invalidate(&url);
    }

    let mut request = self.http.request(method.clone(), url);
    if let Some(body) = body {
      request = request.json(body);
    }

    let response = request.send().await.map_err(|e| {
      warn!(%method, url = %key, "request failed: {}", e);
      ApiError::from_transport(&e, idempotent)
    })?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(|e| {
      warn!(%method, url = %key, "failed to read response body: {}", e);
      ApiError::from_transport(&e, idempotent)
    })?;

    if !status.is_success() {
      let (message, details) = ApiErrorBody::parse(&bytes).into_parts();
      let error = ApiError::from_status(status.as_u16(), message, details, idempotent);
      warn!(%method, url = %key, status = status.as_u16(), "request rejected: {}", error);
      return Err(error);
    }

    let body = bytes.to_vec();
    if method == Method::GET {
      self.cache().insert(key, body.clone());
    }
    Ok(body)
  }

  /// GET and decode a JSON body. Undecodable bodies are evicted from the cache.
  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> std::result::Result<T, ApiError> {
    let body = self.request(Method::GET, url.clone(), None).await?;
    serde_json::from_slice(&body).map_err(|e| {
      self.invalidate(&url);
      ApiError::fatal("Received an unreadable response").with_details(e.to_string())
    })
  }

  async fn post_json(&self, url: Url, body: &Value) -> std::result::Result<Vec<u8>, ApiError> {
    self.request(Method::POST, url, Some(body)).await
  }

  /// Fetch the questions for a piece of content.
  ///
  /// A `success: false` payload is a fatal error and is not left in the cache.
  pub async fn fetch_questions(
    &self,
    content_id: &str,
  ) -> std::result::Result<QuestionSet, ApiError> {
    let url = self.endpoint(&["api", "questions", content_id]);
    let response: ApiQuestionsResponse = self.get_json(url.clone()).await?;

    response.into_question_set(content_id).map_err(|e| {
      self.invalidate(&url);
      e
    })
  }

  /// List the content available for practice.
  pub async fn list_contents(&self) -> std::result::Result<Vec<ContentSummary>, ApiError> {
    let list: ApiContentList = self.get_json(self.endpoint(&["api", "videos"])).await?;
    Ok(list.into_summaries())
  }

  pub async fn get_content(
    &self,
    content_id: &str,
  ) -> std::result::Result<ContentSummary, ApiError> {
    let content: ApiContent = self
      .get_json(self.endpoint(&["api", "videos", content_id]))
      .await?;
    Ok(content.into())
  }

  /// Delete content, dropping every cached read that refers to it.
  pub async fn delete_content(&self, content_id: &str) -> std::result::Result<(), ApiError> {
    self.invalidate(&self.endpoint(&["api", "questions", content_id]));
    self.invalidate(&self.endpoint(&["api", "videos"]));

    let url = self.endpoint(&["api", "videos", content_id]);
    self.request(Method::DELETE, url, None).await?;
    Ok(())
  }

  /// Submit source content for question generation.
  pub async fn submit_content(
    &self,
    source_url: &str,
    level: &str,
  ) -> std::result::Result<ProcessedContent, ApiError> {
    let body = json!({ "url": source_url, "level": level });
    let raw = self.post_json(self.endpoint(&["api", "process"]), &body).await?;
    self.invalidate(&self.endpoint(&["api", "videos"]));

    let response: ApiProcessResponse = serde_json::from_slice(&raw).map_err(|e| {
      ApiError::fatal("Received an unreadable response").with_details(e.to_string())
    })?;
    if !response.success {
      return Err(ApiError::fatal("Content could not be processed"));
    }
    Ok(response.into())
  }

  /// Report a scored answer to the server.
  pub async fn submit_answer(
    &self,
    content_id: &str,
    question_index: usize,
    choice_index: usize,
    is_correct: bool,
  ) -> std::result::Result<(), ApiError> {
    let body = json!({
      "questionId": question_index,
      "answer": { "answer": choice_index, "isCorrect": is_correct },
    });
    let url = self.endpoint(&["api", "questions", content_id, "answer"]);
    self.post_json(url, &body).await?;
    Ok(())
  }

  /// Report a finished session's comprehension score (0-100).
  pub async fn submit_score(
    &self,
    score_percent: f64,
    level: Option<&str>,
  ) -> std::result::Result<(), ApiError> {
    let body = json!({
      "score": score_percent,
      "difficulty_level": level.unwrap_or("intermediate"),
    });
    let url = self.endpoint(&["api", "metrics", "comprehension"]);
    self.post_json(url, &body).await?;
    self.invalidate(&self.endpoint(&["api", "metrics", "stats"]));
    Ok(())
  }

  /// Aggregate practice metrics. Cached like any other read.
  pub async fn stats(&self) -> std::result::Result<Stats, ApiError> {
    let stats: ApiStats = self.get_json(self.endpoint(&["api", "metrics", "stats"])).await?;
    Ok(stats.into())
  }

  /// Resolve an audio reference to a playable URL.
  ///
  /// Absolute references pass through; relative ones resolve against the
  /// base URL.
  pub fn audio_url(&self, audio_ref: &str) -> Option<Url> {
    match Url::parse(audio_ref) {
      Ok(url) => Some(url),
      Err(url::ParseError::RelativeUrlWithoutBase) => self.base_url.join(audio_ref).ok(),
      Err(_) => None,
    }
  }
}
