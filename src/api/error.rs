use std::time::Duration;
use thiserror::Error;

use crate::retry::Retryable;

/// Message used when a failure carries no usable description.
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred";

/// Whether retrying a failed request could help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Network hiccup, overloaded server or deadline expiry
  Retryable,
  /// Client error, semantic rejection or unusable payload
  Fatal,
}

/// Uniform failure shape for every gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
  pub kind: ErrorKind,
  pub message: String,
  pub status_code: Option<u16>,
  pub details: Option<String>,
}

impl ApiError {
  pub fn retryable(message: impl Into<String>) -> Self {
    Self {
      kind: ErrorKind::Retryable,
      message: message.into(),
      status_code: None,
      details: None,
    }
  }

  pub fn fatal(message: impl Into<String>) -> Self {
    Self {
      kind: ErrorKind::Fatal,
      message: message.into(),
      status_code: None,
      details: None,
    }
  }

  /// Classify a non-success HTTP status.
  ///
  /// 408, 429 and 5xx are worth retrying for idempotent requests.
  pub fn from_status(
    status: u16,
    message: Option<String>,
    details: Option<String>,
    idempotent: bool,
  ) -> Self {
    let transient = status == 408 || status == 429 || (500..600).contains(&status);
    Self {
      kind: if transient && idempotent {
        ErrorKind::Retryable
      } else {
        ErrorKind::Fatal
      },
      message: message.unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
      status_code: Some(status),
      details,
    }
  }

  /// Classify a transport-level failure from reqwest.
  ///
  /// A request that never connected is safe to resend whatever the method.
  pub fn from_transport(error: &reqwest::Error, idempotent: bool) -> Self {
    let retryable = error.is_connect()
      || (idempotent && (error.is_timeout() || error.is_request() || error.is_body()));
    Self {
      kind: if retryable {
        ErrorKind::Retryable
      } else {
        ErrorKind::Fatal
      },
      message: FALLBACK_MESSAGE.to_string(),
      status_code: error.status().map(|s| s.as_u16()),
      details: Some(error.to_string()),
    }
  }

  pub fn with_details(mut self, details: impl Into<String>) -> Self {
    self.details = Some(details.into());
    self
  }
}

impl Retryable for ApiError {
  fn is_retryable(&self) -> bool {
    self.kind == ErrorKind::Retryable
  }

  fn timed_out(after: Duration) -> Self {
    Self::retryable("Request timed out").with_details(format!("no response within {:?}", after))
  }
}
