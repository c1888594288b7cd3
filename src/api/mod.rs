//! Client for the practice API: questions, content and progress reporting.

pub mod api_types;
pub mod client;
pub mod error;
pub mod types;

#[cfg(test)]
pub(crate) mod test_server;

pub use client::ApiClient;
pub use error::ApiError;
pub use types::{Question, QuestionSet};
