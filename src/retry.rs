//! Bounded retries with exponential back-off.
//!
//! Attempts run one after another, never concurrently. Between attempt `i`
//! and `i + 1` (0-indexed) the caller is suspended for `base_delay * 2^i`.
//! Errors that are not retryable end the loop immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first. Zero behaves like one.
  pub max_attempts: u32,
  /// Delay before the second attempt; doubles for each one after.
  pub base_delay: Duration,
  /// Deadline for a single attempt. `None` waits indefinitely.
  pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
    Self {
      max_attempts,
      base_delay,
      attempt_timeout: None,
    }
  }

  pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
    self.attempt_timeout = Some(timeout);
    self
  }

  /// Back-off after the failed attempt with the given 0-based index.
  pub fn delay_for(&self, attempt: u32) -> Duration {
    2u32
      .checked_pow(attempt)
      .and_then(|factor| self.base_delay.checked_mul(factor))
      .unwrap_or(Duration::MAX)
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::new(3, Duration::from_millis(1000))
  }
}

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
  /// Whether the failure is likely transient.
  fn is_retryable(&self) -> bool;

  /// Build the error reported when an attempt exceeds its deadline.
  fn timed_out(after: Duration) -> Self;
}

/// Run `operation` under `policy`.
///
/// Returns the first success, the first non-retryable error, or the error
/// of the final attempt, unchanged. No delay follows the final attempt.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
  E: Retryable + Display,
{
  let attempts = policy.max_attempts.max(1);
  let mut attempt = 0;

  loop {
    let result = match policy.attempt_timeout {
      Some(limit) => match tokio::time::timeout(limit, operation()).await {
        Ok(result) => result,
        Err(_) => Err(E::timed_out(limit)),
      },
      None => operation().await,
    };

    let error = match result {
      Ok(value) => return Ok(value),
      Err(error) => error,
    };

    if !error.is_retryable() {
      debug!(attempt, "giving up on non-retryable error: {}", error);
      return Err(error);
    }

    if attempt + 1 >= attempts {
      warn!(attempts, "all attempts failed: {}", error);
      return Err(error);
    }

    let delay = policy.delay_for(attempt);
    warn!(attempt, ?delay, "attempt failed, backing off: {}", error);
    tokio::time::sleep(delay).await;
    attempt += 1;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use tokio::time::Instant;

  #[derive(Debug, PartialEq)]
  enum TestError {
    Transient(u32),
    Fatal,
    TimedOut,
  }

  impl Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      write!(f, "{:?}", self)
    }
  }

  impl Retryable for TestError {
    fn is_retryable(&self) -> bool {
      !matches!(self, TestError::Fatal)
    }

    fn timed_out(_after: Duration) -> Self {
      TestError::TimedOut
    }
  }

  const BASE: Duration = Duration::from_millis(1000);

  #[tokio::test(start_paused = true)]
  async fn test_succeeds_after_two_failures_with_doubling_delays() {
    let calls = RefCell::new(Vec::new());
    let start = Instant::now();

    let result = with_retry(&RetryPolicy::new(3, BASE), || {
      calls.borrow_mut().push(Instant::now());
      let n = calls.borrow().len() as u32;
      async move {
        if n < 3 {
          Err(TestError::Transient(n))
        } else {
          Ok("done")
        }
      }
    })
    .await;

    assert_eq!(result, Ok("done"));
    let calls = calls.into_inner();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1] - calls[0], BASE);
    assert_eq!(calls[2] - calls[1], BASE * 2);
    // No sleep after the final success
    assert_eq!(start.elapsed(), BASE * 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_exhaustion_returns_last_error_without_trailing_sleep() {
    let calls = RefCell::new(0u32);
    let start = Instant::now();

    let result: Result<(), _> = with_retry(&RetryPolicy::new(3, BASE), || {
      *calls.borrow_mut() += 1;
      let n = *calls.borrow();
      async move { Err(TestError::Transient(n)) }
    })
    .await;

    assert_eq!(result, Err(TestError::Transient(3)));
    assert_eq!(*calls.borrow(), 3);
    assert_eq!(start.elapsed(), BASE * 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_fatal_error_short_circuits() {
    let calls = RefCell::new(0u32);
    let start = Instant::now();

    let result: Result<(), _> = with_retry(&RetryPolicy::new(5, BASE), || {
      *calls.borrow_mut() += 1;
      async { Err(TestError::Fatal) }
    })
    .await;

    assert_eq!(result, Err(TestError::Fatal));
    assert_eq!(*calls.borrow(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
  }

  #[tokio::test(start_paused = true)]
  async fn test_zero_attempts_still_runs_once() {
    let calls = RefCell::new(0u32);

    let result = with_retry(&RetryPolicy::new(0, BASE), || {
      *calls.borrow_mut() += 1;
      async { Ok::<_, TestError>(1) }
    })
    .await;

    assert_eq!(result, Ok(1));
    assert_eq!(*calls.borrow(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_hung_attempt_hits_deadline_and_is_retried() {
    let calls = RefCell::new(0u32);
    let policy = RetryPolicy::new(2, BASE).with_attempt_timeout(Duration::from_secs(5));

    let result = with_retry(&policy, || {
      *calls.borrow_mut() += 1;
      let n = *calls.borrow();
      async move {
        if n == 1 {
          tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok::<_, TestError>(n)
      }
    })
    .await;

    assert_eq!(result, Ok(2));
    assert_eq!(*calls.borrow(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_deadline_error_surfaces_after_exhaustion() {
    let policy = RetryPolicy::new(1, BASE).with_attempt_timeout(Duration::from_millis(10));

    let result: Result<(), TestError> = with_retry(&policy, || async {
      tokio::time::sleep(Duration::from_secs(1)).await;
      Ok(())
    })
    .await;

    assert_eq!(result, Err(TestError::TimedOut));
  }

  #[test]
  fn test_delay_schedule_saturates() {
    let policy = RetryPolicy::new(3, Duration::from_millis(100));
    assert_eq!(policy.delay_for(0), Duration::from_millis(100));
    assert_eq!(policy.delay_for(1), Duration::from_millis(200));
    assert_eq!(policy.delay_for(3), Duration::from_millis(800));
    assert_eq!(policy.delay_for(40), Duration::MAX);
  }
}
