//! Retry policy and the shared retry loop.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{ProxyError, Result};

const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Bounded retry with linear backoff.
///
/// Attempts are numbered from 0. After attempt `n` fails the loop waits
/// `n * base_delay`, unless the upstream supplied a `Retry-After` hint, which
/// wins up to `max_retry_after`. Throttled attempts count toward
/// `max_attempts` like any other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Backoff unit multiplied by the attempt index
    pub base_delay: Duration,
    /// Ceiling on server-supplied `Retry-After` hints
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
        }
    }

    pub fn with_max_retry_after(mut self, max_retry_after: Duration) -> Self {
        self.max_retry_after = max_retry_after;
        self
    }

    /// Computed backoff after attempt `attempt` fails: `attempt * base_delay`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Actual wait after a failed attempt, preferring the server's hint
    /// clamped to `max_retry_after`.
    pub fn delay_after(&self, attempt: u32, error: &ProxyError) -> Duration {
        match error.retry_after() {
            Some(hint) if hint > self.max_retry_after => {
                warn!(
                    hint_secs = hint.as_secs(),
                    max_secs = self.max_retry_after.as_secs(),
                    "clamping upstream Retry-After hint"
                );
                self.max_retry_after
            }
            Some(hint) => hint,
            None => self.backoff_for(attempt),
        }
    }
}

/// Runs `operation` until it succeeds, a non-retryable error occurs, or
/// `policy.max_attempts` attempts have failed.
///
/// Exhaustion is reported as `ExhaustedRetries` wrapping the last error.
/// No sleep follows the final attempt.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..policy.max_attempts {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                if attempt + 1 < policy.max_attempts {
                    let delay = policy.delay_after(attempt, &e);
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying upstream request"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(ProxyError::ExhaustedRetries {
        attempts: policy.max_attempts,
        last: Box::new(
            last_err.unwrap_or_else(|| ProxyError::Internal("no attempts were made".to_string())),
        ),
    })
}
