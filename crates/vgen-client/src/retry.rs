//! Retry policy with exponential backoff.
//!
//! Single requests (submit, poll, download, chat) are retried on:
//! - Network errors
//! - HTTP 429 (Too Many Requests), honoring Retry-After
//!
//! Everything else, including client-side timeouts, is returned as-is.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info_span, warn, Instrument};

use crate::config::parse_var;
use crate::error::VideoGenResult;
use crate::metrics::record_retry;

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each later retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt count and base delay.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Create policy from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: parse_var("VGEN_MAX_RETRY_ATTEMPTS").unwrap_or(defaults.max_attempts),
            base_delay: parse_var("VGEN_RETRY_BASE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_delay: parse_var("VGEN_RETRY_MAX_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Backoff before retry number `attempt + 1` (`attempt` is 0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay to use after a failed attempt, letting a longer server hint win.
    fn delay_after(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.delay_for_attempt(attempt);
        match retry_after {
            Some(hint) if hint > backoff => hint.min(self.max_delay),
            _ => backoff,
        }
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// The caller sees either the first success or the last error.
    pub async fn run<T, F, Fut>(&self, operation: &str, op: F) -> VideoGenResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = VideoGenResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            let span = info_span!("vgen_attempt", operation = %operation, attempt = attempt + 1);

            match op().instrument(span).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation = %operation, attempts = attempt + 1, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.delay_after(attempt, e.retry_after());

                    warn!(
                        operation = %operation,
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Request failed, retrying: {}",
                        e
                    );

                    record_retry(operation);

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
