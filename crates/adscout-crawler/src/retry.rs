//! Retry with exponential backoff for transient browser failures.
//!
//! Only failures classified as transient are retried; fatal failures
//! propagate immediately without consuming further attempts. The delay
//! before attempt `n + 1` is `initial_delay * backoff^(n - 1)`.

use crate::error::CrawlError;
use adscout_browser::BrowserError;
use adscout_core::CrawlerConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Retry parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            backoff: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Build a policy from the crawler config.
    #[must_use]
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            backoff: config.retry_backoff,
        }
    }

    /// Delay to sleep after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.initial_delay
            .mul_f64(self.backoff.powi(exponent.try_into().unwrap_or(i32::MAX)))
    }
}

/// Classifies errors as worth retrying or not.
pub trait Retryable {
    /// Whether another attempt could plausibly succeed.
    fn is_retryable(&self) -> bool;
}

impl Retryable for BrowserError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

impl Retryable for CrawlError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Browser(e) => e.is_transient(),
            Self::Database(_) => false,
        }
    }
}

/// Run `operation` until it succeeds, a fatal error occurs, or the
/// attempt budget is exhausted.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() {
                    tracing::error!(operation, error = %err, "Fatal error, not retrying");
                    return Err(err);
                }
                if attempt >= policy.max_attempts {
                    tracing::error!(
                        operation,
                        attempts = policy.max_attempts,
                        error = %err,
                        "Retry budget exhausted"
                    );
                    return Err(err);
                }
                let delay = policy.delay_after_attempt(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
