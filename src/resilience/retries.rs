//! Retry logic.
//!
//! # Responsibilities
//! - Run a logical request as up to `retries + 1` sequential attempts
//! - Bound every attempt with its own deadline
//! - Wait `retry_delay * (attempt + 1)` between failed attempts
//!
//! # Design Decisions
//! - Every failure is retried, HTTP error statuses included
//! - Intermediate failures are logged, only the last one is returned
//! - An attempt never starts before the previous one has settled

use std::future::Future;
use std::time::Duration;

use crate::config::RequestConfig;
use crate::http::FetchError;
use crate::observability::metrics;
use crate::resilience::backoff::linear_backoff;
use crate::resilience::timeouts::with_deadline;

/// Attempt budget and timing for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Base delay for linear backoff.
    pub retry_delay: Duration,
    /// Deadline for each individual attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RequestConfig) -> Self {
        Self {
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Total number of physical attempts.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RequestConfig::default())
    }
}

/// Run `operation` until it succeeds or the retry budget is spent.
///
/// `operation` receives the zero-based attempt index. The last failure is
/// returned unchanged.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    loop {
        match with_deadline(policy.timeout, operation(attempt)).await {
            Ok(value) => {
                metrics::record_request_attempt("success");
                metrics::record_request(true);
                return Ok(value);
            }
            Err(e) => {
                metrics::record_request_attempt(e.kind());

                if attempt >= policy.retries {
                    tracing::warn!(
                        attempts = attempt + 1,
                        error = %e,
                        "Request failed, retry budget exhausted"
                    );
                    metrics::record_request(false);
                    return Err(e);
                }

                let delay = linear_backoff(attempt, policy.retry_delay);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts(),
                    delay = ?delay,
                    error = %e,
                    "Request attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            retry_delay: Duration::from_millis(1000),
            timeout: Duration::from_millis(10_000),
        }
    }

    fn unavailable() -> FetchError {
        FetchError::Http {
            status: 503,
            status_text: "Service Unavailable".to_string(),
        }
    }

    #[test]
    fn default_policy_matches_request_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries, 2);
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.retry_delay, Duration::from_secs(1));
        assert_eq!(policy.timeout, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = retry_with_backoff(policy(2), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(unavailable())
                } else {
                    Ok("third")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "third");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1000ms after the first failure, 2000ms after the second.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_when_budget_spent() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), _> = retry_with_backoff(policy(1), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Err(FetchError::Http {
                    status: 500 + attempt as u16,
                    status_text: String::new(),
                })
            }
        })
        .await;

        assert_eq!(result.unwrap_err().status(), Some(501));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn success_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(policy(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(1) }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_attempt_is_retried() {
        let policy = RetryPolicy {
            retries: 1,
            retry_delay: Duration::from_millis(100),
            timeout: Duration::from_millis(500),
        };

        let result = retry_with_backoff(policy, |attempt| async move {
            if attempt == 0 {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(attempt)
        })
        .await;

        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(policy(0), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Timeout(Duration::from_millis(1))) }
        })
        .await;
        assert!(result.unwrap_err().is_transport());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
