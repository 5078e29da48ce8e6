//! Bounded retry runner shared by every source tier
//!
//! One attempt is one call of the supplied closure, bounded by
//! `attempt_timeout`. Between attempts the runner sleeps on an exponential
//! schedule with jitter. Blocking signals (rate limits, bans, open circuits)
//! stop the loop at once so the caller can escalate to the next tier.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{DigestError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Consecutive empty results after which the unit is given up on
    pub max_consecutive_empty: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
            max_consecutive_empty: 2,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting. Used where a caller wants one shot.
    pub fn once(attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            attempt_timeout,
            ..Self::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_multiplier(self.multiplier)
            .with_randomization_factor(0.5) // Jitter: +/- 50%
            .with_max_elapsed_time(None)
            .build()
    }

    /// Runs `op` until it succeeds or the policy gives up.
    ///
    /// `op` receives the 1-based attempt number. It should return
    /// [`DigestError::EmptyResult`] when a call worked but produced nothing.
    pub async fn run<T, F, Fut>(&self, unit: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut schedule = self.backoff();
        let mut consecutive_empty = 0u32;
        let mut last_error: Option<DigestError> = None;

        for attempt in 1..=self.max_attempts.max(1) {
            let outcome = match tokio::time::timeout(self.attempt_timeout, op(attempt)).await {
                Ok(result) => result,
                Err(_) => Err(DigestError::Timeout(self.attempt_timeout)),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(unit = %unit, attempt = attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_blocking() => {
                    warn!(unit = %unit, attempt = attempt, error = %e, "Source is blocking, escalating");
                    return Err(e);
                }
                Err(e @ DigestError::EmptyResult(_)) => {
                    consecutive_empty += 1;
                    if consecutive_empty >= self.max_consecutive_empty.max(1) {
                        debug!(unit = %unit, attempt = attempt, "Repeated empty results, escalating");
                        return Err(e);
                    }
                    last_error = Some(e);
                }
                Err(e) if e.is_retryable() => {
                    consecutive_empty = 0;
                    warn!(unit = %unit, attempt = attempt, max_attempts = self.max_attempts, error = %e, "Transient error, will retry");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }

            if attempt < self.max_attempts {
                let delay = schedule.next_backoff().unwrap_or(self.max_backoff);
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| DigestError::EmptyResult(unit.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            attempt_timeout: Duration::from_millis(200),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
            max_consecutive_empty: 2,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = fast_policy()
            .run("feed", |attempt| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if attempt < 3 {
                        Err(DigestError::Timeout(Duration::from_millis(1)))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_blocking_escalates_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<()> = fast_policy()
            .run("@ANI", |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(DigestError::RateLimited("social".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(DigestError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_two_empty_results_escalate() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<()> = fast_policy()
            .run("@ndtv", |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(DigestError::EmptyResult("@ndtv".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(DigestError::EmptyResult(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attempt_timeout_and_exhaustion() {
        let policy = RetryPolicy {
            max_attempts: 2,
            attempt_timeout: Duration::from_millis(10),
            ..fast_policy()
        };
        let result: Result<()> = policy
            .run("slow", |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(DigestError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<()> = fast_policy()
            .run("feed", |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(DigestError::ParseError("not a feed".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
