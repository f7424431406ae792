//! Bounded retry with a fixed delay between attempts

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// How often and how patiently to retry a git operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Zero or negative means a single attempt with no retry
    pub max_attempts: i32,
    /// Sleep between attempts (never after the last one)
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: i32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run once, never retry
    pub const fn once() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}

/// Failure returned by [`retry`]
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The policy allowed a single attempt; the error is passed through untouched
    #[error(transparent)]
    Failed(E),

    #[error("{label} failed after {attempts} attempts: {last}")]
    Exhausted {
        label: String,
        attempts: u32,
        #[source]
        last: E,
    },
}

impl<E> RetryError<E> {
    /// The error from the final attempt
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Failed(e) | RetryError::Exhausted { last: e, .. } => e,
        }
    }

    pub fn into_last_error(self) -> E {
        match self {
            RetryError::Failed(e) | RetryError::Exhausted { last: e, .. } => e,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Failed(_) => 1,
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// `op` is called again for every attempt, so anything it computes per call
/// (such as a rotated token) is fresh each time.
pub async fn retry<T, E, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    if policy.max_attempts <= 0 {
        return op().await.map_err(RetryError::Failed);
    }

    let max_attempts = policy.max_attempts as u32;
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::warn!("{} succeeded after {} attempts", label, attempt);
                }
                return Ok(value);
            }
            Err(last) if attempt >= max_attempts => {
                return Err(RetryError::Exhausted {
                    label: label.to_string(),
                    attempts: attempt,
                    last,
                });
            }
            Err(e) => {
                tracing::warn!(
                    "Attempt {}/{} failed for {}: {}. Retrying in {:?}",
                    attempt,
                    max_attempts,
                    label,
                    e,
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
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

    /// Fails the first `failures` calls, then succeeds
    async fn flaky(calls: &AtomicU32, failures: u32) -> Result<u32, String> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= failures {
            Err(format!("boom {}", n))
        } else {
            Ok(n)
        }
    }

    #[tokio::test]
    async fn test_non_positive_attempts_run_once() {
        for max_attempts in [0, -1, -10] {
            let calls = AtomicU32::new(0);
            let policy = RetryPolicy::new(max_attempts, Duration::from_secs(60));

            let err = retry(policy, "clone", || flaky(&calls, u32::MAX))
                .await
                .unwrap_err();

            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(matches!(err, RetryError::Failed(ref e) if e == "boom 1"));
            assert_eq!(err.to_string(), "boom 1");
        }
    }

    #[tokio::test]
    async fn test_single_attempt_success_passes_through() {
        let calls = AtomicU32::new(0);
        let value = retry(RetryPolicy::once(), "clone", || flaky(&calls, 0))
            .await
            .unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let start = Instant::now();

        let value = retry(policy, "fetch", || flaky(&calls, 2)).await.unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // exactly two delays elapsed
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(4, Duration::from_secs(1));
        let start = Instant::now();

        let err = retry(policy, "clone a/b", || flaky(&calls, u32::MAX))
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.attempts(), 4);
        assert_eq!(err.last_error(), "boom 4");
        assert_eq!(err.to_string(), "clone a/b failed after 4 attempts: boom 4");
        // no sleep after the final attempt
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_first_try_success_does_not_sleep() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(3600));
        let value = retry(policy, "clone", || flaky(&calls, 0)).await.unwrap();
        assert_eq!(value, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
