//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failure is worth another attempt
//! - Execute retries with exponential backoff + jitter
//! - Stop after the policy's attempt budget is spent
//!
//! # Design Decisions
//! - Only transient failures are retried (transport errors, throttling, 502/503/504)
//! - The last error is returned unchanged so callers can log it
//! - Backoff timers run on a Tokio runtime handle, so the retry loop itself
//!   may be polled by any executor (the SDK export threads use `block_on`)

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::resilience::backoff::RetryPolicy;

/// Errors that know whether repeating the operation could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// HTTP statuses a collector uses to signal a transient condition.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

/// Run `op` until it succeeds, fails permanently, or the policy is exhausted.
///
/// `op` receives the 1-based attempt number. Delays are slept on `timer`.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    timer: &Handle,
    mut op: F,
) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let delay = policy.delay_after(attempt);
                tracing::debug!(
                    attempt,
                    delay = ?delay,
                    error = %e,
                    "Retrying after transient failure"
                );
                sleep_on(timer, delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn sleep_on(timer: &Handle, delay: Duration) {
    // A runtime shutting down cancels the sleep; retrying early is harmless.
    let _ = timer.spawn(tokio::time::sleep(delay)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct Failure {
        transient: bool,
    }

    impl std::fmt::Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "failure (transient: {})", self.transient)
        }
    }

    impl Retryable for Failure {
        fn is_retryable(&self) -> bool {
            self.transient
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let timer = Handle::current();
        let result = retry_with_backoff(&fast_policy(3), &timer, move |_| async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Failure { transient: true })
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_when_attempts_exhausted() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let timer = Handle::current();
        let result: Result<(), Failure> =
            retry_with_backoff(&fast_policy(4), &timer, move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Failure { transient: true })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let timer = Handle::current();
        let result: Result<(), Failure> =
            retry_with_backoff(&fast_policy(5), &timer, move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Failure { transient: false })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(500));
    }
}
