//! Bounded retry-with-timeout executor.
//!
//! Every cluster-mutating call (resize, node delete, reboot command) is
//! driven through [`execute`]. The operation decides per attempt whether
//! its error is worth retrying; the executor only owns the clock.
//!
//! Guarantees for a policy `{timeout, interval}`:
//! - the first attempt starts immediately
//! - no attempt starts once `timeout` has elapsed, so at most
//!   `ceil(timeout / interval)` attempts run
//! - on exhaustion the last attempt's error is returned as-is

use drill_types::RetryPolicy;
use std::fmt::Display;
use std::future::Future;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T, E> {
    /// Success, stop retrying.
    Done(T),
    /// Transient failure, try again after the interval.
    Retry(E),
    /// Non-retryable failure, stop immediately.
    Fatal(E),
}

impl<T, E> Attempt<T, E> {
    /// Treat every error of `result` as transient.
    pub fn retry_on_err(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Attempt::Done(value),
            Err(e) => Attempt::Retry(e),
        }
    }
}

/// Run `op` until it succeeds, fails fatally, or `policy.timeout()` elapses.
///
/// `what` labels the operation in logs.
///
/// # Errors
///
/// Returns the fatal error, or the last transient error once the next
/// attempt would start at or after the timeout.
pub async fn execute<T, E, F, Fut>(what: &str, policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
    E: Display,
{
    let start = Instant::now();
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        match op().await {
            Attempt::Done(value) => {
                if attempt > 1 {
                    debug!(what, attempt, "succeeded after retries");
                }
                return Ok(value);
            }
            Attempt::Fatal(e) => {
                warn!(what, attempt, error = %e, "non-retryable failure");
                return Err(e);
            }
            Attempt::Retry(e) => {
                let elapsed = start.elapsed();
                if elapsed.saturating_add(policy.interval()) >= policy.timeout() {
                    warn!(
                        what,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %e,
                        "retry budget exhausted"
                    );
                    return Err(e);
                }
                debug!(
                    what,
                    attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "attempt failed, retrying in {:?}",
                    policy.interval()
                );
                sleep(policy.interval()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_needs_no_sleep() {
        let start = Instant::now();
        let result: Result<u32, String> =
            execute("op", RetryPolicy::SCALE, || async { Attempt::Done(7) }).await;
        assert_eq!(result, Ok(7));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_nth_attempt() {
        let calls = counter();
        let start = Instant::now();
        let result: Result<&str, String> = execute("op", RetryPolicy::SCALE, || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 4 {
                    Attempt::Retry(format!("attempt {n} rejected"))
                } else {
                    Attempt::Done("resized")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("resized"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(3 * 120));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let calls = counter();
        let start = Instant::now();
        let result: Result<(), String> = execute("op", RetryPolicy::SCALE, || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Attempt::Retry(format!("attempt {n} rejected"))
            }
        })
        .await;

        // 60 min / 2 min = 30 attempts, none started at or after the timeout
        assert_eq!(calls.load(Ordering::SeqCst), 30);
        assert_eq!(result, Err("attempt 30 rejected".to_string()));
        assert!(start.elapsed() < RetryPolicy::SCALE.timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_bounded_by_ceiling() {
        let policy = RetryPolicy::new(Duration::from_secs(10), Duration::from_secs(3));
        let calls = counter();
        let _: Result<(), &str> = execute("op", policy, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Attempt::Retry("busy")
            }
        })
        .await;
        assert_eq!(u64::from(calls.load(Ordering::SeqCst)), policy.max_attempts());
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_stops_immediately() {
        let calls = counter();
        let result: Result<(), String> = execute("op", RetryPolicy::SCALE, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Attempt::Fatal("quota exceeded".to_string())
            }
        })
        .await;
        assert_eq!(result, Err("quota exceeded".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_runs_once() {
        let policy = RetryPolicy::new(Duration::ZERO, Duration::from_secs(1));
        let calls = counter();
        let result: Result<(), &str> = execute("op", policy, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Attempt::Retry("busy")
            }
        })
        .await;
        assert_eq!(result, Err("busy"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempts_never_start_after_timeout() {
        let policy = RetryPolicy::new(Duration::from_secs(60 * 60), Duration::from_secs(120));
        let calls = counter();
        let start = Instant::now();
        let _: Result<(), &str> = execute("op", policy, || {
            let calls = calls.clone();
            async move {
                assert!(start.elapsed() < policy.timeout());
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_secs(50 * 60)).await;
                Attempt::Retry("slow")
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_policy_does_not_overflow() {
        let policy = RetryPolicy::new(Duration::MAX, Duration::MAX);
        let calls = counter();
        let result: Result<(), &str> = execute("op", policy, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Attempt::Retry("busy")
            }
        })
        .await;
        assert_eq!(result, Err("busy"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retry_on_err_maps_results() {
        assert_eq!(Attempt::<u8, &str>::retry_on_err(Ok(1)), Attempt::Done(1));
        assert_eq!(Attempt::<u8, &str>::retry_on_err(Err("x")), Attempt::Retry("x"));
    }
}
