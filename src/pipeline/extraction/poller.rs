//! Bounded retry loop, independent of what is being polled.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use super::types::PollConfig;

/// How a poll loop ended when the check itself never failed.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut { attempts: u32, elapsed: Duration },
}

/// Run `check` until it yields a value or `config.timeout` has elapsed.
///
/// `check` returns `Ok(None)` while the work is still pending. An `Err` ends
/// the loop at once; terminal failures are not retried. The deadline is
/// tested before every attempt, so a zero timeout evaluates nothing and an
/// interval at or above the timeout allows a single attempt.
pub async fn poll_until<T, E, F, Fut>(config: &PollConfig, mut check: F) -> Result<PollOutcome<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        let elapsed = started.elapsed();
        if elapsed >= config.timeout {
            return Ok(PollOutcome::TimedOut { attempts, elapsed });
        }

        attempts += 1;
        if let Some(value) = check().await? {
            return Ok(PollOutcome::Ready(value));
        }

        tracing::trace!(attempt = attempts, "Still pending, sleeping {:?}", config.interval);
        sleep(config.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::pipeline::extraction::types::MIN_POLL_INTERVAL;

    fn secs(timeout: u64, interval: u64) -> PollConfig {
        PollConfig::new(Duration::from_secs(timeout), Duration::from_secs(interval))
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_returns_without_sleeping() {
        let started = Instant::now();
        let outcome: Result<_, ()> = poll_until(&secs(30, 5), || async { Ok(Some("done")) }).await;
        assert_eq!(outcome, Ok(PollOutcome::Ready("done")));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_pending_until_ready() {
        let calls = Cell::new(0u32);
        let outcome: Result<_, ()> = poll_until(&secs(30, 2), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Ok((n == 3).then_some(n)) }
        })
        .await;
        assert_eq!(outcome, Ok(PollOutcome::Ready(3)));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_within_one_interval_of_deadline() {
        let started = Instant::now();
        let outcome: Result<PollOutcome<()>, ()> =
            poll_until(&secs(10, 3), || async { Ok(None) }).await;

        match outcome {
            Ok(PollOutcome::TimedOut { attempts, elapsed }) => {
                assert_eq!(attempts, 4);
                assert!(elapsed >= Duration::from_secs(10));
                assert!(elapsed <= Duration::from_secs(13));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(started.elapsed() <= Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn error_propagates_without_retry() {
        let calls = Cell::new(0u32);
        let outcome: Result<PollOutcome<()>, &str> = poll_until(&secs(30, 1), || {
            calls.set(calls.get() + 1);
            async { Err("job failed") }
        })
        .await;
        assert_eq!(outcome, Err("job failed"));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_at_or_above_timeout_allows_one_attempt() {
        let calls = Cell::new(0u32);
        let outcome: Result<PollOutcome<()>, ()> = poll_until(&secs(5, 5), || {
            calls.set(calls.get() + 1);
            async { Ok(None) }
        })
        .await;
        assert!(matches!(outcome, Ok(PollOutcome::TimedOut { attempts: 1, .. })));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_spaced_by_minimum() {
        let calls = Cell::new(0u32);
        let config = PollConfig::new(Duration::from_millis(200), Duration::ZERO);
        let outcome: Result<PollOutcome<()>, ()> = poll_until(&config, || {
            calls.set(calls.get() + 1);
            async { Ok(None) }
        })
        .await;

        let max_checks = (200 / MIN_POLL_INTERVAL.as_millis() + 1) as u32;
        assert!(matches!(outcome, Ok(PollOutcome::TimedOut { .. })));
        assert!(calls.get() <= max_checks, "{} checks", calls.get());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_evaluates_nothing() {
        let calls = Cell::new(0u32);
        let outcome: Result<PollOutcome<()>, ()> =
            poll_until(&PollConfig::from_secs(0.0, 1.0), || {
                calls.set(calls.get() + 1);
                async { Ok(None) }
            })
            .await;
        assert!(matches!(outcome, Ok(PollOutcome::TimedOut { attempts: 0, .. })));
        assert_eq!(calls.get(), 0);
    }
}
