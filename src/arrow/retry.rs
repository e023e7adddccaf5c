//! Bounded retry with exponential backoff for transient transport errors.
//!
//! The policy is data, not inline control flow: a predicate over the error,
//! a stop condition (elapsed-time cap OR attempt cap, whichever triggers
//! first), and a bounded exponential wait. The clock is injected so tests
//! drive deterministic schedules. After exhaustion the last error is
//! returned unchanged — callers see the true transport failure.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::{Error, Result};

// ============================================================================
// Clock
// ============================================================================

/// Time source for the retry loop.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time via the tokio timer.
#[cfg(any(feature = "bolt", feature = "flight"))]
pub struct SystemClock;

#[cfg(any(feature = "bolt", feature = "flight"))]
#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Retry policy for one transport.
///
/// The default reproduces the upstream contract: retry only transient
/// transport kinds (timed out, unavailable, internal), stop after 10
/// seconds elapsed or 5 attempts, wait exponentially between attempts with
/// a 1 second floor and a 10 second ceiling.
#[derive(Clone)]
pub struct RetryPolicy {
    retry_if: Arc<dyn Fn(&Error) -> bool + Send + Sync>,
    max_attempts: u32,
    max_elapsed: Duration,
    wait_multiplier: f64,
    wait_min: Duration,
    wait_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_if: Arc::new(Error::is_transient),
            max_attempts: 5,
            max_elapsed: Duration::from_secs(10),
            wait_multiplier: 1.0,
            wait_min: Duration::from_secs(1),
            wait_max: Duration::from_secs(10),
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("max_elapsed", &self.max_elapsed)
            .field("wait_multiplier", &self.wait_multiplier)
            .field("wait_min", &self.wait_min)
            .field("wait_max", &self.wait_max)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Replace the retry predicate.
    pub fn retry_if(mut self, predicate: impl Fn(&Error) -> bool + Send + Sync + 'static) -> Self {
        self.retry_if = Arc::new(predicate);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn max_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_elapsed = elapsed;
        self
    }

    pub fn wait_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.wait_min = min;
        self.wait_max = max;
        self
    }

    pub fn wait_multiplier(mut self, multiplier: f64) -> Self {
        self.wait_multiplier = multiplier;
        self
    }

    /// The wait before retrying after the given 1-based attempt:
    /// `multiplier * 2^(attempt-1)` seconds, clamped to the bounds.
    pub fn wait_after(&self, attempt: u32) -> Duration {
        let exp = 2f64.powi(attempt.saturating_sub(1) as i32);
        let wait = Duration::from_secs_f64((self.wait_multiplier * exp).max(0.0));
        wait.clamp(self.wait_min, self.wait_max)
    }

    /// Run `op` until it succeeds, the predicate rejects the error, or a
    /// stop condition triggers. The final error is returned verbatim.
    pub async fn run<T, Op, Fut>(&self, clock: &dyn Clock, mut op: Op) -> Result<T>
    where
        Op: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let started = clock.now();
        let mut attempt: u32 = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !(self.retry_if)(&error) {
                        return Err(error);
                    }
                    if attempt >= self.max_attempts {
                        return Err(error);
                    }
                    if clock.now().duration_since(started) >= self.max_elapsed {
                        return Err(error);
                    }
                    let wait = self.wait_after(attempt);
                    debug!(target: "gds_rs", attempt, ?wait, "transient transport error, retrying");
                    clock.sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::TransportErrorKind;

    /// A clock whose time only advances when the retry loop sleeps.
    struct ManualClock {
        base: Instant,
        advanced: Mutex<Duration>,
        slept: Mutex<Vec<Duration>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                base: Instant::now(),
                advanced: Mutex::new(Duration::ZERO),
                slept: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *self.advanced.lock()
        }

        async fn sleep(&self, duration: Duration) {
            *self.advanced.lock() += duration;
            self.slept.lock().push(duration);
        }
    }

    fn transient() -> Error {
        Error::transport(TransportErrorKind::Unavailable, "connection refused")
    }

    #[tokio::test]
    async fn succeeds_after_n_transient_failures() {
        let clock = ManualClock::new();
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default().max_elapsed(Duration::from_secs(3600));

        let result: Result<u32> = policy
            .run(&clock, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 3 { Err(transient()) } else { Ok(n) } }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhausts_attempt_cap_exactly() {
        let clock = ManualClock::new();
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default()
            .max_attempts(5)
            .max_elapsed(Duration::from_secs(3600));

        let result: Result<()> = policy
            .run(&clock, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;

        assert!(matches!(result, Err(Error::Transport { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn elapsed_cap_stops_before_attempt_cap() {
        let clock = ManualClock::new();
        let calls = AtomicU32::new(0);
        // Waits of 1s, 2s, 4s... blow through a 3s elapsed cap after two
        // sleeps, well before the generous attempt cap.
        let policy = RetryPolicy::default()
            .max_attempts(100)
            .max_elapsed(Duration::from_secs(3));

        let _: Result<()> = policy
            .run(&clock, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn semantic_errors_are_never_retried() {
        let clock = ManualClock::new();
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<()> = policy
            .run(&clock, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::Server("no such graph".into())) }
            })
            .await;

        assert!(matches!(result, Err(Error::Server(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clock.slept.lock().is_empty());
    }

    #[test]
    fn backoff_schedule_is_bounded_exponential() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.wait_after(1), Duration::from_secs(1));
        assert_eq!(policy.wait_after(2), Duration::from_secs(2));
        assert_eq!(policy.wait_after(3), Duration::from_secs(4));
        assert_eq!(policy.wait_after(4), Duration::from_secs(8));
        // Clamped at the ceiling from here on.
        assert_eq!(policy.wait_after(5), Duration::from_secs(10));
        assert_eq!(policy.wait_after(12), Duration::from_secs(10));
    }
}
