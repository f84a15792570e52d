use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{sleep, Duration};

use crate::config::config::RateLimitConfig;

/// Time source for the rate limiter.
#[allow(async_fn_in_trait)]
pub trait Clock {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        sleep(duration).await;
    }
}

/// Enforces a minimum delay between outbound fetches.
///
/// Every call to [`RateLimiter::throttle`] waits until `interval` (plus an optional
/// random jitter) has passed since the previous call returned. The first call
/// of a run returns immediately.
pub struct RateLimiter<C: Clock = TokioClock> {
    clock: C,
    interval: Duration,
    jitter_ms: u64,
    rng: StdRng,
    last_request: Option<Instant>,
}

impl RateLimiter<TokioClock> {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        RateLimiter::with_clock(
            TokioClock,
            Duration::from_millis(config.interval_ms),
            config.jitter_ms,
        )
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(clock: C, interval: Duration, jitter_ms: u64) -> Self {
        RateLimiter {
            clock,
            interval,
            jitter_ms,
            rng: StdRng::from_entropy(),
            last_request: None,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub async fn throttle(&mut self) {
        if let Some(last) = self.last_request {
            let wait = self.next_interval();
            let elapsed = self.clock.now().saturating_duration_since(last);
            if elapsed < wait {
                self.clock.sleep(wait - elapsed).await;
            }
        }
        self.last_request = Some(self.clock.now());
    }

    fn next_interval(&mut self) -> Duration {
        if self.jitter_ms == 0 {
            return self.interval;
        }
        let jitter = self.rng.gen_range(0..=self.jitter_ms);
        self.interval + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Clock that advances only when slept on, recording every sleep.
    pub(crate) struct FakeClock {
        now: Cell<Instant>,
        pub sleeps: RefCell<Vec<Duration>>,
    }

    impl FakeClock {
        pub(crate) fn new() -> Self {
            FakeClock {
                now: Cell::new(Instant::now()),
                sleeps: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn advance(&self, duration: Duration) {
            self.now.set(self.now.get() + duration);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.now.get()
        }

        async fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
            self.advance(duration);
        }
    }

    #[tokio::test]
    async fn first_call_does_not_wait() {
        let mut limiter = RateLimiter::with_clock(FakeClock::new(), Duration::from_millis(1000), 0);
        limiter.throttle().await;
        assert!(limiter.clock().sleeps.borrow().is_empty());
    }

    #[tokio::test]
    async fn back_to_back_calls_wait_full_interval() {
        let mut limiter = RateLimiter::with_clock(FakeClock::new(), Duration::from_millis(1000), 0);
        limiter.throttle().await;
        limiter.throttle().await;
        limiter.throttle().await;
        assert_eq!(
            *limiter.clock().sleeps.borrow(),
            vec![Duration::from_millis(1000), Duration::from_millis(1000)]
        );
    }

    #[tokio::test]
    async fn time_spent_fetching_counts_toward_interval() {
        let mut limiter = RateLimiter::with_clock(FakeClock::new(), Duration::from_millis(1000), 0);
        limiter.throttle().await;
        limiter.clock().advance(Duration::from_millis(400));
        limiter.throttle().await;
        limiter.clock().advance(Duration::from_millis(1500));
        limiter.throttle().await;
        assert_eq!(*limiter.clock().sleeps.borrow(), vec![Duration::from_millis(600)]);
    }

    #[tokio::test]
    async fn jitter_stays_within_bounds() {
        let mut limiter = RateLimiter::with_clock(FakeClock::new(), Duration::from_millis(500), 200);
        for _ in 0..20 {
            limiter.throttle().await;
        }
        let sleeps = limiter.clock().sleeps.borrow();
        assert_eq!(sleeps.len(), 19);
        for wait in sleeps.iter() {
            assert!(*wait >= Duration::from_millis(500));
            assert!(*wait <= Duration::from_millis(700));
        }
    }

    #[tokio::test]
    async fn zero_interval_never_sleeps() {
        let mut limiter = RateLimiter::with_clock(FakeClock::new(), Duration::ZERO, 0);
        limiter.throttle().await;
        limiter.throttle().await;
        assert!(limiter.clock().sleeps.borrow().is_empty());
    }
}
