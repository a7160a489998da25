//! Token-bucket pacing for backend calls
//!
//! One limiter is shared by the whole worker pool: at most `rate` tokens
//! per second at steady state, with bursts up to `burst` while idle.
//! `acquire` suspends until a token is available or the run is cancelled.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use speakdown_core::{Error, Result};

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Async token bucket.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `rate` tokens per second, bucket capacity `burst`. Both are
    /// clamped to at least 1. The bucket starts full.
    pub fn new(rate: u32, burst: u32) -> Self {
        let rate = rate.max(1) as f64;
        let burst = burst.max(1) as f64;
        Self {
            rate,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token, waiting for the refill when the bucket is empty.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                self.refill(&mut bucket);

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }

                // Time until one whole token has accumulated.
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate)
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
            bucket.last_refill = now;
        }
    }

    /// Remaining tokens, for diagnostics.
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        bucket.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_is_granted_immediately() {
        let limiter = RateLimiter::new(5, 3);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire(&cancel).await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn steady_state_respects_rate() {
        let limiter = RateLimiter::new(10, 1);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        // First token from the full bucket, nine more at 10/s.
        for _ in 0..10 {
            limiter.acquire(&cancel).await.unwrap();
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(900), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1100), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn wait_lower_bound_over_a_run() {
        // N acquisitions at rate R with burst B must spend at least
        // (N - B) / R seconds waiting.
        let (n, rate, burst) = (12u32, 4u32, 2u32);
        let limiter = RateLimiter::new(rate, burst);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        for _ in 0..n {
            limiter.acquire(&cancel).await.unwrap();
        }
        let min_wait = Duration::from_secs_f64((n - burst) as f64 / rate as f64);
        assert!(start.elapsed() >= min_wait);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_refill_caps_at_burst() {
        let limiter = RateLimiter::new(100, 5);
        let cancel = CancellationToken::new();

        for _ in 0..5 {
            limiter.acquire(&cancel).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(limiter.available() <= 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_acquire() {
        let limiter = RateLimiter::new(1, 1);
        let cancel = CancellationToken::new();

        limiter.acquire(&cancel).await.unwrap();

        cancel.cancel();
        let err = limiter.acquire(&cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
