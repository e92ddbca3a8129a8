//! Minimum-interval spacing for remote face service calls.
//!
//! The remote side enforces its quota per API credential regardless of
//! how many callers exist on our side, so every concurrent matching
//! run must funnel through one shared limiter instance.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a fixed minimum interval between admitted calls.
///
/// The last-admitted timestamp is the only state shared between
/// concurrent runs; holding the lock across the sleep means a second
/// caller cannot read the timestamp until the first caller has both
/// waited and stamped, so two runs can never decide to call early at
/// the same time.
pub struct RateLimiter {
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(None),
            min_interval,
        }
    }

    /// Block until at least `min_interval` has elapsed since the
    /// previous call was admitted, then claim this turn.
    pub async fn wait_turn(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit: waiting");
                tokio::time::sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_not_delayed() {
        let limiter = RateLimiter::new(Duration::from_millis(1100));
        let start = Instant::now();
        limiter.wait_turn().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_calls_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(1100));

        limiter.wait_turn().await;
        let first = Instant::now();

        limiter.wait_turn().await;
        let second = Instant::now();

        limiter.wait_turn().await;
        let third = Instant::now();

        assert!(second - first >= Duration::from_millis(1100));
        assert!(third - second >= Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_interval_already_elapsed() {
        let limiter = RateLimiter::new(Duration::from_millis(1100));

        limiter.wait_turn().await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let before = Instant::now();
        limiter.wait_turn().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_limiter_spaces_concurrent_callers() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(1100)));
        let mut tasks = Vec::new();
        for _ in 0..3 {
            let limiter = Arc::clone(&limiter);
            tasks.push(tokio::spawn(async move {
                limiter.wait_turn().await;
                Instant::now()
            }));
        }

        let mut stamps = Vec::new();
        for task in tasks {
            stamps.push(task.await.unwrap());
        }
        stamps.sort();

        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1100));
        }
    }
}
