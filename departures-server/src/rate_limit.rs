//! Minimum-spacing rate limiting for outbound provider calls.
//!
//! Every caller that names the same provider shares one [`RateLimiter`], so
//! several pollers hitting one upstream API still respect its spacing.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default minimum delay between calls to one provider.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);

/// Enforces a minimum delay between successive acquisitions.
///
/// Acquisition holds a per-instance lock while waiting, so concurrent
/// callers queue up instead of racing on the time of the last call.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    min_delay: Duration,
    last_acquired: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, min_delay: Duration) -> Self {
        Self {
            name: name.into(),
            min_delay,
            last_acquired: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Wait until `min_delay` has passed since the previous acquisition.
    pub async fn acquire(&self) {
        let mut last = self.last_acquired.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                let wait = self.min_delay - elapsed;
                debug!(
                    limiter = %self.name,
                    wait_ms = wait.as_millis() as u64,
                    "waiting before next request"
                );
                tokio::time::sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Registry of limiters keyed by provider name.
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry for callers that are not handed one.
    pub fn global() -> &'static RateLimiterRegistry {
        static GLOBAL: OnceLock<RateLimiterRegistry> = OnceLock::new();
        GLOBAL.get_or_init(RateLimiterRegistry::new)
    }

    /// Return the limiter for `name`, creating it on first use.
    ///
    /// `min_delay` only applies when the limiter is created; later callers
    /// share the existing instance and its delay.
    pub async fn get_or_create(&self, name: &str, min_delay: Duration) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.lock().await;

        if let Some(existing) = limiters.get(name) {
            return existing.clone();
        }

        let limiter = Arc::new(RateLimiter::new(name, min_delay));
        limiters.insert(name.to_string(), limiter.clone());
        info!(
            limiter = %name,
            min_delay_ms = min_delay.as_millis() as u64,
            "created rate limiter"
        );
        limiter
    }

    /// Number of registered limiters.
    pub async fn len(&self) -> usize {
        self.limiters.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.limiters.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_acquire_does_not_wait() {
        let limiter = RateLimiter::new("mvg", Duration::from_secs(1));
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn successive_acquires_are_spaced() {
        let limiter = RateLimiter::new("mvg", Duration::from_millis(500));

        let mut stamps = Vec::new();
        for _ in 0..4 {
            limiter.acquire().await;
            stamps.push(Instant::now());
        }

        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn no_wait_after_delay_has_passed() {
        let limiter = RateLimiter::new("db", Duration::from_millis(200));
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_queue() {
        let limiter = Arc::new(RateLimiter::new("vbb", Duration::from_secs(2)));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(handle.await.unwrap());
        }
        stamps.sort();

        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2));
        }
    }

    #[tokio::test]
    async fn registry_shares_instances_by_name() {
        let registry = RateLimiterRegistry::new();

        let a = registry.get_or_create("db", Duration::from_secs(1)).await;
        let b = registry.get_or_create("db", Duration::from_secs(5)).await;
        let c = registry.get_or_create("vbb", Duration::from_secs(1)).await;

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(b.min_delay(), Duration::from_secs(1));
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn concurrent_first_use_creates_one_limiter() {
        let registry = Arc::new(RateLimiterRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry.get_or_create("hafas", DEFAULT_MIN_DELAY).await
                })
            })
            .collect();

        let mut limiters = Vec::new();
        for handle in handles {
            limiters.push(handle.await.unwrap());
        }

        assert!(limiters.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn global_registry_is_shared() {
        let a = RateLimiterRegistry::global()
            .get_or_create("global-test", DEFAULT_MIN_DELAY)
            .await;
        let b = RateLimiterRegistry::global()
            .get_or_create("global-test", DEFAULT_MIN_DELAY)
            .await;
        assert!(Arc::ptr_eq(&a, &b));
    }
}
