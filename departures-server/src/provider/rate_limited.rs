//! Rate-limited repository decorator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Departure;
use crate::rate_limit::{RateLimiter, RateLimiterRegistry};

use super::error::ProviderError;
use super::{DepartureQuery, DepartureRepository};

/// Wraps a repository so every call first waits on a shared limiter.
pub struct RateLimitedRepository {
    inner: Arc<dyn DepartureRepository>,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedRepository {
    /// Wrap `inner` with the limiter registered under `provider`.
    pub async fn new(
        inner: Arc<dyn DepartureRepository>,
        registry: &RateLimiterRegistry,
        provider: &str,
        min_delay: Duration,
    ) -> Self {
        let limiter = registry.get_or_create(provider, min_delay).await;
        Self { inner, limiter }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

#[async_trait]
impl DepartureRepository for RateLimitedRepository {
    async fn get_departures(
        &self,
        station_id: &str,
        query: &DepartureQuery,
    ) -> Result<Vec<Departure>, ProviderError> {
        self.limiter.acquire().await;
        self.inner.get_departures(station_id, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScriptedRepository;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn wrappers_for_one_provider_share_spacing() {
        let scripted = Arc::new(ScriptedRepository::new());
        scripted.push_ok("a", Vec::new());
        scripted.push_ok("b", Vec::new());

        let registry = RateLimiterRegistry::new();
        let delay = Duration::from_millis(750);
        let first = RateLimitedRepository::new(scripted.clone(), &registry, "db", delay).await;
        let second = RateLimitedRepository::new(scripted.clone(), &registry, "db", delay).await;
        assert!(Arc::ptr_eq(first.limiter(), second.limiter()));

        let query = DepartureQuery::new(10);
        let start = Instant::now();
        first.get_departures("a", &query).await.unwrap();
        second.get_departures("b", &query).await.unwrap();

        assert!(start.elapsed() >= delay);
        assert_eq!(scripted.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_pass_through() {
        let scripted = Arc::new(ScriptedRepository::new());
        scripted.push_err("a", ProviderError::Timeout);

        let registry = RateLimiterRegistry::new();
        let repo =
            RateLimitedRepository::new(scripted, &registry, "mvg", Duration::from_secs(1)).await;

        let result = repo.get_departures("a", &DepartureQuery::new(10)).await;
        assert_eq!(result, Err(ProviderError::Timeout));
    }
}
