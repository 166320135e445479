//! Background refresh of the shared raw departure cache.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::cache::RawDepartureCache;
use crate::config::FetcherConfig;
use crate::domain::{StopConfiguration, base_station_id, mark_stale};
use crate::provider::{DepartureQuery, DepartureRepository, ProviderError};
use crate::task::PeriodicTask;

/// Outcome of one fetch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Failed stations whose previous list was kept, marked stale.
    pub stale_kept: usize,
}

/// Station ids across all stops, first occurrence first.
pub fn unique_station_ids<'a, I>(stops: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a StopConfiguration>,
{
    let mut seen = HashSet::new();
    stops
        .into_iter()
        .filter(|s| seen.insert(s.station_id.as_str()))
        .map(|s| s.station_id.clone())
        .collect()
}

/// Refreshes raw departures for every configured station into a shared
/// cache, independently of any stop's direction configuration.
pub struct Fetcher {
    repository: Arc<dyn DepartureRepository>,
    cache: RawDepartureCache,
    station_ids: Vec<String>,
    config: FetcherConfig,
}

impl Fetcher {
    pub fn new(
        repository: Arc<dyn DepartureRepository>,
        cache: RawDepartureCache,
        station_ids: Vec<String>,
        config: FetcherConfig,
    ) -> Self {
        let mut seen = HashSet::new();
        let station_ids = station_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self {
            repository,
            cache,
            station_ids,
            config,
        }
    }

    /// Fetcher covering every stop in `stops`.
    pub fn for_stops<'a, I>(
        repository: Arc<dyn DepartureRepository>,
        cache: RawDepartureCache,
        stops: I,
        config: FetcherConfig,
    ) -> Self
    where
        I: IntoIterator<Item = &'a StopConfiguration>,
    {
        Self::new(repository, cache, unique_station_ids(stops), config)
    }

    pub fn station_ids(&self) -> &[String] {
        &self.station_ids
    }

    pub fn cache(&self) -> &RawDepartureCache {
        &self.cache
    }

    /// Run one pass over every station.
    ///
    /// A failure on one station never skips the others. On failure the
    /// previous list is re-stored with every departure marked stale;
    /// stations with no previous list stay absent.
    pub async fn fetch_all(&self) -> FetchSummary {
        let mut summary = FetchSummary::default();
        let last = self.station_ids.len().saturating_sub(1);

        for (idx, station_id) in self.station_ids.iter().enumerate() {
            match self.fetch_station(station_id).await {
                Ok(count) => {
                    debug!(%station_id, count, "cached departures");
                    summary.succeeded += 1;
                }
                Err(e) => {
                    error!(%station_id, error = %e, "failed to fetch departures");
                    summary.failed += 1;
                    if let Some(previous) = self.cache.get(station_id).await {
                        self.cache.replace(station_id, mark_stale(&previous)).await;
                        summary.stale_kept += 1;
                    }
                }
            }

            if idx < last && !self.config.sleep_between_calls.is_zero() {
                tokio::time::sleep(self.config.sleep_between_calls).await;
            }
        }

        info!(
            stations = self.station_ids.len(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            "fetch pass complete"
        );
        summary
    }

    async fn fetch_station(&self, station_id: &str) -> Result<usize, ProviderError> {
        let query = DepartureQuery::new(self.config.fetch_limit);
        let departures = self
            .repository
            .get_departures(base_station_id(station_id), &query)
            .await?;
        let count = departures.len();
        self.cache.replace(station_id, departures).await;
        Ok(count)
    }

    /// Start the background loop.
    pub fn start(self: Arc<Self>) -> PeriodicTask {
        let interval = self.config.refresh_interval;
        PeriodicTask::spawn("fetcher", interval, move || {
            let fetcher = self.clone();
            async move {
                fetcher.fetch_all().await;
            }
        })
    }
}
