//! Periodic snapshot production for one logical route.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::cache::RawDepartureCache;
use crate::config::PollerConfig;
use crate::domain::{Departure, GroupedDepartures, StopConfiguration};
use crate::grouping::GroupingService;
use crate::provider::ProviderError;
use crate::task::PeriodicTask;

use super::broadcast::Broadcaster;
use super::snapshot::{ApiStatus, DeparturesSnapshot, DirectionGroupWithMetadata, SnapshotStore};

/// Cached departures further in the past than this are not shown.
fn max_cache_age() -> Duration {
    Duration::hours(1)
}

/// Produces the published snapshot for one route's stops.
pub struct Poller {
    stops: Vec<StopConfiguration>,
    config: PollerConfig,
    grouping: GroupingService,
    raw_cache: Option<RawDepartureCache>,
    /// Last successfully processed groups per stop name.
    processed: Mutex<HashMap<String, Vec<GroupedDepartures>>>,
    snapshot: SnapshotStore,
    broadcaster: Arc<Broadcaster>,
}

impl Poller {
    pub fn new(
        stops: Vec<StopConfiguration>,
        config: PollerConfig,
        grouping: GroupingService,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            stops,
            config,
            grouping,
            raw_cache: None,
            processed: Mutex::new(HashMap::new()),
            snapshot: SnapshotStore::new(),
            broadcaster,
        }
    }

    /// Read raw departures from a shared cache before calling upstream.
    pub fn with_raw_cache(mut self, cache: RawDepartureCache) -> Self {
        self.raw_cache = Some(cache);
        self
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    /// Handle to the published snapshot.
    pub fn snapshot(&self) -> SnapshotStore {
        self.snapshot.clone()
    }

    /// Run one pass over every stop, publish the result and return its
    /// status.
    pub async fn poll_once(&self) -> ApiStatus {
        let mut groups = Vec::new();
        let mut had_error = false;
        let mut processed = self.processed.lock().await;

        for stop in &self.stops {
            match self.process_stop(stop).await {
                Ok(stop_groups) => {
                    groups.extend(
                        stop_groups.iter().cloned().map(|g| {
                            DirectionGroupWithMetadata::new(&stop.station_id, &stop.station_name, g)
                        }),
                    );
                    processed.insert(stop.station_name.clone(), stop_groups);
                }
                Err(e) => {
                    had_error = true;
                    log_fetch_error(stop, &e);

                    match processed.get(&stop.station_name) {
                        Some(previous) => {
                            info!(stop = %stop.station_name, "using stale processed departures");
                            groups.extend(previous.iter().map(|g| {
                                DirectionGroupWithMetadata::new(
                                    &stop.station_id,
                                    &stop.station_name,
                                    g.to_stale(),
                                )
                            }));
                        }
                        None => {
                            warn!(stop = %stop.station_name, "no cached departures available");
                        }
                    }
                }
            }
        }
        drop(processed);

        let api_status = if had_error {
            ApiStatus::Error
        } else {
            ApiStatus::Success
        };
        let group_count = groups.len();

        self.snapshot
            .replace(DeparturesSnapshot {
                groups,
                last_update: Some(Utc::now()),
                api_status,
            })
            .await;
        self.broadcaster.publish(&self.config.topic);

        debug!(
            topic = %self.config.topic,
            groups = group_count,
            status = api_status.as_str(),
            "poll pass complete"
        );
        api_status
    }

    async fn process_stop(
        &self,
        stop: &StopConfiguration,
    ) -> Result<Vec<GroupedDepartures>, ProviderError> {
        let now = Utc::now();
        let groups = match self.cached_departures(stop, now).await {
            Some(recent) => self.grouping.group_departures(&recent, stop, now),
            None => self.grouping.get_grouped_departures(stop).await?,
        };

        Ok(groups
            .into_iter()
            .map(|g| dedupe_group(g, &stop.station_name))
            .collect())
    }

    /// Usable cached departures for a stop, or `None` when a direct fetch is
    /// needed.
    async fn cached_departures(
        &self,
        stop: &StopConfiguration,
        now: DateTime<Utc>,
    ) -> Option<Vec<Departure>> {
        let cache = self.raw_cache.as_ref()?;
        let cached = cache.get(&stop.station_id).await?;
        if cached.is_empty() {
            debug!(stop = %stop.station_name, "cache empty, fetching directly");
            return None;
        }

        let cutoff = now - max_cache_age();
        let recent: Vec<Departure> = cached.iter().filter(|d| d.time >= cutoff).cloned().collect();
        if recent.is_empty() {
            warn!(
                stop = %stop.station_name,
                cached = cached.len(),
                "cached departures too old, fetching directly"
            );
            return None;
        }
        Some(recent)
    }

    /// Start the background loop.
    pub fn start(self: Arc<Self>) -> PeriodicTask {
        let name = format!("poller:{}", self.config.topic);
        let interval = self.config.refresh_interval;
        PeriodicTask::spawn(name, interval, move || {
            let poller = self.clone();
            async move {
                poller.poll_once().await;
            }
        })
    }
}

fn log_fetch_error(stop: &StopConfiguration, e: &ProviderError) {
    error!(
        stop = %stop.station_name,
        station_id = %stop.station_id,
        reason = %e.reason(),
        error = %e,
        "failed to fetch departures"
    );
    if e.is_rate_limited() {
        warn!(
            stop = %stop.station_name,
            "rate limited upstream; consider a longer delay between calls"
        );
    }
}

/// Drop repeats of the same (line, destination, time) within one group.
fn dedupe_group(mut group: GroupedDepartures, stop_name: &str) -> GroupedDepartures {
    let mut seen = HashSet::new();
    group.departures.retain(|d| {
        let (line, destination, time) = d.identity();
        let fresh = seen.insert((line.to_string(), destination.to_string(), time));
        if !fresh {
            warn!(
                stop = %stop_name,
                direction = %group.direction_name,
                %line,
                %destination,
                %time,
                "dropping duplicate departure"
            );
        }
        fresh
    });
    group
}
