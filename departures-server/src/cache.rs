//! Shared raw departure cache.
//!
//! The Fetcher writes one entry per station id; Pollers read them. Entries
//! are whole lists behind an `Arc`, so a reader always sees either the old
//! list or the new one, never a mix.

use std::sync::Arc;

use moka::future::Cache as MokaCache;

use crate::domain::Departure;

/// Cached departure list for one station.
pub type CachedDepartures = Arc<Vec<Departure>>;

/// Configuration for the raw cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of stations held.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_capacity: 1000 }
    }
}

/// Raw departures keyed by configured station id.
///
/// Entries never expire on their own. Freshness is expressed through
/// `is_realtime`, and readers decide what is too old to show.
#[derive(Clone)]
pub struct RawDepartureCache {
    entries: MokaCache<String, CachedDepartures>,
}

impl RawDepartureCache {
    pub fn new(config: &CacheConfig) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .build();
        Self { entries }
    }

    /// Current list for a station, if one was ever stored.
    pub async fn get(&self, station_id: &str) -> Option<CachedDepartures> {
        self.entries.get(station_id).await
    }

    /// Replace the list for a station wholesale.
    pub async fn replace(&self, station_id: &str, departures: Vec<Departure>) {
        self.entries
            .insert(station_id.to_string(), Arc::new(departures))
            .await;
    }
}

impl Default for RawDepartureCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
