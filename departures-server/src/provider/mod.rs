//! Upstream departure providers.
//!
//! The rest of the crate sees every provider (MVG, DB, VBB, HAFAS profiles)
//! through one capability: fetch departures for a station. Adapter-specific
//! HTTP details stay behind [`DepartureRepository`].

mod composite;
mod error;
mod mock;
mod rate_limited;

use async_trait::async_trait;

use crate::domain::Departure;

pub use composite::{CompositeDepartureRepository, CompositeBuilder, RepositoryKey};
pub use error::ProviderError;
pub use mock::{MockDepartureRepository, ScriptedRepository};
pub use rate_limited::RateLimitedRepository;

/// Default provider query window in minutes.
const DEFAULT_DURATION_MINS: i64 = 60;

/// Parameters for a departure query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartureQuery {
    /// Maximum number of departures to return.
    pub limit: usize,

    /// Start of the window, in minutes from now.
    pub offset_minutes: i64,

    /// Restrict to these transport types; `None` means all.
    pub transport_types: Option<Vec<String>>,

    /// Length of the window in minutes. Ignored by providers without one.
    pub duration_minutes: i64,
}

impl DepartureQuery {
    /// Query the next `limit` departures from now.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            offset_minutes: 0,
            transport_types: None,
            duration_minutes: DEFAULT_DURATION_MINS,
        }
    }

    pub fn with_offset(mut self, mins: i64) -> Self {
        self.offset_minutes = mins;
        self
    }

    pub fn with_duration(mut self, mins: i64) -> Self {
        self.duration_minutes = mins;
        self
    }

    pub fn with_transport_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transport_types = Some(types.into_iter().map(Into::into).collect());
        self
    }
}

/// Source of normalized departures for a station.
#[async_trait]
pub trait DepartureRepository: Send + Sync {
    /// Fetch departures for `station_id`.
    ///
    /// An empty `Ok` means the provider answered with no departures; any
    /// upstream problem is an `Err`.
    async fn get_departures(
        &self,
        station_id: &str,
        query: &DepartureQuery,
    ) -> Result<Vec<Departure>, ProviderError>;
}
