//! Routing of station queries to the provider configured for each stop.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::{Departure, StopConfiguration, base_station_id};

use super::error::ProviderError;
use super::{DepartureQuery, DepartureRepository};

/// Identifies one repository instance: a provider and an optional profile.
///
/// Both parts are lower-cased; a blank profile means auto-detection and is
/// stored as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryKey {
    pub api_provider: String,
    pub profile: Option<String>,
}

impl RepositoryKey {
    pub fn new(api_provider: &str, profile: Option<&str>) -> Self {
        Self {
            api_provider: api_provider.trim().to_lowercase(),
            profile: profile
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_lowercase),
        }
    }

    /// Key for the provider a stop is configured to use.
    pub fn for_stop(stop: &StopConfiguration) -> Self {
        Self::new(&stop.api_provider, stop.hafas_profile.as_deref())
    }

    /// The same provider without a profile.
    fn without_profile(&self) -> Self {
        Self {
            api_provider: self.api_provider.clone(),
            profile: None,
        }
    }
}

impl fmt::Display for RepositoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.profile {
            Some(profile) => write!(f, "{}/{}", self.api_provider, profile),
            None => f.write_str(&self.api_provider),
        }
    }
}

/// Builder collecting one repository per provider key.
pub struct CompositeBuilder {
    fallback: Arc<dyn DepartureRepository>,
    repositories: HashMap<RepositoryKey, Arc<dyn DepartureRepository>>,
}

impl CompositeBuilder {
    /// Register the repository serving `key`.
    pub fn register(
        mut self,
        key: RepositoryKey,
        repository: Arc<dyn DepartureRepository>,
    ) -> Self {
        self.repositories.insert(key, repository);
        self
    }

    /// Map every configured station to its provider's repository.
    ///
    /// Stop-point ids are also mapped by their base id, since that is what
    /// upstream queries use.
    pub fn build<'a, I>(self, stops: I) -> CompositeDepartureRepository
    where
        I: IntoIterator<Item = &'a StopConfiguration>,
    {
        let mut routes = HashMap::new();

        for stop in stops {
            let key = RepositoryKey::for_stop(stop);
            let repository = self
                .repositories
                .get(&key)
                .or_else(|| self.repositories.get(&key.without_profile()))
                .cloned()
                .unwrap_or_else(|| {
                    warn!(
                        station_id = %stop.station_id,
                        provider = %key,
                        "no repository registered for provider, using fallback"
                    );
                    self.fallback.clone()
                });

            routes.insert(stop.station_id.clone(), repository.clone());
            routes
                .entry(base_station_id(&stop.station_id).to_string())
                .or_insert(repository);
        }

        CompositeDepartureRepository {
            routes,
            fallback: self.fallback,
        }
    }
}

/// Repository that forwards each query to the provider configured for the
/// station.
pub struct CompositeDepartureRepository {
    routes: HashMap<String, Arc<dyn DepartureRepository>>,
    fallback: Arc<dyn DepartureRepository>,
}

impl CompositeDepartureRepository {
    /// Start building a composite; unknown stations go to `fallback`.
    pub fn builder(fallback: Arc<dyn DepartureRepository>) -> CompositeBuilder {
        CompositeBuilder {
            fallback,
            repositories: HashMap::new(),
        }
    }

    fn repository_for(&self, station_id: &str) -> &Arc<dyn DepartureRepository> {
        match self.routes.get(station_id) {
            Some(repository) => repository,
            None => {
                warn!(%station_id, "station not found in configuration, using fallback provider");
                &self.fallback
            }
        }
    }

    /// Number of station ids with a configured route.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

#[async_trait]
impl DepartureRepository for CompositeDepartureRepository {
    async fn get_departures(
        &self,
        station_id: &str,
        query: &DepartureQuery,
    ) -> Result<Vec<Departure>, ProviderError> {
        debug!(%station_id, limit = query.limit, "routing departure query");
        self.repository_for(station_id)
            .get_departures(station_id, query)
            .await
    }
}
