//! Application state for the web layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::RouteConfiguration;
use crate::poller::SnapshotStore;

/// What the web layer knows about one route.
#[derive(Debug, Clone)]
pub struct RouteHandle {
    pub title: String,
    pub stop_count: usize,
    pub snapshot: SnapshotStore,
}

impl RouteHandle {
    pub fn new(route: &RouteConfiguration, snapshot: SnapshotStore) -> Self {
        Self {
            title: route.display_title().to_string(),
            stop_count: route.stops.len(),
            snapshot,
        }
    }
}

/// Shared application state.
///
/// Route handles are fixed at startup; only their snapshots change.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Routes keyed by topic.
    pub routes: Arc<BTreeMap<String, RouteHandle>>,
}

impl AppState {
    pub fn new<I>(routes: I) -> Self
    where
        I: IntoIterator<Item = (String, RouteHandle)>,
    {
        Self {
            routes: Arc::new(routes.into_iter().collect()),
        }
    }

    pub fn route(&self, topic: &str) -> Option<&RouteHandle> {
        self.routes.get(topic)
    }
}
