//! Published departure snapshots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::{Departure, GroupedDepartures};

/// Outcome of the most recent poll pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    /// No pass has completed yet.
    #[default]
    Unknown,
    Success,
    /// At least one stop failed in the last pass.
    Error,
}

impl ApiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiStatus::Unknown => "unknown",
            ApiStatus::Success => "success",
            ApiStatus::Error => "error",
        }
    }
}

/// A direction group annotated with the stop it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionGroupWithMetadata {
    pub station_id: String,
    pub stop_name: String,
    pub direction_name: String,
    pub departures: Vec<Departure>,
}

impl DirectionGroupWithMetadata {
    pub fn new(station_id: &str, stop_name: &str, group: GroupedDepartures) -> Self {
        Self {
            station_id: station_id.to_string(),
            stop_name: stop_name.to_string(),
            direction_name: group.direction_name,
            departures: group.departures,
        }
    }
}

/// Everything a display needs for one route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeparturesSnapshot {
    pub groups: Vec<DirectionGroupWithMetadata>,
    pub last_update: Option<DateTime<Utc>>,
    pub api_status: ApiStatus,
}

/// Holds the current snapshot; writers swap it wholesale.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    current: Arc<RwLock<Arc<DeparturesSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Arc<DeparturesSnapshot> {
        self.current.read().await.clone()
    }

    pub async fn replace(&self, snapshot: DeparturesSnapshot) {
        *self.current.write().await = Arc::new(snapshot);
    }
}
