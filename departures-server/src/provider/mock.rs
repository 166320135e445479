//! Mock providers for running and testing without upstream access.
//!
//! [`MockDepartureRepository`] loads sample boards from JSON files and serves
//! them as if they were live. [`ScriptedRepository`] replays queued results
//! per station and records every call.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::domain::Departure;

use super::error::ProviderError;
use super::{DepartureQuery, DepartureRepository};

/// One departure in a mock board file, timed relative to the request.
#[derive(Debug, Clone, Deserialize)]
struct MockDeparture {
    in_minutes: i64,
    #[serde(default)]
    delay_seconds: Option<i64>,
    #[serde(default)]
    platform: Option<String>,
    line: String,
    destination: String,
    transport_type: String,
    #[serde(default)]
    is_cancelled: bool,
    #[serde(default)]
    messages: Vec<String>,
    #[serde(default)]
    stop_point_global_id: Option<String>,
}

impl MockDeparture {
    fn at(&self, now: DateTime<Utc>) -> Departure {
        let planned_time = now + Duration::minutes(self.in_minutes);
        let time = planned_time + Duration::seconds(self.delay_seconds.unwrap_or(0));
        Departure {
            time,
            planned_time,
            delay_seconds: self.delay_seconds,
            platform: self.platform.clone(),
            is_realtime: true,
            line: self.line.clone(),
            destination: self.destination.clone(),
            transport_type: self.transport_type.clone(),
            is_cancelled: self.is_cancelled,
            messages: self.messages.clone(),
            stop_point_global_id: self.stop_point_global_id.clone(),
        }
    }
}

/// Mock repository that serves departure boards from JSON files.
#[derive(Debug, Clone)]
pub struct MockDepartureRepository {
    /// Boards keyed by station id.
    boards: Arc<HashMap<String, Vec<MockDeparture>>>,
}

impl MockDepartureRepository {
    /// Load every `{station_id}.json` file in a directory.
    ///
    /// Each file holds an array of departures with an `in_minutes` offset
    /// instead of absolute times, so the board stays current.
    pub fn from_dir(data_dir: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let boards = load_boards(data_dir.as_ref())?;
        Ok(Self {
            boards: Arc::new(boards),
        })
    }

    /// List stations with mock data.
    pub fn available_stations(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.boards.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn load_boards(data_dir: &Path) -> Result<HashMap<String, Vec<MockDeparture>>, ProviderError> {
    let entries = std::fs::read_dir(data_dir).map_err(|e| {
        ProviderError::Parse(format!("failed to read mock data directory: {e}"))
    })?;

    let mut boards = HashMap::new();
    for entry in entries {
        let path = entry
            .map_err(|e| ProviderError::Parse(format!("failed to read directory entry: {e}")))?
            .path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }

        let station_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ProviderError::Parse(format!("invalid filename: {path:?}")))?
            .to_string();

        let json = std::fs::read_to_string(&path)
            .map_err(|e| ProviderError::Parse(format!("failed to read {path:?}: {e}")))?;
        let board: Vec<MockDeparture> = serde_json::from_str(&json)
            .map_err(|e| ProviderError::Parse(format!("failed to parse {path:?}: {e}")))?;

        boards.insert(station_id, board);
    }

    if boards.is_empty() {
        return Err(ProviderError::Parse(format!(
            "no mock board files found in {data_dir:?}"
        )));
    }

    Ok(boards)
}

#[async_trait]
impl DepartureRepository for MockDepartureRepository {
    async fn get_departures(
        &self,
        station_id: &str,
        query: &DepartureQuery,
    ) -> Result<Vec<Departure>, ProviderError> {
        let board = self
            .boards
            .get(station_id)
            .ok_or_else(|| ProviderError::StationNotFound(station_id.to_string()))?;

        let now = Utc::now();
        let window_start = now + Duration::minutes(query.offset_minutes);
        let window_end = window_start + Duration::minutes(query.duration_minutes);

        let mut departures: Vec<Departure> = board
            .iter()
            .filter(|d| match &query.transport_types {
                Some(types) => types.iter().any(|t| t.eq_ignore_ascii_case(&d.transport_type)),
                None => true,
            })
            .map(|d| d.at(now))
            .filter(|d| d.planned_time >= window_start && d.planned_time <= window_end)
            .collect();
        departures.sort_by_key(|d| d.time);
        departures.truncate(query.limit);

        Ok(departures)
    }
}

type Scripted = Result<Vec<Departure>, ProviderError>;

/// Repository that replays queued results per station.
///
/// Each call pops the next queued result; the last one is repeated once the
/// queue is down to a single entry. Stations with nothing queued fail with
/// [`ProviderError::StationNotFound`].
#[derive(Debug, Default)]
pub struct ScriptedRepository {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<(String, DepartureQuery)>>,
}

impl ScriptedRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for a station.
    pub fn push_ok(&self, station_id: &str, departures: Vec<Departure>) {
        self.push(station_id, Ok(departures));
    }

    /// Queue a failure for a station.
    pub fn push_err(&self, station_id: &str, error: ProviderError) {
        self.push(station_id, Err(error));
    }

    fn push(&self, station_id: &str, result: Scripted) {
        let mut responses = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        responses
            .entry(station_id.to_string())
            .or_default()
            .push_back(result);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<(String, DepartureQuery)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls made for one station.
    pub fn call_count(&self, station_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, _)| id == station_id)
            .count()
    }
}

#[async_trait]
impl DepartureRepository for ScriptedRepository {
    async fn get_departures(
        &self,
        station_id: &str,
        query: &DepartureQuery,
    ) -> Result<Vec<Departure>, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((station_id.to_string(), query.clone()));

        let mut responses = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let queue = responses
            .get_mut(station_id)
            .ok_or_else(|| ProviderError::StationNotFound(station_id.to_string()))?;

        match queue.len() {
            0 => Err(ProviderError::StationNotFound(station_id.to_string())),
            1 => queue[0].clone(),
            _ => queue
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::StationNotFound(station_id.to_string()))),
        }
    }
}
