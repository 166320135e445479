//! Per-stop display policy.

use std::fmt;

use chrono::Duration;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// Default cap on departures per direction group.
pub const DEFAULT_MAX_DEPARTURES_PER_STOP: usize = 20;

/// Default cap on departures per line within a direction group.
pub const DEFAULT_MAX_DEPARTURES_PER_ROUTE: usize = 2;

/// Default number of departures requested from the provider.
pub const DEFAULT_MAX_DEPARTURES_FETCH: usize = 50;

/// Default provider query window in minutes.
pub const DEFAULT_FETCH_WINDOW_MINS: i64 = 60;

/// Default upstream provider.
pub const DEFAULT_API_PROVIDER: &str = "mvg";

const DEFAULT_UNGROUPED_TITLE: &str = "Other";

/// A direction label and the patterns that select departures for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionMapping {
    pub name: String,
    pub patterns: Vec<String>,
}

impl DirectionMapping {
    pub fn new<I, S>(name: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

/// Configuration for one monitored stop.
///
/// Loaded once at startup and read-only afterwards. Direction mappings keep
/// the order in which they were declared; output groups follow that order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StopConfiguration {
    /// Station id, possibly a stop-point id such as `de:09162:1108:1:1`.
    pub station_id: String,

    /// Display name.
    pub station_name: String,

    #[serde(default, deserialize_with = "ordered_directions")]
    pub direction_mappings: Vec<DirectionMapping>,

    #[serde(default = "default_max_per_stop")]
    pub max_departures_per_stop: usize,

    #[serde(default = "default_max_per_route")]
    pub max_departures_per_route: usize,

    #[serde(default = "default_true")]
    pub show_ungrouped: bool,

    #[serde(default)]
    pub ungrouped_title: Option<String>,

    /// Departures sooner than now plus this many minutes are hidden.
    #[serde(default)]
    pub departure_leeway_minutes: i64,

    /// Look-ahead window in hours. Values below 1 mean unset.
    #[serde(default)]
    pub max_hours_in_advance: Option<f64>,

    /// Blacklist patterns.
    #[serde(default)]
    pub exclude_destinations: Vec<String>,

    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub platform_filter: Option<String>,

    /// Lines the platform filter applies to; empty means all lines.
    #[serde(default)]
    pub platform_filter_routes: Vec<String>,

    #[serde(default = "default_api_provider")]
    pub api_provider: String,

    #[serde(default)]
    pub hafas_profile: Option<String>,

    #[serde(default = "default_max_fetch")]
    pub max_departures_fetch: usize,

    #[serde(default = "default_fetch_window", alias = "api_duration_minutes")]
    pub fetch_max_minutes_in_advance: i64,
}

impl StopConfiguration {
    /// Create a configuration with default limits and no direction mappings.
    pub fn new(station_id: impl Into<String>, station_name: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            station_name: station_name.into(),
            direction_mappings: Vec::new(),
            max_departures_per_stop: DEFAULT_MAX_DEPARTURES_PER_STOP,
            max_departures_per_route: DEFAULT_MAX_DEPARTURES_PER_ROUTE,
            show_ungrouped: true,
            ungrouped_title: None,
            departure_leeway_minutes: 0,
            max_hours_in_advance: None,
            exclude_destinations: Vec::new(),
            platform_filter: None,
            platform_filter_routes: Vec::new(),
            api_provider: DEFAULT_API_PROVIDER.to_string(),
            hafas_profile: None,
            max_departures_fetch: DEFAULT_MAX_DEPARTURES_FETCH,
            fetch_max_minutes_in_advance: DEFAULT_FETCH_WINDOW_MINS,
        }
    }

    /// Append a direction mapping after the existing ones.
    pub fn with_direction<I, S>(mut self, name: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.direction_mappings
            .push(DirectionMapping::new(name, patterns));
        self
    }

    pub fn with_max_departures_per_stop(mut self, n: usize) -> Self {
        self.max_departures_per_stop = n;
        self
    }

    pub fn with_max_departures_per_route(mut self, n: usize) -> Self {
        self.max_departures_per_route = n;
        self
    }

    /// Show or hide the ungrouped bucket, optionally under a custom label.
    pub fn with_ungrouped(mut self, show: bool, title: Option<&str>) -> Self {
        self.show_ungrouped = show;
        self.ungrouped_title = title.map(str::to_string);
        self
    }

    pub fn with_leeway_minutes(mut self, mins: i64) -> Self {
        self.departure_leeway_minutes = mins;
        self
    }

    pub fn with_max_hours_in_advance(mut self, hours: f64) -> Self {
        self.max_hours_in_advance = Some(hours);
        self
    }

    pub fn with_exclusions<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_destinations = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict departures to one platform, optionally only for some lines.
    pub fn with_platform_filter<I, S>(mut self, platform: impl Into<String>, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platform_filter = Some(platform.into());
        self.platform_filter_routes = routes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>, profile: Option<&str>) -> Self {
        self.api_provider = provider.into();
        self.hafas_profile = profile.map(str::to_string);
        self
    }

    /// Label for departures that matched no direction.
    pub fn ungrouped_label(&self) -> &str {
        self.ungrouped_title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_UNGROUPED_TITLE)
    }

    /// True when the configured id names one physical sub-stop.
    pub fn is_stop_point(&self) -> bool {
        is_stop_point_id(&self.station_id)
    }

    /// The id to send upstream; providers only accept base station ids.
    pub fn query_station_id(&self) -> &str {
        base_station_id(&self.station_id)
    }

    /// Minimum lead time before a departure is shown, or `None` when the
    /// configured minutes do not fit in a `Duration`.
    pub fn leeway(&self) -> Option<Duration> {
        Duration::try_minutes(self.departure_leeway_minutes)
    }

    /// Look-ahead window, or `None` when unset or below one hour.
    ///
    /// Values too large for a `Duration` saturate at the maximum.
    pub fn max_lookahead(&self) -> Option<Duration> {
        self.max_hours_in_advance
            .filter(|h| *h >= 1.0)
            .map(|h| Duration::try_milliseconds((h * 3_600_000.0) as i64).unwrap_or(Duration::MAX))
    }

    /// Per-line cap, treating zero as the default.
    pub fn route_cap(&self) -> usize {
        match self.max_departures_per_route {
            0 => DEFAULT_MAX_DEPARTURES_PER_ROUTE,
            n => n,
        }
    }

    /// Per-group cap, treating zero as the default.
    pub fn stop_cap(&self) -> usize {
        match self.max_departures_per_stop {
            0 => DEFAULT_MAX_DEPARTURES_PER_STOP,
            n => n,
        }
    }
}

/// Stop-point ids have at least five `:`-separated parts and repeat the
/// last part, e.g. `de:09162:1108:1:1`.
pub fn is_stop_point_id(station_id: &str) -> bool {
    let parts: Vec<&str> = station_id.split(':').collect();
    parts.len() >= 5 && parts[parts.len() - 1] == parts[parts.len() - 2]
}

/// Strip a stop-point id down to its station id (first three parts).
pub fn base_station_id(station_id: &str) -> &str {
    if !is_stop_point_id(station_id) {
        return station_id;
    }
    match station_id.match_indices(':').nth(2) {
        Some((idx, _)) => &station_id[..idx],
        None => station_id,
    }
}

fn default_max_per_stop() -> usize {
    DEFAULT_MAX_DEPARTURES_PER_STOP
}

fn default_max_per_route() -> usize {
    DEFAULT_MAX_DEPARTURES_PER_ROUTE
}

fn default_max_fetch() -> usize {
    DEFAULT_MAX_DEPARTURES_FETCH
}

fn default_fetch_window() -> i64 {
    DEFAULT_FETCH_WINDOW_MINS
}

fn default_api_provider() -> String {
    DEFAULT_API_PROVIDER.to_string()
}

fn default_true() -> bool {
    true
}

/// Read a `{"label": ["pattern", ...]}` object in document order.
fn ordered_directions<'de, D>(deserializer: D) -> Result<Vec<DirectionMapping>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedVisitor;

    impl<'de> Visitor<'de> for OrderedVisitor {
        type Value = Vec<DirectionMapping>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of direction name to pattern list")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, patterns)) = map.next_entry::<String, Vec<String>>()? {
                if out.iter().any(|m: &DirectionMapping| m.name == name) {
                    return Err(de::Error::custom(format!(
                        "duplicate direction mapping: {name}"
                    )));
                }
                out.push(DirectionMapping { name, patterns });
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(OrderedVisitor)
}

/// Platforms are written as either `9` or `"9"` in configuration files.
fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
    }))
}
