//! Runtime configuration.
//!
//! Values come from environment variables plus a JSON file of routes. Only
//! well-formedness is checked here.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{DEFAULT_MAX_DEPARTURES_FETCH, StopConfiguration};
use crate::rate_limit::DEFAULT_MIN_DELAY;

/// Default refresh interval for Fetcher and Pollers.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MOCK_DIR: &str = "data/mock";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not set")]
    Missing { var: &'static str },

    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate route topic: {0}")]
    DuplicateTopic(String),
}

/// Settings for the shared raw-cache Fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherConfig {
    /// Time between passes.
    pub refresh_interval: Duration,

    /// Page size requested per station.
    pub fetch_limit: usize,

    /// Pause between successive stations within a pass.
    pub sleep_between_calls: Duration,
}

impl FetcherConfig {
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = limit;
        self
    }

    pub fn with_sleep_between_calls(mut self, sleep: Duration) -> Self {
        self.sleep_between_calls = sleep;
        self
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            fetch_limit: DEFAULT_MAX_DEPARTURES_FETCH,
            sleep_between_calls: Duration::ZERO,
        }
    }
}

/// Settings for one route's Poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Notification topic for this route's snapshot.
    pub topic: String,

    pub refresh_interval: Duration,
}

impl PollerConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

/// Minimum spacing of calls to each upstream provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub min_delay: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay: DEFAULT_MIN_DELAY,
        }
    }
}

/// One logical route: a topic and the stops shown under it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RouteConfiguration {
    pub topic: String,

    #[serde(default)]
    pub title: Option<String>,

    pub stops: Vec<StopConfiguration>,
}

impl RouteConfiguration {
    pub fn new(topic: impl Into<String>, stops: Vec<StopConfiguration>) -> Self {
        Self {
            topic: topic.into(),
            title: None,
            stops,
        }
    }

    /// Display title, defaulting to the topic.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.topic)
    }

    /// Parse a JSON array of routes.
    pub fn parse_all(json: &str, path: &Path) -> Result<Vec<Self>, ConfigError> {
        let routes: Vec<Self> = serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let mut seen = HashSet::new();
        for route in &routes {
            if !seen.insert(route.topic.as_str()) {
                return Err(ConfigError::DuplicateTopic(route.topic.clone()));
            }
        }
        Ok(routes)
    }

    /// Load a JSON array of routes from a file.
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_all(&json, path)
    }
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub fetcher: FetcherConfig,
    pub rate_limit: RateLimitConfig,
    pub routes: Vec<RouteConfiguration>,
    pub mock_dir: PathBuf,
    pub port: u16,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut fetcher = FetcherConfig::default();
        if let Some(secs) = parse_var::<u64>(&lookup, "DEPARTURES_REFRESH_SECS")? {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    var: "DEPARTURES_REFRESH_SECS",
                    value: secs.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
            fetcher = fetcher.with_refresh_interval(Duration::from_secs(secs));
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "DEPARTURES_SLEEP_MS")? {
            fetcher = fetcher.with_sleep_between_calls(Duration::from_millis(ms));
        }

        let mut rate_limit = RateLimitConfig::default();
        if let Some(ms) = parse_var::<u64>(&lookup, "DEPARTURES_RATE_LIMIT_MS")? {
            rate_limit.min_delay = Duration::from_millis(ms);
        }

        let routes_path = lookup("DEPARTURES_ROUTES").ok_or(ConfigError::Missing {
            var: "DEPARTURES_ROUTES",
        })?;
        let routes = RouteConfiguration::load_all(&routes_path)?;

        let mock_dir = lookup("DEPARTURES_MOCK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MOCK_DIR));
        let port = parse_var::<u16>(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);

        Ok(Self {
            fetcher,
            rate_limit,
            routes,
            mock_dir,
            port,
        })
    }

    /// Poller settings for one route, sharing the Fetcher's interval.
    pub fn poller_config(&self, route: &RouteConfiguration) -> PollerConfig {
        PollerConfig::new(&route.topic).with_refresh_interval(self.fetcher.refresh_interval)
    }

    /// Every configured stop across all routes.
    pub fn all_stops(&self) -> impl Iterator<Item = &StopConfiguration> {
        self.routes.iter().flat_map(|r| r.stops.iter())
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    const ROUTES: &str = r#"[
        {
            "topic": "giesing",
            "title": "Richtung Giesing",
            "stops": [
                {
                    "station_id": "de:09162:70",
                    "station_name": "Universität",
                    "direction_mappings": {"->Giesing": ["Giesing", "Fürstenried"]},
                    "max_departures_per_route": 1
                },
                {"station_id": "de:09162:1108:1:1", "station_name": "Hackerbrücke"}
            ]
        },
        {"topic": "airport", "stops": []}
    ]"#;

    fn env_with_routes(extra: &[(&str, &str)]) -> (tempfile::TempDir, HashMap<String, String>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("routes.json");
        std::fs::write(&path, ROUTES).unwrap();

        let mut vars: HashMap<String, String> = extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        vars.insert(
            "DEPARTURES_ROUTES".to_string(),
            path.to_string_lossy().into_owned(),
        );
        (dir, vars)
    }

    #[test]
    fn defaults() {
        let fetcher = FetcherConfig::default();
        assert_eq!(fetcher.refresh_interval, Duration::from_secs(30));
        assert_eq!(fetcher.fetch_limit, 50);
        assert_eq!(fetcher.sleep_between_calls, Duration::ZERO);
        assert_eq!(RateLimitConfig::default().min_delay, Duration::from_secs(1));
    }

    #[test]
    fn loads_from_lookup() {
        let (_dir, vars) = env_with_routes(&[
            ("DEPARTURES_REFRESH_SECS", "60"),
            ("DEPARTURES_SLEEP_MS", "250"),
            ("DEPARTURES_RATE_LIMIT_MS", "1500"),
            ("PORT", "8080"),
        ]);

        let config = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.fetcher.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.fetcher.sleep_between_calls, Duration::from_millis(250));
        assert_eq!(config.rate_limit.min_delay, Duration::from_millis(1500));
        assert_eq!(config.port, 8080);
        assert_eq!(config.mock_dir, PathBuf::from(DEFAULT_MOCK_DIR));
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.all_stops().count(), 2);

        let giesing = &config.routes[0];
        assert_eq!(giesing.display_title(), "Richtung Giesing");
        assert_eq!(giesing.stops[0].max_departures_per_route, 1);
        assert_eq!(config.routes[1].display_title(), "airport");

        let poller = config.poller_config(giesing);
        assert_eq!(poller.topic, "giesing");
        assert_eq!(poller.refresh_interval, Duration::from_secs(60));
    }

    #[test]
    fn invalid_number_is_reported() {
        let (_dir, vars) = env_with_routes(&[("DEPARTURES_SLEEP_MS", "soon")]);
        let err = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "DEPARTURES_SLEEP_MS",
                ..
            }
        ));
    }

    #[test]
    fn zero_refresh_is_rejected() {
        let (_dir, vars) = env_with_routes(&[("DEPARTURES_REFRESH_SECS", "0")]);
        assert!(AppConfig::from_lookup(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn routes_path_is_required() {
        let err = AppConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                var: "DEPARTURES_ROUTES"
            }
        ));
    }

    #[test]
    fn duplicate_topics_are_rejected() {
        let json = r#"[{"topic": "a", "stops": []}, {"topic": "a", "stops": []}]"#;
        let err = RouteConfiguration::parse_all(json, Path::new("routes.json")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTopic(t) if t == "a"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RouteConfiguration::load_all("/nonexistent/routes.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn bundled_routes_parse() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/routes.json");
        let routes = RouteConfiguration::load_all(path).unwrap();
        assert_eq!(routes[0].topic, "universitaet");
        assert!(routes[0].stops[1].is_stop_point());
    }
}
