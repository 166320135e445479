//! Departure value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single scheduled transit event at a station.
///
/// Produced by provider adapters and never mutated afterwards. Fallback
/// paths derive a stale copy with [`Departure::to_stale`] instead of
/// flipping the flag in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Departure {
    /// Effective (real-time adjusted) departure time.
    pub time: DateTime<Utc>,

    /// Scheduled departure time.
    pub planned_time: DateTime<Utc>,

    /// Delay in seconds, if the provider reports one.
    pub delay_seconds: Option<i64>,

    /// Platform or bay, as reported by the provider.
    pub platform: Option<String>,

    /// True only when the most recent fetch for this station succeeded.
    pub is_realtime: bool,

    /// Line identifier, e.g. "U3" or "59".
    pub line: String,

    /// Destination text.
    pub destination: String,

    /// Transport type label, e.g. "U-Bahn" or "Bus".
    pub transport_type: String,

    pub is_cancelled: bool,

    /// Free-text rider messages.
    #[serde(default)]
    pub messages: Vec<String>,

    /// Physical sub-stop at a multi-platform station.
    #[serde(default)]
    pub stop_point_global_id: Option<String>,
}

impl Departure {
    /// Clone this departure with `is_realtime` forced to false.
    pub fn to_stale(&self) -> Self {
        Self {
            is_realtime: false,
            ..self.clone()
        }
    }

    /// Key used to detect the same vehicle event reported twice.
    pub fn identity(&self) -> (&str, &str, DateTime<Utc>) {
        (&self.line, &self.destination, self.time)
    }
}

/// Mark every departure in a list as stale.
pub fn mark_stale(departures: &[Departure]) -> Vec<Departure> {
    departures.iter().map(Departure::to_stale).collect()
}

/// Departures grouped under one direction label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedDepartures {
    pub direction_name: String,
    pub departures: Vec<Departure>,
}

impl GroupedDepartures {
    pub fn new(direction_name: impl Into<String>, departures: Vec<Departure>) -> Self {
        Self {
            direction_name: direction_name.into(),
            departures,
        }
    }

    /// Copy of this group with every departure marked stale.
    pub fn to_stale(&self) -> Self {
        Self {
            direction_name: self.direction_name.clone(),
            departures: mark_stale(&self.departures),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::departure_at;
    use super::*;

    #[test]
    fn to_stale_only_clears_realtime_flag() {
        let now = Utc::now();
        let mut original = departure_at(now, 5, "U3", "Giesing");
        original.delay_seconds = Some(60);
        original.messages = vec!["Elevator out of service".to_string()];

        let stale = original.to_stale();

        assert!(original.is_realtime);
        assert!(!stale.is_realtime);
        assert_eq!(stale.delay_seconds, Some(60));
        assert_eq!(stale.messages, original.messages);
        assert_eq!(stale.time, original.time);
    }

    #[test]
    fn grouped_to_stale_marks_every_departure() {
        let now = Utc::now();
        let group = GroupedDepartures::new(
            "->Giesing",
            vec![
                departure_at(now, 1, "U3", "Giesing"),
                departure_at(now, 4, "U6", "Klinikum"),
            ],
        );

        let stale = group.to_stale();

        assert_eq!(stale.direction_name, "->Giesing");
        assert!(stale.departures.iter().all(|d| !d.is_realtime));
    }

    #[test]
    fn deserializes_without_optional_lists() {
        let json = r#"{
            "time": "2024-03-15T10:05:00Z",
            "planned_time": "2024-03-15T10:03:00Z",
            "delay_seconds": 120,
            "platform": "2",
            "is_realtime": true,
            "line": "U3",
            "destination": "Fürstenried West",
            "transport_type": "U-Bahn",
            "is_cancelled": false
        }"#;

        let departure: Departure = serde_json::from_str(json).unwrap();
        assert!(departure.messages.is_empty());
        assert!(departure.stop_point_global_id.is_none());
        assert_eq!(departure.destination, "Fürstenried West");
    }
}
