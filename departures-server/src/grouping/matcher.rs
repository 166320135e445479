//! Text matching of departures against direction and blacklist patterns.
//!
//! A departure is matched through its search text,
//! `"{transport_type} {line} {destination}"`, NFC-normalized and lower-cased.
//! A pattern matches when its normalized form is a substring of that text.

use unicode_normalization::UnicodeNormalization;

use crate::domain::{Departure, StopConfiguration};

/// NFC-normalize and lower-case text for matching.
///
/// "ü" written as one code point and as "u" plus a combining diaeresis
/// normalize to the same string.
pub fn normalize(text: &str) -> String {
    text.nfc().collect::<String>().to_lowercase()
}

/// Normalized search text for a departure.
pub fn search_text(departure: &Departure) -> String {
    normalize(&format!(
        "{} {} {}",
        departure.transport_type, departure.line, departure.destination
    ))
}

/// A list of normalized substring patterns.
///
/// Blank patterns are dropped; they would otherwise match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<String>,
}

impl PatternSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| normalize(p.as_ref().trim()))
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True if any pattern occurs in the (already normalized) text.
    pub fn matches(&self, search_text: &str) -> bool {
        self.patterns.iter().any(|p| search_text.contains(p.as_str()))
    }
}

/// Assigns departures to the first matching direction in declaration order.
#[derive(Debug, Clone)]
pub struct DirectionMatcher {
    directions: Vec<(String, PatternSet)>,
    exclusions: PatternSet,
}

impl DirectionMatcher {
    pub fn from_config(stop: &StopConfiguration) -> Self {
        let directions = stop
            .direction_mappings
            .iter()
            .map(|m| (m.name.clone(), PatternSet::new(&m.patterns)))
            .collect();
        Self {
            directions,
            exclusions: PatternSet::new(&stop.exclude_destinations),
        }
    }

    /// Number of configured directions.
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    /// Direction label at `index`.
    pub fn name(&self, index: usize) -> &str {
        &self.directions[index].0
    }

    /// True if the departure matches a blacklist pattern.
    pub fn is_excluded(&self, search_text: &str) -> bool {
        self.exclusions.matches(search_text)
    }

    /// Index of the first direction whose patterns match.
    pub fn assign(&self, search_text: &str) -> Option<usize> {
        self.directions
            .iter()
            .position(|(_, patterns)| patterns.matches(search_text))
    }
}
