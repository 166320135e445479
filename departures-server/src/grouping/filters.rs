//! Per-group filter cascade.
//!
//! Each direction group, and the ungrouped bucket, runs through the same
//! steps in order: sort, stop-point, platform, leeway, look-ahead, per-line
//! cap, per-group cap. Every step is a total function over its input.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::warn;

use crate::domain::{Departure, StopConfiguration};

/// Apply the full cascade to one group.
pub fn filter_and_limit(
    mut departures: Vec<Departure>,
    stop: &StopConfiguration,
    reference_time: DateTime<Utc>,
) -> Vec<Departure> {
    departures.sort_by_key(|d| d.time);

    if stop.is_stop_point() {
        departures = filter_stop_point(departures, &stop.station_id);
    }

    if let Some(platform) = &stop.platform_filter {
        departures = filter_platform(departures, platform, &stop.platform_filter_routes);
    }

    let cutoff = stop
        .leeway()
        .and_then(|leeway| reference_time.checked_add_signed(leeway));
    departures = match cutoff {
        Some(cutoff) => filter_leeway(departures, cutoff),
        // Past the end of representable time nothing can be shown.
        None if stop.departure_leeway_minutes > 0 => Vec::new(),
        None => departures,
    };

    // A window reaching past representable time is no bound at all.
    if let Some(latest) = stop
        .max_lookahead()
        .and_then(|lookahead| reference_time.checked_add_signed(lookahead))
    {
        departures = filter_lookahead(departures, latest);
    }

    departures = cap_per_route(departures, stop.route_cap());
    departures.truncate(stop.stop_cap());
    departures
}

/// Keep departures from exactly this stop point.
pub fn filter_stop_point(departures: Vec<Departure>, stop_point_id: &str) -> Vec<Departure> {
    let initial = departures.len();
    let available: BTreeSet<String> = departures
        .iter()
        .filter_map(|d| d.stop_point_global_id.clone())
        .collect();

    let kept: Vec<Departure> = departures
        .into_iter()
        .filter(|d| d.stop_point_global_id.as_deref() == Some(stop_point_id))
        .collect();

    if initial > 0 && kept.is_empty() {
        warn!(
            stop_point_id,
            initial,
            ?available,
            "stop point filter removed every departure"
        );
    }
    kept
}

/// Keep departures at `platform`, either by exact value or in a recognized
/// "Platform N" / "Pos. N" form.
///
/// When `routes` is non-empty, lines outside it pass through unfiltered.
pub fn filter_platform(
    departures: Vec<Departure>,
    platform: &str,
    routes: &[String],
) -> Vec<Departure> {
    let pattern = platform_pattern(platform);
    let initial = departures.len();
    let available: BTreeSet<String> = departures
        .iter()
        .filter_map(|d| d.platform.clone())
        .collect();

    let kept: Vec<Departure> = departures
        .into_iter()
        .filter(|d| {
            let applies = routes.is_empty() || routes.iter().any(|r| *r == d.line);
            !applies
                || d.platform
                    .as_deref()
                    .is_some_and(|p| platform_matches(p, platform, pattern.as_ref()))
        })
        .collect();

    if initial > 0 && kept.is_empty() {
        warn!(
            platform,
            initial,
            ?available,
            "platform filter removed every departure"
        );
    }
    kept
}

/// Matches the filter value as a standalone token, optionally after "Pos."
/// or "Platform", but not inside a line name such as "U9".
fn platform_pattern(platform: &str) -> Option<Regex> {
    let escaped = regex::escape(platform);
    Regex::new(&format!(r"(?:^|\s|Pos\.|Platform\s){escaped}(?:\s|$|\)|,)")).ok()
}

fn platform_matches(value: &str, platform: &str, pattern: Option<&Regex>) -> bool {
    value == platform || pattern.is_some_and(|re| re.is_match(value))
}

/// Drop departures earlier than `cutoff`.
pub fn filter_leeway(departures: Vec<Departure>, cutoff: DateTime<Utc>) -> Vec<Departure> {
    departures.into_iter().filter(|d| d.time >= cutoff).collect()
}

/// Drop departures later than `latest`.
pub fn filter_lookahead(departures: Vec<Departure>, latest: DateTime<Utc>) -> Vec<Departure> {
    departures.into_iter().filter(|d| d.time <= latest).collect()
}

/// Keep at most `max_per_route` departures per line, in list order.
pub fn cap_per_route(departures: Vec<Departure>, max_per_route: usize) -> Vec<Departure> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    departures
        .into_iter()
        .filter(|d| {
            let count = counts.entry(d.line.clone()).or_insert(0);
            if *count < max_per_route {
                *count += 1;
                true
            } else {
                false
            }
        })
        .collect()
}
