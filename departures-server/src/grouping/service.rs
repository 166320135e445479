//! Grouping of raw departures into per-direction display lists.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::{Departure, GroupedDepartures, StopConfiguration};
use crate::provider::{DepartureQuery, DepartureRepository, ProviderError};

use super::filters::filter_and_limit;
use super::matcher::{DirectionMatcher, search_text};

/// Group departures for one stop.
///
/// Blacklisted departures are dropped, the rest go to the first direction
/// whose patterns match or to the ungrouped bucket. Each group then runs
/// through the filter cascade. Non-empty directions come out in declaration
/// order, followed by the ungrouped bucket when the stop shows it.
pub fn group_departures(
    departures: &[Departure],
    stop: &StopConfiguration,
    reference_time: DateTime<Utc>,
) -> Vec<GroupedDepartures> {
    let matcher = DirectionMatcher::from_config(stop);
    if matcher.is_empty() {
        warn!(stop = %stop.station_name, "no direction mappings configured");
    }

    let mut buckets: Vec<Vec<Departure>> = vec![Vec::new(); matcher.len()];
    let mut ungrouped = Vec::new();
    let mut excluded = 0usize;

    for departure in departures {
        let text = search_text(departure);
        if matcher.is_excluded(&text) {
            excluded += 1;
            continue;
        }
        match matcher.assign(&text) {
            Some(idx) => buckets[idx].push(departure.clone()),
            None => {
                debug!(
                    stop = %stop.station_name,
                    transport_type = %departure.transport_type,
                    line = %departure.line,
                    destination = %departure.destination,
                    "unmatched departure"
                );
                ungrouped.push(departure.clone());
            }
        }
    }

    if excluded > 0 {
        debug!(stop = %stop.station_name, excluded, "filtered blacklisted departures");
    }

    let mut result: Vec<GroupedDepartures> = buckets
        .into_iter()
        .enumerate()
        .filter_map(|(idx, bucket)| {
            let kept = filter_and_limit(bucket, stop, reference_time);
            (!kept.is_empty()).then(|| GroupedDepartures::new(matcher.name(idx), kept))
        })
        .collect();

    if stop.show_ungrouped && !ungrouped.is_empty() {
        let kept = filter_and_limit(ungrouped, stop, reference_time);
        if !kept.is_empty() {
            result.push(GroupedDepartures::new(stop.ungrouped_label(), kept));
        }
    }

    result
}

/// Fetches departures for configured stops and groups them.
#[derive(Clone)]
pub struct GroupingService {
    repository: Arc<dyn DepartureRepository>,
}

impl GroupingService {
    pub fn new(repository: Arc<dyn DepartureRepository>) -> Self {
        Self { repository }
    }

    /// Fetch and group departures for a stop, relative to now.
    ///
    /// Upstream failures are returned to the caller unchanged.
    pub async fn get_grouped_departures(
        &self,
        stop: &StopConfiguration,
    ) -> Result<Vec<GroupedDepartures>, ProviderError> {
        let query = DepartureQuery::new(stop.max_departures_fetch)
            .with_duration(stop.fetch_max_minutes_in_advance);
        let departures = self
            .repository
            .get_departures(stop.query_station_id(), &query)
            .await?;

        debug!(
            stop = %stop.station_name,
            station_id = %stop.query_station_id(),
            count = departures.len(),
            "fetched departures"
        );

        Ok(self.group_departures(&departures, stop, Utc::now()))
    }

    /// Group departures that were already fetched, e.g. from a shared cache.
    pub fn group_departures(
        &self,
        departures: &[Departure],
        stop: &StopConfiguration,
        reference_time: DateTime<Utc>,
    ) -> Vec<GroupedDepartures> {
        group_departures(departures, stop, reference_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::departure_at;
    use crate::provider::ScriptedRepository;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn giesing_stop() -> StopConfiguration {
        StopConfiguration::new("de:09162:70", "Universität")
            .with_direction("->Giesing", ["Giesing", "Fürstenried"])
    }

    fn group_names(groups: &[GroupedDepartures]) -> Vec<&str> {
        groups.iter().map(|g| g.direction_name.as_str()).collect()
    }

    #[test]
    fn groups_matching_and_ungrouped() {
        let deps = vec![
            departure_at(now(), 8, "U6", "Klinikum Großhadern"),
            departure_at(now(), 5, "U3", "Fürstenried West"),
            departure_at(now(), 2, "U2", "Giesing"),
        ];

        let groups = group_departures(&deps, &giesing_stop(), now());

        assert_eq!(group_names(&groups), ["->Giesing", "Other"]);
        let giesing: Vec<&str> = groups[0]
            .departures
            .iter()
            .map(|d| d.destination.as_str())
            .collect();
        assert_eq!(giesing, ["Giesing", "Fürstenried West"]);
        assert_eq!(groups[1].departures.len(), 1);
        assert_eq!(groups[1].departures[0].destination, "Klinikum Großhadern");
    }

    #[test]
    fn route_cap_of_one_keeps_earliest() {
        let stop = StopConfiguration::new("de:09162:70", "Universität")
            .with_max_departures_per_route(1);
        let deps: Vec<Departure> = [9, 3, 12, 5, 7]
            .iter()
            .map(|m| departure_at(now(), *m, "U3", "Moosach"))
            .collect();

        let groups = group_departures(&deps, &stop, now());

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].departures.len(), 1);
        assert_eq!(groups[0].departures[0].time, now() + chrono::Duration::minutes(3));
    }

    #[test]
    fn groups_follow_declaration_order() {
        let stop = StopConfiguration::new("x", "x")
            .with_direction("Zentrum", ["Sendlinger Tor"])
            .with_direction("Airport", ["Flughafen"])
            .with_direction("Bahnhof", ["Hauptbahnhof"]);
        let deps = vec![
            departure_at(now(), 1, "S8", "Flughafen München"),
            departure_at(now(), 2, "U1", "Hauptbahnhof"),
            departure_at(now(), 3, "U2", "Sendlinger Tor"),
        ];

        let groups = group_departures(&deps, &stop, now());
        assert_eq!(group_names(&groups), ["Zentrum", "Airport", "Bahnhof"]);
    }

    #[test]
    fn empty_directions_are_omitted() {
        let stop = giesing_stop().with_direction("->Nord", ["Moosach"]);
        let deps = vec![departure_at(now(), 1, "U2", "Giesing")];

        let groups = group_departures(&deps, &stop, now());
        assert_eq!(group_names(&groups), ["->Giesing"]);
    }

    #[test]
    fn hidden_ungrouped_bucket() {
        let stop = giesing_stop().with_ungrouped(false, None);
        let deps = vec![
            departure_at(now(), 1, "U2", "Giesing"),
            departure_at(now(), 2, "U6", "Garching"),
        ];

        let groups = group_departures(&deps, &stop, now());
        assert_eq!(group_names(&groups), ["->Giesing"]);
    }

    #[test]
    fn custom_ungrouped_label() {
        let stop = giesing_stop().with_ungrouped(true, Some("Sonstige"));
        let deps = vec![departure_at(now(), 2, "U6", "Garching")];

        let groups = group_departures(&deps, &stop, now());
        assert_eq!(group_names(&groups), ["Sonstige"]);
    }

    #[test]
    fn blacklist_applies_before_grouping() {
        let stop = giesing_stop().with_exclusions(["Fürstenried"]);
        let deps = vec![
            departure_at(now(), 1, "U3", "Fürstenried West"),
            departure_at(now(), 2, "U2", "Giesing"),
        ];

        let groups = group_departures(&deps, &stop, now());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].departures.len(), 1);
        assert_eq!(groups[0].departures[0].destination, "Giesing");
    }

    #[test]
    fn matching_ignores_unicode_form() {
        let stop = StopConfiguration::new("x", "x")
            .with_direction("Süd", ["Fu\u{0308}rstenried"]);
        let deps = vec![departure_at(now(), 1, "U3", "FÜRSTENRIED WEST")];

        let groups = group_departures(&deps, &stop, now());
        assert_eq!(group_names(&groups), ["Süd"]);
    }

    #[test]
    fn huge_lookahead_does_not_panic() {
        let stop = giesing_stop().with_max_hours_in_advance(1e10);
        let deps = vec![departure_at(now(), 5, "U3", "Giesing")];

        let groups = group_departures(&deps, &stop, now());
        assert_eq!(group_names(&groups), ["->Giesing"]);
    }

    #[test]
    fn leeway_applies_to_every_group() {
        let stop = giesing_stop().with_leeway_minutes(5);
        let deps = vec![
            departure_at(now(), 3, "U2", "Giesing"),
            departure_at(now(), 4, "U6", "Garching"),
            departure_at(now(), 6, "U6", "Garching"),
        ];

        let groups = group_departures(&deps, &stop, now());
        assert_eq!(group_names(&groups), ["Other"]);
        assert_eq!(groups[0].departures.len(), 1);
    }

    #[tokio::test]
    async fn fetches_with_stop_configuration() {
        let stop = StopConfiguration::new("de:09162:1108:1:1", "Hackerbrücke")
            .with_direction("Ost", ["Ostbahnhof"]);
        let repo = Arc::new(ScriptedRepository::new());
        let mut dep = departure_at(Utc::now(), 5, "S1", "Ostbahnhof");
        dep.stop_point_global_id = Some("de:09162:1108:1:1".to_string());
        repo.push_ok("de:09162:1108", vec![dep]);

        let service = GroupingService::new(repo.clone());
        let groups = service.get_grouped_departures(&stop).await.unwrap();

        assert_eq!(group_names(&groups), ["Ost"]);
        let calls = repo.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "de:09162:1108");
        assert_eq!(calls[0].1.limit, stop.max_departures_fetch);
        assert_eq!(calls[0].1.duration_minutes, stop.fetch_max_minutes_in_advance);
    }

    #[tokio::test]
    async fn fetch_failure_propagates() {
        let repo = Arc::new(ScriptedRepository::new());
        repo.push_err(
            "de:09162:70",
            ProviderError::Http {
                status: 503,
                message: "down".into(),
            },
        );

        let service = GroupingService::new(repo);
        let result = service.get_grouped_departures(&giesing_stop()).await;
        assert!(matches!(result, Err(ProviderError::Http { status: 503, .. })));
    }

    #[tokio::test]
    async fn empty_fetch_is_not_an_error() {
        let repo = Arc::new(ScriptedRepository::new());
        repo.push_ok("de:09162:70", Vec::new());

        let service = GroupingService::new(repo);
        let groups = service.get_grouped_departures(&giesing_stop()).await.unwrap();
        assert!(groups.is_empty());
    }
}
