//! Response types for the HTTP API.

use serde::Serialize;

use crate::poller::DeparturesSnapshot;

/// One entry in the route listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub topic: String,
    pub title: String,
    pub stops: usize,
}

/// Response for `GET /api/routes`.
#[derive(Debug, Serialize)]
pub struct RoutesResponse {
    pub routes: Vec<RouteSummary>,
}

/// Response for `GET /api/routes/:topic/departures`.
#[derive(Debug, Serialize)]
pub struct DeparturesResponse {
    pub topic: String,
    pub title: String,
    #[serde(flatten)]
    pub snapshot: DeparturesSnapshot,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}
