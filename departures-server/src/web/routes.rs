//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tracing::warn;

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/routes", get(list_routes))
        .route("/api/routes/:topic/departures", get(route_departures))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// List configured routes.
async fn list_routes(State(state): State<AppState>) -> Json<RoutesResponse> {
    let routes = state
        .routes
        .iter()
        .map(|(topic, handle)| RouteSummary {
            topic: topic.clone(),
            title: handle.title.clone(),
            stops: handle.stop_count,
        })
        .collect();

    Json(RoutesResponse { routes })
}

/// Current snapshot for one route.
async fn route_departures(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Json<DeparturesResponse>, AppError> {
    let handle = state.route(&topic).ok_or_else(|| AppError::NotFound {
        message: format!("Unknown route: {topic}"),
    })?;

    let snapshot = handle.snapshot.get().await;
    Ok(Json(DeparturesResponse {
        title: handle.title.clone(),
        topic,
        snapshot: (*snapshot).clone(),
    }))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound { message: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
        };

        warn!(%status, %message, "request failed");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
