//! Read-only HTTP surface over the published snapshots.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::{AppState, RouteHandle};
