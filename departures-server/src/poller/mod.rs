//! Per-route polling and snapshot publication.
//!
//! Each route gets one [`Poller`]. Pollers read the Fetcher's shared raw
//! cache when one is configured, group departures per stop, and publish a
//! complete [`DeparturesSnapshot`] after every pass.

mod broadcast;
mod route_poller;
mod snapshot;

pub use broadcast::{Broadcaster, SnapshotUpdated};
pub use route_poller::Poller;
pub use snapshot::{ApiStatus, DeparturesSnapshot, DirectionGroupWithMetadata, SnapshotStore};
