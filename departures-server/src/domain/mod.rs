//! Domain types for the departures display.
//!
//! Departures arrive from provider adapters as immutable values. Stop
//! configurations are loaded once at startup and describe how a flat list of
//! departures turns into direction groups.

mod departure;
mod stop;

#[cfg(test)]
pub(crate) use departure::fixtures;
pub use departure::{Departure, GroupedDepartures, mark_stale};
pub use stop::{
    DEFAULT_API_PROVIDER, DEFAULT_FETCH_WINDOW_MINS, DEFAULT_MAX_DEPARTURES_FETCH,
    DEFAULT_MAX_DEPARTURES_PER_ROUTE, DEFAULT_MAX_DEPARTURES_PER_STOP, DirectionMapping,
    StopConfiguration, base_station_id, is_stop_point_id,
};
