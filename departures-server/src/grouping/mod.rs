//! Direction grouping and per-group filtering.

mod filters;
mod matcher;
mod service;

pub use filters::{
    cap_per_route, filter_and_limit, filter_leeway, filter_lookahead, filter_platform,
    filter_stop_point,
};
pub use matcher::{DirectionMatcher, PatternSet, normalize, search_text};
pub use service::{GroupingService, group_departures};
