//! Live transit departures server.
//!
//! Fetches departures from upstream providers, groups them by direction for
//! each configured stop, and keeps a last-known-good snapshot per route
//! while upstream services fail and recover.

pub mod cache;
pub mod config;
pub mod domain;
pub mod fetcher;
pub mod grouping;
pub mod poller;
pub mod provider;
pub mod rate_limit;
pub mod task;
pub mod web;
