//! News Aggregator - an RSS/Atom aggregation service
//!
//! Fetches an allow-listed set of feeds concurrently, normalizes their
//! entries into articles, deduplicates and sorts them, and serves the
//! result as JSON from `/api/news`.

pub mod aggregator;
pub mod config;
pub mod dates;
pub mod fetcher;
pub mod normalize;
pub mod registry;
pub mod routes;
