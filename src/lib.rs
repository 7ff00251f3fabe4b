//! Hero marketplace listing service: indexer fetch, query engine, HTTP API.

pub mod api;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod listing_refresh;
pub mod price;
pub mod query;
pub mod state;
pub mod trade;
pub mod types;
