//! Multi-network staking portfolio aggregation for Cosmos SDK chains.
//!
//! `pipeline::Aggregator` is the entry point; the binary in `src/bin` wires it
//! to SQLite metadata, LCD endpoints and the CoinGecko price feed.

pub mod config;
pub mod errors;
pub mod pipeline;
pub mod query;
pub mod types;

pub use pipeline::{AggregateResponse, Aggregator};
