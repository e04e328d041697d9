//! # Aggregation pipeline
//!
//! One request flows through these stages:
//!
//! 1. `directory` - load chain info and explorers, fail unknown networks
//! 2. `scheduler` - one task per (network, subject, category), barrier join
//! 3. `denoms` - one batch lookup of every distinct denomination
//! 4. `prices` - one batch call to the price feed
//! 5. `enrich` - convert raw amounts, attach prices, drop filtered amounts
//! 6. `names` - resolve validator monikers, attach explorer links
//!
//! `engine::Aggregator` drives the stages; `store` holds the results.
//!
//! ## Persistence
//!
//! `db::SqliteMetadataStore` implements both `ChainDirectory` and
//! `DenomStore` over the schema in `/sql/`. `coingecko::CoinGeckoFeed`
//! implements `PriceFeed`.

pub mod coingecko;
pub mod db;
pub mod denoms;
pub mod directory;
pub mod engine;
pub mod enrich;
pub mod names;
pub mod prices;
pub mod scheduler;
pub mod store;

// Re-export commonly used types
pub use coingecko::CoinGeckoFeed;
pub use db::{run_schema_migrations, SqliteMetadataStore};
pub use denoms::{DenomStore, DenomTable};
pub use directory::ChainDirectory;
pub use engine::{AggregateResponse, Aggregator};
pub use prices::PriceFeed;
pub use store::{AggregationStore, CategoryOutcome, NetworkEntry, Summary};
