//! Aggregator configuration from environment variables

use crate::errors::ConfigError;
use std::env;
use std::time::Duration;

/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Path to SQLite metadata database
    pub db_path: String,

    /// Directory holding the `*.sql` schema files
    pub schema_dir: String,

    /// Per-request timeout for chain queries in milliseconds
    pub query_timeout_ms: u64,

    /// CoinGecko-compatible API base URL
    pub price_feed_url: String,
}

impl AggregatorConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `STAKEVIEW_DB_PATH` (default: stakeview.db)
    /// - `STAKEVIEW_SCHEMA_DIR` (default: sql)
    /// - `QUERY_TIMEOUT_MS` (default: 10000)
    /// - `PRICE_FEED_URL` (default: https://api.coingecko.com/api/v3)
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("STAKEVIEW_DB_PATH").unwrap_or_else(|_| "stakeview.db".to_string()),

            schema_dir: env::var("STAKEVIEW_SCHEMA_DIR").unwrap_or_else(|_| "sql".to_string()),

            query_timeout_ms: env::var("QUERY_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),

            price_feed_url: env::var("PRICE_FEED_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "QUERY_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }
        if !self.price_feed_url.starts_with("http://") && !self.price_feed_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(format!(
                "PRICE_FEED_URL must be an http(s) URL, got {}",
                self.price_feed_url
            )));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}
