use std::time::Duration;
use thiserror::Error;

/// Failure of a single remote query
///
/// Every variant is a per-unit failure: the scheduler records its display
/// string under the unit's slot and moves on.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// Non-success status with the LCD error envelope (`code` is the ABCI code)
    #[error("remote error (status {status}, code {code}): {message}")]
    Remote {
        status: u16,
        code: i64,
        message: String,
    },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("no query client for {network}: {reason}")]
    Unavailable { network: String, reason: String },
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Parse(err.to_string())
    }
}

/// Metadata store errors (chains, explorers, denominations, account links)
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema directory not found: {0}")]
    SchemaMissing(String),

    #[error("invalid row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("connection lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum PriceError {
    #[error("price feed request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("price feed returned status {0}")]
    Status(u16),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Request-level failure: the only error an entry point returns
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("failed to load network metadata: {0}")]
    Prerequisites(#[source] StoreError),

    #[error("failed to load linked accounts for user {user_id}: {source}")]
    Accounts {
        user_id: i64,
        #[source]
        source: StoreError,
    },
}
