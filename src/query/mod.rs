//! Remote query client
//!
//! One typed request per call against a network's LCD endpoint. The
//! aggregation pipeline only sees the `QueryClient` / `ClientFactory` traits;
//! `lcd` is the HTTP implementation and `parse` turns payloads into records.

pub mod client;
pub mod endpoint;
pub mod lcd;
pub mod parse;

pub use client::{ClientCache, ClientFactory, LogTelemetry, QueryClient, QueryOutcome, Telemetry, TelemetrySink};
pub use endpoint::Endpoint;
pub use lcd::{LcdClient, LcdClientFactory};
