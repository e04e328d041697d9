//! Query client seam: the trait the scheduler calls, per-network client cache,
//! and the telemetry sink every call reports to.

use super::endpoint::Endpoint;
use crate::errors::QueryError;
use crate::types::{ChainInfo, NetworkName};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Timing of one remote call
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub network: NetworkName,
    pub endpoint: &'static str,
    pub duration: Duration,
    pub success: bool,
}

/// Result of one remote call plus its telemetry
///
/// Telemetry is produced for failed calls too.
#[derive(Debug)]
pub struct QueryOutcome {
    pub result: Result<Value, QueryError>,
    pub telemetry: Telemetry,
}

/// One network's request/response endpoint
#[async_trait]
pub trait QueryClient: Send + Sync {
    fn network(&self) -> &NetworkName;

    /// Issue exactly one request. Timeouts surface as `QueryError::Timeout`.
    async fn query(&self, endpoint: &Endpoint) -> QueryOutcome;
}

/// Builds a client for a chain; called at most once per network per cache
pub trait ClientFactory: Send + Sync {
    fn connect(&self, chain: &ChainInfo) -> Result<Arc<dyn QueryClient>, QueryError>;
}

/// Receives per-call telemetry; never consulted for control flow
pub trait TelemetrySink: Send + Sync {
    fn record(&self, telemetry: &Telemetry);
}

/// Telemetry sink that logs each call and keeps running totals
#[derive(Debug, Default)]
pub struct LogTelemetry {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl LogTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// (succeeded, failed) since creation
    pub fn totals(&self) -> (u64, u64) {
        (
            self.succeeded.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }
}

impl TelemetrySink for LogTelemetry {
    fn record(&self, telemetry: &Telemetry) {
        let counter = if telemetry.success {
            &self.succeeded
        } else {
            &self.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);

        log::debug!(
            "query network={} endpoint={} duration_ms={} success={}",
            telemetry.network,
            telemetry.endpoint,
            telemetry.duration.as_millis(),
            telemetry.success
        );
    }
}

/// Per-network clients, created on first use and reused across requests
pub struct ClientCache {
    factory: Arc<dyn ClientFactory>,
    clients: Mutex<HashMap<NetworkName, Arc<dyn QueryClient>>>,
}

impl ClientCache {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_connect(&self, chain: &ChainInfo) -> Result<Arc<dyn QueryClient>, QueryError> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(&chain.name) {
            return Ok(client.clone());
        }

        let client = self.factory.connect(chain)?;
        log::debug!("Created query client for {} ({})", chain.name, chain.lcd_url);
        clients.insert(chain.name.clone(), client.clone());
        Ok(client)
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct NullClient {
        network: NetworkName,
    }

    #[async_trait]
    impl QueryClient for NullClient {
        fn network(&self) -> &NetworkName {
            &self.network
        }

        async fn query(&self, endpoint: &Endpoint) -> QueryOutcome {
            QueryOutcome {
                result: Ok(Value::Null),
                telemetry: Telemetry {
                    network: self.network.clone(),
                    endpoint: endpoint.label(),
                    duration: Duration::ZERO,
                    success: true,
                },
            }
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        connects: AtomicUsize,
    }

    impl ClientFactory for CountingFactory {
        fn connect(&self, chain: &ChainInfo) -> Result<Arc<dyn QueryClient>, QueryError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if chain.lcd_url.is_empty() {
                return Err(QueryError::Unavailable {
                    network: chain.name.to_string(),
                    reason: "empty url".to_string(),
                });
            }
            Ok(Arc::new(NullClient {
                network: chain.name.clone(),
            }))
        }
    }

    fn chain(name: &str, url: &str) -> ChainInfo {
        ChainInfo {
            name: NetworkName::parse(name).unwrap(),
            lcd_url: url.to_string(),
            bond_denom: "uatom".to_string(),
        }
    }

    #[tokio::test]
    async fn test_client_cache_reuses_clients() {
        let factory = Arc::new(CountingFactory::default());
        let cache = ClientCache::new(factory.clone());
        let hub = chain("cosmoshub", "http://lcd");

        let first = cache.get_or_connect(&hub).await.unwrap();
        let second = cache.get_or_connect(&hub).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        cache.get_or_connect(&chain("osmosis", "http://osmo")).await.unwrap();
        assert_eq!(factory.connects.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_failed_connect_is_not_cached() {
        let factory = Arc::new(CountingFactory::default());
        let cache = ClientCache::new(factory.clone());
        let broken = chain("juno", "");

        assert!(cache.get_or_connect(&broken).await.is_err());
        assert!(cache.get_or_connect(&broken).await.is_err());
        assert_eq!(factory.connects.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 0);
    }

    #[test]
    fn test_log_telemetry_totals() {
        let sink = LogTelemetry::new();
        let mut telemetry = Telemetry {
            network: NetworkName::parse("cosmoshub").unwrap(),
            endpoint: "balances",
            duration: Duration::from_millis(12),
            success: true,
        };
        sink.record(&telemetry);
        telemetry.success = false;
        sink.record(&telemetry);
        sink.record(&telemetry);
        assert_eq!(sink.totals(), (1, 2));
    }
}
