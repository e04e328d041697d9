//! HTTP client for Cosmos SDK LCD (REST) endpoints

use super::client::{ClientFactory, QueryClient, QueryOutcome, Telemetry};
use super::endpoint::Endpoint;
use crate::errors::QueryError;
use crate::types::{ChainInfo, NetworkName};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Error body returned by LCD gateways on non-2xx responses
#[derive(Debug, Deserialize)]
struct LcdErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Map a non-success response body to a `QueryError`
fn classify_error(status: u16, body: &str) -> QueryError {
    match serde_json::from_str::<LcdErrorBody>(body) {
        Ok(err) if !err.message.is_empty() => QueryError::Remote {
            status,
            code: err.code,
            message: err.message,
        },
        _ => QueryError::Remote {
            status,
            code: 0,
            message: body.trim().chars().take(200).collect(),
        },
    }
}

pub struct LcdClient {
    network: NetworkName,
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl LcdClient {
    pub fn new(chain: &ChainInfo, timeout: Duration) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::Unavailable {
                network: chain.name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            network: chain.name.clone(),
            base_url: chain.lcd_url.trim_end_matches('/').to_string(),
            timeout,
            http,
        })
    }

    async fn fetch(&self, url: &str) -> Result<Value, QueryError> {
        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                QueryError::Timeout {
                    url: url.to_string(),
                    timeout: self.timeout,
                }
            } else {
                QueryError::Http {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| QueryError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl QueryClient for LcdClient {
    fn network(&self) -> &NetworkName {
        &self.network
    }

    async fn query(&self, endpoint: &Endpoint) -> QueryOutcome {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let started = Instant::now();
        let result = self.fetch(&url).await;

        QueryOutcome {
            telemetry: Telemetry {
                network: self.network.clone(),
                endpoint: endpoint.label(),
                duration: started.elapsed(),
                success: result.is_ok(),
            },
            result,
        }
    }
}

/// Builds `LcdClient`s with a shared per-request timeout
pub struct LcdClientFactory {
    timeout: Duration,
}

impl LcdClientFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ClientFactory for LcdClientFactory {
    fn connect(&self, chain: &ChainInfo) -> Result<Arc<dyn QueryClient>, QueryError> {
        if !chain.lcd_url.starts_with("http://") && !chain.lcd_url.starts_with("https://") {
            return Err(QueryError::Unavailable {
                network: chain.name.to_string(),
                reason: format!("LCD url must start with http:// or https://, got {}", chain.lcd_url),
            });
        }
        Ok(Arc::new(LcdClient::new(chain, self.timeout)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_lcd_error_envelope() {
        let body = r#"{"code":5,"message":"rpc error: code = NotFound desc = validator does not exist","details":[]}"#;
        match classify_error(404, body) {
            QueryError::Remote { status, code, message } => {
                assert_eq!(status, 404);
                assert_eq!(code, 5);
                assert!(message.contains("validator does not exist"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_classify_plain_text_error() {
        match classify_error(502, "Bad Gateway\n") {
            QueryError::Remote { status, code, message } => {
                assert_eq!(status, 502);
                assert_eq!(code, 0);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_factory_rejects_bad_url() {
        let factory = LcdClientFactory::new(Duration::from_secs(1));
        let chain = ChainInfo {
            name: NetworkName::parse("cosmoshub").unwrap(),
            lcd_url: "lcd.example.com".to_string(),
            bond_denom: "uatom".to_string(),
        };
        assert!(matches!(
            factory.connect(&chain),
            Err(QueryError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_client_trims_trailing_slash() {
        let chain = ChainInfo {
            name: NetworkName::parse("cosmoshub").unwrap(),
            lcd_url: "https://lcd.example.com/".to_string(),
            bond_denom: "uatom".to_string(),
        };
        let client = LcdClient::new(&chain, Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "https://lcd.example.com");
        assert_eq!(client.network().as_str(), "cosmoshub");
    }
}
