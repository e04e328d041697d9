//! CoinGecko price feed
//!
//! Endpoint: `{base}/simple/price?ids=a,b,c&vs_currencies=usd`
//! Returns: `{"cosmos": {"usd": 9.87}, "osmosis": {"usd": 0.41}}`
//!
//! Ids the feed does not know are simply absent from the response.

use super::prices::PriceFeed;
use crate::errors::PriceError;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

const QUOTE_CURRENCY: &str = "usd";

/// Raw `/simple/price` body: id → currency → quote
pub type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

pub struct CoinGeckoFeed {
    base_url: String,
    http: reqwest::Client,
}

impl CoinGeckoFeed {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PriceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, ids: &BTreeSet<String>) -> String {
        let joined: Vec<&str> = ids.iter().map(String::as_str).collect();
        format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.base_url,
            joined.join(","),
            QUOTE_CURRENCY
        )
    }
}

/// Keep the USD quote of every id that has one
pub fn usd_quotes(response: SimplePriceResponse) -> HashMap<String, f64> {
    response
        .into_iter()
        .filter_map(|(id, quotes)| quotes.get(QUOTE_CURRENCY).map(|price| (id, *price)))
        .collect()
}

#[async_trait]
impl PriceFeed for CoinGeckoFeed {
    async fn get_prices(&self, ids: &BTreeSet<String>) -> Result<HashMap<String, f64>, PriceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = self.url(ids);
        log::debug!("💱 Fetching {} prices from {}", ids.len(), url);

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(PriceError::Status(response.status().as_u16()));
        }

        let body: SimplePriceResponse = response.json().await?;
        Ok(usd_quotes(body))
    }
}
