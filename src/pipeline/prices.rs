//! Price resolution: one batch price-feed call for the distinct feed ids
//! found in the resolved denomination metadata.

use super::denoms::DenomTable;
use crate::errors::PriceError;
use crate::types::DenomKey;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};

/// (network, raw denom) → fiat price of one display unit
pub type PriceTable = HashMap<DenomKey, f64>;

/// External price feed
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Prices for the given feed ids; ids the feed does not know are absent
    async fn get_prices(&self, ids: &BTreeSet<String>) -> Result<HashMap<String, f64>, PriceError>;
}

/// Distinct feed ids referenced by the metadata
pub fn price_ids(denoms: &DenomTable) -> BTreeSet<String> {
    denoms
        .values()
        .filter_map(|meta| meta.price_id.clone())
        .collect()
}

/// Resolve a price for every denomination that has a feed id
///
/// Missing ids are left unpriced; a failed feed call leaves everything
/// unpriced.
pub async fn resolve_prices(feed: &dyn PriceFeed, denoms: &DenomTable) -> PriceTable {
    let ids = price_ids(denoms);
    if ids.is_empty() {
        return PriceTable::new();
    }

    let quotes = match feed.get_prices(&ids).await {
        Ok(quotes) => quotes,
        Err(e) => {
            log::warn!("⚠️  Price feed unavailable for {} ids, amounts stay unpriced: {}", ids.len(), e);
            return PriceTable::new();
        }
    };

    let missing = ids.iter().filter(|id| !quotes.contains_key(*id)).count();
    if missing > 0 {
        log::debug!("Price feed returned no quote for {} of {} ids", missing, ids.len());
    }

    denoms
        .iter()
        .filter_map(|(key, meta)| {
            let price = meta.price_id.as_ref().and_then(|id| quotes.get(id))?;
            Some((key.clone(), *price))
        })
        .collect()
}
