//! Denomination resolution: one batch lookup for every distinct
//! (network, raw denomination) referenced by the collected amounts.

use super::store::{AggregationStore, AmountHandle};
use crate::errors::StoreError;
use crate::types::{DenomKey, DenomMetadata};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};

pub type DenomTable = HashMap<DenomKey, DenomMetadata>;

/// Metadata store side of denomination lookups
#[async_trait]
pub trait DenomStore: Send + Sync {
    /// Resolve all keys in one round trip; unknown keys are simply absent
    async fn resolve_denominations(&self, keys: &BTreeSet<DenomKey>) -> Result<DenomTable, StoreError>;
}

/// Distinct (network, raw denom) pairs behind the handles
pub fn distinct_denoms(store: &AggregationStore, handles: &[AmountHandle]) -> BTreeSet<DenomKey> {
    handles
        .iter()
        .filter_map(|handle| {
            let slot = &handle.slot;
            let record = store
                .records(&slot.network, &slot.subject, slot.category)
                .get(handle.index)?;
            let amount = record.amount()?;
            Some(DenomKey::new(slot.network.clone(), amount.raw_denom()))
        })
        .collect()
}

/// Batch-resolve metadata; a failed lookup degrades to an empty table
pub async fn resolve_denoms(source: &dyn DenomStore, keys: &BTreeSet<DenomKey>) -> DenomTable {
    if keys.is_empty() {
        return DenomTable::new();
    }

    match source.resolve_denominations(keys).await {
        Ok(table) => {
            log::debug!("Resolved {}/{} denominations", table.len(), keys.len());
            table
        }
        Err(e) => {
            log::error!(
                "❌ Denomination lookup failed for {} pairs, amounts stay unscaled: {}",
                keys.len(),
                e
            );
            DenomTable::new()
        }
    }
}
