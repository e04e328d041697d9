//! Chain directory: prerequisite metadata resolved before any fan-out

use super::store::AggregationStore;
use crate::errors::StoreError;
use crate::types::{AccountTarget, ChainInfo, Explorer, NetworkName};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Persistence side of chains, explorers and user account links
#[async_trait]
pub trait ChainDirectory: Send + Sync {
    /// Chain info for each known name; unknown names are absent
    async fn chains(&self, names: &BTreeSet<NetworkName>) -> Result<HashMap<NetworkName, ChainInfo>, StoreError>;

    /// Explorer templates for each name that has one
    async fn explorers(&self, names: &BTreeSet<NetworkName>) -> Result<HashMap<NetworkName, Explorer>, StoreError>;

    async fn linked_accounts(&self, user_id: i64) -> Result<Vec<AccountTarget>, StoreError>;
}

/// Networks cleared for fan-out
#[derive(Debug, Default)]
pub struct Prerequisites {
    pub chains: HashMap<NetworkName, Arc<ChainInfo>>,
    pub explorers: HashMap<NetworkName, Explorer>,
}

impl Prerequisites {
    pub fn is_ready(&self, network: &NetworkName) -> bool {
        self.chains.contains_key(network)
    }
}

/// Load chain and explorer metadata for the requested networks
///
/// A store failure is fatal to the request. A network without chain info or
/// explorer is marked failed in `store` and left out of the result; every
/// other network is opened for writes.
pub async fn load_prerequisites(
    directory: &dyn ChainDirectory,
    requested: &BTreeSet<NetworkName>,
    store: &mut AggregationStore,
) -> Result<Prerequisites, StoreError> {
    let mut chains = directory.chains(requested).await?;
    let mut explorers = directory.explorers(requested).await?;

    let mut ready = Prerequisites::default();
    for network in requested {
        let Some(chain) = chains.remove(network) else {
            log::warn!("⚠️  Unknown network {}, skipping its queries", network);
            store.fail_network(network.clone(), format!("unknown network {}", network));
            continue;
        };
        let Some(explorer) = explorers.remove(network) else {
            log::warn!("⚠️  No explorer configured for {}, skipping its queries", network);
            store.fail_network(network.clone(), format!("no explorer configured for {}", network));
            continue;
        };

        store.open_network(network.clone());
        ready.chains.insert(network.clone(), Arc::new(chain));
        ready.explorers.insert(network.clone(), explorer);
    }

    Ok(ready)
}
