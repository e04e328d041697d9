//! Secondary fan-out: resolve validator monikers for the addresses collected
//! during the primary fan-out, then write them (and explorer links) back.

use super::store::{AddressRef, AggregationStore, NetworkEntry};
use crate::errors::QueryError;
use crate::query::parse::parse_moniker;
use crate::query::{ClientCache, Endpoint, TelemetrySink};
use crate::types::{ChainInfo, Explorer, NetworkName, Subject};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

pub type NameTable = HashMap<AddressRef, String>;

/// network → account address → explorer page
pub type AccountLinks = BTreeMap<NetworkName, BTreeMap<String, String>>;

async fn lookup_name(
    reference: &AddressRef,
    chain: &ChainInfo,
    clients: &ClientCache,
    telemetry: &dyn TelemetrySink,
) -> Result<String, QueryError> {
    let client = clients.get_or_connect(chain).await?;
    let outcome = client
        .query(&Endpoint::Validator {
            address: reference.address.clone(),
        })
        .await;
    telemetry.record(&outcome.telemetry);
    parse_moniker(outcome.result?)
}

/// Resolve one name per distinct reference, concurrently
///
/// Failures are logged and leave the name out of the table.
pub async fn resolve_names(
    references: &[AddressRef],
    chains: &HashMap<NetworkName, Arc<ChainInfo>>,
    clients: Arc<ClientCache>,
    telemetry: Arc<dyn TelemetrySink>,
) -> NameTable {
    let distinct: BTreeSet<&AddressRef> = references.iter().collect();
    let names = Arc::new(Mutex::new(NameTable::new()));
    let mut units = JoinSet::new();

    for reference in distinct {
        let Some(chain) = chains.get(&reference.network).cloned() else {
            log::warn!("⚠️  No chain info for {}, skipping name of {}", reference.network, reference.address);
            continue;
        };
        let reference = reference.clone();
        let clients = clients.clone();
        let telemetry = telemetry.clone();
        let names = names.clone();

        units.spawn(async move {
            match lookup_name(&reference, &chain, &clients, telemetry.as_ref()).await {
                Ok(name) => {
                    names.lock().await.insert(reference, name);
                }
                Err(e) => {
                    log::warn!(
                        "⚠️  Name lookup failed for {} on {}: {}",
                        reference.address,
                        reference.network,
                        e
                    );
                }
            }
        });
    }

    super::scheduler::join_units(units).await;

    let mut names = names.lock().await;
    std::mem::take(&mut *names)
}

/// Fill validator names and explorer links throughout the store
pub fn apply_names(
    store: &mut AggregationStore,
    names: &NameTable,
    explorers: &HashMap<NetworkName, Explorer>,
) {
    for (network, _, records) in store.data_mut() {
        let explorer = explorers.get(network);
        for record in records.iter_mut() {
            for validator in record.validators_mut() {
                let key = AddressRef {
                    network: network.clone(),
                    address: validator.address.clone(),
                };
                validator.name = names.get(&key).cloned();
                validator.explorer_url = explorer.map(|e| e.validator_link(&validator.address));
            }
        }
    }
}

/// Explorer link for every account subject in the store
pub fn account_links(store: &AggregationStore, explorers: &HashMap<NetworkName, Explorer>) -> AccountLinks {
    let mut links = AccountLinks::new();
    for (network, entry) in store.networks() {
        let (NetworkEntry::Results(subjects), Some(explorer)) = (entry, explorers.get(network)) else {
            continue;
        };
        for subject in subjects.keys() {
            if let Subject::Account(address) = subject {
                links
                    .entry(network.clone())
                    .or_default()
                    .insert(address.clone(), explorer.account_link(address));
            }
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::store::{Collector, SlotKey};
    use crate::types::{Amount, Category, Record, Subject, ValidatorRef};

    #[test]
    fn test_apply_names_and_links() {
        let hub = NetworkName::parse("cosmoshub").unwrap();
        let mut store = AggregationStore::new();
        store.open_network(hub.clone());
        let mut collector = Collector::new(store);
        collector.record(
            SlotKey {
                network: hub.clone(),
                subject: Subject::Account("cosmos1abc".to_string()),
                category: Category::Delegation,
            },
            Ok(vec![
                Record::Delegation {
                    validator: ValidatorRef::new("valoper1known"),
                    amount: Amount::new(1.0, "uatom"),
                },
                Record::Delegation {
                    validator: ValidatorRef::new("valoper1unknown"),
                    amount: Amount::new(2.0, "uatom"),
                },
            ]),
        );

        let names = NameTable::from([(
            AddressRef {
                network: hub.clone(),
                address: "valoper1known".to_string(),
            },
            "Figment".to_string(),
        )]);
        let explorers = HashMap::from([(
            hub.clone(),
            Explorer {
                account_url: "https://mintscan.io/cosmos/address/{}".to_string(),
                validator_url: "https://mintscan.io/cosmos/validators/{}".to_string(),
            },
        )]);

        apply_names(&mut collector.store, &names, &explorers);

        let records = collector.store.records(
            &hub,
            &Subject::Account("cosmos1abc".to_string()),
            Category::Delegation,
        );
        let first = records[0].validators()[0];
        assert_eq!(first.name.as_deref(), Some("Figment"));
        assert_eq!(
            first.explorer_url.as_deref(),
            Some("https://mintscan.io/cosmos/validators/valoper1known")
        );
        let second = records[1].validators()[0];
        assert_eq!(second.name, None);
        assert!(second.explorer_url.is_some());
    }

    #[test]
    fn test_account_links_skip_network_subjects() {
        let hub = NetworkName::parse("cosmoshub").unwrap();
        let mut store = AggregationStore::new();
        store.open_network(hub.clone());
        store.fail_network(NetworkName::parse("juno").unwrap(), "unknown network juno");
        let mut collector = Collector::new(store);
        for subject in [Subject::Account("cosmos1abc".to_string()), Subject::Network] {
            collector.record(
                SlotKey {
                    network: hub.clone(),
                    subject,
                    category: Category::Supply,
                },
                Ok(Vec::new()),
            );
        }
        let explorers = HashMap::from([(
            hub.clone(),
            Explorer {
                account_url: "https://mintscan.io/cosmos/address/{}".to_string(),
                validator_url: "https://mintscan.io/cosmos/validators/{}".to_string(),
            },
        )]);

        let links = account_links(&collector.store, &explorers);
        assert_eq!(links.len(), 1);
        assert_eq!(links[&hub].len(), 1);
        assert_eq!(links[&hub]["cosmos1abc"], "https://mintscan.io/cosmos/address/cosmos1abc");
    }
}
