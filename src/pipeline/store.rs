//! Aggregation store: network → subject → category → data | error
//!
//! Built by the primary fan-out through `Collector`, which also records the
//! amount handles and address references the later stages consume.

use crate::types::{Amount, Category, NetworkName, Record, Subject};
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one unit of work
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryOutcome {
    Data(Vec<Record>),
    Error(String),
}

pub type CategoryMap = BTreeMap<Category, CategoryOutcome>;

/// A network either failed its prerequisites or holds per-subject results
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkEntry {
    Error(String),
    Results(BTreeMap<Subject, CategoryMap>),
}

/// Unique key of one unit's write
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub network: NetworkName,
    pub subject: Subject,
    pub category: Category,
}

/// Points at one Amount inside the store (the amount-network reference)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountHandle {
    pub slot: SlotKey,
    pub index: usize,
}

/// (network, address) collected for the secondary name lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressRef {
    pub network: NetworkName,
    pub address: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregationStore {
    networks: BTreeMap<NetworkName, NetworkEntry>,
}

impl AggregationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a prerequisite failure; no units run for this network
    pub fn fail_network(&mut self, network: NetworkName, reason: impl Into<String>) {
        self.networks.insert(network, NetworkEntry::Error(reason.into()));
    }

    /// Make a network ready to receive unit writes
    pub fn open_network(&mut self, network: NetworkName) {
        self.networks
            .entry(network)
            .or_insert_with(|| NetworkEntry::Results(BTreeMap::new()));
    }

    /// Write one unit's outcome
    ///
    /// # Panics
    /// If the network was never opened or the slot was already written. Both
    /// mean the task plan is inconsistent with the prerequisite set.
    pub fn insert(&mut self, slot: &SlotKey, outcome: CategoryOutcome) {
        let subjects = match self.networks.get_mut(&slot.network) {
            Some(NetworkEntry::Results(subjects)) => subjects,
            _ => panic!("slot {:?} targets a network outside the prerequisite set", slot),
        };
        let categories = subjects.entry(slot.subject.clone()).or_default();
        if categories.insert(slot.category, outcome).is_some() {
            panic!("slot {:?} written twice", slot);
        }
    }

    pub fn network(&self, network: &NetworkName) -> Option<&NetworkEntry> {
        self.networks.get(network)
    }

    pub fn get(&self, network: &NetworkName, subject: &Subject, category: Category) -> Option<&CategoryOutcome> {
        match self.networks.get(network)? {
            NetworkEntry::Results(subjects) => subjects.get(subject)?.get(&category),
            NetworkEntry::Error(_) => None,
        }
    }

    /// Records of a successful slot, empty when missing or failed
    pub fn records(&self, network: &NetworkName, subject: &Subject, category: Category) -> &[Record] {
        match self.get(network, subject, category) {
            Some(CategoryOutcome::Data(records)) => records,
            _ => &[],
        }
    }

    pub fn amount_mut(&mut self, handle: &AmountHandle) -> Option<&mut Amount> {
        let slot = &handle.slot;
        match self.networks.get_mut(&slot.network)? {
            NetworkEntry::Results(subjects) => match subjects.get_mut(&slot.subject)?.get_mut(&slot.category)? {
                CategoryOutcome::Data(records) => records.get_mut(handle.index)?.amount_mut(),
                CategoryOutcome::Error(_) => None,
            },
            NetworkEntry::Error(_) => None,
        }
    }

    /// Every successful record list with its network and category
    pub fn data_mut(&mut self) -> impl Iterator<Item = (&NetworkName, Category, &mut Vec<Record>)> + '_ {
        self.networks
            .iter_mut()
            .filter_map(|(network, entry)| match entry {
                NetworkEntry::Results(subjects) => Some((&*network, subjects)),
                NetworkEntry::Error(_) => None,
            })
            .flat_map(|(network, subjects)| {
                subjects.values_mut().flat_map(move |categories| {
                    categories.iter_mut().filter_map(move |(category, outcome)| match outcome {
                        CategoryOutcome::Data(records) => Some((network, *category, records)),
                        CategoryOutcome::Error(_) => None,
                    })
                })
            })
    }

    pub fn networks(&self) -> impl Iterator<Item = (&NetworkName, &NetworkEntry)> {
        self.networks.iter()
    }

    /// Unit counts, for "N of M succeeded" rendering
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for entry in self.networks.values() {
            match entry {
                NetworkEntry::Error(_) => summary.failed_networks += 1,
                NetworkEntry::Results(subjects) => {
                    for outcome in subjects.values().flat_map(|c| c.values()) {
                        match outcome {
                            CategoryOutcome::Data(_) => summary.succeeded += 1,
                            CategoryOutcome::Error(_) => summary.failed += 1,
                        }
                    }
                }
            }
        }
        summary
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub succeeded: usize,
    pub failed: usize,
    pub failed_networks: usize,
}

/// Everything the primary fan-out produces, guarded by one lock
#[derive(Debug, Default)]
pub struct Collector {
    pub store: AggregationStore,
    pub amounts: Vec<AmountHandle>,
    pub addresses: Vec<AddressRef>,
}

impl Collector {
    pub fn new(store: AggregationStore) -> Self {
        Self {
            store,
            amounts: Vec::new(),
            addresses: Vec::new(),
        }
    }

    /// Store a unit's outcome and index its amounts and validator addresses
    pub fn record(&mut self, slot: SlotKey, outcome: Result<Vec<Record>, String>) {
        let outcome = match outcome {
            Ok(records) => {
                for (index, record) in records.iter().enumerate() {
                    if record.amount().is_some() {
                        self.amounts.push(AmountHandle {
                            slot: slot.clone(),
                            index,
                        });
                    }
                    for validator in record.validators() {
                        self.addresses.push(AddressRef {
                            network: slot.network.clone(),
                            address: validator.address.clone(),
                        });
                    }
                }
                CategoryOutcome::Data(records)
            }
            Err(message) => CategoryOutcome::Error(message),
        };
        self.store.insert(&slot, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidatorRef;

    fn hub() -> NetworkName {
        NetworkName::parse("cosmoshub").unwrap()
    }

    fn slot(category: Category) -> SlotKey {
        SlotKey {
            network: hub(),
            subject: Subject::Account("cosmos1abc".to_string()),
            category,
        }
    }

    #[test]
    fn test_collector_indexes_amounts_and_addresses() {
        let mut store = AggregationStore::new();
        store.open_network(hub());
        let mut collector = Collector::new(store);

        collector.record(
            slot(Category::Delegation),
            Ok(vec![
                Record::Delegation {
                    validator: ValidatorRef::new("valoper1"),
                    amount: Amount::new(10.0, "uatom"),
                },
                Record::Delegation {
                    validator: ValidatorRef::new("valoper2"),
                    amount: Amount::new(20.0, "uatom"),
                },
            ]),
        );
        collector.record(slot(Category::Balance), Err("timeout".to_string()));

        assert_eq!(collector.amounts.len(), 2);
        assert_eq!(collector.amounts[1].index, 1);
        assert_eq!(collector.addresses.len(), 2);

        let handle = collector.amounts[1].clone();
        let amount = collector.store.amount_mut(&handle).unwrap();
        assert_eq!(amount.raw_amount, 20.0);

        assert_eq!(
            collector.store.summary(),
            Summary {
                succeeded: 1,
                failed: 1,
                failed_networks: 0
            }
        );
    }

    #[test]
    #[should_panic(expected = "written twice")]
    fn test_slot_written_once() {
        let mut store = AggregationStore::new();
        store.open_network(hub());
        store.insert(&slot(Category::Balance), CategoryOutcome::Data(vec![]));
        store.insert(&slot(Category::Balance), CategoryOutcome::Data(vec![]));
    }

    #[test]
    #[should_panic(expected = "outside the prerequisite set")]
    fn test_write_to_unknown_network_is_a_defect() {
        let mut store = AggregationStore::new();
        store.insert(&slot(Category::Balance), CategoryOutcome::Data(vec![]));
    }

    #[test]
    fn test_failed_network_serializes_as_error() {
        let mut store = AggregationStore::new();
        store.fail_network(hub(), "unknown network");
        assert_eq!(store.summary().failed_networks, 1);
        assert!(store.get(&hub(), &Subject::Network, Category::Supply).is_none());

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json["cosmoshub"]["error"], "unknown network");
    }

    #[test]
    fn test_data_mut_skips_errors() {
        let mut store = AggregationStore::new();
        store.open_network(hub());
        store.insert(
            &slot(Category::Balance),
            CategoryOutcome::Data(vec![Record::Balance {
                amount: Amount::new(1.0, "uatom"),
            }]),
        );
        store.insert(&slot(Category::Unbonding), CategoryOutcome::Error("boom".to_string()));

        let visited: Vec<Category> = store.data_mut().map(|(_, category, _)| category).collect();
        assert_eq!(visited, vec![Category::Balance]);
    }
}
