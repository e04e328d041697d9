//! Enrichment and filtering
//!
//! Local, single-threaded passes over the collected store: rescale and rename
//! every referenced amount, attach its fiat value, then prune records per the
//! category's filter policy.

use super::denoms::DenomTable;
use super::prices::PriceTable;
use super::store::{AggregationStore, AmountHandle};
use crate::types::{Amount, DenomKey, DenomMetadata, FilterPolicy, NetworkName, Record};

/// Apply metadata and price to one amount
///
/// Everything is derived from `raw_amount` and the raw denomination, so
/// applying twice gives the same amount.
fn apply(amount: &mut Amount, meta: Option<&DenomMetadata>, price: Option<f64>) {
    let Some(meta) = meta else {
        return;
    };

    let raw_denom = amount.raw_denom().to_string();
    amount.value = amount.raw_amount / 10f64.powi(meta.exponent as i32);
    amount.denom = meta.display.clone();
    amount.base_denom = Some(raw_denom);
    amount.price_usd = price.map(|price| amount.value * price);
}

/// Enrich every amount behind the handles; returns how many were rescaled
pub fn enrich(
    store: &mut AggregationStore,
    handles: &[AmountHandle],
    denoms: &DenomTable,
    prices: &PriceTable,
) -> usize {
    let mut enriched = 0;
    for handle in handles {
        let Some(amount) = store.amount_mut(handle) else {
            continue;
        };
        let key = DenomKey::new(handle.slot.network.clone(), amount.raw_denom());
        let meta = denoms.get(&key);
        if meta.is_some() {
            enriched += 1;
        }
        apply(amount, meta, prices.get(&key).copied());
    }
    enriched
}

fn is_ignored(network: &NetworkName, amount: &Amount, denoms: &DenomTable) -> bool {
    let key = DenomKey::new(network.clone(), amount.raw_denom());
    denoms.get(&key).is_some_and(|meta| meta.ignored)
}

fn keep(policy: FilterPolicy, network: &NetworkName, record: &Record, denoms: &DenomTable) -> bool {
    let Some(amount) = record.amount() else {
        return true;
    };
    match policy {
        FilterPolicy::RequirePrice => amount.price_usd.is_some(),
        FilterPolicy::SkipIgnored => !is_ignored(network, amount, denoms),
        FilterPolicy::Keep => true,
    }
}

/// Prune records per category policy; returns how many were removed
///
/// Must run after `enrich`: removal shifts the indices handles point at.
pub fn filter(store: &mut AggregationStore, denoms: &DenomTable) -> usize {
    let mut removed = 0;
    for (network, category, records) in store.data_mut() {
        let policy = category.filter_policy();
        let before = records.len();
        records.retain(|record| keep(policy, network, record, denoms));
        removed += before - records.len();
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::store::{Collector, SlotKey};
    use crate::types::{Category, Subject, ValidatorRef};

    fn hub() -> NetworkName {
        NetworkName::parse("cosmoshub").unwrap()
    }

    fn account() -> Subject {
        Subject::Account("cosmos1abc".to_string())
    }

    fn meta(display: &str, exponent: u32, ignored: bool) -> DenomMetadata {
        DenomMetadata {
            display: display.to_string(),
            exponent,
            ignored,
            price_id: Some(display.to_lowercase()),
        }
    }

    fn collect(records: Vec<(Subject, Category, Vec<Record>)>) -> Collector {
        let mut store = AggregationStore::new();
        store.open_network(hub());
        let mut collector = Collector::new(store);
        for (subject, category, records) in records {
            collector.record(
                SlotKey {
                    network: hub(),
                    subject,
                    category,
                },
                Ok(records),
            );
        }
        collector
    }

    fn balance(raw: f64, denom: &str) -> Record {
        Record::Balance {
            amount: Amount::new(raw, denom),
        }
    }

    #[test]
    fn test_rescale_rename_and_price() {
        let mut collector = collect(vec![(account(), Category::Balance, vec![balance(2_500_000.0, "uatom")])]);
        let denoms = DenomTable::from([(DenomKey::new(hub(), "uatom"), meta("ATOM", 6, false))]);
        let prices = PriceTable::from([(DenomKey::new(hub(), "uatom"), 0.5)]);

        let enriched = enrich(&mut collector.store, &collector.amounts, &denoms, &prices);
        assert_eq!(enriched, 1);

        let amount = collector.store.records(&hub(), &account(), Category::Balance)[0]
            .amount()
            .unwrap()
            .clone();
        assert_eq!(amount.value, 2.5);
        assert_eq!(amount.denom, "ATOM");
        assert_eq!(amount.base_denom.as_deref(), Some("uatom"));
        assert_eq!(amount.price_usd, Some(2_500_000.0 / 1e6 * 0.5));
    }

    #[test]
    fn test_enrich_is_idempotent() {
        let mut collector = collect(vec![(
            account(),
            Category::Delegation,
            vec![Record::Delegation {
                validator: ValidatorRef::new("valoper1"),
                amount: Amount::new(1_000_000.0, "uatom"),
            }],
        )]);
        let denoms = DenomTable::from([(DenomKey::new(hub(), "uatom"), meta("ATOM", 6, false))]);
        let prices = PriceTable::from([(DenomKey::new(hub(), "uatom"), 10.0)]);

        enrich(&mut collector.store, &collector.amounts, &denoms, &prices);
        let once = collector.store.clone();
        enrich(&mut collector.store, &collector.amounts, &denoms, &prices);
        assert_eq!(collector.store, once);
    }

    #[test]
    fn test_unknown_denom_left_untouched() {
        let mut collector = collect(vec![(account(), Category::Balance, vec![balance(42.0, "ibc/XYZ")])]);
        let enriched = enrich(&mut collector.store, &collector.amounts, &DenomTable::new(), &PriceTable::new());
        assert_eq!(enriched, 0);

        let record = &collector.store.records(&hub(), &account(), Category::Balance)[0];
        assert_eq!(record, &balance(42.0, "ibc/XYZ"));
    }

    #[test]
    fn test_balance_filter_requires_price() {
        let mut collector = collect(vec![(
            account(),
            Category::Balance,
            vec![balance(1_000_000.0, "uatom"), balance(5.0, "ibc/NOPRICE")],
        )]);
        let denoms = DenomTable::from([
            (DenomKey::new(hub(), "uatom"), meta("ATOM", 6, false)),
            (DenomKey::new(hub(), "ibc/NOPRICE"), meta("NOP", 6, false)),
        ]);
        let prices = PriceTable::from([(DenomKey::new(hub(), "uatom"), 10.0)]);

        enrich(&mut collector.store, &collector.amounts, &denoms, &prices);
        let removed = filter(&mut collector.store, &denoms);

        assert_eq!(removed, 1);
        let records = collector.store.records(&hub(), &account(), Category::Balance);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount().unwrap().denom, "ATOM");
    }

    #[test]
    fn test_supply_filter_drops_ignored_even_when_priced() {
        let mut collector = collect(vec![(
            Subject::Network,
            Category::Supply,
            vec![
                Record::Supply {
                    amount: Amount::new(1e12, "uatom"),
                },
                Record::Supply {
                    amount: Amount::new(3.0, "gamm/pool/1"),
                },
                Record::Supply {
                    amount: Amount::new(7.0, "ibc/UNPRICED"),
                },
            ],
        )]);
        let denoms = DenomTable::from([
            (DenomKey::new(hub(), "uatom"), meta("ATOM", 6, false)),
            (DenomKey::new(hub(), "gamm/pool/1"), meta("GAMM-1", 18, true)),
        ]);
        let prices = PriceTable::from([
            (DenomKey::new(hub(), "uatom"), 10.0),
            (DenomKey::new(hub(), "gamm/pool/1"), 1.0),
        ]);

        enrich(&mut collector.store, &collector.amounts, &denoms, &prices);
        filter(&mut collector.store, &denoms);

        let denoms: Vec<String> = collector
            .store
            .records(&hub(), &Subject::Network, Category::Supply)
            .iter()
            .map(|r| r.amount().unwrap().denom.clone())
            .collect();
        assert_eq!(denoms, vec!["ATOM".to_string(), "ibc/UNPRICED".to_string()]);
    }

    #[test]
    fn test_non_amount_records_survive_filter() {
        let mut collector = collect(vec![(Subject::Network, Category::Inflation, vec![Record::Inflation { rate: 0.07 }])]);
        assert_eq!(filter(&mut collector.store, &DenomTable::new()), 0);
        assert_eq!(
            collector.store.records(&hub(), &Subject::Network, Category::Inflation).len(),
            1
        );
    }
}
