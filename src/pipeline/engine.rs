//! Aggregation engine - orchestration of one request
//!
//! ```text
//! Init ──(metadata load fails)──► Failed
//!   │
//!   ▼
//! FanOutPrimary → JoinPrimary → ResolveDenoms → ResolvePrices
//!   → EnrichAndFilter → FanOutSecondary → JoinSecondary → Done
//! ```
//!
//! Only `Init` can fail the request. Once fan-out starts every failure is
//! data inside the returned store.

use super::denoms::{distinct_denoms, resolve_denoms, DenomStore};
use super::directory::{load_prerequisites, ChainDirectory, Prerequisites};
use super::enrich::{enrich, filter};
use super::names::{account_links, apply_names, resolve_names, AccountLinks};
use super::prices::{resolve_prices, PriceFeed};
use super::scheduler::{account_tasks, fan_out, network_tasks, QueryTask};
use super::store::{AggregationStore, Collector, Summary};
use crate::errors::AggregateError;
use crate::query::{ClientCache, ClientFactory, TelemetrySink};
use crate::types::{AccountTarget, ChainInfo, NetworkName};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    FanOutPrimary,
    JoinPrimary,
    ResolveDenoms,
    ResolvePrices,
    EnrichAndFilter,
    FanOutSecondary,
    JoinSecondary,
    Done,
    Failed,
}

/// Fully enriched, filtered result of one entry point
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResponse {
    pub networks: AggregationStore,
    /// Explorer page per queried account
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub account_links: AccountLinks,
    pub summary: Summary,
}

struct StageTracker {
    stage: Stage,
    started: Instant,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: Stage::Init,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: Stage) {
        log::debug!(
            "stage {:?} → {:?} (+{}ms)",
            self.stage,
            next,
            self.started.elapsed().as_millis()
        );
        self.stage = next;
    }
}

/// Entry points for the front end
///
/// Holds the collaborators; every call builds its own request-scoped store.
pub struct Aggregator {
    directory: Arc<dyn ChainDirectory>,
    denoms: Arc<dyn DenomStore>,
    prices: Arc<dyn PriceFeed>,
    clients: Arc<ClientCache>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Aggregator {
    pub fn new(
        directory: Arc<dyn ChainDirectory>,
        denoms: Arc<dyn DenomStore>,
        prices: Arc<dyn PriceFeed>,
        clients: Arc<dyn ClientFactory>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            directory,
            denoms,
            prices,
            clients: Arc::new(ClientCache::new(clients)),
            telemetry,
        }
    }

    /// Balances, rewards, commission, delegations, redelegations and
    /// unbondings for every account
    pub async fn aggregate_balances(&self, accounts: Vec<AccountTarget>) -> Result<AggregateResponse, AggregateError> {
        let by_network = group_accounts(accounts);
        let requested: BTreeSet<NetworkName> = by_network.keys().cloned().collect();

        log::info!(
            "📊 Aggregating {} accounts on {} networks",
            by_network.values().map(Vec::len).sum::<usize>(),
            by_network.len()
        );

        self.run(&requested, |chain| {
            by_network
                .get(&chain.name)
                .into_iter()
                .flatten()
                .flat_map(|account| account_tasks(chain, account))
                .collect()
        })
        .await
    }

    /// Same as `aggregate_balances` for every account linked to a user
    pub async fn aggregate_user_balances(&self, user_id: i64) -> Result<AggregateResponse, AggregateError> {
        let accounts = self
            .directory
            .linked_accounts(user_id)
            .await
            .map_err(|source| AggregateError::Accounts { user_id, source })?;

        if accounts.is_empty() {
            log::info!("User {} has no linked accounts", user_id);
        }
        self.aggregate_balances(accounts).await
    }

    /// Supply, community pool, staking params and inflation per network
    pub async fn aggregate_network_params(&self, networks: Vec<NetworkName>) -> Result<AggregateResponse, AggregateError> {
        let requested: BTreeSet<NetworkName> = networks.into_iter().collect();
        log::info!("📊 Aggregating parameters for {} networks", requested.len());
        self.run(&requested, network_tasks).await
    }

    async fn run<F>(&self, requested: &BTreeSet<NetworkName>, plan: F) -> Result<AggregateResponse, AggregateError>
    where
        F: Fn(&Arc<ChainInfo>) -> Vec<QueryTask>,
    {
        let mut tracker = StageTracker::new();

        let mut store = AggregationStore::new();
        let prerequisites = match load_prerequisites(self.directory.as_ref(), requested, &mut store).await {
            Ok(prerequisites) => prerequisites,
            Err(e) => {
                tracker.advance(Stage::Failed);
                log::error!("❌ Cannot load network metadata: {}", e);
                return Err(AggregateError::Prerequisites(e));
            }
        };

        tracker.advance(Stage::FanOutPrimary);
        let tasks = plan_tasks(&prerequisites, plan);
        let collector = Arc::new(Mutex::new(Collector::new(store)));
        fan_out(tasks, self.clients.clone(), self.telemetry.clone(), collector.clone()).await;

        tracker.advance(Stage::JoinPrimary);
        let Collector {
            mut store,
            amounts,
            addresses,
        } = std::mem::take(&mut *collector.lock().await);

        tracker.advance(Stage::ResolveDenoms);
        let denom_keys = distinct_denoms(&store, &amounts);
        let denoms = resolve_denoms(self.denoms.as_ref(), &denom_keys).await;

        tracker.advance(Stage::ResolvePrices);
        let prices = resolve_prices(self.prices.as_ref(), &denoms).await;

        tracker.advance(Stage::EnrichAndFilter);
        let enriched = enrich(&mut store, &amounts, &denoms, &prices);
        let removed = filter(&mut store, &denoms);
        log::debug!(
            "Enriched {}/{} amounts, filtered out {}",
            enriched,
            amounts.len(),
            removed
        );

        tracker.advance(Stage::FanOutSecondary);
        let names = resolve_names(
            &addresses,
            &prerequisites.chains,
            self.clients.clone(),
            self.telemetry.clone(),
        )
        .await;

        tracker.advance(Stage::JoinSecondary);
        apply_names(&mut store, &names, &prerequisites.explorers);
        let account_links = account_links(&store, &prerequisites.explorers);

        tracker.advance(Stage::Done);
        let summary = store.summary();
        log::info!(
            "✅ {} of {} queries succeeded ({} networks skipped) in {}ms",
            summary.succeeded,
            summary.succeeded + summary.failed,
            summary.failed_networks,
            tracker.started.elapsed().as_millis()
        );

        Ok(AggregateResponse {
            networks: store,
            account_links,
            summary,
        })
    }
}

/// One target per (network, address); slots are keyed by address alone.
/// Operator addresses merge, the first one given wins.
fn group_accounts(accounts: Vec<AccountTarget>) -> BTreeMap<NetworkName, Vec<AccountTarget>> {
    let mut merged: BTreeMap<(NetworkName, String), Option<String>> = BTreeMap::new();
    for account in accounts {
        let operator = merged.entry((account.network, account.address)).or_default();
        if operator.is_none() {
            *operator = account.operator_address;
        }
    }

    let mut by_network: BTreeMap<NetworkName, Vec<AccountTarget>> = BTreeMap::new();
    for ((network, address), operator_address) in merged {
        by_network.entry(network.clone()).or_default().push(AccountTarget {
            network,
            address,
            operator_address,
        });
    }
    by_network
}

/// Ready networks in name order, so task launch order is deterministic
fn plan_tasks<F>(prerequisites: &Prerequisites, plan: F) -> Vec<QueryTask>
where
    F: Fn(&Arc<ChainInfo>) -> Vec<QueryTask>,
{
    let mut chains: Vec<&Arc<ChainInfo>> = prerequisites.chains.values().collect();
    chains.sort_by(|a, b| a.name.cmp(&b.name));
    chains.into_iter().flat_map(|chain| plan(chain)).collect()
}
