//! Primary fan-out
//!
//! One tokio task per (network, subject, category) slot. Each task makes
//! exactly one remote call and writes exactly one outcome into the shared
//! `Collector`. The lock is taken only for that write.

use super::store::{Collector, SlotKey};
use crate::errors::QueryError;
use crate::query::parse::parse_records;
use crate::query::{ClientCache, Endpoint, TelemetrySink};
use crate::types::{AccountTarget, Category, ChainInfo, Record, Subject};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// One unit of primary fan-out work
#[derive(Debug, Clone)]
pub struct QueryTask {
    pub slot: SlotKey,
    pub endpoint: Endpoint,
    pub chain: Arc<ChainInfo>,
}

/// Tasks for every account category of one account
///
/// Validator commission is planned only when the account has an operator
/// address.
pub fn account_tasks(chain: &Arc<ChainInfo>, account: &AccountTarget) -> Vec<QueryTask> {
    Category::ACCOUNT
        .into_iter()
        .filter_map(|category| {
            let endpoint = Endpoint::for_account(category, account)?;
            Some(QueryTask {
                slot: SlotKey {
                    network: chain.name.clone(),
                    subject: Subject::Account(account.address.clone()),
                    category,
                },
                endpoint,
                chain: chain.clone(),
            })
        })
        .collect()
}

/// Tasks for every network-wide category of one chain
pub fn network_tasks(chain: &Arc<ChainInfo>) -> Vec<QueryTask> {
    Category::NETWORK
        .into_iter()
        .filter_map(|category| {
            Some(QueryTask {
                slot: SlotKey {
                    network: chain.name.clone(),
                    subject: Subject::Network,
                    category,
                },
                endpoint: Endpoint::for_network(category)?,
                chain: chain.clone(),
            })
        })
        .collect()
}

async fn execute(
    task: &QueryTask,
    clients: &ClientCache,
    telemetry: &dyn TelemetrySink,
) -> Result<Vec<Record>, QueryError> {
    let client = clients.get_or_connect(&task.chain).await?;
    let outcome = client.query(&task.endpoint).await;
    telemetry.record(&outcome.telemetry);
    parse_records(task.slot.category, outcome.result?, &task.chain.bond_denom)
}

async fn run_task(
    task: QueryTask,
    clients: Arc<ClientCache>,
    telemetry: Arc<dyn TelemetrySink>,
    collector: Arc<Mutex<Collector>>,
) {
    let outcome = execute(&task, &clients, telemetry.as_ref())
        .await
        .map_err(|e| {
            log::warn!(
                "⚠️  {} {} for {} failed: {}",
                task.slot.network,
                task.slot.category,
                task.slot.subject,
                e
            );
            e.to_string()
        });

    collector.lock().await.record(task.slot, outcome);
}

/// Launch every task and wait for all of them
pub async fn fan_out(
    tasks: Vec<QueryTask>,
    clients: Arc<ClientCache>,
    telemetry: Arc<dyn TelemetrySink>,
    collector: Arc<Mutex<Collector>>,
) {
    let mut units = JoinSet::new();
    for task in tasks {
        units.spawn(run_task(task, clients.clone(), telemetry.clone(), collector.clone()));
    }
    log::debug!("Launched {} query units", units.len());
    join_units(units).await;
}

/// Barrier join. A panicking unit is an invariant violation and is re-raised.
pub(crate) async fn join_units(mut units: JoinSet<()>) {
    while let Some(joined) = units.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                std::panic::resume_unwind(e.into_panic());
            }
            log::error!("❌ Query unit cancelled: {}", e);
        }
    }
}
