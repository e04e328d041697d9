//! LCD response parsing: JSON payload → `Record`s for one category

use crate::errors::QueryError;
use crate::types::{Amount, Category, Record, StakingParams, ValidatorRef};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Coin {
    denom: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    balances: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
struct RewardsResponse {
    #[serde(default)]
    rewards: Vec<DelegatorReward>,
}

#[derive(Debug, Deserialize)]
struct DelegatorReward {
    validator_address: String,
    #[serde(default)]
    reward: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
struct CommissionResponse {
    commission: CommissionCoins,
}

#[derive(Debug, Deserialize)]
struct CommissionCoins {
    #[serde(default)]
    commission: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
struct DelegationsResponse {
    #[serde(default)]
    delegation_responses: Vec<DelegationResponse>,
}

#[derive(Debug, Deserialize)]
struct DelegationResponse {
    delegation: Delegation,
    balance: Coin,
}

#[derive(Debug, Deserialize)]
struct Delegation {
    validator_address: String,
}

#[derive(Debug, Deserialize)]
struct RedelegationsResponse {
    #[serde(default)]
    redelegation_responses: Vec<RedelegationResponse>,
}

#[derive(Debug, Deserialize)]
struct RedelegationResponse {
    redelegation: Redelegation,
    #[serde(default)]
    entries: Vec<RedelegationEntryResponse>,
}

#[derive(Debug, Deserialize)]
struct Redelegation {
    validator_src_address: String,
    validator_dst_address: String,
}

#[derive(Debug, Deserialize)]
struct RedelegationEntryResponse {
    redelegation_entry: RedelegationEntry,
    balance: String,
}

#[derive(Debug, Deserialize)]
struct RedelegationEntry {
    completion_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct UnbondingResponse {
    #[serde(default)]
    unbonding_responses: Vec<UnbondingDelegation>,
}

#[derive(Debug, Deserialize)]
struct UnbondingDelegation {
    validator_address: String,
    #[serde(default)]
    entries: Vec<UnbondingEntry>,
}

#[derive(Debug, Deserialize)]
struct UnbondingEntry {
    completion_time: DateTime<Utc>,
    balance: String,
}

#[derive(Debug, Deserialize)]
struct SupplyResponse {
    #[serde(default)]
    supply: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
struct CommunityPoolResponse {
    #[serde(default)]
    pool: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
struct StakingParamsResponse {
    params: LcdStakingParams,
}

// Integer params arrive as JSON numbers from most gateways.
#[derive(Debug, Deserialize)]
struct LcdStakingParams {
    unbonding_time: String,
    max_validators: u32,
    max_entries: u32,
    historical_entries: u32,
    bond_denom: String,
}

#[derive(Debug, Deserialize)]
struct InflationResponse {
    inflation: String,
}

#[derive(Debug, Deserialize)]
struct ValidatorResponse {
    validator: Validator,
}

#[derive(Debug, Deserialize)]
struct Validator {
    description: ValidatorDescription,
}

#[derive(Debug, Deserialize)]
struct ValidatorDescription {
    #[serde(default)]
    moniker: String,
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, QueryError> {
    Ok(serde_json::from_value(payload)?)
}

/// Parse an LCD decimal string ("1000", "12.500000000000000000")
fn parse_decimal(raw: &str) -> Result<f64, QueryError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| QueryError::Parse(format!("invalid decimal amount {:?}", raw)))
}

/// Non-zero amounts only; dust of exactly zero is never shown
fn coin_amounts(coins: Vec<Coin>) -> Result<Vec<Amount>, QueryError> {
    let mut amounts = Vec::with_capacity(coins.len());
    for coin in coins {
        let raw = parse_decimal(&coin.amount)?;
        if raw > 0.0 {
            amounts.push(Amount::new(raw, coin.denom));
        }
    }
    Ok(amounts)
}

/// Parse one category's payload
///
/// `bond_denom` denominates redelegation and unbonding entries, whose
/// balances are bare integers.
pub fn parse_records(
    category: Category,
    payload: Value,
    bond_denom: &str,
) -> Result<Vec<Record>, QueryError> {
    let records = match category {
        Category::Balance => {
            let response: BalancesResponse = decode(payload)?;
            coin_amounts(response.balances)?
                .into_iter()
                .map(|amount| Record::Balance { amount })
                .collect()
        }
        Category::StakingReward => {
            let response: RewardsResponse = decode(payload)?;
            let mut records = Vec::new();
            for reward in response.rewards {
                for amount in coin_amounts(reward.reward)? {
                    records.push(Record::Reward {
                        validator: ValidatorRef::new(reward.validator_address.clone()),
                        amount,
                    });
                }
            }
            records
        }
        Category::ValidatorCommission => {
            let response: CommissionResponse = decode(payload)?;
            coin_amounts(response.commission.commission)?
                .into_iter()
                .map(|amount| Record::Commission { amount })
                .collect()
        }
        Category::Delegation => {
            let response: DelegationsResponse = decode(payload)?;
            let mut records = Vec::new();
            for entry in response.delegation_responses {
                let raw = parse_decimal(&entry.balance.amount)?;
                if raw > 0.0 {
                    records.push(Record::Delegation {
                        validator: ValidatorRef::new(entry.delegation.validator_address),
                        amount: Amount::new(raw, entry.balance.denom),
                    });
                }
            }
            records
        }
        Category::Redelegation => {
            let response: RedelegationsResponse = decode(payload)?;
            let mut records = Vec::new();
            for redelegation in response.redelegation_responses {
                for entry in redelegation.entries {
                    let raw = parse_decimal(&entry.balance)?;
                    if raw > 0.0 {
                        records.push(Record::Redelegation {
                            source: ValidatorRef::new(
                                redelegation.redelegation.validator_src_address.clone(),
                            ),
                            destination: ValidatorRef::new(
                                redelegation.redelegation.validator_dst_address.clone(),
                            ),
                            amount: Amount::new(raw, bond_denom),
                            completion_time: entry.redelegation_entry.completion_time,
                        });
                    }
                }
            }
            records
        }
        Category::Unbonding => {
            let response: UnbondingResponse = decode(payload)?;
            let mut records = Vec::new();
            for unbonding in response.unbonding_responses {
                for entry in unbonding.entries {
                    let raw = parse_decimal(&entry.balance)?;
                    if raw > 0.0 {
                        records.push(Record::Unbonding {
                            validator: ValidatorRef::new(unbonding.validator_address.clone()),
                            amount: Amount::new(raw, bond_denom),
                            completion_time: entry.completion_time,
                        });
                    }
                }
            }
            records
        }
        Category::Supply => {
            let response: SupplyResponse = decode(payload)?;
            coin_amounts(response.supply)?
                .into_iter()
                .map(|amount| Record::Supply { amount })
                .collect()
        }
        Category::CommunityPool => {
            let response: CommunityPoolResponse = decode(payload)?;
            coin_amounts(response.pool)?
                .into_iter()
                .map(|amount| Record::CommunityPool { amount })
                .collect()
        }
        Category::StakingParams => {
            let response: StakingParamsResponse = decode(payload)?;
            let params = response.params;
            vec![Record::StakingParams(StakingParams {
                unbonding_time: params.unbonding_time,
                max_validators: params.max_validators,
                max_entries: params.max_entries,
                historical_entries: params.historical_entries,
                bond_denom: params.bond_denom,
            })]
        }
        Category::Inflation => {
            let response: InflationResponse = decode(payload)?;
            vec![Record::Inflation {
                rate: parse_decimal(&response.inflation)?,
            }]
        }
    };
    Ok(records)
}

/// Extract a validator's moniker; empty monikers are an error
pub fn parse_moniker(payload: Value) -> Result<String, QueryError> {
    let response: ValidatorResponse = decode(payload)?;
    let moniker = response.validator.description.moniker.trim().to_string();
    if moniker.is_empty() {
        return Err(QueryError::Parse("validator has no moniker".to_string()));
    }
    Ok(moniker)
}
