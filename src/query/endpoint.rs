//! Cosmos SDK LCD endpoints used by the aggregator

use crate::types::{AccountTarget, Category};

/// Page size for list endpoints; one request per unit, so ask for everything
const PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Balances { address: String },
    DelegatorRewards { delegator: String },
    ValidatorCommission { validator: String },
    Delegations { delegator: String },
    Redelegations { delegator: String },
    UnbondingDelegations { delegator: String },
    Supply,
    CommunityPool,
    StakingParams,
    Inflation,
    Validator { address: String },
}

impl Endpoint {
    /// Endpoint serving an account category
    ///
    /// Returns `None` for validator commission when the account has no
    /// operator address.
    pub fn for_account(category: Category, account: &AccountTarget) -> Option<Self> {
        let address = account.address.clone();
        let endpoint = match category {
            Category::Balance => Endpoint::Balances { address },
            Category::StakingReward => Endpoint::DelegatorRewards { delegator: address },
            Category::ValidatorCommission => Endpoint::ValidatorCommission {
                validator: account.operator_address.clone()?,
            },
            Category::Delegation => Endpoint::Delegations { delegator: address },
            Category::Redelegation => Endpoint::Redelegations { delegator: address },
            Category::Unbonding => Endpoint::UnbondingDelegations { delegator: address },
            Category::Supply
            | Category::CommunityPool
            | Category::StakingParams
            | Category::Inflation => return None,
        };
        Some(endpoint)
    }

    /// Endpoint serving a network-wide category
    pub fn for_network(category: Category) -> Option<Self> {
        match category {
            Category::Supply => Some(Endpoint::Supply),
            Category::CommunityPool => Some(Endpoint::CommunityPool),
            Category::StakingParams => Some(Endpoint::StakingParams),
            Category::Inflation => Some(Endpoint::Inflation),
            _ => None,
        }
    }

    /// Path relative to the LCD base URL
    pub fn path(&self) -> String {
        match self {
            Endpoint::Balances { address } => format!(
                "/cosmos/bank/v1beta1/balances/{}?pagination.limit={}",
                address, PAGE_LIMIT
            ),
            Endpoint::DelegatorRewards { delegator } => {
                format!("/cosmos/distribution/v1beta1/delegators/{}/rewards", delegator)
            }
            Endpoint::ValidatorCommission { validator } => format!(
                "/cosmos/distribution/v1beta1/validators/{}/commission",
                validator
            ),
            Endpoint::Delegations { delegator } => format!(
                "/cosmos/staking/v1beta1/delegations/{}?pagination.limit={}",
                delegator, PAGE_LIMIT
            ),
            Endpoint::Redelegations { delegator } => format!(
                "/cosmos/staking/v1beta1/delegators/{}/redelegations?pagination.limit={}",
                delegator, PAGE_LIMIT
            ),
            Endpoint::UnbondingDelegations { delegator } => format!(
                "/cosmos/staking/v1beta1/delegators/{}/unbonding_delegations?pagination.limit={}",
                delegator, PAGE_LIMIT
            ),
            Endpoint::Supply => {
                format!("/cosmos/bank/v1beta1/supply?pagination.limit={}", PAGE_LIMIT)
            }
            Endpoint::CommunityPool => "/cosmos/distribution/v1beta1/community_pool".to_string(),
            Endpoint::StakingParams => "/cosmos/staking/v1beta1/params".to_string(),
            Endpoint::Inflation => "/cosmos/mint/v1beta1/inflation".to_string(),
            Endpoint::Validator { address } => {
                format!("/cosmos/staking/v1beta1/validators/{}", address)
            }
        }
    }

    /// Short label for telemetry
    pub fn label(&self) -> &'static str {
        match self {
            Endpoint::Balances { .. } => "balances",
            Endpoint::DelegatorRewards { .. } => "delegator_rewards",
            Endpoint::ValidatorCommission { .. } => "validator_commission",
            Endpoint::Delegations { .. } => "delegations",
            Endpoint::Redelegations { .. } => "redelegations",
            Endpoint::UnbondingDelegations { .. } => "unbonding_delegations",
            Endpoint::Supply => "supply",
            Endpoint::CommunityPool => "community_pool",
            Endpoint::StakingParams => "staking_params",
            Endpoint::Inflation => "inflation",
            Endpoint::Validator { .. } => "validator",
        }
    }
}
