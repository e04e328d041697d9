//! Data model shared by the query client, the metadata store and the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid network name: {0:?}")]
pub struct InvalidNetworkName(pub String);

/// Validated network identifier
///
/// Lowercase ASCII letters, digits, `-` and `_`. Every map in the pipeline is
/// keyed by this type rather than a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkName(String);

impl NetworkName {
    pub fn parse(raw: &str) -> Result<Self, InvalidNetworkName> {
        let name = raw.trim().to_ascii_lowercase();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(InvalidNetworkName(raw.to_string()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NetworkName {
    type Error = InvalidNetworkName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NetworkName> for String {
    fn from(name: NetworkName) -> Self {
        name.0
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Second level of the aggregation store: whose data a slot holds
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    /// Network-wide data (supply, params)
    Network,
    Account(String),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Network => f.write_str("network"),
            Subject::Account(address) => f.write_str(address),
        }
    }
}

impl Subject {
    /// JSON key of network-wide data; `_` never appears in a bech32 address
    pub const NETWORK_KEY: &'static str = "_network";
}

// JSON map keys must be strings.
impl Serialize for Subject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Subject::Network => serializer.serialize_str(Self::NETWORK_KEY),
            Subject::Account(address) => serializer.serialize_str(address),
        }
    }
}

/// Fixed set of things fetched per account or per network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Balance,
    StakingReward,
    ValidatorCommission,
    Delegation,
    Redelegation,
    Unbonding,
    Supply,
    CommunityPool,
    StakingParams,
    Inflation,
}

/// How a category's records are pruned after enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPolicy {
    /// Drop every amount without a fiat price
    RequirePrice,
    /// Drop amounts whose denomination is flagged `ignored`; keep unpriced ones
    SkipIgnored,
    /// No amounts to filter
    Keep,
}

impl Category {
    pub const ACCOUNT: [Category; 6] = [
        Category::Balance,
        Category::StakingReward,
        Category::ValidatorCommission,
        Category::Delegation,
        Category::Redelegation,
        Category::Unbonding,
    ];

    pub const NETWORK: [Category; 4] = [
        Category::Supply,
        Category::CommunityPool,
        Category::StakingParams,
        Category::Inflation,
    ];

    pub fn filter_policy(self) -> FilterPolicy {
        match self {
            Category::Balance
            | Category::StakingReward
            | Category::ValidatorCommission
            | Category::Delegation
            | Category::Redelegation
            | Category::Unbonding => FilterPolicy::RequirePrice,
            Category::Supply | Category::CommunityPool => FilterPolicy::SkipIgnored,
            Category::StakingParams | Category::Inflation => FilterPolicy::Keep,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Balance => "balance",
            Category::StakingReward => "staking_reward",
            Category::ValidatorCommission => "validator_commission",
            Category::Delegation => "delegation",
            Category::Redelegation => "redelegation",
            Category::Unbonding => "unbonding",
            Category::Supply => "supply",
            Category::CommunityPool => "community_pool",
            Category::StakingParams => "staking_params",
            Category::Inflation => "inflation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A quantity of some denomination
///
/// `raw_amount` is what the chain returned and never changes. Enrichment
/// derives `value`, `denom`, `base_denom` and `price_usd` from it, so running
/// enrichment twice yields the same result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub raw_amount: f64,
    pub value: f64,
    pub denom: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_denom: Option<String>,
    pub price_usd: Option<f64>,
}

impl Amount {
    pub fn new(raw_amount: f64, denom: impl Into<String>) -> Self {
        Self {
            raw_amount,
            value: raw_amount,
            denom: denom.into(),
            base_denom: None,
            price_usd: None,
        }
    }

    /// On-chain denomination, whether or not the amount was renamed
    pub fn raw_denom(&self) -> &str {
        self.base_denom.as_deref().unwrap_or(&self.denom)
    }
}

/// Validator mentioned by a record; name and link are filled in later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorRef {
    pub address: String,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

impl ValidatorRef {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            explorer_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingParams {
    pub unbonding_time: String,
    pub max_validators: u32,
    pub max_entries: u32,
    pub historical_entries: u32,
    pub bond_denom: String,
}

/// One parsed result item; the variant is fixed by the slot's category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Balance {
        amount: Amount,
    },
    Reward {
        validator: ValidatorRef,
        amount: Amount,
    },
    Commission {
        amount: Amount,
    },
    Delegation {
        validator: ValidatorRef,
        amount: Amount,
    },
    Redelegation {
        source: ValidatorRef,
        destination: ValidatorRef,
        amount: Amount,
        completion_time: DateTime<Utc>,
    },
    Unbonding {
        validator: ValidatorRef,
        amount: Amount,
        completion_time: DateTime<Utc>,
    },
    Supply {
        amount: Amount,
    },
    CommunityPool {
        amount: Amount,
    },
    StakingParams(StakingParams),
    Inflation {
        rate: f64,
    },
}

impl Record {
    pub fn amount(&self) -> Option<&Amount> {
        match self {
            Record::Balance { amount }
            | Record::Reward { amount, .. }
            | Record::Commission { amount }
            | Record::Delegation { amount, .. }
            | Record::Redelegation { amount, .. }
            | Record::Unbonding { amount, .. }
            | Record::Supply { amount }
            | Record::CommunityPool { amount } => Some(amount),
            Record::StakingParams(_) | Record::Inflation { .. } => None,
        }
    }

    pub fn amount_mut(&mut self) -> Option<&mut Amount> {
        match self {
            Record::Balance { amount }
            | Record::Reward { amount, .. }
            | Record::Commission { amount }
            | Record::Delegation { amount, .. }
            | Record::Redelegation { amount, .. }
            | Record::Unbonding { amount, .. }
            | Record::Supply { amount }
            | Record::CommunityPool { amount } => Some(amount),
            Record::StakingParams(_) | Record::Inflation { .. } => None,
        }
    }

    pub fn validators(&self) -> Vec<&ValidatorRef> {
        match self {
            Record::Reward { validator, .. }
            | Record::Delegation { validator, .. }
            | Record::Unbonding { validator, .. } => vec![validator],
            Record::Redelegation {
                source,
                destination,
                ..
            } => vec![source, destination],
            _ => Vec::new(),
        }
    }

    pub fn validators_mut(&mut self) -> Vec<&mut ValidatorRef> {
        match self {
            Record::Reward { validator, .. }
            | Record::Delegation { validator, .. }
            | Record::Unbonding { validator, .. } => vec![validator],
            Record::Redelegation {
                source,
                destination,
                ..
            } => vec![source, destination],
            _ => Vec::new(),
        }
    }
}

/// Key of the denomination batch lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DenomKey {
    pub network: NetworkName,
    pub denom: String,
}

impl DenomKey {
    pub fn new(network: NetworkName, denom: impl Into<String>) -> Self {
        Self {
            network,
            denom: denom.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenomMetadata {
    pub display: String,
    pub exponent: u32,
    /// Never surfaced in supply-style results (dust, LP shares)
    pub ignored: bool,
    pub price_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainInfo {
    pub name: NetworkName,
    pub lcd_url: String,
    /// Denomination of redelegation and unbonding entries, which carry bare integers
    pub bond_denom: String,
}

/// Explorer link templates; `{}` is replaced by the address
#[derive(Debug, Clone, PartialEq)]
pub struct Explorer {
    pub account_url: String,
    pub validator_url: String,
}

impl Explorer {
    pub fn account_link(&self, address: &str) -> String {
        self.account_url.replace("{}", address)
    }

    pub fn validator_link(&self, address: &str) -> String {
        self.validator_url.replace("{}", address)
    }
}

/// Account whose per-category data is aggregated
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountTarget {
    pub network: NetworkName,
    pub address: String,
    /// Validator operator address, set only for accounts that run a validator
    pub operator_address: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountParseError {
    #[error("expected <network>:<address>[:<operator>], got {0:?}")]
    Format(String),
    #[error(transparent)]
    Network(#[from] InvalidNetworkName),
}

impl FromStr for AccountTarget {
    type Err = AccountParseError;

    /// Parses `network:address` or `network:address:operator`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let (network, address, operator) = match parts.as_slice() {
            [network, address] => (*network, *address, None),
            [network, address, operator] => (*network, *address, Some(*operator)),
            _ => return Err(AccountParseError::Format(s.to_string())),
        };
        if address.is_empty() || operator.is_some_and(str::is_empty) {
            return Err(AccountParseError::Format(s.to_string()));
        }
        Ok(Self {
            network: NetworkName::parse(network)?,
            address: address.to_string(),
            operator_address: operator.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_name_normalizes() {
        let name = NetworkName::parse(" Cosmoshub ").unwrap();
        assert_eq!(name.as_str(), "cosmoshub");
        assert!(NetworkName::parse("").is_err());
        assert!(NetworkName::parse("osmo sis").is_err());
        assert!(NetworkName::parse("juno/1").is_err());
    }

    #[test]
    fn test_account_target_parse() {
        let target: AccountTarget = "cosmoshub:cosmos1abc".parse().unwrap();
        assert_eq!(target.network.as_str(), "cosmoshub");
        assert_eq!(target.address, "cosmos1abc");
        assert_eq!(target.operator_address, None);

        let validator: AccountTarget = "cosmoshub:cosmos1abc:cosmosvaloper1abc".parse().unwrap();
        assert_eq!(
            validator.operator_address.as_deref(),
            Some("cosmosvaloper1abc")
        );

        assert!("cosmos1abc".parse::<AccountTarget>().is_err());
        assert!("cosmoshub:".parse::<AccountTarget>().is_err());
        assert!("a:b:c:d".parse::<AccountTarget>().is_err());
    }

    #[test]
    fn test_raw_denom_survives_rename() {
        let mut amount = Amount::new(1_000_000.0, "uatom");
        assert_eq!(amount.raw_denom(), "uatom");

        amount.base_denom = Some("uatom".to_string());
        amount.denom = "ATOM".to_string();
        assert_eq!(amount.raw_denom(), "uatom");
    }

    #[test]
    fn test_record_accessors() {
        let mut record = Record::Redelegation {
            source: ValidatorRef::new("valoper1src"),
            destination: ValidatorRef::new("valoper1dst"),
            amount: Amount::new(5.0, "uatom"),
            completion_time: Utc::now(),
        };
        assert_eq!(record.validators().len(), 2);
        assert_eq!(record.amount().map(|a| a.raw_amount), Some(5.0));

        for validator in record.validators_mut() {
            validator.name = Some("named".to_string());
        }
        assert!(record.validators().iter().all(|v| v.name.is_some()));

        assert!(Record::Inflation { rate: 0.1 }.amount().is_none());
    }

    #[test]
    fn test_subject_serializes_as_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(Subject::Account("cosmos1abc".to_string()), 1);
        map.insert(Subject::Network, 2);
        // An account literally named "network" must not collide with network data
        map.insert(Subject::Account("network".to_string()), 3);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"_network":2,"cosmos1abc":1,"network":3}"#);
    }

    #[test]
    fn test_filter_policies_per_category() {
        assert_eq!(Category::Balance.filter_policy(), FilterPolicy::RequirePrice);
        assert_eq!(Category::Supply.filter_policy(), FilterPolicy::SkipIgnored);
        assert_eq!(Category::CommunityPool.filter_policy(), FilterPolicy::SkipIgnored);
        assert_eq!(Category::Inflation.filter_policy(), FilterPolicy::Keep);
    }
}
