//! Chain-specific types: identities, persisted records and override blobs.

use alloy::primitives::{Address, U256};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::blockchain::error::ChainError;

const OPTIMISM_IDS: [u64; 2] = [10, 69];
const ARBITRUM_IDS: [u64; 2] = [42161, 421611];

/// Chain identity.
///
/// Backed by a 256-bit unsigned integer, which covers the `numeric(78,0)`
/// column the records are keyed by. Equality and hashing are by value, so two
/// identities never alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ChainId(pub U256);

impl ChainId {
    /// Returns the identity as a `u64` if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.0 > U256::from(u64::MAX) {
            return None;
        }
        Some(self.0.as_limbs()[0])
    }

    /// Optimism mainnet or testnet.
    pub fn is_optimism(&self) -> bool {
        is_optimism(self)
    }

    /// Arbitrum mainnet or testnet.
    pub fn is_arbitrum(&self) -> bool {
        is_arbitrum(self)
    }

    /// Rollup chains whose log-query block numbers differ from `block.number`.
    pub fn is_l2(&self) -> bool {
        is_l2(self)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(U256::from(id))
    }
}

impl From<U256> for ChainId {
    fn from(id: U256) -> Self {
        Self(id)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChainId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.starts_with('-') {
            return Err(format!("invalid chain id '{s}'"));
        }
        U256::from_str(trimmed)
            .map(Self)
            .map_err(|e| format!("invalid chain id '{s}': {e}"))
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ChainIdVisitor;

        impl de::Visitor<'_> for ChainIdVisitor {
            type Value = ChainId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or a decimal/hex string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ChainId, E> {
                Ok(ChainId::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ChainId, E> {
                u64::try_from(v)
                    .map(ChainId::from)
                    .map_err(|_| E::custom(format!("chain id must not be negative, got {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ChainId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ChainIdVisitor)
    }
}

/// Optimism mainnet (10) or Optimism Kovan (69).
pub fn is_optimism(id: &ChainId) -> bool {
    id.to_u64().is_some_and(|n| OPTIMISM_IDS.contains(&n))
}

/// Arbitrum One (42161) or Arbitrum Rinkeby (421611).
pub fn is_arbitrum(id: &ChainId) -> bool {
    id.to_u64().is_some_and(|n| ARBITRUM_IDS.contains(&n))
}

/// Any rollup family whose block numbers for log searching differ from the
/// value returned by `block.number`.
pub fn is_l2(id: &ChainId) -> bool {
    is_optimism(id) || is_arbitrum(id)
}

/// Amount of LINK in juels (10^-18 LINK).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Link(pub U256);

impl Link {
    /// Amount from a juels count that fits in 64 bits.
    pub const fn from_juels(juels: u64) -> Self {
        Self(U256::from_limbs([juels, 0, 0, 0]))
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} juels", self.0)
    }
}

impl Serialize for Link {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Link {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        decimal::deserialize(deserializer).map(Self)
    }
}

/// Gas estimator selected for a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GasEstimatorMode {
    /// Percentile of recent block prices.
    BlockHistory,
    /// Always the configured default price.
    FixedPrice,
    /// Rollup-specific pricing from the Optimism gas oracle.
    Optimism,
}

impl fmt::Display for GasEstimatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BlockHistory => "BlockHistory",
            Self::FixedPrice => "FixedPrice",
            Self::Optimism => "Optimism",
        };
        f.write_str(s)
    }
}

impl FromStr for GasEstimatorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BlockHistory" => Ok(Self::BlockHistory),
            "FixedPrice" => Ok(Self::FixedPrice),
            "Optimism" => Ok(Self::Optimism),
            other => Err(format!(
                "unknown gas estimator mode '{other}', expected one of BlockHistory, FixedPrice, Optimism"
            )),
        }
    }
}

/// Persisted per-chain override record.
///
/// Every field is nullable: `None` means "not overridden" and falls through
/// to the chain's default set, while `Some(0)` is a real override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainCfg {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_monitor_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_monitor_block_delay: Option<u16>,
    #[serde(with = "duration_opt", skip_serializing_if = "Option::is_none")]
    pub block_emission_idle_warning_threshold: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_history_estimator_batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_history_estimator_block_delay: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_history_estimator_block_history_size: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_history_estimator_transaction_percentile: Option<u16>,
    #[serde(with = "duration_opt", skip_serializing_if = "Option::is_none")]
    pub eth_tx_reaper_interval: Option<Duration>,
    #[serde(with = "duration_opt", skip_serializing_if = "Option::is_none")]
    pub eth_tx_reaper_threshold: Option<Duration>,
    #[serde(with = "duration_opt", skip_serializing_if = "Option::is_none")]
    pub eth_tx_resend_after_threshold: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finality_depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags_contract_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_bump_percent: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_bump_threshold: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_bump_tx_depth: Option<u16>,
    #[serde(with = "decimal_opt", skip_serializing_if = "Option::is_none")]
    pub gas_bump_wei: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_estimator_mode: Option<GasEstimatorMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit_default: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit_multiplier: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit_transfer: Option<u64>,
    #[serde(with = "decimal_opt", skip_serializing_if = "Option::is_none")]
    pub gas_price_default: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_tracker_history_depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_tracker_max_buffer_size: Option<u32>,
    #[serde(with = "duration_opt", skip_serializing_if = "Option::is_none")]
    pub head_tracker_sampling_interval: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_contract_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_backfill_batch_size: Option<u32>,
    #[serde(with = "decimal_opt", skip_serializing_if = "Option::is_none")]
    pub max_gas_price_wei: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_in_flight_transactions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_queued_transactions: Option<u64>,
    #[serde(with = "decimal_opt", skip_serializing_if = "Option::is_none")]
    pub min_gas_price_wei: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_incoming_confirmations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_required_outgoing_confirmations: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_contract_payment: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce_auto_sync: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_contract_confirmations: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_default_batch_size: Option<u32>,
}

/// Persisted chain record (`evm_chains` row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRecord {
    pub id: ChainId,
    #[serde(default)]
    pub cfg: ChainCfg,
    /// Unix seconds.
    #[serde(default)]
    pub created_at: u64,
    /// Unix seconds.
    #[serde(default)]
    pub updated_at: u64,
    /// Attached at load time from the node records; not part of the row.
    #[serde(skip)]
    pub nodes: Vec<NodeRecord>,
}

impl ChainRecord {
    /// A record with an empty override blob and no nodes.
    pub fn new(id: ChainId) -> Self {
        Self {
            id,
            cfg: ChainCfg::default(),
            created_at: 0,
            updated_at: 0,
            nodes: Vec::new(),
        }
    }
}

/// Persisted node record (`nodes` row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Unique, compared case-insensitively.
    pub name: String,
    pub chain_id: ChainId,
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub http_url: Option<String>,
    #[serde(default)]
    pub send_only: bool,
}

impl NodeRecord {
    /// Check the row constraints: non-empty name, well-formed URLs, and the
    /// primary/send-only shape.
    ///
    /// A send-only node must have an HTTP URL and no websocket URL; a primary
    /// node must have a websocket URL.
    pub fn validate(&self) -> Result<(), ChainError> {
        let invalid = |reason: String| ChainError::NodeInvalid {
            node: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("node name must not be empty".to_string()));
        }
        if let Some(ws) = &self.ws_url {
            check_url(ws, &["ws", "wss"]).map_err(invalid)?;
        }
        if let Some(http) = &self.http_url {
            check_url(http, &["http", "https"]).map_err(invalid)?;
        }

        if self.send_only {
            if self.http_url.is_none() || self.ws_url.is_some() {
                return Err(invalid(
                    "send-only nodes require an HTTP URL and no websocket URL".to_string(),
                ));
            }
        } else if self.ws_url.is_none() {
            return Err(invalid("primary nodes require a websocket URL".to_string()));
        }
        Ok(())
    }
}

fn check_url(raw: &str, schemes: &[&str]) -> Result<Url, String> {
    if raw.trim().is_empty() {
        return Err("URL must not be empty".to_string());
    }
    let url = Url::parse(raw).map_err(|e| format!("invalid URL '{raw}': {e}"))?;
    if !schemes.contains(&url.scheme()) {
        return Err(format!(
            "URL '{raw}' has scheme '{}', expected one of {}",
            url.scheme(),
            schemes.join("/")
        ));
    }
    Ok(url)
}

/// Decimal (or `0x` hex) big integers, serialised as decimal strings.
pub(crate) mod decimal {
    use alloy::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Str(String),
    }

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(U256::from(n)),
            Raw::Str(s) => U256::from_str(s.trim()).map_err(serde::de::Error::custom),
        }
    }
}

pub(crate) mod decimal_opt {
    use alloy::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<U256>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super::decimal")] U256);

        Option::<Wrapper>::deserialize(deserializer).map(|w| w.map(|Wrapper(v)| v))
    }
}

/// Durations written as strings such as `"1m30s"` or `"250ms"`.
pub(crate) mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    use crate::blockchain::env::{format_duration, parse_duration};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod duration_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    use crate::blockchain::env::format_duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&format_duration(*v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super::duration_str")] Duration);

        Option::<Wrapper>::deserialize(deserializer).map(|w| w.map(|Wrapper(v)| v))
    }
}
