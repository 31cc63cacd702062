//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the chain
//! registry. All types derive Serde traits for deserialization from config
//! files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::blockchain::types::{duration_str, ChainCfg, ChainId, NodeRecord};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RegistryConfig {
    /// Process-wide settings shared by every chain.
    pub general: GeneralConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Periodic chain readiness/health reporting.
    pub health_check: HealthCheckConfig,

    /// Where chain and node records are persisted.
    pub store: StoreConfig,

    /// Chains to seed into the store at startup.
    pub chains: Vec<ChainEntry>,
}

/// Global configuration, the last-resort layer of parameter resolution.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Run without any chain. Overridden by `ETH_DISABLED`.
    pub ethereum_disabled: bool,

    /// Chain returned by `ChainRegistry::default`. Overridden by `ETH_CHAIN_ID`.
    pub default_chain_id: Option<ChainId>,

    /// Per-request timeout of the RPC client, in seconds.
    pub rpc_timeout_secs: u64,

    /// Off-chain reporting timing defaults.
    pub ocr: OcrConfig,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            ethereum_disabled: false,
            default_chain_id: None,
            rpc_timeout_secs: 10,
            ocr: OcrConfig::default(),
        }
    }
}

impl GeneralConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

/// OCR timing values with no per-chain meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OcrConfig {
    #[serde(with = "duration_str")]
    pub blockchain_timeout: Duration,

    #[serde(with = "duration_str")]
    pub contract_poll_interval: Duration,

    #[serde(with = "duration_str")]
    pub contract_subscribe_interval: Duration,

    #[serde(with = "duration_str")]
    pub contract_transmitter_transmit_timeout: Duration,

    #[serde(with = "duration_str")]
    pub database_timeout: Duration,

    #[serde(with = "duration_str")]
    pub observation_timeout: Duration,

    #[serde(with = "duration_str")]
    pub observation_grace_period: Duration,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            blockchain_timeout: Duration::from_secs(20),
            contract_poll_interval: Duration::from_secs(60),
            contract_subscribe_interval: Duration::from_secs(120),
            contract_transmitter_transmit_timeout: Duration::from_secs(10),
            database_timeout: Duration::from_secs(10),
            observation_timeout: Duration::from_secs(10),
            observation_grace_period: Duration::from_secs(1),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a filter directive.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the periodic health monitor.
    pub enabled: bool,

    /// Interval between checks, in seconds.
    pub interval_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 15,
        }
    }
}

/// Chain store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot file. In-memory only when unset.
    pub path: Option<PathBuf>,
}

/// A chain to seed into the store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainEntry {
    pub id: ChainId,

    /// Initial override record. Ignored when the store already knows the chain.
    #[serde(default)]
    pub cfg: ChainCfg,

    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
}

/// A node of a seeded chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeEntry {
    pub name: String,

    #[serde(default)]
    pub ws_url: Option<String>,

    #[serde(default)]
    pub http_url: Option<String>,

    #[serde(default)]
    pub send_only: bool,
}

impl NodeEntry {
    /// The store record for this node on `chain_id`.
    pub fn to_record(&self, chain_id: ChainId) -> NodeRecord {
        NodeRecord {
            name: self.name.clone(),
            chain_id,
            ws_url: self.ws_url.clone(),
            http_url: self.http_url.clone(),
            send_only: self.send_only,
        }
    }
}
