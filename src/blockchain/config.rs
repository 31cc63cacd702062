//! Chain-scoped parameter resolution.
//!
//! # Responsibilities
//! - Resolve every per-chain parameter through a fixed precedence
//! - Guard the runtime-settable default gas price
//! - Validate cross-parameter invariants, reporting all of them at once
//!
//! # Precedence
//! ```text
//! ethereum_disabled short-circuit (estimator mode, balance monitor only)
//!     → environment override (malformed values are logged and skipped)
//!     → persisted override record (None = unset, Some(0) = zero)
//!     → default set for the chain id (or the fallback set)
//!     → general config (OCR timing values only)
//! ```
//!
//! # Design Decisions
//! - The resolver composes its sources explicitly; nothing is inherited
//! - Values are resolved on every call so environment changes and runtime
//!   writes are always visible
//! - The persisted record sits behind a `RwLock`; a writer holds it across
//!   the store write so readers never observe an unpersisted value

use alloy::primitives::{Address, U256};
use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::blockchain::defaults::ChainDefaults;
use crate::blockchain::env::{self, EnvSource, EnvValue};
use crate::blockchain::error::{ChainError, Violation};
use crate::blockchain::ocr::OcrLocalConfig;
use crate::blockchain::store::ChainStore;
use crate::blockchain::types::{decimal, duration_str, ChainCfg, ChainId, GasEstimatorMode, Link};
use crate::config::GeneralConfig;
use crate::observability::metrics;

/// Minimum fee increase, in percent, that execution clients accept for a
/// replacement transaction.
pub const MIN_REPLACEMENT_BUMP_PERCENT: u16 = 10;

/// Generates a resolver method for a parameter that follows the plain
/// env → persisted → default chain.
macro_rules! chain_param {
    ($( $(#[$doc:meta])* $name:ident: $ty:ty = $key:literal; )*) => {
        $(
            $(#[$doc])*
            pub fn $name(&self) -> $ty {
                self.resolve($key, |cfg| cfg.$name, self.defaults.$name)
            }
        )*
    };
}

/// Per-chain view over every configuration source.
pub struct ChainScopedConfig {
    id: ChainId,
    general: Arc<GeneralConfig>,
    env: Arc<dyn EnvSource>,
    store: Arc<dyn ChainStore>,
    persisted: RwLock<ChainCfg>,
    defaults: &'static ChainDefaults,
}

impl ChainScopedConfig {
    /// Build the resolver for chain `id` with its persisted override record.
    ///
    /// Selecting the fallback default set is logged here, once.
    pub fn new(
        id: ChainId,
        persisted: ChainCfg,
        general: Arc<GeneralConfig>,
        env: Arc<dyn EnvSource>,
        store: Arc<dyn ChainStore>,
    ) -> Self {
        Self {
            defaults: ChainDefaults::for_chain(&id),
            id,
            general,
            env,
            store,
            persisted: RwLock::new(persisted),
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.id
    }

    pub fn general(&self) -> &GeneralConfig {
        &self.general
    }

    /// The default set selected for this chain.
    pub fn defaults(&self) -> &'static ChainDefaults {
        self.defaults
    }

    /// A copy of the current persisted override record.
    pub fn persisted_cfg(&self) -> ChainCfg {
        self.read_cfg().clone()
    }

    fn read_cfg(&self) -> RwLockReadGuard<'_, ChainCfg> {
        self.persisted.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_cfg(&self) -> RwLockWriteGuard<'_, ChainCfg> {
        self.persisted.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lookup<T: EnvValue>(&self, key: &str, persisted: impl FnOnce(&ChainCfg) -> Option<T>) -> Option<T> {
        env::lookup(self.env.as_ref(), key).or_else(|| persisted(&self.read_cfg()))
    }

    fn resolve<T: EnvValue>(&self, key: &str, persisted: impl FnOnce(&ChainCfg) -> Option<T>, default: T) -> T {
        self.lookup(key, persisted).unwrap_or(default)
    }

    fn global<T: EnvValue>(&self, key: &str, fallback: T) -> T {
        env::lookup(self.env.as_ref(), key).unwrap_or(fallback)
    }

    chain_param! {
        /// Blocks the balance monitor trails behind head.
        balance_monitor_block_delay: u16 = "ETH_BALANCE_MONITOR_BLOCK_DELAY";
        /// How long without a new head before a warning is logged.
        block_emission_idle_warning_threshold: Duration = "BLOCK_EMISSION_IDLE_WARNING_THRESHOLD";
        block_history_estimator_block_delay: u16 = "BLOCK_HISTORY_ESTIMATOR_BLOCK_DELAY";
        block_history_estimator_block_history_size: u16 = "BLOCK_HISTORY_ESTIMATOR_BLOCK_HISTORY_SIZE";
        /// Percentile of recent transaction prices used as the estimate.
        block_history_estimator_transaction_percentile: u16 = "BLOCK_HISTORY_ESTIMATOR_TRANSACTION_PERCENTILE";
        eth_tx_reaper_interval: Duration = "ETH_TX_REAPER_INTERVAL";
        /// Age after which confirmed transactions are reaped.
        eth_tx_reaper_threshold: Duration = "ETH_TX_REAPER_THRESHOLD";
        eth_tx_resend_after_threshold: Duration = "ETH_TX_RESEND_AFTER_THRESHOLD";
        /// Confirmations after which a block is treated as final.
        finality_depth: u32 = "ETH_FINALITY_DEPTH";
        gas_bump_percent: u16 = "ETH_GAS_BUMP_PERCENT";
        /// Blocks to wait before bumping again. 0 disables bumping.
        gas_bump_threshold: u64 = "ETH_GAS_BUMP_THRESHOLD";
        gas_bump_tx_depth: u16 = "ETH_GAS_BUMP_TX_DEPTH";
        gas_bump_wei: U256 = "ETH_GAS_BUMP_WEI";
        gas_limit_default: u64 = "ETH_GAS_LIMIT_DEFAULT";
        gas_limit_multiplier: f32 = "ETH_GAS_LIMIT_MULTIPLIER";
        gas_limit_transfer: u64 = "ETH_GAS_LIMIT_TRANSFER";
        /// Current default gas price. Settable at runtime through
        /// [`ChainScopedConfig::set_gas_price_default`].
        gas_price_default: U256 = "ETH_GAS_PRICE_DEFAULT";
        head_tracker_history_depth: u32 = "ETH_HEAD_TRACKER_HISTORY_DEPTH";
        head_tracker_max_buffer_size: u32 = "ETH_HEAD_TRACKER_MAX_BUFFER_SIZE";
        head_tracker_sampling_interval: Duration = "ETH_HEAD_TRACKER_SAMPLING_INTERVAL";
        log_backfill_batch_size: u32 = "ETH_LOG_BACKFILL_BATCH_SIZE";
        max_gas_price_wei: U256 = "ETH_MAX_GAS_PRICE_WEI";
        /// Broadcast but unconfirmed transactions allowed at once. 0 disables the limit.
        max_in_flight_transactions: u32 = "ETH_MAX_IN_FLIGHT_TRANSACTIONS";
        max_queued_transactions: u64 = "ETH_MAX_QUEUED_TRANSACTIONS";
        min_gas_price_wei: U256 = "ETH_MIN_GAS_PRICE_WEI";
        min_incoming_confirmations: u32 = "MIN_INCOMING_CONFIRMATIONS";
        min_required_outgoing_confirmations: u64 = "MIN_REQUIRED_OUTGOING_CONFIRMATIONS";
        minimum_contract_payment: Link = "MINIMUM_CONTRACT_PAYMENT_LINK_JUELS";
        nonce_auto_sync: bool = "ETH_NONCE_AUTO_SYNC";
        rpc_default_batch_size: u32 = "ETH_RPC_DEFAULT_BATCH_SIZE";
    }

    pub fn balance_monitor_enabled(&self) -> bool {
        if self.general.ethereum_disabled {
            return false;
        }
        self.resolve(
            "BALANCE_MONITOR_ENABLED",
            |cfg| cfg.balance_monitor_enabled,
            self.defaults.balance_monitor_enabled,
        )
    }

    pub fn gas_estimator_mode(&self) -> GasEstimatorMode {
        if self.general.ethereum_disabled {
            return GasEstimatorMode::FixedPrice;
        }
        self.resolve(
            "GAS_ESTIMATOR_MODE",
            |cfg| cfg.gas_estimator_mode,
            self.defaults.gas_estimator_mode,
        )
    }

    /// Blocks fetched per batch by the block history estimator. A resolved
    /// value of 0 means "use the RPC default batch size".
    pub fn block_history_estimator_batch_size(&self) -> u32 {
        let size = self.resolve(
            "BLOCK_HISTORY_ESTIMATOR_BATCH_SIZE",
            |cfg| cfg.block_history_estimator_batch_size,
            self.defaults.block_history_estimator_batch_size,
        );
        if size > 0 {
            size
        } else {
            self.rpc_default_batch_size()
        }
    }

    pub fn flags_contract_address(&self) -> Option<Address> {
        self.lookup("FLAGS_CONTRACT_ADDRESS", |cfg| cfg.flags_contract_address)
            .or(self.defaults.flags_contract_address)
    }

    pub fn link_contract_address(&self) -> Option<Address> {
        self.lookup("LINK_CONTRACT_ADDRESS", |cfg| cfg.link_contract_address)
            .or(self.defaults.link_contract_address)
    }

    /// Confirmations to wait for before accepting a new OCR contract config.
    /// A non-zero `override_value` (e.g. from a job spec) wins outright.
    pub fn ocr_contract_confirmations(&self, override_value: u16) -> u16 {
        if override_value != 0 {
            return override_value;
        }
        self.resolve(
            "OCR_CONTRACT_CONFIRMATIONS",
            |cfg| cfg.ocr_contract_confirmations,
            self.defaults.ocr_contract_confirmations,
        )
    }

    pub fn ocr_blockchain_timeout(&self) -> Duration {
        self.global("OCR_BLOCKCHAIN_TIMEOUT", self.general.ocr.blockchain_timeout)
    }

    pub fn ocr_contract_poll_interval(&self) -> Duration {
        self.global("OCR_CONTRACT_POLL_INTERVAL", self.general.ocr.contract_poll_interval)
    }

    pub fn ocr_contract_subscribe_interval(&self) -> Duration {
        self.global(
            "OCR_CONTRACT_SUBSCRIBE_INTERVAL",
            self.general.ocr.contract_subscribe_interval,
        )
    }

    pub fn ocr_contract_transmitter_transmit_timeout(&self) -> Duration {
        self.global(
            "OCR_CONTRACT_TRANSMITTER_TRANSMIT_TIMEOUT",
            self.general.ocr.contract_transmitter_transmit_timeout,
        )
    }

    pub fn ocr_database_timeout(&self) -> Duration {
        self.global("OCR_DATABASE_TIMEOUT", self.general.ocr.database_timeout)
    }

    pub fn ocr_observation_timeout(&self) -> Duration {
        self.global("OCR_OBSERVATION_TIMEOUT", self.general.ocr.observation_timeout)
    }

    pub fn ocr_observation_grace_period(&self) -> Duration {
        self.global(
            "OCR_OBSERVATION_GRACE_PERIOD",
            self.general.ocr.observation_grace_period,
        )
    }

    /// The OCR local timing block as this chain would run it.
    pub fn ocr_local_config(&self) -> OcrLocalConfig {
        OcrLocalConfig {
            blockchain_timeout: self.ocr_blockchain_timeout(),
            contract_config_confirmations: self.ocr_contract_confirmations(0),
            contract_config_tracker_poll_interval: self.ocr_contract_poll_interval(),
            contract_config_tracker_subscribe_interval: self.ocr_contract_subscribe_interval(),
            contract_transmitter_transmit_timeout: self.ocr_contract_transmitter_transmit_timeout(),
            database_timeout: self.ocr_database_timeout(),
            data_source_timeout: self.ocr_observation_timeout(),
            data_source_grace_period: self.ocr_observation_grace_period(),
        }
    }

    /// Set the default gas price and persist it.
    ///
    /// The value must lie within the resolved `[min_gas_price_wei,
    /// max_gas_price_wei]`. On any error nothing changes, in memory or in the
    /// store.
    pub fn set_gas_price_default(&self, value: U256) -> Result<(), ChainError> {
        let min = self.min_gas_price_wei();
        let max = self.max_gas_price_wei();
        if value < min || value > max {
            return Err(ChainError::ValueOutOfBounds { value, min, max });
        }

        {
            let mut cfg = self.write_cfg();
            let mut updated = cfg.clone();
            updated.gas_price_default = Some(value);
            self.store.store_cfg(&self.id, &updated)?;
            *cfg = updated;
        }

        metrics::record_gas_price_default_update(&self.id);
        if self.env.get("ETH_GAS_PRICE_DEFAULT").is_some() {
            tracing::warn!(
                chain_id = %self.id,
                gas_price = %value,
                "Default gas price persisted, but ETH_GAS_PRICE_DEFAULT is set and still takes precedence"
            );
        } else {
            tracing::info!(chain_id = %self.id, gas_price = %value, "Default gas price updated");
        }
        Ok(())
    }

    /// Check every invariant and report all violations together.
    pub fn validate(&self) -> Result<(), ChainError> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ChainError::ConfigurationInvalid {
                chain_id: self.id,
                violations,
            })
        }
    }

    /// Every broken invariant, in a stable order.
    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();

        let bump_percent = self.gas_bump_percent();
        if bump_percent < MIN_REPLACEMENT_BUMP_PERCENT {
            out.push(Violation::GasBumpPercentTooLow {
                percent: bump_percent,
                minimum: MIN_REPLACEMENT_BUMP_PERCENT,
            });
        }

        let depth = self.gas_bump_tx_depth();
        let max_in_flight = self.max_in_flight_transactions();
        if u32::from(depth) > max_in_flight {
            out.push(Violation::GasBumpTxDepthAboveMaxInFlight { depth, max_in_flight });
        }

        let default = self.gas_price_default();
        let min = self.min_gas_price_wei();
        if min > default {
            out.push(Violation::MinGasPriceAboveDefault { min, default });
        }
        let max = self.max_gas_price_wei();
        if max < default {
            out.push(Violation::MaxGasPriceBelowDefault { max, default });
        }

        let finality_depth = self.finality_depth();
        let history_depth = self.head_tracker_history_depth();
        if history_depth < finality_depth {
            out.push(Violation::HeadTrackerHistoryBelowFinality {
                history_depth,
                finality_depth,
            });
        }

        if self.gas_estimator_mode() == GasEstimatorMode::BlockHistory
            && self.block_history_estimator_block_history_size() == 0
        {
            out.push(Violation::BlockHistorySizeZero);
        }

        if finality_depth < 1 {
            out.push(Violation::FinalityDepthTooLow);
        }

        if self.min_incoming_confirmations() < 1 {
            out.push(Violation::MinIncomingConfirmationsTooLow);
        }

        out.extend(
            self.ocr_local_config()
                .sanity_check()
                .into_iter()
                .map(Violation::Ocr),
        );

        out
    }

    /// Every resolved value, for display and diagnostics.
    pub fn snapshot(&self) -> ResolvedParams {
        ResolvedParams {
            chain_id: self.id,
            defaults: self.defaults.name,
            balance_monitor_enabled: self.balance_monitor_enabled(),
            balance_monitor_block_delay: self.balance_monitor_block_delay(),
            block_emission_idle_warning_threshold: self.block_emission_idle_warning_threshold(),
            block_history_estimator_batch_size: self.block_history_estimator_batch_size(),
            block_history_estimator_block_delay: self.block_history_estimator_block_delay(),
            block_history_estimator_block_history_size: self
                .block_history_estimator_block_history_size(),
            block_history_estimator_transaction_percentile: self
                .block_history_estimator_transaction_percentile(),
            eth_tx_reaper_interval: self.eth_tx_reaper_interval(),
            eth_tx_reaper_threshold: self.eth_tx_reaper_threshold(),
            eth_tx_resend_after_threshold: self.eth_tx_resend_after_threshold(),
            finality_depth: self.finality_depth(),
            flags_contract_address: self.flags_contract_address(),
            gas_bump_percent: self.gas_bump_percent(),
            gas_bump_threshold: self.gas_bump_threshold(),
            gas_bump_tx_depth: self.gas_bump_tx_depth(),
            gas_bump_wei: self.gas_bump_wei(),
            gas_estimator_mode: self.gas_estimator_mode(),
            gas_limit_default: self.gas_limit_default(),
            gas_limit_multiplier: self.gas_limit_multiplier(),
            gas_limit_transfer: self.gas_limit_transfer(),
            gas_price_default: self.gas_price_default(),
            head_tracker_history_depth: self.head_tracker_history_depth(),
            head_tracker_max_buffer_size: self.head_tracker_max_buffer_size(),
            head_tracker_sampling_interval: self.head_tracker_sampling_interval(),
            link_contract_address: self.link_contract_address(),
            log_backfill_batch_size: self.log_backfill_batch_size(),
            max_gas_price_wei: self.max_gas_price_wei(),
            max_in_flight_transactions: self.max_in_flight_transactions(),
            max_queued_transactions: self.max_queued_transactions(),
            min_gas_price_wei: self.min_gas_price_wei(),
            min_incoming_confirmations: self.min_incoming_confirmations(),
            min_required_outgoing_confirmations: self.min_required_outgoing_confirmations(),
            minimum_contract_payment: self.minimum_contract_payment(),
            nonce_auto_sync: self.nonce_auto_sync(),
            rpc_default_batch_size: self.rpc_default_batch_size(),
            ocr: self.ocr_local_config(),
        }
    }
}

impl std::fmt::Debug for ChainScopedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainScopedConfig")
            .field("chain_id", &self.id)
            .field("defaults", &self.defaults.name)
            .field("persisted", &*self.read_cfg())
            .finish()
    }
}

/// Fully resolved parameters of one chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedParams {
    pub chain_id: ChainId,
    /// Name of the default set in use.
    pub defaults: &'static str,
    pub balance_monitor_enabled: bool,
    pub balance_monitor_block_delay: u16,
    #[serde(with = "duration_str")]
    pub block_emission_idle_warning_threshold: Duration,
    pub block_history_estimator_batch_size: u32,
    pub block_history_estimator_block_delay: u16,
    pub block_history_estimator_block_history_size: u16,
    pub block_history_estimator_transaction_percentile: u16,
    #[serde(with = "duration_str")]
    pub eth_tx_reaper_interval: Duration,
    #[serde(with = "duration_str")]
    pub eth_tx_reaper_threshold: Duration,
    #[serde(with = "duration_str")]
    pub eth_tx_resend_after_threshold: Duration,
    pub finality_depth: u32,
    pub flags_contract_address: Option<Address>,
    pub gas_bump_percent: u16,
    pub gas_bump_threshold: u64,
    pub gas_bump_tx_depth: u16,
    #[serde(with = "decimal")]
    pub gas_bump_wei: U256,
    pub gas_estimator_mode: GasEstimatorMode,
    pub gas_limit_default: u64,
    pub gas_limit_multiplier: f32,
    pub gas_limit_transfer: u64,
    #[serde(with = "decimal")]
    pub gas_price_default: U256,
    pub head_tracker_history_depth: u32,
    pub head_tracker_max_buffer_size: u32,
    #[serde(with = "duration_str")]
    pub head_tracker_sampling_interval: Duration,
    pub link_contract_address: Option<Address>,
    pub log_backfill_batch_size: u32,
    #[serde(with = "decimal")]
    pub max_gas_price_wei: U256,
    pub max_in_flight_transactions: u32,
    pub max_queued_transactions: u64,
    #[serde(with = "decimal")]
    pub min_gas_price_wei: U256,
    pub min_incoming_confirmations: u32,
    pub min_required_outgoing_confirmations: u64,
    pub minimum_contract_payment: Link,
    pub nonce_auto_sync: bool,
    pub rpc_default_batch_size: u32,
    pub ocr: OcrLocalConfig,
}
