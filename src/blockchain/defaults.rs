//! Built-in parameter sets per known network.
//!
//! # Responsibilities
//! - Provide a complete baseline for every per-chain parameter
//! - Select the set for a chain id, or the generic fallback
//!
//! # Design Decisions
//! - All sets are `static` and built from [`FALLBACK`] with struct update
//!   syntax, so a chain only lists what makes it different
//! - Every set satisfies the resolver's validation rules on its own

use alloy::primitives::{address, Address, U256};
use std::time::Duration;

use crate::blockchain::types::{ChainId, GasEstimatorMode, Link};

const fn gwei(n: u64) -> U256 {
    U256::from_limbs([n * 1_000_000_000, 0, 0, 0])
}

/// Baseline value of every per-chain parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainDefaults {
    /// Human readable network name, used in logs.
    pub name: &'static str,
    pub balance_monitor_enabled: bool,
    pub balance_monitor_block_delay: u16,
    pub block_emission_idle_warning_threshold: Duration,
    pub block_history_estimator_batch_size: u32,
    pub block_history_estimator_block_delay: u16,
    pub block_history_estimator_block_history_size: u16,
    pub block_history_estimator_transaction_percentile: u16,
    pub eth_tx_reaper_interval: Duration,
    pub eth_tx_reaper_threshold: Duration,
    pub eth_tx_resend_after_threshold: Duration,
    pub finality_depth: u32,
    pub flags_contract_address: Option<Address>,
    pub gas_bump_percent: u16,
    pub gas_bump_threshold: u64,
    pub gas_bump_tx_depth: u16,
    pub gas_bump_wei: U256,
    pub gas_estimator_mode: GasEstimatorMode,
    pub gas_limit_default: u64,
    pub gas_limit_multiplier: f32,
    pub gas_limit_transfer: u64,
    pub gas_price_default: U256,
    pub head_tracker_history_depth: u32,
    pub head_tracker_max_buffer_size: u32,
    pub head_tracker_sampling_interval: Duration,
    pub link_contract_address: Option<Address>,
    pub log_backfill_batch_size: u32,
    pub max_gas_price_wei: U256,
    pub max_in_flight_transactions: u32,
    pub max_queued_transactions: u64,
    pub min_gas_price_wei: U256,
    pub min_incoming_confirmations: u32,
    pub min_required_outgoing_confirmations: u64,
    pub minimum_contract_payment: Link,
    pub nonce_auto_sync: bool,
    pub ocr_contract_confirmations: u16,
    pub rpc_default_batch_size: u32,
}

/// Used for any chain id without a dedicated set.
pub static FALLBACK: ChainDefaults = FALLBACK_SET;

const FALLBACK_SET: ChainDefaults = ChainDefaults {
    name: "fallback",
    balance_monitor_enabled: true,
    balance_monitor_block_delay: 1,
    block_emission_idle_warning_threshold: Duration::from_secs(60),
    block_history_estimator_batch_size: 4,
    block_history_estimator_block_delay: 1,
    block_history_estimator_block_history_size: 16,
    block_history_estimator_transaction_percentile: 60,
    eth_tx_reaper_interval: Duration::from_secs(3_600),
    eth_tx_reaper_threshold: Duration::from_secs(168 * 3_600),
    eth_tx_resend_after_threshold: Duration::from_secs(60),
    finality_depth: 50,
    flags_contract_address: None,
    gas_bump_percent: 20,
    gas_bump_threshold: 3,
    gas_bump_tx_depth: 10,
    gas_bump_wei: gwei(5),
    gas_estimator_mode: GasEstimatorMode::BlockHistory,
    gas_limit_default: 500_000,
    gas_limit_multiplier: 1.0,
    gas_limit_transfer: 21_000,
    gas_price_default: gwei(20),
    head_tracker_history_depth: 100,
    head_tracker_max_buffer_size: 3,
    head_tracker_sampling_interval: Duration::from_secs(1),
    link_contract_address: None,
    log_backfill_batch_size: 100,
    max_gas_price_wei: gwei(5_000),
    max_in_flight_transactions: 16,
    max_queued_transactions: 250,
    min_gas_price_wei: gwei(1),
    min_incoming_confirmations: 3,
    min_required_outgoing_confirmations: 12,
    // 0.1 LINK
    minimum_contract_payment: Link::from_juels(100_000_000_000_000_000),
    nonce_auto_sync: true,
    ocr_contract_confirmations: 4,
    rpc_default_batch_size: 100,
};

static MAINNET: ChainDefaults = ChainDefaults {
    name: "Ethereum Mainnet",
    link_contract_address: Some(address!("514910771AF9Ca656af840dff83E8264EcF986CA")),
    min_required_outgoing_confirmations: 12,
    ..FALLBACK_SET
};

static ROPSTEN: ChainDefaults = ChainDefaults {
    name: "Ropsten",
    link_contract_address: Some(address!("20fE562d797A42Dcb3399062AE9546cd06f63280")),
    ..FALLBACK_SET
};

static RINKEBY: ChainDefaults = ChainDefaults {
    name: "Rinkeby",
    link_contract_address: Some(address!("01BE23585060835E02B77ef475b0Cc51aA1e0709")),
    ..FALLBACK_SET
};

static GOERLI: ChainDefaults = ChainDefaults {
    name: "Goerli",
    link_contract_address: Some(address!("326C977E6efc84E512bB9C30f76E30c160eD06FB")),
    ..FALLBACK_SET
};

static KOVAN: ChainDefaults = ChainDefaults {
    name: "Kovan",
    link_contract_address: Some(address!("a36085F69e2889c224210F603D836748e7dC0088")),
    ..FALLBACK_SET
};

static BSC: ChainDefaults = ChainDefaults {
    name: "BSC Mainnet",
    balance_monitor_block_delay: 2,
    block_emission_idle_warning_threshold: Duration::from_secs(15),
    block_history_estimator_block_delay: 2,
    block_history_estimator_block_history_size: 24,
    gas_price_default: gwei(5),
    head_tracker_history_depth: 100,
    link_contract_address: Some(address!("404460C6A5EdE2D891e8297795264fDe62ADBB75")),
    min_gas_price_wei: gwei(1),
    min_incoming_confirmations: 3,
    ocr_contract_confirmations: 2,
    ..FALLBACK_SET
};

static XDAI: ChainDefaults = ChainDefaults {
    name: "xDai",
    gas_price_default: gwei(1),
    link_contract_address: Some(address!("E2e73A1c69ecF83F464EFCE6A5be353a37cA09b2")),
    min_gas_price_wei: gwei(1),
    ..FALLBACK_SET
};

static POLYGON: ChainDefaults = ChainDefaults {
    name: "Polygon Mainnet",
    balance_monitor_block_delay: 13,
    block_emission_idle_warning_threshold: Duration::from_secs(15),
    block_history_estimator_block_delay: 10,
    block_history_estimator_block_history_size: 24,
    finality_depth: 200,
    gas_bump_wei: gwei(20),
    gas_price_default: gwei(1),
    head_tracker_history_depth: 250,
    head_tracker_max_buffer_size: 100,
    link_contract_address: Some(address!("b0897686c545045aFc77CF20eC7A532E3120E0F1")),
    min_gas_price_wei: gwei(1),
    min_incoming_confirmations: 5,
    ..FALLBACK_SET
};

static FANTOM: ChainDefaults = ChainDefaults {
    name: "Fantom Opera",
    gas_price_default: gwei(15),
    link_contract_address: Some(address!("6F43FF82CCA38001B6699a8AC47A2d0E66939407")),
    min_gas_price_wei: gwei(1),
    min_incoming_confirmations: 3,
    ..FALLBACK_SET
};

const OPTIMISM_SET: ChainDefaults = ChainDefaults {
    name: "Optimism Mainnet",
    balance_monitor_block_delay: 0,
    block_history_estimator_block_history_size: 0,
    finality_depth: 1,
    gas_bump_threshold: 0,
    gas_estimator_mode: GasEstimatorMode::Optimism,
    head_tracker_history_depth: 10,
    head_tracker_sampling_interval: Duration::ZERO,
    link_contract_address: Some(address!("350a791Bfc2C21F9Ed5d10980Dad2e2638ffa7f6")),
    min_incoming_confirmations: 1,
    min_required_outgoing_confirmations: 0,
    ocr_contract_confirmations: 1,
    ..FALLBACK_SET
};

static OPTIMISM: ChainDefaults = OPTIMISM_SET;

static OPTIMISM_KOVAN: ChainDefaults = ChainDefaults {
    name: "Optimism Kovan",
    link_contract_address: Some(address!("4911b761993b9c8c0d14Ba2d86902AF6B0074F5B")),
    ..OPTIMISM_SET
};

const ARBITRUM_SET: ChainDefaults = ChainDefaults {
    name: "Arbitrum One",
    gas_bump_threshold: 0,
    gas_estimator_mode: GasEstimatorMode::FixedPrice,
    gas_limit_default: 7_000_000,
    gas_limit_transfer: 800_000,
    gas_price_default: gwei(1),
    link_contract_address: Some(address!("f97f4df75117a78c1A5a0DBb814Af92458539FB4")),
    max_gas_price_wei: gwei(1_000),
    min_gas_price_wei: U256::ZERO,
    ocr_contract_confirmations: 1,
    ..FALLBACK_SET
};

static ARBITRUM: ChainDefaults = ARBITRUM_SET;

static ARBITRUM_RINKEBY: ChainDefaults = ChainDefaults {
    name: "Arbitrum Rinkeby",
    link_contract_address: Some(address!("615fBe6372676474d9e6933d310469c9b68e9726")),
    ..ARBITRUM_SET
};

impl ChainDefaults {
    /// The dedicated set for a known chain id.
    pub fn lookup(id: &ChainId) -> Option<&'static ChainDefaults> {
        let set = match id.to_u64()? {
            1 => &MAINNET,
            3 => &ROPSTEN,
            4 => &RINKEBY,
            5 => &GOERLI,
            42 => &KOVAN,
            56 => &BSC,
            100 => &XDAI,
            137 => &POLYGON,
            250 => &FANTOM,
            10 => &OPTIMISM,
            69 => &OPTIMISM_KOVAN,
            42161 => &ARBITRUM,
            421611 => &ARBITRUM_RINKEBY,
            _ => return None,
        };
        Some(set)
    }

    /// The set for `id`, falling back to [`FALLBACK`] with a warning.
    pub fn for_chain(id: &ChainId) -> &'static ChainDefaults {
        match Self::lookup(id) {
            Some(set) => set,
            None => {
                tracing::warn!(
                    chain_id = %id,
                    "Unrecognised chain id, falling back to generic default parameters"
                );
                &FALLBACK
            }
        }
    }

    /// Chain ids with a dedicated set.
    pub fn known_chain_ids() -> [u64; 13] {
        [1, 3, 4, 5, 42, 56, 100, 137, 250, 10, 69, 42161, 421611]
    }
}
