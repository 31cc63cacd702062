//! Integration tests for chain-scoped parameter resolution.

use alloy::primitives::{address, U256};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use evm_chains::blockchain::config::ChainScopedConfig;
use evm_chains::blockchain::env::{EnvSource, MapEnv};
use evm_chains::blockchain::error::ChainError;
use evm_chains::blockchain::store::{ChainStore, JsonChainStore};
use evm_chains::blockchain::types::{ChainCfg, ChainId, GasEstimatorMode, Link};
use evm_chains::config::GeneralConfig;

const GWEI: u64 = 1_000_000_000;

fn resolver_with(id: u64, persisted: ChainCfg, env: MapEnv) -> ChainScopedConfig {
    let store = JsonChainStore::new(None);
    store.insert_chain(ChainId::from(id), persisted.clone());
    ChainScopedConfig::new(
        ChainId::from(id),
        persisted,
        Arc::new(GeneralConfig::default()),
        Arc::new(env) as Arc<dyn EnvSource>,
        Arc::new(store) as Arc<dyn ChainStore>,
    )
}

/// A persisted record that overrides a handful of parameters.
fn persisted_overrides() -> ChainCfg {
    ChainCfg {
        finality_depth: Some(99),
        gas_price_default: Some(U256::from(7 * GWEI)),
        gas_bump_threshold: Some(9),
        max_queued_transactions: Some(77),
        nonce_auto_sync: Some(true),
        gas_estimator_mode: Some(GasEstimatorMode::BlockHistory),
        ..ChainCfg::default()
    }
}

type Check = fn(&ChainScopedConfig) -> bool;

fn case(key: &'static str, raw: &'static str, check: Check) -> (&'static str, &'static str, Check) {
    (key, raw, check)
}

#[test]
fn test_environment_wins_for_every_parameter() {
    let table = vec![
        case("BALANCE_MONITOR_ENABLED", "false", |c| !c.balance_monitor_enabled()),
        case("ETH_BALANCE_MONITOR_BLOCK_DELAY", "7", |c| c.balance_monitor_block_delay() == 7),
        case("BLOCK_EMISSION_IDLE_WARNING_THRESHOLD", "5m", |c| {
            c.block_emission_idle_warning_threshold() == Duration::from_secs(300)
        }),
        case("BLOCK_HISTORY_ESTIMATOR_BATCH_SIZE", "9", |c| c.block_history_estimator_batch_size() == 9),
        case("BLOCK_HISTORY_ESTIMATOR_BLOCK_DELAY", "3", |c| c.block_history_estimator_block_delay() == 3),
        case("BLOCK_HISTORY_ESTIMATOR_BLOCK_HISTORY_SIZE", "40", |c| {
            c.block_history_estimator_block_history_size() == 40
        }),
        case("BLOCK_HISTORY_ESTIMATOR_TRANSACTION_PERCENTILE", "75", |c| {
            c.block_history_estimator_transaction_percentile() == 75
        }),
        case("ETH_TX_REAPER_INTERVAL", "2h", |c| c.eth_tx_reaper_interval() == Duration::from_secs(7_200)),
        case("ETH_TX_REAPER_THRESHOLD", "24h", |c| c.eth_tx_reaper_threshold() == Duration::from_secs(86_400)),
        case("ETH_TX_RESEND_AFTER_THRESHOLD", "90s", |c| {
            c.eth_tx_resend_after_threshold() == Duration::from_secs(90)
        }),
        case("ETH_FINALITY_DEPTH", "30", |c| c.finality_depth() == 30),
        case("FLAGS_CONTRACT_ADDRESS", "0x000000000000000000000000000000000000dEaD", |c| {
            c.flags_contract_address() == Some(address!("000000000000000000000000000000000000dEaD"))
        }),
        case("ETH_GAS_BUMP_PERCENT", "25", |c| c.gas_bump_percent() == 25),
        case("ETH_GAS_BUMP_THRESHOLD", "0", |c| c.gas_bump_threshold() == 0),
        case("ETH_GAS_BUMP_TX_DEPTH", "4", |c| c.gas_bump_tx_depth() == 4),
        case("ETH_GAS_BUMP_WEI", "1000", |c| c.gas_bump_wei() == U256::from(1_000)),
        case("GAS_ESTIMATOR_MODE", "FixedPrice", |c| c.gas_estimator_mode() == GasEstimatorMode::FixedPrice),
        case("ETH_GAS_LIMIT_DEFAULT", "400000", |c| c.gas_limit_default() == 400_000),
        case("ETH_GAS_LIMIT_MULTIPLIER", "1.5", |c| c.gas_limit_multiplier() == 1.5),
        case("ETH_GAS_LIMIT_TRANSFER", "30000", |c| c.gas_limit_transfer() == 30_000),
        case("ETH_GAS_PRICE_DEFAULT", "3000000000", |c| c.gas_price_default() == U256::from(3 * GWEI)),
        case("ETH_HEAD_TRACKER_HISTORY_DEPTH", "150", |c| c.head_tracker_history_depth() == 150),
        case("ETH_HEAD_TRACKER_MAX_BUFFER_SIZE", "5", |c| c.head_tracker_max_buffer_size() == 5),
        case("ETH_HEAD_TRACKER_SAMPLING_INTERVAL", "500ms", |c| {
            c.head_tracker_sampling_interval() == Duration::from_millis(500)
        }),
        case("LINK_CONTRACT_ADDRESS", "0x0000000000000000000000000000000000000001", |c| {
            c.link_contract_address() == Some(address!("0000000000000000000000000000000000000001"))
        }),
        case("ETH_LOG_BACKFILL_BATCH_SIZE", "250", |c| c.log_backfill_batch_size() == 250),
        case("ETH_MAX_GAS_PRICE_WEI", "9000000000000", |c| {
            c.max_gas_price_wei() == U256::from(9_000_000_000_000u64)
        }),
        case("ETH_MAX_IN_FLIGHT_TRANSACTIONS", "32", |c| c.max_in_flight_transactions() == 32),
        case("ETH_MAX_QUEUED_TRANSACTIONS", "0", |c| c.max_queued_transactions() == 0),
        case("ETH_MIN_GAS_PRICE_WEI", "2", |c| c.min_gas_price_wei() == U256::from(2)),
        case("MIN_INCOMING_CONFIRMATIONS", "6", |c| c.min_incoming_confirmations() == 6),
        case("MIN_REQUIRED_OUTGOING_CONFIRMATIONS", "20", |c| c.min_required_outgoing_confirmations() == 20),
        case("MINIMUM_CONTRACT_PAYMENT_LINK_JUELS", "1000", |c| {
            c.minimum_contract_payment() == Link::from_juels(1_000)
        }),
        case("ETH_NONCE_AUTO_SYNC", "false", |c| !c.nonce_auto_sync()),
        case("OCR_CONTRACT_CONFIRMATIONS", "8", |c| c.ocr_contract_confirmations(0) == 8),
        case("ETH_RPC_DEFAULT_BATCH_SIZE", "50", |c| c.rpc_default_batch_size() == 50),
    ];

    for (key, raw, check) in table {
        let resolver = resolver_with(1, persisted_overrides(), MapEnv::new().with(key, raw));
        assert!(check(&resolver), "{key}={raw} was not honoured");
    }
}

#[test]
fn test_persisted_record_beats_defaults() {
    let resolver = resolver_with(1, persisted_overrides(), MapEnv::new());

    assert_eq!(resolver.finality_depth(), 99);
    assert_eq!(resolver.gas_price_default(), U256::from(7 * GWEI));
    assert_eq!(resolver.max_queued_transactions(), 77);
    // Untouched fields fall through to the mainnet set.
    assert_eq!(resolver.head_tracker_history_depth(), 100);
    assert_eq!(resolver.min_required_outgoing_confirmations(), 12);
}

#[test]
fn test_known_chain_uses_its_own_defaults() {
    let polygon = resolver_with(137, ChainCfg::default(), MapEnv::new());
    assert_eq!(polygon.defaults().name, "Polygon Mainnet");
    assert_eq!(polygon.finality_depth(), 200);
    assert_eq!(polygon.gas_price_default(), U256::from(GWEI));

    let optimism = resolver_with(10, ChainCfg::default(), MapEnv::new());
    assert_eq!(optimism.finality_depth(), 1);
    assert_eq!(optimism.gas_estimator_mode(), GasEstimatorMode::Optimism);
}

#[test]
fn test_unknown_chain_uses_fallback_defaults() {
    let resolver = resolver_with(999_999, ChainCfg::default(), MapEnv::new());
    assert_eq!(resolver.defaults().name, "fallback");
    assert_eq!(resolver.finality_depth(), 50);
    assert_eq!(resolver.gas_price_default(), U256::from(20 * GWEI));
    assert!(resolver.validate().is_ok());

    // Ids wider than 64 bits are valid too.
    let huge = ChainId(U256::from(u64::MAX) * U256::from(16));
    let store = JsonChainStore::new(None);
    let resolver = ChainScopedConfig::new(
        huge,
        ChainCfg::default(),
        Arc::new(GeneralConfig::default()),
        Arc::new(MapEnv::new()),
        Arc::new(store),
    );
    assert_eq!(resolver.defaults().name, "fallback");
}

/// Log lines written while `f` runs on this thread.
fn captured_logs(f: impl FnOnce()) -> String {
    #[derive(Clone, Default)]
    struct Buffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Buffer {
        fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn test_unknown_chain_logs_fallback_warning() {
    let logs = captured_logs(|| {
        resolver_with(999_999, ChainCfg::default(), MapEnv::new());
    });
    assert!(logs.contains("WARN"), "{logs}");
    assert!(logs.contains("falling back to generic default parameters"), "{logs}");
    assert!(logs.contains("chain_id=999999"), "{logs}");

    let logs = captured_logs(|| {
        resolver_with(137, ChainCfg::default(), MapEnv::new());
    });
    assert!(!logs.contains("falling back"), "{logs}");
}

#[test]
fn test_set_gas_price_default_persists_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chains.json");
    let id = ChainId::from(1);

    let store = JsonChainStore::load_from_file(&path).unwrap();
    store.insert_chain(id, ChainCfg::default());
    store.save_to_file().unwrap();

    let resolver = ChainScopedConfig::new(
        id,
        ChainCfg::default(),
        Arc::new(GeneralConfig::default()),
        Arc::new(MapEnv::new()),
        Arc::new(store),
    );
    resolver.set_gas_price_default(U256::from(30 * GWEI)).unwrap();
    assert_eq!(resolver.gas_price_default(), U256::from(30 * GWEI));

    let reopened = JsonChainStore::load_from_file(&path).unwrap();
    let record = reopened.chain(&id).unwrap();
    assert_eq!(record.cfg.gas_price_default, Some(U256::from(30 * GWEI)));
    assert!(record.updated_at > 0);

    let restarted = ChainScopedConfig::new(
        id,
        record.cfg,
        Arc::new(GeneralConfig::default()),
        Arc::new(MapEnv::new()),
        Arc::new(reopened),
    );
    assert_eq!(restarted.gas_price_default(), U256::from(30 * GWEI));
}

#[test]
fn test_rejected_gas_price_is_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chains.json");
    let id = ChainId::from(1);

    let store = JsonChainStore::load_from_file(&path).unwrap();
    store.insert_chain(id, ChainCfg::default());
    store.save_to_file().unwrap();

    let resolver = ChainScopedConfig::new(
        id,
        ChainCfg::default(),
        Arc::new(GeneralConfig::default()),
        Arc::new(MapEnv::new()),
        Arc::new(store),
    );

    let too_high = U256::from(5_001u64) * U256::from(GWEI);
    let err = resolver.set_gas_price_default(too_high).unwrap_err();
    assert!(matches!(err, ChainError::ValueOutOfBounds { .. }));
    assert_eq!(
        err.to_string(),
        format!(
            "cannot set default gas price to {too_high}, it must be between {} and {}",
            GWEI,
            5_000 * GWEI
        )
    );

    // Both ends of the range are accepted.
    resolver.set_gas_price_default(U256::from(GWEI)).unwrap();
    resolver.set_gas_price_default(U256::from(5_000 * GWEI)).unwrap();

    let reopened = JsonChainStore::load_from_file(&path).unwrap();
    assert_eq!(
        reopened.chain(&id).unwrap().cfg.gas_price_default,
        Some(U256::from(5_000 * GWEI))
    );
}

#[test]
fn test_environment_still_shadows_a_runtime_gas_price() {
    let resolver = resolver_with(
        1,
        ChainCfg::default(),
        MapEnv::new().with("ETH_GAS_PRICE_DEFAULT", "2000000000"),
    );

    resolver.set_gas_price_default(U256::from(40 * GWEI)).unwrap();

    assert_eq!(resolver.gas_price_default(), U256::from(2 * GWEI));
    assert_eq!(resolver.persisted_cfg().gas_price_default, Some(U256::from(40 * GWEI)));
}

#[test]
fn test_concurrent_reads_see_whole_values() {
    let resolver = Arc::new(resolver_with(1, ChainCfg::default(), MapEnv::new()));
    let candidates: Vec<U256> = (20..=30).map(|g| U256::from(g * GWEI)).collect();

    let writer = {
        let resolver = resolver.clone();
        let candidates = candidates.clone();
        thread::spawn(move || {
            for value in candidates.iter().cycle().take(200) {
                resolver.set_gas_price_default(*value).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let resolver = resolver.clone();
            let candidates = candidates.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let seen = resolver.gas_price_default();
                    assert!(candidates.contains(&seen), "torn read: {seen}");
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_ocr_local_config_uses_chain_confirmations() {
    let resolver = resolver_with(
        42161,
        ChainCfg::default(),
        MapEnv::new().with("OCR_OBSERVATION_TIMEOUT", "15s"),
    );
    let local = resolver.ocr_local_config();

    assert_eq!(local.contract_config_confirmations, resolver.ocr_contract_confirmations(0));
    assert_eq!(local.data_source_timeout, Duration::from_secs(15));
    assert_eq!(local.blockchain_timeout, Duration::from_secs(20));
    assert!(local.sanity_check().is_empty());
}
