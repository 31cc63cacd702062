//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the chain store and seed it from the configuration file
//! - Assemble the collaborators every chain shares
//! - Build the registry
//!
//! # Design Decisions
//! - Seeding never overwrites a stored override record, so values set at
//!   runtime survive restarts
//! - A broken seed entry is reported and skipped; the rest still load

use std::sync::Arc;

use crate::blockchain::chain::ChainRegistryOpts;
use crate::blockchain::client::{default_client_factory, ClientFactory};
use crate::blockchain::env::EnvSource;
use crate::blockchain::error::{ChainError, ChainErrors};
use crate::blockchain::registry::ChainRegistry;
use crate::blockchain::store::{JsonChainStore, StoreError};
use crate::config::{ChainEntry, RegistryConfig, StoreConfig};

/// Open the store configured in `[store]`.
pub fn open_store(config: &StoreConfig) -> Result<JsonChainStore, StoreError> {
    match &config.path {
        Some(path) => JsonChainStore::load_from_file(path),
        None => Ok(JsonChainStore::new(None)),
    }
}

/// Insert every configured chain and node into the store.
///
/// Nothing is flushed to disk. Returns the entries that could not be inserted.
pub fn seed_store(store: &JsonChainStore, chains: &[ChainEntry]) -> Vec<StoreError> {
    let mut rejected = Vec::new();
    for entry in chains {
        if store.insert_chain(entry.id, entry.cfg.clone()) {
            tracing::info!(chain_id = %entry.id, "Seeded chain");
        } else {
            tracing::debug!(chain_id = %entry.id, "Chain already stored, keeping stored overrides");
        }
        for node in &entry.nodes {
            if let Err(e) = store.insert_node(node.to_record(entry.id)) {
                tracing::warn!(chain_id = %entry.id, node = %node.name, error = %e, "Skipping node");
                rejected.push(e);
            }
        }
    }
    rejected
}

/// Registry options using the default RPC client and no extra services.
pub fn registry_opts(
    config: &RegistryConfig,
    env: Arc<dyn EnvSource>,
    store: Arc<JsonChainStore>,
) -> ChainRegistryOpts {
    let gen_eth_client: ClientFactory = default_client_factory(config.general.rpc_timeout());
    ChainRegistryOpts {
        config: Arc::new(config.general.clone()),
        env,
        store,
        keystore: None,
        advisory_locker: None,
        event_broadcaster: None,
        gen_eth_client,
        gen_services: None,
    }
}

/// Outcome of [`bootstrap`].
#[derive(Debug)]
pub struct Bootstrapped {
    pub registry: ChainRegistry,
    /// Chains that failed to build. The registry holds the rest.
    pub built: Result<(), ChainErrors>,
    /// Configured nodes the store refused.
    pub rejected: Vec<StoreError>,
}

/// Open and seed the store, then build the registry.
///
/// Only a store or registry failure is fatal. Per-chain build failures and
/// refused nodes are handed back alongside the registry.
pub fn bootstrap(config: &RegistryConfig, env: Arc<dyn EnvSource>) -> Result<Bootstrapped, ChainError> {
    let store = open_store(&config.store)?;
    let rejected = seed_store(&store, &config.chains);
    if !rejected.is_empty() {
        tracing::warn!(count = rejected.len(), "Configured nodes were not stored");
    }
    store.save_to_file()?;
    let opts = registry_opts(config, env, Arc::new(store));
    let (registry, built) = ChainRegistry::load(&opts)?;
    Ok(Bootstrapped {
        registry,
        built,
        rejected,
    })
}
