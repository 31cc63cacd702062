//! Registry of every chain in the process.
//!
//! # Responsibilities
//! - Build one [`Chain`] per persisted record, tolerating partial failure
//! - Look chains up by id, or the configured default, only when ready
//! - Fan lifecycle calls out to every chain and aggregate the errors
//!
//! # Design Decisions
//! - The index is built once and never mutated; a new chain set means a
//!   new registry, so lookups need no locking
//! - Keys are `ChainId` values, never their string forms
//! - Start and close run every chain concurrently and wait for all of them

use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::blockchain::chain::{Chain, ChainRegistryOpts};
use crate::blockchain::error::{ChainError, ChainErrors};
use crate::blockchain::types::{ChainId, ChainRecord};
use crate::observability::metrics;

/// Owner of every chain.
pub struct ChainRegistry {
    chains: HashMap<ChainId, Arc<Chain>>,
    default_id: Option<ChainId>,
}

impl ChainRegistry {
    /// An empty registry. Every lifecycle call is a no-op.
    pub fn empty(default_id: Option<ChainId>) -> Self {
        Self {
            chains: HashMap::new(),
            default_id,
        }
    }

    /// Build a registry from chain records with their nodes attached.
    ///
    /// Chains that fail to build are left out and reported in the second
    /// element; the registry holds every chain that succeeded. When Ethereum
    /// is disabled the registry is empty and no error is reported.
    #[must_use]
    pub fn new(opts: &ChainRegistryOpts, records: &[ChainRecord]) -> (Self, Result<(), ChainErrors>) {
        let default_id = opts.config.default_chain_id;
        if opts.config.ethereum_disabled {
            tracing::info!("Ethereum is disabled, chain registry is empty");
            metrics::record_chain_count(0);
            return (Self::empty(default_id), Ok(()));
        }

        let mut chains = HashMap::with_capacity(records.len());
        let mut errors = ChainErrors::new();
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            // First record wins, even if it fails to build.
            if !seen.insert(record.id) {
                tracing::error!(chain_id = %record.id, "Duplicate chain record");
                errors.push(ChainError::ChainBuildFailed {
                    chain_id: record.id,
                    source: Box::new(ChainError::DuplicateChain(record.id)),
                });
                continue;
            }
            match Chain::new(opts, record) {
                Ok(chain) => {
                    chains.insert(record.id, Arc::new(chain));
                }
                Err(e) => {
                    tracing::error!(chain_id = %record.id, error = %e, "Failed to build chain");
                    errors.push(ChainError::ChainBuildFailed {
                        chain_id: record.id,
                        source: Box::new(e),
                    });
                }
            }
        }

        if let Some(id) = default_id {
            if !chains.contains_key(&id) {
                tracing::warn!(chain_id = %id, "Default chain is not in the registry");
            }
        }

        tracing::info!(chains = chains.len(), failed = errors.len(), "Chain registry built");
        metrics::record_chain_count(chains.len());

        (Self { chains, default_id }, errors.into_result())
    }

    /// Read every chain and node record from the store and build a registry.
    ///
    /// Nodes are attached to their chain by id. A store failure is returned
    /// as the outer error; chain build failures as the inner one.
    pub fn load(opts: &ChainRegistryOpts) -> Result<(Self, Result<(), ChainErrors>), ChainError> {
        if opts.config.ethereum_disabled {
            return Ok(Self::new(opts, &[]));
        }

        let mut records = opts.store.load_chains()?;
        let nodes = opts.store.load_nodes()?;

        let index: HashMap<ChainId, usize> = records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.id, i))
            .collect();
        for node in nodes {
            match index.get(&node.chain_id) {
                Some(&i) => records[i].nodes.push(node),
                None => {
                    tracing::warn!(node = %node.name, chain_id = %node.chain_id, "Node refers to an unknown chain");
                }
            }
        }

        Ok(Self::new(opts, &records))
    }

    /// The chain with `id`, if it is registered and ready.
    pub fn get(&self, id: &ChainId) -> Result<Arc<Chain>, ChainError> {
        let chain = self
            .chains
            .get(id)
            .ok_or(ChainError::ChainNotFound(*id))?;
        chain.ready().map_err(|source| ChainError::ChainNotReady {
            chain_id: *id,
            source,
        })?;
        Ok(chain.clone())
    }

    /// The configured default chain, if it is registered and ready.
    pub fn default(&self) -> Result<Arc<Chain>, ChainError> {
        let id = self.default_id.ok_or(ChainError::ChainIdRequired)?;
        self.get(&id)
    }

    pub fn default_id(&self) -> Option<ChainId> {
        self.default_id
    }

    /// Every chain, in no particular order.
    pub fn chains(&self) -> Vec<Arc<Chain>> {
        self.chains.values().cloned().collect()
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// Start every chain concurrently.
    pub async fn start(&self) -> Result<(), ChainErrors> {
        let results = join_all(self.chains.values().map(|chain| chain.start())).await;
        let errors = collect(results);
        if errors.is_empty() {
            tracing::info!(chains = self.chains.len(), "All chains started");
        } else {
            tracing::warn!(chains = self.chains.len(), failed = errors.len(), "Some chains failed to start");
        }
        errors.into_result()
    }

    /// Close every chain concurrently.
    pub async fn close(&self) -> Result<(), ChainErrors> {
        let results = join_all(self.chains.values().map(|chain| chain.close())).await;
        tracing::info!(chains = self.chains.len(), "Chain registry closed");
        collect(results).into_result()
    }

    /// Readiness of every chain.
    pub fn ready(&self) -> Result<(), ChainErrors> {
        self.check(Chain::ready)
    }

    /// Health of every chain.
    pub fn healthy(&self) -> Result<(), ChainErrors> {
        self.check(Chain::healthy)
    }

    fn check(&self, f: impl Fn(&Chain) -> Result<(), crate::lifecycle::ServiceError>) -> Result<(), ChainErrors> {
        let mut errors = ChainErrors::new();
        for (id, chain) in &self.chains {
            if let Err(source) = f(chain) {
                errors.push(ChainError::Service {
                    chain_id: *id,
                    source,
                });
            }
        }
        errors.into_result()
    }
}

fn collect(results: Vec<Result<(), ChainErrors>>) -> ChainErrors {
    let mut errors = ChainErrors::new();
    for result in results {
        if let Err(e) = result {
            errors.extend(e);
        }
    }
    errors
}

impl std::fmt::Debug for ChainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.chains.keys().collect();
        ids.sort();
        f.debug_struct("ChainRegistry")
            .field("chains", &ids)
            .field("default_id", &self.default_id)
            .finish()
    }
}
