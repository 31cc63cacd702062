//! Chain and node persistence.
//!
//! # Responsibilities
//! - Load chain and node records for the registry
//! - Durably persist the per-chain override record
//! - Enforce node row constraints on insert
//!
//! # Design Decisions
//! - [`ChainStore`] is the seam; [`JsonChainStore`] keeps records in
//!   `DashMap`s and snapshots them to an optional JSON file
//! - Every override write is flushed to disk before it returns, so a
//!   successful `store_cfg` survives a restart
//! - Snapshots are written to a sibling temp file and renamed into place.
//!   Saves are serialized across clones, so the temp file has one writer
//!   and the last rename always carries the newest state

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::blockchain::types::{ChainCfg, ChainId, ChainRecord, NodeRecord};

/// Errors raised by a [`ChainStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed store file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no chain record with id {0}")]
    ChainNotFound(ChainId),

    #[error("a different node named '{0}' already exists")]
    DuplicateNode(String),

    #[error("{0}")]
    Node(String),
}

/// Persistence handle for chain and node records.
pub trait ChainStore: Send + Sync {
    /// Every chain record, ordered by id, without nodes attached.
    fn load_chains(&self) -> Result<Vec<ChainRecord>, StoreError>;

    /// Every node record, ordered by name.
    fn load_nodes(&self) -> Result<Vec<NodeRecord>, StoreError>;

    /// Replace the override record of one chain.
    fn store_cfg(&self, chain_id: &ChainId, cfg: &ChainCfg) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    chains: Vec<ChainRecord>,
    #[serde(default)]
    nodes: Vec<NodeRecord>,
}

/// In-memory store with optional JSON file persistence.
#[derive(Clone, Default)]
pub struct JsonChainStore {
    chains: Arc<DashMap<ChainId, ChainRecord>>,
    /// Keyed by lowercased node name.
    nodes: Arc<DashMap<String, NodeRecord>>,
    persistence_path: Option<PathBuf>,
    save_lock: Arc<Mutex<()>>,
}

impl JsonChainStore {
    /// Create an empty store. Nothing is read from `persistence_path`.
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            chains: Arc::new(DashMap::new()),
            nodes: Arc::new(DashMap::new()),
            persistence_path,
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Open a store backed by `path`, loading it if the file exists.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;
            for chain in snapshot.chains {
                store.chains.insert(chain.id, chain);
            }
            for node in snapshot.nodes {
                store.nodes.insert(node.name.to_lowercase(), node);
            }
            tracing::info!(
                path = %path.display(),
                chains = store.chains.len(),
                nodes = store.nodes.len(),
                "Loaded chain store"
            );
        }
        Ok(store)
    }

    /// Write a snapshot to the persistence path, if one is configured.
    pub fn save_to_file(&self) -> Result<(), StoreError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        // Held from snapshot to rename. Poisoning only means a previous
        // writer panicked; the file on disk is still whole.
        let _guard = self.save_lock.lock().unwrap_or_else(|p| p.into_inner());

        let snapshot = Snapshot {
            chains: self.sorted_chains(),
            nodes: self.sorted_nodes(),
        };

        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, &snapshot)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp, path)?;

        tracing::debug!(
            path = %path.display(),
            chains = snapshot.chains.len(),
            nodes = snapshot.nodes.len(),
            "Saved chain store"
        );
        Ok(())
    }

    /// Add a chain record unless one with the same id exists.
    ///
    /// An existing record keeps its override blob, so values written at
    /// runtime are not clobbered by re-seeding. Returns whether a record was
    /// added.
    pub fn insert_chain(&self, id: ChainId, cfg: ChainCfg) -> bool {
        if self.chains.contains_key(&id) {
            return false;
        }
        let now = unix_now();
        let mut record = ChainRecord::new(id);
        record.cfg = cfg;
        record.created_at = now;
        record.updated_at = now;
        self.chains.insert(id, record);
        true
    }

    /// Add a node record.
    ///
    /// Re-inserting an identical record is a no-op. A different record with
    /// the same name (compared case-insensitively) is rejected.
    pub fn insert_node(&self, node: NodeRecord) -> Result<(), StoreError> {
        node.validate().map_err(|e| StoreError::Node(e.to_string()))?;
        if !self.chains.contains_key(&node.chain_id) {
            return Err(StoreError::ChainNotFound(node.chain_id));
        }

        let key = node.name.to_lowercase();
        if let Some(existing) = self.nodes.get(&key) {
            if *existing == node {
                return Ok(());
            }
            return Err(StoreError::DuplicateNode(node.name));
        }
        self.nodes.insert(key, node);
        Ok(())
    }

    /// A copy of one chain record.
    pub fn chain(&self, id: &ChainId) -> Option<ChainRecord> {
        self.chains.get(id).map(|r| r.value().clone())
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn sorted_chains(&self) -> Vec<ChainRecord> {
        let mut chains: Vec<_> = self.chains.iter().map(|r| r.value().clone()).collect();
        chains.sort_by_key(|c| c.id);
        chains
    }

    fn sorted_nodes(&self) -> Vec<NodeRecord> {
        let mut nodes: Vec<_> = self.nodes.iter().map(|r| r.value().clone()).collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        nodes
    }
}

impl ChainStore for JsonChainStore {
    fn load_chains(&self) -> Result<Vec<ChainRecord>, StoreError> {
        Ok(self.sorted_chains())
    }

    fn load_nodes(&self) -> Result<Vec<NodeRecord>, StoreError> {
        Ok(self.sorted_nodes())
    }

    fn store_cfg(&self, chain_id: &ChainId, cfg: &ChainCfg) -> Result<(), StoreError> {
        let previous = {
            let mut record = self
                .chains
                .get_mut(chain_id)
                .ok_or(StoreError::ChainNotFound(*chain_id))?;
            let previous = (record.cfg.clone(), record.updated_at);
            record.cfg = cfg.clone();
            record.updated_at = unix_now();
            previous
        };

        if let Err(e) = self.save_to_file() {
            // Roll back so memory never runs ahead of disk, unless a later
            // write already replaced this value.
            if let Some(mut record) = self.chains.get_mut(chain_id).filter(|r| r.cfg == *cfg) {
                record.cfg = previous.0;
                record.updated_at = previous.1;
            }
            return Err(e);
        }
        Ok(())
    }
}

impl std::fmt::Debug for JsonChainStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonChainStore")
            .field("chains", &self.chains.len())
            .field("nodes", &self.nodes.len())
            .field("persistence_path", &self.persistence_path)
            .finish()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
