//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! store.rs (chain + node records)
//!     → registry.rs (one Chain per record, failures collected)
//!     → chain.rs (resolver + client + services per chain)
//!     → config.rs (env → persisted → defaults.rs → general config)
//!     → client.rs (RPC connection with timeouts)
//! ```
//!
//! # Constraints
//! - A chain is only handed out when it reports ready
//! - Configuration problems are reported in full, never first-only
//! - All RPC calls have configurable timeouts

pub mod chain;
pub mod client;
pub mod config;
pub mod defaults;
pub mod env;
pub mod error;
pub mod ocr;
pub mod registry;
pub mod store;
pub mod types;

pub use chain::{Chain, ChainRegistryOpts, ServiceContext, ServiceFactory};
pub use client::{default_client_factory, ClientFactory, EthClient, RpcClient};
pub use config::{ChainScopedConfig, ResolvedParams};
pub use defaults::ChainDefaults;
pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use error::{ChainError, ChainErrors, Violation};
pub use registry::ChainRegistry;
pub use store::{ChainStore, JsonChainStore, StoreError};
pub use types::{is_arbitrum, is_l2, is_optimism, ChainCfg, ChainId, ChainRecord, GasEstimatorMode, Link, NodeRecord};
