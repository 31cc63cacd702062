//! Multi-chain EVM configuration and chain registry.
//!
//! Resolves every per-network operational parameter (gas pricing,
//! confirmation depths, head tracking windows, batching limits) for each
//! connected chain independently, and owns the lifecycle of the set of
//! active chain connections.

// Core subsystems
pub mod blockchain;
pub mod config;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;

pub use blockchain::{Chain, ChainError, ChainId, ChainRegistry, ChainScopedConfig};
pub use config::RegistryConfig;
pub use lifecycle::Shutdown;
