//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (ETH_DISABLED / ETH_CHAIN_ID overrides)
//!     → validation.rs (semantic checks)
//!     → RegistryConfig (validated, immutable)
//!     → GeneralConfig shared via Arc with every chain's resolver
//!     → [[chains]] entries seed the chain store
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; per-chain values that change at
//!   runtime live in the chain store, not here
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ChainEntry, GeneralConfig, HealthCheckConfig, NodeEntry, ObservabilityConfig, OcrConfig,
    RegistryConfig, StoreConfig,
};
