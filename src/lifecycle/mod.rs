//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → open store → seed store → build registry
//!
//! Start (registry → chains):
//!     ChainRegistry::start → every Chain::start → client, then services
//!
//! Close (registry → chains):
//!     ChainRegistry::close → every Chain::close → services (reverse), then client
//!
//! Checks:
//!     ready()   → "may I hand this out to a caller?"
//!     healthy() → "is it still doing its job?"
//! ```
//!
//! # Design Decisions
//! - A chain has no state machine of its own; its state is the union of
//!   its services' states
//! - Fan-out always runs every child and aggregates every error
//! - No timeouts at this layer; a stuck service is its own responsibility

pub mod shutdown;
pub mod startup;

use async_trait::async_trait;
use thiserror::Error;

pub use shutdown::Shutdown;

/// Failure reported by a service's lifecycle or check method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service}: {reason}")]
pub struct ServiceError {
    /// Name of the failing service.
    pub service: String,
    /// Human readable cause.
    pub reason: String,
}

impl ServiceError {
    pub fn new(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            reason: reason.into(),
        }
    }
}

/// A long-running component owned by a chain (client, head tracker, ...).
#[async_trait]
pub trait Service: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Start the service.
    async fn start(&self) -> Result<(), ServiceError>;

    /// Stop the service. Usually it cannot be started again afterwards.
    async fn close(&self) -> Result<(), ServiceError>;

    /// `Ok` once the service can be used.
    fn ready(&self) -> Result<(), ServiceError>;

    /// `Ok` while the service is working as expected.
    fn healthy(&self) -> Result<(), ServiceError>;
}
