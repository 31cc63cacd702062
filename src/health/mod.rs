//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (monitor.rs)
//!     → ChainRegistry::chains()
//!     → Chain::ready() / Chain::healthy()
//!     → evm_chain_ready / evm_chain_healthy gauges
//!     → log on state transitions
//! ```
//!
//! # Design Decisions
//! - The monitor only observes; it never restarts or removes chains
//! - Only transitions are logged, to keep steady-state logs quiet

pub mod monitor;

pub use monitor::HealthMonitor;
