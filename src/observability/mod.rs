//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Resolver, registry, health monitor produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges via the metrics facade)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or the configured level)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Metric updates go through the facade and are no-ops until an exporter
//!   is installed, so library users and tests pay nothing
//! - Chain ids are metric labels; their number is small and bounded

pub mod logging;
pub mod metrics;
