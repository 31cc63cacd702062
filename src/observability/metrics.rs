//! Metrics collection and exposition.
//!
//! # Metrics
//! - `evm_chains_total` (gauge): chains held by the registry
//! - `evm_chain_ready` (gauge, `chain_id`): 1=ready, 0=not ready
//! - `evm_chain_healthy` (gauge, `chain_id`): 1=healthy, 0=unhealthy
//! - `evm_gas_price_default_updates_total` (counter, `chain_id`): runtime
//!   default gas price changes
//! - `evm_env_parse_failures_total` (counter, `key`): malformed
//!   environment overrides that were ignored

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::blockchain::types::ChainId;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_chain_count(count: usize) {
    gauge!("evm_chains_total").set(count as f64);
}

pub fn record_chain_ready(chain_id: &ChainId, ready: bool) {
    gauge!("evm_chain_ready", "chain_id" => chain_id.to_string()).set(if ready { 1.0 } else { 0.0 });
}

pub fn record_chain_health(chain_id: &ChainId, healthy: bool) {
    gauge!("evm_chain_healthy", "chain_id" => chain_id.to_string()).set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_gas_price_default_update(chain_id: &ChainId) {
    counter!("evm_gas_price_default_updates_total", "chain_id" => chain_id.to_string()).increment(1);
}

pub fn record_env_parse_failure(key: &str) {
    counter!("evm_env_parse_failures_total", "key" => key.to_string()).increment(1);
}
