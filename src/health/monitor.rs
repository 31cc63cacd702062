//! Periodic chain health reporting.
//!
//! # Responsibilities
//! - Periodically check every chain's readiness and health
//! - Publish the results as metrics and log state changes

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::blockchain::registry::ChainRegistry;
use crate::blockchain::types::ChainId;
use crate::config::HealthCheckConfig;
use crate::observability::metrics;

/// Last observed state of one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStatus {
    pub ready: bool,
    pub healthy: bool,
}

pub struct HealthMonitor {
    registry: Arc<ChainRegistry>,
    config: HealthCheckConfig,
    last: HashMap<ChainId, ChainStatus>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ChainRegistry>, config: HealthCheckConfig) -> Self {
        Self {
            registry,
            config,
            last: HashMap::new(),
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Chain health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            chains = self.registry.chain_count(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Check every chain once and return the observed states.
    pub fn check_all(&mut self) -> HashMap<ChainId, ChainStatus> {
        let mut current = HashMap::new();

        for chain in self.registry.chains() {
            let id = chain.id();
            let ready = chain.ready();
            let healthy = chain.healthy();
            let status = ChainStatus {
                ready: ready.is_ok(),
                healthy: healthy.is_ok(),
            };

            metrics::record_chain_ready(&id, status.ready);
            metrics::record_chain_health(&id, status.healthy);

            if self.last.get(&id) != Some(&status) {
                match healthy.err().or(ready.err()) {
                    Some(e) => tracing::warn!(chain_id = %id, ready = status.ready, error = %e, "Chain is unhealthy"),
                    None => tracing::info!(chain_id = %id, "Chain is healthy"),
                }
            }
            current.insert(id, status);
        }

        self.last = current.clone();
        current
    }
}
