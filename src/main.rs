//! evm-chains
//!
//! Operator CLI for the multi-chain registry.
//!
//! # Architecture Overview
//!
//! ```text
//!   evm-chains.toml ──▶ config::loader ──▶ RegistryConfig
//!                                              │
//!                          ┌───────────────────┴──────────────┐
//!                          ▼                                  ▼
//!                 lifecycle::startup                    GeneralConfig
//!                 (open + seed store)                         │
//!                          │                                  │
//!                          ▼                                  ▼
//!                 ChainRegistry::load ──▶ Chain ──▶ ChainScopedConfig
//!                          │               │         (env → store → defaults)
//!                          │               └──▶ RpcClient (alloy)
//!                          ▼
//!                 health::HealthMonitor ──▶ metrics (Prometheus)
//! ```
//!
//! # Commands
//! - `run`: build the registry, start every chain, wait for Ctrl-C, close
//! - `check`: build the registry without connecting and report problems
//! - `show --chain-id N`: print the resolved parameters of one chain

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use evm_chains::blockchain::config::ChainScopedConfig;
use evm_chains::blockchain::env::{EnvSource, ProcessEnv};
use evm_chains::blockchain::registry::ChainRegistry;
use evm_chains::blockchain::types::ChainId;
use evm_chains::config::{load_config, RegistryConfig};
use evm_chains::health::HealthMonitor;
use evm_chains::lifecycle::startup::{open_store, registry_opts, seed_store};
use evm_chains::lifecycle::{startup, Shutdown};
use evm_chains::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "evm-chains")]
#[command(about = "Multi-chain EVM configuration and chain registry", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "evm-chains.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start every chain and run until interrupted
    Run,
    /// Validate the configuration and every chain without connecting
    Check,
    /// Print the resolved parameters of one chain as JSON
    Show {
        /// Chain to show; defaults to the configured default chain.
        #[arg(long)]
        chain_id: Option<ChainId>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging("info");
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    logging::init_logging(&config.observability.log_level);

    let env: Arc<dyn EnvSource> = Arc::new(ProcessEnv);
    match cli.command {
        Commands::Run => run(config, env).await,
        Commands::Check => check(&config, env),
        Commands::Show { chain_id } => show(&config, env, chain_id),
    }
}

async fn run(config: RegistryConfig, env: Arc<dyn EnvSource>) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("evm-chains v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let startup::Bootstrapped {
        registry,
        built,
        rejected,
    } = startup::bootstrap(&config, env)?;
    for e in &rejected {
        tracing::error!(error = %e, "Node not loaded");
    }
    if let Err(errors) = built {
        for e in errors {
            tracing::error!(error = %e, "Chain unavailable");
        }
    }
    let registry = Arc::new(registry);

    if let Err(errors) = registry.start().await {
        for e in errors {
            tracing::error!(error = %e, "Chain failed to start");
        }
    }

    let shutdown = Shutdown::new();
    let monitor = HealthMonitor::new(registry.clone(), config.health_check.clone());
    let monitor_task = tokio::spawn(monitor.run(shutdown.subscribe()));

    shutdown.wait_for_signal().await?;
    if let Err(e) = monitor_task.await {
        tracing::warn!(error = %e, "Health monitor task failed");
    }

    if let Err(errors) = registry.close().await {
        for e in errors {
            tracing::warn!(error = %e, "Error while closing chain");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn check(config: &RegistryConfig, env: Arc<dyn EnvSource>) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(&config.store)?;
    let rejected = seed_store(&store, &config.chains);
    let opts = registry_opts(config, env, Arc::new(store));
    let (registry, built) = ChainRegistry::load(&opts)?;

    let mut chains = registry.chains();
    chains.sort_by_key(|c| c.id());
    for chain in &chains {
        println!("ok      chain {} ({})", chain.id(), chain.config().defaults().name);
    }
    for e in &rejected {
        println!("skipped {e}");
    }

    match built {
        Ok(()) if rejected.is_empty() => {
            println!("{} chain(s) valid", registry.chain_count());
            Ok(())
        }
        Ok(()) => Err(format!("{} node(s) rejected", rejected.len()).into()),
        Err(errors) => {
            for e in errors.iter() {
                println!("failed  {e}");
            }
            Err(format!("{} chain(s) failed to build", errors.len()).into())
        }
    }
}

fn show(
    config: &RegistryConfig,
    env: Arc<dyn EnvSource>,
    chain_id: Option<ChainId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = chain_id
        .or(config.general.default_chain_id)
        .ok_or("no --chain-id given and no default chain configured")?;

    let store = open_store(&config.store)?;
    let rejected = seed_store(&store, &config.chains);
    if !rejected.is_empty() {
        tracing::warn!(count = rejected.len(), "Configured nodes were not stored; run `check` for details");
    }
    let persisted = store.chain(&id).map(|record| record.cfg).unwrap_or_default();

    let resolver = ChainScopedConfig::new(
        id,
        persisted,
        Arc::new(config.general.clone()),
        env,
        Arc::new(store),
    );

    let output = serde_json::json!({
        "params": resolver.snapshot(),
        "violations": resolver
            .violations()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
