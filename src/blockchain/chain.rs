//! A single network connection.
//!
//! # Responsibilities
//! - Bundle a chain's identity, resolver, client and dependent services
//! - Delegate lifecycle calls to its members
//!
//! # Design Decisions
//! - No state machine of its own; the chain is started when its members are
//! - Start runs the client first and services in order; close runs services
//!   in reverse and the client last
//! - Start and close attempt every member and aggregate errors; ready and
//!   healthy stop at the first failure

use std::sync::Arc;

use crate::blockchain::client::{ClientFactory, EthClient};
use crate::blockchain::config::ChainScopedConfig;
use crate::blockchain::env::EnvSource;
use crate::blockchain::error::{ChainError, ChainErrors};
use crate::blockchain::store::ChainStore;
use crate::blockchain::types::{ChainId, ChainRecord};
use crate::config::GeneralConfig;
use crate::lifecycle::{Service, ServiceError};

/// Signing keys, passed through to services that need them.
pub trait KeyStore: Send + Sync {}

/// Cross-process advisory locks, passed through to services that need them.
pub trait AdvisoryLocker: Send + Sync {}

/// Database change notifications, passed through to services that need them.
pub trait EventBroadcaster: Send + Sync {}

/// Everything a service factory can draw on when building a chain's services.
#[derive(Clone)]
pub struct ServiceContext {
    pub chain_id: ChainId,
    pub config: Arc<ChainScopedConfig>,
    pub client: Arc<dyn EthClient>,
    pub keystore: Option<Arc<dyn KeyStore>>,
    pub advisory_locker: Option<Arc<dyn AdvisoryLocker>>,
    pub event_broadcaster: Option<Arc<dyn EventBroadcaster>>,
}

/// Builds the dependent services (head tracker, tx manager, ...) of a chain.
pub type ServiceFactory = Arc<dyn Fn(&ServiceContext) -> Vec<Arc<dyn Service>> + Send + Sync>;

/// Collaborators shared by every chain of a registry.
#[derive(Clone)]
pub struct ChainRegistryOpts {
    pub config: Arc<GeneralConfig>,
    pub env: Arc<dyn EnvSource>,
    pub store: Arc<dyn ChainStore>,
    pub keystore: Option<Arc<dyn KeyStore>>,
    pub advisory_locker: Option<Arc<dyn AdvisoryLocker>>,
    pub event_broadcaster: Option<Arc<dyn EventBroadcaster>>,
    pub gen_eth_client: ClientFactory,
    pub gen_services: Option<ServiceFactory>,
}

/// One connected network.
pub struct Chain {
    id: ChainId,
    config: Arc<ChainScopedConfig>,
    client: Arc<dyn EthClient>,
    services: Vec<Arc<dyn Service>>,
    keystore: Option<Arc<dyn KeyStore>>,
    advisory_locker: Option<Arc<dyn AdvisoryLocker>>,
    event_broadcaster: Option<Arc<dyn EventBroadcaster>>,
}

impl Chain {
    /// Build a chain from its record.
    ///
    /// Node records are checked first, then the resolver is built and
    /// validated, then the client and services are created.
    pub fn new(opts: &ChainRegistryOpts, record: &ChainRecord) -> Result<Self, ChainError> {
        for node in &record.nodes {
            node.validate()?;
        }

        let config = Arc::new(ChainScopedConfig::new(
            record.id,
            record.cfg.clone(),
            opts.config.clone(),
            opts.env.clone(),
            opts.store.clone(),
        ));
        config.validate()?;

        let client = (opts.gen_eth_client)(record)?;

        let services = match &opts.gen_services {
            Some(factory) => factory(&ServiceContext {
                chain_id: record.id,
                config: config.clone(),
                client: client.clone(),
                keystore: opts.keystore.clone(),
                advisory_locker: opts.advisory_locker.clone(),
                event_broadcaster: opts.event_broadcaster.clone(),
            }),
            None => Vec::new(),
        };

        tracing::debug!(
            chain_id = %record.id,
            defaults = config.defaults().name,
            nodes = record.nodes.len(),
            services = services.len(),
            "Chain built"
        );

        Ok(Self {
            id: record.id,
            config,
            client,
            services,
            keystore: opts.keystore.clone(),
            advisory_locker: opts.advisory_locker.clone(),
            event_broadcaster: opts.event_broadcaster.clone(),
        })
    }

    pub fn id(&self) -> ChainId {
        self.id
    }

    pub fn config(&self) -> &Arc<ChainScopedConfig> {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn EthClient> {
        &self.client
    }

    pub fn services(&self) -> &[Arc<dyn Service>] {
        &self.services
    }

    pub fn keystore(&self) -> Option<&Arc<dyn KeyStore>> {
        self.keystore.as_ref()
    }

    pub fn advisory_locker(&self) -> Option<&Arc<dyn AdvisoryLocker>> {
        self.advisory_locker.as_ref()
    }

    pub fn event_broadcaster(&self) -> Option<&Arc<dyn EventBroadcaster>> {
        self.event_broadcaster.as_ref()
    }

    pub fn is_l2(&self) -> bool {
        self.id.is_l2()
    }

    pub fn is_optimism(&self) -> bool {
        self.id.is_optimism()
    }

    pub fn is_arbitrum(&self) -> bool {
        self.id.is_arbitrum()
    }

    fn wrap(&self, source: ServiceError) -> ChainError {
        ChainError::Service {
            chain_id: self.id,
            source,
        }
    }

    /// Start the client, then every service.
    pub async fn start(&self) -> Result<(), ChainErrors> {
        let mut errors = ChainErrors::new();
        if let Err(e) = self.client.start().await {
            errors.push(self.wrap(e));
        }
        for service in &self.services {
            if let Err(e) = service.start().await {
                errors.push(self.wrap(e));
            }
        }
        errors.into_result()
    }

    /// Close every service in reverse order, then the client.
    pub async fn close(&self) -> Result<(), ChainErrors> {
        let mut errors = ChainErrors::new();
        for service in self.services.iter().rev() {
            if let Err(e) = service.close().await {
                errors.push(self.wrap(e));
            }
        }
        if let Err(e) = self.client.close().await {
            errors.push(self.wrap(e));
        }
        errors.into_result()
    }

    /// First readiness failure among the client and services.
    pub fn ready(&self) -> Result<(), ServiceError> {
        self.client.ready()?;
        self.services.iter().try_for_each(|s| s.ready())
    }

    /// First health failure among the client and services.
    pub fn healthy(&self) -> Result<(), ServiceError> {
        self.client.healthy()?;
        self.services.iter().try_for_each(|s| s.healthy())
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("id", &self.id)
            .field("client", &self.client.name())
            .field("services", &self.services.len())
            .finish()
    }
}
