//! Per-chain JSON-RPC client with timeout and failover.
//!
//! # Responsibilities
//! - Connect to every primary node of one chain
//! - Verify the remote chain id on start
//! - Query chain state (block number, gas price) with per-request timeouts
//! - Report readiness and health to the owning chain
//!
//! # Design Decisions
//! - [`EthClient`] is the seam; chains only see `Arc<dyn EthClient>`, and
//!   tests inject fakes through a [`ClientFactory`]
//! - HTTP endpoints are built eagerly; websocket-only nodes connect on start
//! - Send-only nodes are counted but never used for reads

use alloy::providers::{Provider, ProviderBuilder};
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::error::ChainError;
use crate::blockchain::types::{ChainId, ChainRecord};
use crate::lifecycle::{Service, ServiceError};

/// Network client of a single chain.
#[async_trait]
pub trait EthClient: Service {
    /// The chain this client is configured for.
    fn chain_id(&self) -> ChainId;

    /// Latest block number.
    async fn block_number(&self) -> Result<u64, ServiceError>;

    /// Current network gas price in wei.
    async fn gas_price(&self) -> Result<u128, ServiceError>;
}

/// Builds the client of a chain from its record.
pub type ClientFactory = Arc<dyn Fn(&ChainRecord) -> Result<Arc<dyn EthClient>, ChainError> + Send + Sync>;

/// Factory producing [`RpcClient`]s with the given per-request timeout.
pub fn default_client_factory(request_timeout: Duration) -> ClientFactory {
    Arc::new(move |record: &ChainRecord| {
        RpcClient::new(record, request_timeout).map(|client| Arc::new(client) as Arc<dyn EthClient>)
    })
}

type DynProvider = Arc<dyn Provider + Send + Sync>;

#[derive(Clone)]
struct Endpoint {
    node: String,
    provider: DynProvider,
}

#[derive(Debug, Default)]
struct ClientState {
    started: bool,
    closed: bool,
    last_error: Option<String>,
}

/// JSON-RPC client over the primary nodes of one chain.
pub struct RpcClient {
    name: String,
    chain_id: ChainId,
    /// Connected endpoints, in node order.
    endpoints: RwLock<Vec<Endpoint>>,
    /// Websocket-only primaries, connected on start.
    pending_ws: Vec<(String, String)>,
    send_only: usize,
    timeout_duration: Duration,
    state: Mutex<ClientState>,
}

impl RpcClient {
    /// Create a client for every primary node of `record`.
    ///
    /// Fails if the chain has no primary node or an HTTP URL is malformed.
    pub fn new(record: &ChainRecord, timeout_duration: Duration) -> Result<Self, ChainError> {
        let mut endpoints = Vec::new();
        let mut pending_ws = Vec::new();
        let mut send_only = 0;

        for node in &record.nodes {
            if node.send_only {
                send_only += 1;
                continue;
            }
            match (&node.http_url, &node.ws_url) {
                (Some(http), _) => {
                    let url: url::Url = http.parse().map_err(|e| {
                        ChainError::ClientInit(format!("invalid RPC URL '{}' for node '{}': {}", http, node.name, e))
                    })?;
                    endpoints.push(Endpoint {
                        node: node.name.clone(),
                        provider: Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider,
                    });
                }
                (None, Some(ws)) => pending_ws.push((node.name.clone(), ws.clone())),
                (None, None) => {
                    tracing::warn!(node = %node.name, "Ignoring node without any URL");
                }
            }
        }

        if endpoints.is_empty() && pending_ws.is_empty() {
            return Err(ChainError::ClientInit(format!(
                "chain {} has no primary nodes",
                record.id
            )));
        }

        Ok(Self {
            name: format!("EthClient({})", record.id),
            chain_id: record.id,
            endpoints: RwLock::new(endpoints),
            pending_ws,
            send_only,
            timeout_duration,
            state: Mutex::new(ClientState::default()),
        })
    }

    fn snapshot(&self) -> Vec<Endpoint> {
        self.endpoints
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ClientState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    fn error(&self, reason: impl Into<String>) -> ServiceError {
        ServiceError::new(self.name.clone(), reason)
    }

    /// Run `call` against each endpoint in turn until one succeeds.
    async fn failover<T, F, Fut>(&self, what: &str, call: F) -> Result<T, ServiceError>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, alloy::transports::TransportError>>,
    {
        for endpoint in self.snapshot() {
            match timeout(self.timeout_duration, call(endpoint.provider.clone())).await {
                Ok(Ok(result)) => {
                    self.with_state(|s| s.last_error = None);
                    return Ok(result);
                }
                Ok(Err(e)) => {
                    tracing::warn!(chain_id = %self.chain_id, node = %endpoint.node, error = %e, "RPC error, trying next node");
                }
                Err(_) => {
                    tracing::warn!(chain_id = %self.chain_id, node = %endpoint.node, "RPC timeout, trying next node");
                }
            }
        }
        let reason = format!("all nodes failed to {what}");
        self.with_state(|s| s.last_error = Some(reason.clone()));
        Err(self.error(reason))
    }

    /// Chain id reported by the remote nodes.
    pub async fn get_chain_id(&self) -> Result<ChainId, ServiceError> {
        self.failover("get chain id", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId::from)
    }

    /// Verify the connected chain id matches the record.
    pub async fn verify_chain_id(&self) -> Result<(), ServiceError> {
        let remote = self.get_chain_id().await?;
        if remote != self.chain_id {
            return Err(self.error(format!(
                "chain id mismatch: configured {}, node reports {}",
                self.chain_id, remote
            )));
        }
        Ok(())
    }

    /// Websocket-only primaries without a live endpoint yet.
    fn unconnected_ws(&self) -> Vec<(String, String)> {
        let connected = self.snapshot();
        self.pending_ws
            .iter()
            .filter(|(node, _)| !connected.iter().any(|e| e.node == *node))
            .cloned()
            .collect()
    }

    /// Connect the websocket-only primaries. A start retried after a failed
    /// chain id check only dials the ones still missing.
    async fn connect_pending(&self) {
        for (node, ws) in self.unconnected_ws() {
            match timeout(self.timeout_duration, ProviderBuilder::new().connect(&ws)).await {
                Ok(Ok(provider)) => {
                    let endpoint = Endpoint {
                        node,
                        provider: Arc::new(provider) as DynProvider,
                    };
                    self.endpoints
                        .write()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .push(endpoint);
                }
                Ok(Err(e)) => tracing::warn!(node = %node, error = %e, "Websocket connection failed"),
                Err(_) => tracing::warn!(node = %node, "Websocket connection timed out"),
            }
        }
    }
}

#[async_trait]
impl Service for RpcClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), ServiceError> {
        let (started, closed) = self.with_state(|s| (s.started, s.closed));
        if closed {
            return Err(self.error("client has been closed"));
        }
        if started {
            return Ok(());
        }

        self.connect_pending().await;
        if self.snapshot().is_empty() {
            return Err(self.error("no reachable primary node"));
        }

        if let Err(e) = self.verify_chain_id().await {
            self.with_state(|s| s.last_error = Some(e.reason.clone()));
            return Err(e);
        }

        self.with_state(|s| s.started = true);
        tracing::info!(
            chain_id = %self.chain_id,
            primaries = self.snapshot().len(),
            send_only = self.send_only,
            "RPC client started"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), ServiceError> {
        self.with_state(|s| {
            s.started = false;
            s.closed = true;
        });
        self.endpoints
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        Ok(())
    }

    fn ready(&self) -> Result<(), ServiceError> {
        self.with_state(|s| {
            if s.started {
                Ok(())
            } else if s.closed {
                Err(self.error("client is closed"))
            } else {
                Err(self.error("client is not started"))
            }
        })
    }

    fn healthy(&self) -> Result<(), ServiceError> {
        self.ready()?;
        match self.with_state(|s| s.last_error.clone()) {
            Some(reason) => Err(self.error(reason)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EthClient for RpcClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn block_number(&self) -> Result<u64, ServiceError> {
        self.failover("get block number", |p| async move { p.get_block_number().await })
            .await
    }

    async fn gas_price(&self) -> Result<u128, ServiceError> {
        self.failover("get gas price", |p| async move { p.get_gas_price().await })
            .await
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("chain_id", &self.chain_id)
            .field("endpoints", &self.snapshot().len())
            .field("pending_ws", &self.pending_ws.len())
            .field("send_only", &self.send_only)
            .field("timeout", &self.timeout_duration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::NodeRecord;

    fn record(nodes: Vec<NodeRecord>) -> ChainRecord {
        let mut record = ChainRecord::new(ChainId::from(31337));
        record.nodes = nodes;
        record
    }

    fn node(name: &str, ws: Option<&str>, http: Option<&str>, send_only: bool) -> NodeRecord {
        NodeRecord {
            name: name.to_string(),
            chain_id: ChainId::from(31337),
            ws_url: ws.map(str::to_string),
            http_url: http.map(str::to_string),
            send_only,
        }
    }

    #[test]
    fn test_requires_a_primary_node() {
        let only_send = record(vec![node("s", None, Some("http://localhost:8545"), true)]);
        assert!(matches!(
            RpcClient::new(&only_send, Duration::from_secs(1)),
            Err(ChainError::ClientInit(_))
        ));
    }

    #[test]
    fn test_not_ready_before_start() {
        let client = RpcClient::new(
            &record(vec![node("p", Some("ws://localhost:8546"), Some("http://localhost:8545"), false)]),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.chain_id(), ChainId::from(31337));
        assert!(client.ready().is_err());
        assert!(client.healthy().is_err());
    }

    #[test]
    fn test_connected_ws_nodes_are_not_redialed() {
        let client = RpcClient::new(
            &record(vec![
                node("http", None, Some("http://localhost:8545"), false),
                node("ws-a", Some("ws://localhost:8546"), None, false),
                node("ws-b", Some("ws://localhost:8547"), None, false),
            ]),
            Duration::from_secs(1),
        )
        .unwrap();

        let pending: Vec<_> = client.unconnected_ws().into_iter().map(|(n, _)| n).collect();
        assert_eq!(pending, vec!["ws-a", "ws-b"]);

        // Stand in for a connection made by an earlier start attempt.
        let url: url::Url = "http://localhost:8546".parse().unwrap();
        client.endpoints.write().unwrap().push(Endpoint {
            node: "ws-a".to_string(),
            provider: Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider,
        });

        let pending: Vec<_> = client.unconnected_ws().into_iter().map(|(n, _)| n).collect();
        assert_eq!(pending, vec!["ws-b"]);
        assert_eq!(client.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_rpc_failover_exhausts_nodes() {
        // Nothing listens on these ports, so every node fails.
        let client = RpcClient::new(
            &record(vec![
                node("a", Some("ws://127.0.0.1:1"), Some("http://127.0.0.1:1"), false),
                node("b", Some("ws://127.0.0.1:2"), Some("http://127.0.0.1:2"), false),
            ]),
            Duration::from_secs(2),
        )
        .unwrap();

        let err = client.block_number().await.unwrap_err();
        assert!(err.reason.contains("all nodes failed"));
        assert!(client.start().await.is_err());
        assert!(client.ready().is_err());
    }

    #[tokio::test]
    async fn test_closed_client_cannot_start() {
        let client = RpcClient::new(
            &record(vec![node("p", Some("ws://localhost:8546"), Some("http://localhost:8545"), false)]),
            Duration::from_secs(1),
        )
        .unwrap();
        client.close().await.unwrap();
        assert!(client.start().await.is_err());
        assert_eq!(client.ready().unwrap_err().reason, "client is closed");
    }
}
