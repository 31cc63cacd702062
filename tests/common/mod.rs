//! Shared fakes and fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use evm_chains::blockchain::chain::{ChainRegistryOpts, ServiceFactory};
use evm_chains::blockchain::client::{ClientFactory, EthClient};
use evm_chains::blockchain::env::{EnvSource, MapEnv};
use evm_chains::blockchain::store::{ChainStore, JsonChainStore};
use evm_chains::blockchain::types::{ChainId, ChainRecord, NodeRecord};
use evm_chains::config::GeneralConfig;
use evm_chains::lifecycle::{Service, ServiceError};

/// Shared, ordered log of lifecycle events.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Programmable client that never touches the network.
pub struct FakeClient {
    name: String,
    chain_id: ChainId,
    log: EventLog,
    started: AtomicBool,
    fail_start: AtomicBool,
    not_ready: Mutex<Option<String>>,
    unhealthy: Mutex<Option<String>>,
    block: AtomicU64,
}

impl FakeClient {
    pub fn new(chain_id: ChainId, log: EventLog) -> Self {
        Self {
            name: format!("client-{chain_id}"),
            chain_id,
            log,
            started: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
            not_ready: Mutex::new(None),
            unhealthy: Mutex::new(None),
            block: AtomicU64::new(1),
        }
    }

    pub fn set_not_ready(&self, reason: Option<&str>) {
        *self.not_ready.lock().unwrap() = reason.map(str::to_string);
    }

    pub fn set_unhealthy(&self, reason: Option<&str>) {
        *self.unhealthy.lock().unwrap() = reason.map(str::to_string);
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Service for FakeClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), ServiceError> {
        self.log.lock().unwrap().push(format!("start {}", self.name));
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(ServiceError::new(&self.name, "dial failed"));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), ServiceError> {
        self.log.lock().unwrap().push(format!("close {}", self.name));
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn ready(&self) -> Result<(), ServiceError> {
        match &*self.not_ready.lock().unwrap() {
            Some(reason) => Err(ServiceError::new(&self.name, reason.clone())),
            None => Ok(()),
        }
    }

    fn healthy(&self) -> Result<(), ServiceError> {
        match &*self.unhealthy.lock().unwrap() {
            Some(reason) => Err(ServiceError::new(&self.name, reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EthClient for FakeClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn block_number(&self) -> Result<u64, ServiceError> {
        Ok(self.block.fetch_add(1, Ordering::SeqCst))
    }

    async fn gas_price(&self) -> Result<u128, ServiceError> {
        Ok(20_000_000_000)
    }
}

/// Every fake client a factory has built, by chain.
#[derive(Clone, Default)]
pub struct FakeClients {
    inner: Arc<Mutex<HashMap<ChainId, Arc<FakeClient>>>>,
}

impl FakeClients {
    pub fn get(&self, id: u64) -> Arc<FakeClient> {
        self.inner.lock().unwrap()[&ChainId::from(id)].clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// A client factory producing [`FakeClient`]s, plus a handle to them.
pub fn fake_client_factory(log: EventLog) -> (ClientFactory, FakeClients) {
    let clients = FakeClients::default();
    let handle = clients.clone();
    let factory: ClientFactory = Arc::new(move |record: &ChainRecord| {
        let client = Arc::new(FakeClient::new(record.id, log.clone()));
        clients.inner.lock().unwrap().insert(record.id, client.clone());
        Ok(client as Arc<dyn EthClient>)
    });
    (factory, handle)
}

/// Dependent service that records its lifecycle calls.
pub struct FakeService {
    name: String,
    log: EventLog,
    fail_start: bool,
    fail_close: bool,
}

impl FakeService {
    pub fn new(name: impl Into<String>, log: EventLog) -> Self {
        Self {
            name: name.into(),
            log,
            fail_start: false,
            fail_close: false,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

#[async_trait]
impl Service for FakeService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), ServiceError> {
        self.log.lock().unwrap().push(format!("start {}", self.name));
        if self.fail_start {
            return Err(ServiceError::new(&self.name, "boom on start"));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), ServiceError> {
        self.log.lock().unwrap().push(format!("close {}", self.name));
        if self.fail_close {
            return Err(ServiceError::new(&self.name, "boom on close"));
        }
        Ok(())
    }

    fn ready(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    fn healthy(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// A primary node with a websocket URL.
pub fn primary_node(name: &str, chain: u64) -> NodeRecord {
    NodeRecord {
        name: name.to_string(),
        chain_id: ChainId::from(chain),
        ws_url: Some(format!("ws://{name}.example:8546")),
        http_url: Some(format!("http://{name}.example:8545")),
        send_only: false,
    }
}

/// A chain record with one primary node.
pub fn chain_record(id: u64) -> ChainRecord {
    let mut record = ChainRecord::new(ChainId::from(id));
    record.nodes.push(primary_node(&format!("node-{id}"), id));
    record
}

/// Registry options over fake clients and an in-memory store.
pub struct Harness {
    pub opts: ChainRegistryOpts,
    pub clients: FakeClients,
    pub store: Arc<JsonChainStore>,
    pub log: EventLog,
}

pub fn harness(general: GeneralConfig, env: MapEnv) -> Harness {
    harness_with_services(general, env, None)
}

pub fn harness_with_services(
    general: GeneralConfig,
    env: MapEnv,
    gen_services: Option<ServiceFactory>,
) -> Harness {
    let log = event_log();
    let (factory, clients) = fake_client_factory(log.clone());
    let store = Arc::new(JsonChainStore::new(None));
    let opts = ChainRegistryOpts {
        config: Arc::new(general),
        env: Arc::new(env) as Arc<dyn EnvSource>,
        store: store.clone() as Arc<dyn ChainStore>,
        keystore: None,
        advisory_locker: None,
        event_broadcaster: None,
        gen_eth_client: factory,
        gen_services,
    };
    Harness {
        opts,
        clients,
        store,
        log,
    }
}

pub fn general_with_default(id: u64) -> GeneralConfig {
    GeneralConfig {
        default_chain_id: Some(ChainId::from(id)),
        ..GeneralConfig::default()
    }
}

/// Start a minimal JSON-RPC node that answers `eth_chainId`,
/// `eth_blockNumber` and `eth_gasPrice`.
pub async fn start_mock_rpc(chain_id: u64, block_number: u64) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let Some(body) = read_http_body(&mut socket).await else {
                    return;
                };
                let request: serde_json::Value = match serde_json::from_slice(&body) {
                    Ok(v) => v,
                    Err(_) => return,
                };
                let result = match request["method"].as_str() {
                    Some("eth_chainId") => format!("0x{chain_id:x}"),
                    Some("eth_blockNumber") => format!("0x{block_number:x}"),
                    Some("eth_gasPrice") => "0x4a817c800".to_string(),
                    _ => "0x0".to_string(),
                };
                let response = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": request["id"],
                    "result": result,
                })
                .to_string();
                let raw = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(raw.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

async fn read_http_body(socket: &mut tokio::net::TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let length: usize = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        let body_start = header_end + 4;
        if buf.len() >= body_start + length {
            return Some(buf[body_start..body_start + length].to_vec());
        }
    }
}
