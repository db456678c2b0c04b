//! Test utilities
//!
//! A scripted in-memory node and key fixtures for deterministic pipeline
//! tests. Only compiled for tests or with the `test_utils` feature.

#![cfg(any(test, feature = "test_utils"))]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value as Json};

use crate::errors::{Error, Result};
use crate::rpc::{BlockHeader, NodeClient};
use crate::signer::InMemorySigner;
use crate::types::{Address, AddressKind, BlockHash, ChainId, OperationHash, PublicKey};

/// Sandbox `bootstrap1` account
pub const BOOTSTRAP1_SECRET_KEY: &str = "edsk3gUfUPyBSfrS9CCgmCiQsTCHGkviBDusMxDJstFtojtc1zcpsh";
pub const BOOTSTRAP1_PUBLIC_KEY: &str = "edpkuBknW28nW72KG6RoHtYW7p12T6GKc7nAbwYX5m8Wd9sDVC9yav";
pub const BOOTSTRAP1_ADDRESS: &str = "tz1KqTpEZ7Yob7QbPE4Hy4Wo8fHG8LhKxZSx";

pub const MAINNET: &str = "NetXdQprcVkpaWU";

pub fn bootstrap1_public_key() -> PublicKey {
    BOOTSTRAP1_PUBLIC_KEY.parse().unwrap()
}

pub fn bootstrap1_signer() -> InMemorySigner {
    InMemorySigner::from_secret_key(BOOTSTRAP1_SECRET_KEY).unwrap()
}

/// Distinct implicit address per `n`
pub fn sample_address(n: u8) -> Address {
    Address::new(AddressKind::Ed25519, [n.wrapping_add(0x40); 20])
}

/// Distinct contract address per `n`
pub fn sample_contract(n: u8) -> Address {
    Address::new(AddressKind::Contract, [n.wrapping_add(0x80); 20])
}

type SimulateFn = dyn Fn(&Json) -> Result<Json> + Send + Sync;

/// Successful `run_operation` answer mirroring the request contents
///
/// Every operation consumes `milligas` and pays `storage` bytes.
pub fn applied_response(request: &Json, milligas: u64, storage: u64) -> Json {
    let contents = request["operation"]["contents"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|mut op| {
            op["metadata"] = json!({
                "operation_result": {
                    "status": "applied",
                    "consumed_milligas": milligas.to_string(),
                    "paid_storage_size_diff": storage.to_string(),
                }
            });
            op
        })
        .collect::<Vec<_>>();
    json!({ "contents": contents })
}

/// Answer failing every transaction whose amount is above `max_amount`
pub fn balance_limited_response(request: &Json, max_amount: u64, milligas: u64) -> Json {
    let mut response = applied_response(request, milligas, 0);
    if let Some(contents) = response["contents"].as_array_mut() {
        for op in contents {
            let amount = op["amount"]
                .as_str()
                .and_then(|a| a.parse::<u64>().ok())
                .unwrap_or(0);
            if amount > max_amount {
                op["metadata"]["operation_result"] = json!({
                    "status": "failed",
                    "errors": [{
                        "kind": "temporary",
                        "id": "proto.alpha.contract.balance_too_low"
                    }]
                });
            }
        }
    }
    response
}

/// Scripted [`NodeClient`] with call counters
pub struct MockNode {
    pub chain_id: ChainId,
    pub counter: u64,
    pub manager_key: Mutex<Option<PublicKey>>,
    head_level: AtomicI64,
    /// Levels the head advances on every `head()` call
    pub blocks_per_poll: i64,
    /// Blocks after injection at which an injected operation is included;
    /// `None` means never
    pub include_after: Option<i64>,
    /// Block queries fail as unreachable once something was injected
    pub unreachable_after_inject: bool,
    simulate: Box<SimulateFn>,
    injected: Mutex<Vec<(i64, OperationHash)>>,
    pub injected_bytes: Mutex<Vec<String>>,
    pub run_operation_calls: AtomicUsize,
    pub inject_calls: AtomicUsize,
    pub head_calls: AtomicUsize,
    pub requests: Mutex<Vec<Json>>,
}

impl std::fmt::Debug for MockNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNode")
            .field("chain_id", &self.chain_id.to_string())
            .field("counter", &self.counter)
            .field("head_level", &self.head_level)
            .finish_non_exhaustive()
    }
}

impl Default for MockNode {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNode {
    /// Mainnet node at level 100 where the bootstrap1 key is revealed and
    /// every operation costs 1000 milligas and no storage
    pub fn new() -> Self {
        Self {
            chain_id: MAINNET.parse().unwrap(),
            counter: 41,
            manager_key: Mutex::new(Some(bootstrap1_public_key())),
            head_level: AtomicI64::new(100),
            blocks_per_poll: 0,
            include_after: Some(1),
            unreachable_after_inject: false,
            simulate: Box::new(|request| Ok(applied_response(request, 1_000, 0))),
            injected: Mutex::new(Vec::new()),
            injected_bytes: Mutex::new(Vec::new()),
            run_operation_calls: AtomicUsize::new(0),
            inject_calls: AtomicUsize::new(0),
            head_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_simulation<F>(mut self, simulate: F) -> Self
    where
        F: Fn(&Json) -> Result<Json> + Send + Sync + 'static,
    {
        self.simulate = Box::new(simulate);
        self
    }

    pub fn unrevealed(self) -> Self {
        *self.manager_key.lock().unwrap() = None;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn run_operation_count(&self) -> usize {
        self.run_operation_calls.load(Ordering::SeqCst)
    }

    pub fn inject_count(&self) -> usize {
        self.inject_calls.load(Ordering::SeqCst)
    }

    pub fn head_level(&self) -> i64 {
        self.head_level.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable_after_inject && self.inject_count() > 0 {
            return Err(Error::NodeUnreachable {
                endpoint: self.endpoint().to_string(),
                message: "connection reset".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NodeClient for MockNode {
    fn endpoint(&self) -> &str {
        "mock://node"
    }

    async fn chain_id(&self) -> Result<ChainId> {
        Ok(self.chain_id)
    }

    async fn head(&self) -> Result<BlockHeader> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        let step = self.blocks_per_poll;
        let level = self.head_level.fetch_add(step, Ordering::SeqCst) + step;
        let mut hash = [0u8; 32];
        hash[..8].copy_from_slice(&level.to_be_bytes());
        Ok(BlockHeader {
            hash: BlockHash::from_bytes(hash),
            level,
        })
    }

    async fn counter(&self, _address: &Address) -> Result<u64> {
        Ok(self.counter)
    }

    async fn manager_key(&self, _address: &Address) -> Result<Option<PublicKey>> {
        Ok(self.manager_key.lock().unwrap().clone())
    }

    async fn run_operation(&self, request: &Json) -> Result<Json> {
        self.run_operation_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        (self.simulate)(request)
    }

    async fn inject(&self, signed_hex: &str) -> Result<OperationHash> {
        self.inject_calls.fetch_add(1, Ordering::SeqCst);
        let bytes = hex::decode(signed_hex).map_err(|e| Error::Rpc {
            endpoint: self.endpoint().to_string(),
            status: Some(400),
            message: e.to_string(),
        })?;
        let hash = OperationHash::of_signed_bytes(&bytes);
        if let Some(after) = self.include_after {
            self.injected.lock().unwrap().push((self.head_level() + after, hash));
        }
        self.injected_bytes.lock().unwrap().push(signed_hex.to_string());
        Ok(hash)
    }

    async fn operation_hashes(&self, level: i64) -> Result<Vec<OperationHash>> {
        self.check_reachable()?;
        Ok(self
            .injected
            .lock()
            .unwrap()
            .iter()
            .filter(|(included, _)| *included == level)
            .map(|(_, hash)| *hash)
            .collect())
    }
}
