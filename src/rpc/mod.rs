//! Node RPC interface
//!
//! The submission pipeline only talks to a node through [`NodeClient`], so
//! tests can script a node and production uses [`HttpNode`].

pub mod http;

use async_trait::async_trait;
use serde_json::Value as Json;

use crate::errors::Result;
use crate::types::{Address, BlockHash, ChainId, OperationHash, PublicKey};

pub use http::HttpNode;

/// Head block identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub hash: BlockHash,
    pub level: i64,
}

/// Operations a submission needs from a node
#[async_trait]
pub trait NodeClient: Send + Sync + std::fmt::Debug {
    /// Endpoint description for error reports
    fn endpoint(&self) -> &str;

    async fn chain_id(&self) -> Result<ChainId>;

    /// Current head, used as branch and for confirmation polling
    async fn head(&self) -> Result<BlockHeader>;

    /// Last counter used by `address`
    async fn counter(&self, address: &Address) -> Result<u64>;

    /// Revealed key of `address`, `None` when never revealed
    async fn manager_key(&self, address: &Address) -> Result<Option<PublicKey>>;

    /// Dry-run a signed-shaped operation; returns the raw result JSON
    async fn run_operation(&self, request: &Json) -> Result<Json>;

    /// Inject signed bytes (hex) and return the node-assigned hash
    async fn inject(&self, signed_hex: &str) -> Result<OperationHash>;

    /// Hashes of every operation included at `level`
    async fn operation_hashes(&self, level: i64) -> Result<Vec<OperationHash>>;
}
