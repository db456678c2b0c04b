//! Signed batches and submission receipts

use serde::Serialize;
use tracing::warn;

use crate::observability::TraceContext;
use crate::types::{OperationHash, Signature};

use super::fees::burn_fee;
use super::operation::Batch;
use super::simulate::OperationCost;

/// A batch with its signature, ready for injection
///
/// Dropping one that was never broadcast is logged: the counters it used
/// stay free, but the caller most likely lost a submission.
pub struct SignedBatch {
    batch: Batch,
    bytes: Vec<u8>,
    signature: Signature,
    hash: OperationHash,
    broadcast: bool,
}

impl SignedBatch {
    pub(crate) fn new(
        batch: Batch,
        bytes: Vec<u8>,
        signature: Signature,
        hash: OperationHash,
    ) -> Self {
        Self {
            batch,
            bytes,
            signature,
            hash,
            broadcast: false,
        }
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Forged bytes followed by the signature
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Hash computed locally from the signed bytes
    pub fn operation_hash(&self) -> &OperationHash {
        &self.hash
    }

    pub(crate) fn mark_broadcast(&mut self) {
        self.broadcast = true;
    }
}

impl std::fmt::Debug for SignedBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedBatch")
            .field("operation_hash", &self.hash.to_string())
            .field("operations", &self.batch.len())
            .field("size", &self.bytes.len())
            .field("broadcast", &self.broadcast)
            .finish()
    }
}

impl Drop for SignedBatch {
    fn drop(&mut self) {
        if !self.broadcast {
            warn!(
                operation_hash = %self.hash,
                source = %self.batch.source,
                drop_source = "SignedBatch",
                "Signed batch dropped without broadcast"
            );
        }
    }
}

/// Outcome of a broadcast submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub operation_hash: OperationHash,
    /// Total fee in mutez
    pub fee: u64,
    pub gas_limit: u64,
    pub storage_limit: u64,
    /// Storage burn of the simulated consumption, in mutez
    pub burn: u64,
    pub operations: usize,
    /// Whether the batch carried a reveal of the source key
    pub revealed_key: bool,
    /// Level the operation was included at, when confirmation was awaited
    pub confirmed_level: Option<i64>,
    pub trace_id: String,
    pub correlation_id: String,
}

impl Receipt {
    pub(crate) fn new(
        hash: OperationHash,
        batch: &Batch,
        costs: &[OperationCost],
        trace: &TraceContext,
    ) -> Self {
        Self {
            operation_hash: hash,
            fee: batch.total_fee(),
            gas_limit: batch.total_gas(),
            storage_limit: batch.total_storage(),
            burn: burn_fee(costs.iter().map(|c| c.storage).sum()),
            operations: batch.len(),
            revealed_key: batch.has_reveal(),
            confirmed_level: None,
            trace_id: trace.trace_id().to_string(),
            correlation_id: trace.correlation_id().as_str().to_string(),
        }
    }
}
