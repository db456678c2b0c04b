//! Operations, batches and limits
//!
//! A batch is built once: requests are planned into operations, the
//! pipeline fills in counters, limits and fees, and the batch is signed and
//! broadcast exactly once.

use serde_json::{json, Value as Json};

use crate::contracts::ContractCall;
use crate::micheline::Node;
use crate::types::{Address, BlockHash, PublicKey};

/// What a caller asks to submit, before any protocol bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    /// Plain tez transfer, amount in mutez
    Transfer { destination: Address, amount: u64 },
    /// Entrypoint invocation
    Call(ContractCall),
}

impl OperationRequest {
    pub fn transfer(destination: Address, amount: u64) -> Self {
        Self::Transfer {
            destination,
            amount,
        }
    }
}

impl From<ContractCall> for OperationRequest {
    fn from(call: ContractCall) -> Self {
        Self::Call(call)
    }
}

/// Gas, storage and fee of one operation
///
/// All zero until the batch has been simulated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    pub gas: u64,
    pub storage: u64,
    /// Fee in mutez
    pub fee: u64,
}

/// Entrypoint and argument of a contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    pub entrypoint: String,
    pub value: Node,
}

/// Operation payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Reveal {
        public_key: PublicKey,
    },
    Transaction {
        amount: u64,
        destination: Address,
        parameters: Option<Parameters>,
    },
}

impl Content {
    pub fn kind(&self) -> &'static str {
        match self {
            Content::Reveal { .. } => "reveal",
            Content::Transaction { .. } => "transaction",
        }
    }

    pub fn is_reveal(&self) -> bool {
        matches!(self, Content::Reveal { .. })
    }
}

impl From<OperationRequest> for Content {
    fn from(request: OperationRequest) -> Self {
        match request {
            OperationRequest::Transfer {
                destination,
                amount,
            } => Content::Transaction {
                amount,
                destination,
                parameters: None,
            },
            OperationRequest::Call(call) => Content::Transaction {
                amount: 0,
                destination: *call.destination(),
                parameters: Some(Parameters {
                    entrypoint: call.entrypoint().to_string(),
                    value: call.parameter().clone(),
                }),
            },
        }
    }
}

/// One manager operation of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub content: Content,
    pub counter: u64,
    pub limits: Limits,
}

impl Operation {
    /// JSON contents entry as the node RPC expects it
    pub fn to_json(&self, source: &Address) -> Json {
        let mut entry = json!({
            "kind": self.content.kind(),
            "source": source.to_string(),
            "fee": self.limits.fee.to_string(),
            "counter": self.counter.to_string(),
            "gas_limit": self.limits.gas.to_string(),
            "storage_limit": self.limits.storage.to_string(),
        });
        match &self.content {
            Content::Reveal { public_key } => {
                entry["public_key"] = json!(public_key.to_string());
            }
            Content::Transaction {
                amount,
                destination,
                parameters,
            } => {
                entry["amount"] = json!(amount.to_string());
                entry["destination"] = json!(destination.to_string());
                if let Some(params) = parameters {
                    entry["parameters"] = json!({
                        "entrypoint": params.entrypoint,
                        "value": params.value.to_json(),
                    });
                }
            }
        }
        entry
    }
}

/// Operations sharing one source, branch and counter sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub source: Address,
    pub branch: BlockHash,
    pub operations: Vec<Operation>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Sum of operation fees
    pub fn total_fee(&self) -> u64 {
        self.operations.iter().map(|op| op.limits.fee).sum()
    }

    pub fn total_gas(&self) -> u64 {
        self.operations.iter().map(|op| op.limits.gas).sum()
    }

    pub fn total_storage(&self) -> u64 {
        self.operations.iter().map(|op| op.limits.storage).sum()
    }

    pub fn has_reveal(&self) -> bool {
        self.operations.iter().any(|op| op.content.is_reveal())
    }

    /// Unsigned JSON form: `{ branch, contents }`
    pub fn to_json(&self) -> Json {
        json!({
            "branch": self.branch.to_string(),
            "contents": self
                .operations
                .iter()
                .map(|op| op.to_json(&self.source))
                .collect::<Vec<_>>(),
        })
    }
}
