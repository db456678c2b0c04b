//! tezos-vault - Tezos contract-call encoding and operation submission
//!
//! Typed Micheline parameters for deployed contract versions, plus a
//! staged pipeline that simulates, limits, signs and injects operation
//! batches against a Tezos node.

pub mod config;
pub mod contracts;
pub mod convert;
pub mod errors;
pub mod metrics;
pub mod micheline;
pub mod observability;
pub mod rpc;
pub mod schema;
pub mod signer;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod tx_builder;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use contracts::{Contract, ContractCall, ContractRegistry};
pub use errors::{Error, Result};
pub use micheline::Node;
pub use signer::{InMemorySigner, Signer};
pub use tx_builder::{Receipt, SubmitOptions, Submitter};
pub use types::{Address, ChainId, OperationHash, PublicKey, Signature};
pub use wallet::Wallet;
