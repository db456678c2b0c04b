//! Operation batch building and submission
//!
//! ## Architecture
//!
//! - **operation**: requests, operations, batches and their RPC JSON form
//! - **plan**: counter assignment, reveal placement and order validation
//! - **forge**: binary serialisation, signing digest and operation hash
//! - **simulate**: dry-run request and consumption parsing
//! - **fees**: protocol limits, minimal fees, margins and fee ceiling
//! - **context**: per-submission node/signer state and stage tracking
//! - **output**: signed batches and receipts
//! - **builder**: the [`Submitter`] pipeline
//! - **estimate**: transfer cost estimation with the minimal-amount probe
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tezos_vault::config::SubmissionConfig;
//! use tezos_vault::rpc::HttpNode;
//! use tezos_vault::signer::InMemorySigner;
//! use tezos_vault::tx_builder::{OperationRequest, SubmitOptions, Submitter};
//!
//! # async fn example() -> tezos_vault::Result<()> {
//! let node = Arc::new(HttpNode::new(&Default::default())?);
//! let signer = Arc::new(InMemorySigner::from_secret_key("edsk...")?);
//! let submitter = Submitter::new(node, signer, SubmissionConfig::default());
//!
//! let destination = "tz1KqTpEZ7Yob7QbPE4Hy4Wo8fHG8LhKxZSx".parse()?;
//! let receipt = submitter
//!     .submit(vec![OperationRequest::transfer(destination, 1_000_000)], SubmitOptions::default())
//!     .await?;
//! println!("{}", receipt.operation_hash);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod context;
pub mod estimate;
pub mod fees;
pub mod forge;
pub mod operation;
pub mod output;
pub mod plan;
pub mod simulate;

pub use builder::{FeeCeiling, PreparedBatch, SubmitOptions, Submitter};
pub use context::{BatchContext, Stage};
pub use estimate::{FeeEstimate, FeeEstimator};
pub use fees::Margins;
pub use operation::{Batch, Content, Limits, Operation, OperationRequest, Parameters};
pub use output::{Receipt, SignedBatch};
pub use plan::{plan_batch, sanity_check_op_order};
pub use simulate::OperationCost;
