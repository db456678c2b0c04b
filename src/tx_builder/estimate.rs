//! Plain transfer cost estimation
//!
//! Runs the pipeline up to fee computation without signing. When the
//! requested amounts make simulation fail (usually a balance that cannot
//! also cover the fee), the batch is simulated once more with 1 mutez per
//! transfer and a fixed buffer is added to the resulting fee.

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::{Error, Result};
use crate::observability::TraceContext;
use crate::types::Address;

use super::builder::{PreparedBatch, SubmitOptions, Submitter};
use super::fees::burn_fee;
use super::operation::OperationRequest;

/// Smallest representable positive amount, in mutez
pub const PROBE_AMOUNT: u64 = 1;

/// Estimated cost of a batch of transfers, in mutez
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeEstimate {
    /// Baker fees, probe buffer included when `probed`
    pub fee: u64,
    /// Storage burn for allocations and paid storage
    pub burn: u64,
    pub gas: u64,
    pub storage: u64,
    /// Whether the estimate comes from the minimal-amount probe
    pub probed: bool,
}

impl FeeEstimate {
    pub fn total(&self) -> u64 {
        self.fee + self.burn
    }

    fn from_prepared(prepared: &PreparedBatch, buffer: u64, probed: bool) -> Self {
        let storage = prepared.costs.iter().map(|c| c.storage).sum();
        Self {
            fee: prepared.batch.total_fee() + buffer,
            burn: burn_fee(storage),
            gas: prepared.batch.total_gas(),
            storage,
            probed,
        }
    }
}

/// Estimates transfer costs through a [`Submitter`]
#[derive(Debug, Clone)]
pub struct FeeEstimator {
    submitter: Submitter,
}

impl FeeEstimator {
    pub fn new(submitter: Submitter) -> Self {
        Self { submitter }
    }

    /// Cost of sending each `(destination, amount)` pair in one batch
    pub async fn estimate(
        &self,
        transfers: &[(Address, u64)],
        source: Option<Address>,
    ) -> Result<FeeEstimate> {
        let options = SubmitOptions {
            source,
            ..Default::default()
        };
        let requests = transfers
            .iter()
            .map(|(destination, amount)| OperationRequest::transfer(*destination, *amount))
            .collect();

        let trace = TraceContext::new("estimate");
        let attempt = self
            .submitter
            .prepare_traced(trace.clone(), requests, &options)
            .await;
        match attempt {
            Ok(prepared) => {
                let estimate = FeeEstimate::from_prepared(&prepared, 0, false);
                info!(fee = estimate.fee, burn = estimate.burn, "Transfer cost estimated");
                Ok(estimate)
            }
            Err(Error::SimulationFailed { index, cause }) => {
                warn!(index, cause = %cause, "Estimating with minimal amounts");
                if let Some(metrics) = self.submitter.metrics() {
                    metrics.probe_retries.inc();
                }
                let probes = transfers
                    .iter()
                    .map(|(destination, _)| OperationRequest::transfer(*destination, PROBE_AMOUNT))
                    .collect();
                let retry = trace.child_span("estimate_retry");
                let prepared = self
                    .submitter
                    .prepare_traced(retry, probes, &options)
                    .await?;
                let buffer = self.submitter.config().probe_fee_buffer;
                let estimate = FeeEstimate::from_prepared(&prepared, buffer, true);
                info!(fee = estimate.fee, burn = estimate.burn, "Transfer cost estimated by probe");
                Ok(estimate)
            }
            Err(err) => Err(err),
        }
    }
}
