//! Submission pipeline
//!
//! [`Submitter`] drives one batch through
//! `SourceResolved → Completed → Simulated → LimitsApplied → FeeChecked →
//! Signed → Broadcast`. Any failure aborts the whole batch; nothing reaches
//! the node before the signature covers every operation.
//!
//! Counters are read from the node while completing a batch. Two batches
//! for the same source must not be completed concurrently: callers
//! serialise submissions per signer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::config::SubmissionConfig;
use crate::errors::{Error, Result};
use crate::metrics::{Metrics, Timer};
use crate::observability::{CorrelationId, TraceContext};
use crate::rpc::NodeClient;
use crate::signer::Signer;
use crate::types::{Address, OperationHash};

use super::context::{BatchContext, Stage};
use super::fees::{apply_limits, check_fee_ceiling};
use super::forge::{forge_batch, operation_hash, signed_bytes, signing_digest};
use super::operation::{Batch, OperationRequest};
use super::output::{Receipt, SignedBatch};
use super::plan::{plan_batch, sanity_check_op_order};
use super::simulate::{parse_simulation, run_operation_request, OperationCost};

/// Fee ceiling for one submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeeCeiling {
    /// Use `submission.max_fee` from the configuration
    #[default]
    Configured,
    Limit(u64),
    Unlimited,
}

/// Per-submission overrides of the configured behaviour
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Source account; defaults to the signer's first account
    pub source: Option<Address>,
    pub fee_ceiling: FeeCeiling,
    /// Overrides `submission.wait_for_confirmation`
    pub wait_for_confirmation: Option<bool>,
    /// Caller request id carried into logs and the receipt
    pub correlation_id: Option<CorrelationId>,
}

impl SubmitOptions {
    fn trace(&self, operation: &str) -> TraceContext {
        match &self.correlation_id {
            Some(id) => TraceContext::with_correlation(operation, id.clone()),
            None => TraceContext::new(operation),
        }
    }
}

/// A batch that went through steps 1 to 4
#[derive(Debug)]
pub struct PreparedBatch {
    pub context: BatchContext,
    pub batch: Batch,
    pub costs: Vec<OperationCost>,
}

#[derive(Clone)]
pub struct Submitter {
    node: Arc<dyn NodeClient>,
    signer: Arc<dyn Signer>,
    config: SubmissionConfig,
    metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("node", &self.node.endpoint())
            .field("signer", &self.signer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Submitter {
    pub fn new(
        node: Arc<dyn NodeClient>,
        signer: Arc<dyn Signer>,
        config: SubmissionConfig,
    ) -> Self {
        Self {
            node,
            signer,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn node(&self) -> &Arc<dyn NodeClient> {
        &self.node
    }

    pub fn signer(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    pub(crate) fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_deref()
    }

    /// Step 1: the explicit source if the signer holds its key, else the
    /// signer's first account
    pub fn resolve_source(&self, explicit: Option<Address>) -> Result<Address> {
        let addresses = self.signer.addresses();
        match explicit {
            Some(source) if addresses.contains(&source) => Ok(source),
            Some(source) => Err(Error::Signing(format!("signer holds no key for {}", source))),
            None => addresses
                .first()
                .copied()
                .ok_or_else(|| Error::Signing("signer holds no keys".to_string())),
        }
    }

    /// Step 2: branch, counters and reveal
    #[instrument(skip(self, trace, requests), fields(trace_id = %trace.trace_id()))]
    pub async fn complete(
        &self,
        trace: TraceContext,
        source: Address,
        requests: Vec<OperationRequest>,
    ) -> Result<(BatchContext, Batch)> {
        if requests.is_empty() {
            return Err(Error::invalid_argument("operations", "batch has no operations"));
        }
        let public_key = self.signer.public_key(&source)?;

        let (chain_id, head, counter, manager_key) = tokio::try_join!(
            self.node.chain_id(),
            self.node.head(),
            self.node.counter(&source),
            self.node.manager_key(&source),
        )?;

        let revealed = match manager_key {
            Some(key) if key != public_key => {
                return Err(Error::Signing(format!(
                    "{} is revealed with {}, signer holds {}",
                    source, key, public_key
                )))
            }
            Some(_) => true,
            None => false,
        };

        let reveal = (!revealed).then(|| public_key.clone());
        let operations = plan_batch(reveal, requests, counter + 1)?;
        sanity_check_op_order(&operations)?;

        let batch = Batch {
            source,
            branch: head.hash,
            operations,
        };
        let mut context = BatchContext::new(
            trace,
            chain_id,
            head,
            self.config.ttl,
            source,
            public_key,
            revealed,
        );
        context.advance(Stage::SourceResolved);
        context.advance(Stage::Completed);
        info!(
            source = %source,
            branch = %head.hash,
            level = head.level,
            first_counter = counter + 1,
            operations = batch.len(),
            reveal = !revealed,
            "Batch completed"
        );
        Ok((context, batch))
    }

    /// Step 3: dry-run and per-operation consumption
    #[instrument(
        skip_all,
        fields(trace_id = %context.trace.trace_id(), operations = batch.len())
    )]
    pub async fn simulate(
        &self,
        context: &mut BatchContext,
        batch: &Batch,
    ) -> Result<Vec<OperationCost>> {
        let span = context.trace.child_span("simulate");
        debug!(
            span_id = span.span_id(),
            parent_span_id = ?span.parent_span_id,
            "Simulating batch"
        );
        let request =
            run_operation_request(batch, &context.chain_id, self.config.block_gas_limit)?;
        let response = self.node.run_operation(&request).await?;
        match parse_simulation(&response, batch.len()) {
            Ok(costs) => {
                context.advance(Stage::Simulated);
                Ok(costs)
            }
            Err(err) => {
                if let Error::SimulationFailed { index, cause } = &err {
                    warn!(index, cause = %cause, "Simulation rejected batch");
                    if let Some(metrics) = self.metrics() {
                        metrics.simulations_failed.inc();
                    }
                }
                Err(err)
            }
        }
    }

    /// Step 4: limits from consumption plus margins, then minimal fees
    pub fn apply_limits(
        &self,
        context: &mut BatchContext,
        batch: &mut Batch,
        costs: &[OperationCost],
    ) -> Result<()> {
        apply_limits(batch, costs, self.config.margins())?;
        context.advance(Stage::LimitsApplied);
        Ok(())
    }

    /// Step 5
    pub fn check_fee(
        &self,
        context: &mut BatchContext,
        batch: &Batch,
        ceiling: FeeCeiling,
    ) -> Result<()> {
        let ceiling = match ceiling {
            FeeCeiling::Configured => self.config.max_fee,
            FeeCeiling::Limit(limit) => Some(limit),
            FeeCeiling::Unlimited => None,
        };
        if let Err(err) = check_fee_ceiling(batch, ceiling) {
            warn!(fee = batch.total_fee(), ceiling = ?ceiling, "Fee above ceiling");
            if let Some(metrics) = self.metrics() {
                metrics.fee_ceiling_rejections.inc();
            }
            return Err(err);
        }
        context.advance(Stage::FeeChecked);
        Ok(())
    }

    /// Step 6: forge and sign the whole batch
    pub async fn sign(&self, context: &mut BatchContext, batch: Batch) -> Result<SignedBatch> {
        let forged = forge_batch(&batch)?;
        let digest = signing_digest(&forged);
        let signature = self.signer.sign_digest(&batch.source, &digest).await?;
        let bytes = signed_bytes(&forged, &signature);
        let hash = operation_hash(&bytes);
        context.advance(Stage::Signed);
        Ok(SignedBatch::new(batch, bytes, signature, hash))
    }

    /// Step 7: inject the signed bytes
    #[instrument(
        skip_all,
        fields(trace_id = %context.trace.trace_id(), operation_hash = %signed.operation_hash())
    )]
    pub async fn broadcast(
        &self,
        context: &mut BatchContext,
        signed: &mut SignedBatch,
    ) -> Result<OperationHash> {
        let injected = self.node.inject(&signed.to_hex()).await?;
        signed.mark_broadcast();
        context.advance(Stage::Broadcast);
        if let Some(metrics) = self.metrics() {
            metrics.broadcasts_total.inc();
        }
        if injected != *signed.operation_hash() {
            warn!(node_hash = %injected, "Node reported a different operation hash");
        }
        info!(operation_hash = %injected, fee = signed.batch().total_fee(), "Batch injected");
        Ok(injected)
    }

    /// Steps 1 to 4 under a fresh `submit` trace
    pub async fn prepare(
        &self,
        requests: Vec<OperationRequest>,
        options: &SubmitOptions,
    ) -> Result<PreparedBatch> {
        self.prepare_traced(options.trace("submit"), requests, options)
            .await
    }

    /// Steps 1 to 4 under `trace`, as used by submission and fee estimation
    pub async fn prepare_traced(
        &self,
        trace: TraceContext,
        requests: Vec<OperationRequest>,
        options: &SubmitOptions,
    ) -> Result<PreparedBatch> {
        let source = self.resolve_source(options.source)?;
        let (mut context, mut batch) = self.complete(trace, source, requests).await?;
        let costs = self.simulate(&mut context, &batch).await?;
        self.apply_limits(&mut context, &mut batch, &costs)?;
        Ok(PreparedBatch { context, batch, costs })
    }

    /// Run the full pipeline and return the receipt
    ///
    /// With confirmation waiting enabled, a [`Error::Timeout`] means the
    /// batch was injected but its outcome is unknown: it may still be
    /// included. The timeout carries the operation hash.
    pub async fn submit(
        &self,
        requests: Vec<OperationRequest>,
        options: SubmitOptions,
    ) -> Result<Receipt> {
        let timer = Timer::start();
        if let Some(metrics) = self.metrics() {
            metrics.submissions_total.inc();
        }
        let result = self.run_pipeline(requests, &options, &timer).await;
        match &result {
            Err(Error::Timeout { operation_hash, polls }) => {
                warn!(operation_hash = %operation_hash, polls, "Injected, outcome unknown");
                if let Some(metrics) = self.metrics() {
                    metrics.confirmation_timeouts.inc();
                }
            }
            Err(err) => {
                warn!(category = err.category(), error = %err, "Submission failed");
                if let Some(metrics) = self.metrics() {
                    metrics.submissions_failed.inc();
                }
            }
            Ok(_) => {}
        }
        result
    }

    async fn run_pipeline(
        &self,
        requests: Vec<OperationRequest>,
        options: &SubmitOptions,
        timer: &Timer,
    ) -> Result<Receipt> {
        let prepared = self.prepare(requests, options).await?;
        self.finish(prepared, options, timer).await
    }

    /// Steps 5 to 7, then the optional confirmation wait
    #[instrument(skip_all, fields(trace_id = %prepared.context.trace.trace_id()))]
    async fn finish(
        &self,
        prepared: PreparedBatch,
        options: &SubmitOptions,
        timer: &Timer,
    ) -> Result<Receipt> {
        let PreparedBatch {
            mut context,
            batch,
            costs,
        } = prepared;

        self.check_fee(&mut context, &batch, options.fee_ceiling)?;
        let mut signed = self.sign(&mut context, batch).await?;
        let hash = self.broadcast(&mut context, &mut signed).await?;
        if let Some(metrics) = self.metrics() {
            timer.observe_duration(&metrics.submit_latency);
        }

        let mut receipt = Receipt::new(hash, signed.batch(), &costs, &context.trace);
        let wait = options
            .wait_for_confirmation
            .unwrap_or(self.config.wait_for_confirmation);
        if wait {
            receipt.confirmed_level = Some(self.wait_for_confirmation(&context, &hash).await?);
        }
        Ok(receipt)
    }

    /// Poll until `hash` is included with the configured depth
    ///
    /// Gives up with `Timeout` after `max_poll_cycles` polls, after
    /// `confirmation_deadline_secs`, or once the head passes the batch's
    /// expiry level without inclusion. Node errors while polling only cost
    /// a poll: the operation is already injected, so no other error is
    /// returned from here.
    pub async fn wait_for_confirmation(
        &self,
        context: &BatchContext,
        hash: &OperationHash,
    ) -> Result<i64> {
        let span = context.trace.child_span("confirm");
        debug!(span_id = span.span_id(), operation_hash = %hash, "Waiting for inclusion");
        let deadline = Duration::from_secs(self.config.confirmation_deadline_secs);
        let mut polls = 0u32;
        let outcome =
            tokio::time::timeout(deadline, self.poll_inclusion(context, hash, &mut polls)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation_hash: hash.to_string(),
                polls,
            }),
        }
    }

    async fn poll_inclusion(
        &self,
        context: &BatchContext,
        hash: &OperationHash,
        polls: &mut u32,
    ) -> Result<i64> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let depth = self.config.confirmations.max(1) as i64;
        let mut next_level = context.branch.level + 1;
        let mut included_at = None;

        loop {
            if *polls >= self.config.max_poll_cycles {
                return Err(Error::Timeout {
                    operation_hash: hash.to_string(),
                    polls: *polls,
                });
            }
            *polls += 1;

            let head = match self.node.head().await {
                Ok(head) => head,
                Err(err) => {
                    warn!(
                        operation_hash = %hash,
                        poll = *polls,
                        error = %err,
                        "Head unavailable"
                    );
                    tokio::time::sleep(interval).await;
                    continue;
                }
            };
            while included_at.is_none() && next_level <= head.level {
                match self.node.operation_hashes(next_level).await {
                    Ok(hashes) => {
                        if hashes.contains(hash) {
                            info!(
                                operation_hash = %hash,
                                level = next_level,
                                "Operation included"
                            );
                            included_at = Some(next_level);
                        }
                        next_level += 1;
                    }
                    Err(err) => {
                        warn!(level = next_level, error = %err, "Block operations unavailable");
                        break;
                    }
                }
            }

            match included_at {
                Some(level) if head.level - level + 1 >= depth => return Ok(level),
                None if head.level > context.expires_at_level() => {
                    warn!(
                        operation_hash = %hash,
                        level = head.level,
                        "Batch expired without inclusion"
                    );
                    return Err(Error::Timeout {
                        operation_hash: hash.to_string(),
                        polls: *polls,
                    });
                }
                _ => {}
            }
            tokio::time::sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        applied_response, bootstrap1_signer, sample_address, sample_contract, MockNode,
    };
    use crate::tx_builder::fees::minimal_fee;
    use crate::tx_builder::forge::{operation_size, BRANCH_SIZE, SIGNATURE_SIZE};
    use crate::tx_builder::operation::Content;
    use crate::contracts::ContractCall;
    use crate::micheline::Node;
    use serde_json::json;

    fn submitter(node: Arc<MockNode>, config: SubmissionConfig) -> Submitter {
        Submitter::new(node, Arc::new(bootstrap1_signer()), config)
    }

    fn call(entrypoint: &str, value: i64) -> OperationRequest {
        ContractCall::new(entrypoint, Node::Seq(vec![Node::int(value)]), sample_contract(1)).into()
    }

    #[tokio::test]
    async fn test_two_calls_get_independent_margins() {
        let node = MockNode::new()
            .with_simulation(|request| {
                let mut response = applied_response(request, 0, 0);
                let results = [("2500000", "67"), ("3100001", "0")];
                let contents = response["contents"].as_array_mut().unwrap();
                for (op, (gas, storage)) in contents.iter_mut().zip(results) {
                    op["metadata"]["operation_result"]["consumed_milligas"] = json!(gas);
                    op["metadata"]["operation_result"]["paid_storage_size_diff"] = json!(storage);
                }
                Ok(response)
            })
            .into_arc();
        let submitter = submitter(node.clone(), SubmissionConfig::default());

        let prepared = submitter
            .prepare(
                vec![call("mint_editions", 1), call("burn_editions", 2)],
                &SubmitOptions::default(),
            )
            .await
            .unwrap();

        let ops = &prepared.batch.operations;
        assert_eq!(ops.len(), 2);
        assert_eq!((ops[0].limits.gas, ops[0].limits.storage), (2_500 + 100, 67 + 20));
        assert_eq!((ops[1].limits.gas, ops[1].limits.storage), (3_101 + 100, 20));
        assert_eq!(ops[0].counter, 42);
        assert_eq!(ops[1].counter, 43);

        let size = operation_size(&prepared.batch.source, &ops[1]).unwrap();
        assert_eq!(ops[1].limits.fee, minimal_fee(size, ops[1].limits.gas));
        let size =
            operation_size(&prepared.batch.source, &ops[0]).unwrap() + BRANCH_SIZE + SIGNATURE_SIZE;
        assert_eq!(ops[0].limits.fee, minimal_fee(size, ops[0].limits.gas));
        assert_eq!(
            prepared.context.stages(),
            &[
                Stage::Building,
                Stage::SourceResolved,
                Stage::Completed,
                Stage::Simulated,
                Stage::LimitsApplied,
            ]
        );
        assert_eq!(prepared.context.trace.operation, "submit");
        assert_eq!(node.inject_count(), 0);
    }

    #[tokio::test]
    async fn test_prepare_traced_keeps_callers_trace() {
        let node = MockNode::new().into_arc();
        let submitter = submitter(node, SubmissionConfig::default());
        let parent = TraceContext::new("estimate");
        let retry = parent.child_span("estimate_retry");

        let prepared = submitter
            .prepare_traced(
                retry,
                vec![OperationRequest::transfer(sample_address(1), 1)],
                &SubmitOptions::default(),
            )
            .await
            .unwrap();

        let trace = &prepared.context.trace;
        assert_eq!(trace.operation, "estimate_retry");
        assert_eq!(trace.trace_id(), parent.trace_id());
        assert_eq!(trace.parent_span_id.as_deref(), Some(parent.span_id()));
    }

    #[tokio::test]
    async fn test_fee_ceiling_blocks_broadcast() {
        let node = MockNode::new().into_arc();
        let metrics = Arc::new(Metrics::new().unwrap());
        let submitter =
            submitter(node.clone(), SubmissionConfig::default()).with_metrics(metrics.clone());

        let options = SubmitOptions {
            fee_ceiling: FeeCeiling::Limit(10),
            ..Default::default()
        };
        let result = submitter
            .submit(vec![OperationRequest::transfer(sample_address(1), 5_000)], options)
            .await;
        match result {
            Err(Error::FeeExceedsCeiling { fee, ceiling }) => {
                assert!(fee > 10);
                assert_eq!(ceiling, 10);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(node.run_operation_count(), 1);
        assert_eq!(node.inject_count(), 0);
        assert_eq!(metrics.fee_ceiling_rejections.get(), 1);
        assert_eq!(metrics.submissions_failed.get(), 1);
    }

    #[tokio::test]
    async fn test_submit_injects_signed_batch() {
        let node = MockNode::new().into_arc();
        let submitter = submitter(node.clone(), SubmissionConfig::default());

        let receipt = submitter
            .submit(
                vec![OperationRequest::transfer(sample_address(2), 1_000_000)],
                SubmitOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(node.inject_count(), 1);
        let injected = node.injected_bytes.lock().unwrap()[0].clone();
        let bytes = hex::decode(injected).unwrap();
        assert_eq!(receipt.operation_hash, OperationHash::of_signed_bytes(&bytes));
        assert_eq!(receipt.operations, 1);
        assert!(!receipt.revealed_key);
        assert!(receipt.fee > 0);
        assert_eq!(receipt.confirmed_level, None);
    }

    #[tokio::test]
    async fn test_caller_correlation_reaches_receipt() {
        let node = MockNode::new().into_arc();
        let submitter = submitter(node, SubmissionConfig::default());
        let options = SubmitOptions {
            correlation_id: Some("order-17".into()),
            ..Default::default()
        };

        let receipt = submitter
            .submit(vec![OperationRequest::transfer(sample_address(2), 1)], options)
            .await
            .unwrap();
        assert_eq!(receipt.correlation_id, "order-17");
        assert!(!receipt.trace_id.is_empty());
    }

    #[tokio::test]
    async fn test_unrevealed_source_gets_reveal_first() {
        let node = MockNode::new().unrevealed().into_arc();
        let submitter = submitter(node.clone(), SubmissionConfig::default());

        let receipt = submitter
            .submit(vec![call("burn_editions", 3)], SubmitOptions::default())
            .await
            .unwrap();
        assert!(receipt.revealed_key);
        assert_eq!(receipt.operations, 2);

        let request = node.requests.lock().unwrap()[0].clone();
        let contents = request["operation"]["contents"].as_array().unwrap();
        assert_eq!(contents[0]["kind"], "reveal");
        assert_eq!(contents[0]["counter"], "42");
        assert_eq!(contents[1]["kind"], "transaction");
        assert_eq!(contents[1]["counter"], "43");
    }

    #[tokio::test]
    async fn test_simulation_failure_aborts_batch() {
        let node = MockNode::new()
            .with_simulation(|_| {
                Ok(json!({ "contents": [{ "metadata": { "operation_result": {
                    "status": "failed",
                    "errors": [{ "id": "proto.alpha.michelson_v1.script_rejected" }]
                } } }] }))
            })
            .into_arc();
        let submitter = submitter(node.clone(), SubmissionConfig::default());

        let err = submitter
            .submit(vec![call("mint_editions", 1)], SubmitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SimulationFailed { index: 0, .. }));
        assert_eq!(node.inject_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_source_is_rejected_before_node_calls() {
        let node = MockNode::new().into_arc();
        let submitter = submitter(node.clone(), SubmissionConfig::default());
        let options = SubmitOptions {
            source: Some(sample_address(9)),
            ..Default::default()
        };
        let err = submitter
            .submit(vec![OperationRequest::transfer(sample_address(2), 1)], options)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
        assert_eq!(node.head_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_revealed_key_mismatch() {
        let other = crate::signer::InMemorySigner::from_seed(&[1; 32]).unwrap();
        let node = MockNode::new();
        *node.manager_key.lock().unwrap() = Some(other.public_key(other.address()).unwrap());
        let submitter = submitter(node.into_arc(), SubmissionConfig::default());
        let err = submitter
            .prepare(
                vec![OperationRequest::transfer(sample_address(2), 1)],
                &SubmitOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_confirmation_depth() {
        let mut node = MockNode::new();
        node.blocks_per_poll = 1;
        node.include_after = Some(1);
        let node = node.into_arc();
        let config = SubmissionConfig {
            wait_for_confirmation: true,
            confirmations: 2,
            ..Default::default()
        };
        let submitter = submitter(node.clone(), config);

        let receipt = submitter
            .submit(
                vec![OperationRequest::transfer(sample_address(3), 10)],
                SubmitOptions::default(),
            )
            .await
            .unwrap();
        let level = receipt.confirmed_level.unwrap();
        assert!(node.head_level() >= level + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_timeout_after_max_polls() {
        let mut node = MockNode::new();
        node.include_after = None;
        node.blocks_per_poll = 0;
        let node = node.into_arc();
        let config = SubmissionConfig {
            max_poll_cycles: 3,
            ..Default::default()
        };
        let submitter = submitter(node.clone(), config);

        let options = SubmitOptions {
            wait_for_confirmation: Some(true),
            ..Default::default()
        };
        let err = submitter
            .submit(vec![OperationRequest::transfer(sample_address(3), 10)], options)
            .await
            .unwrap_err();
        match err {
            Error::Timeout { polls, .. } => assert_eq!(polls, 3),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(node.inject_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_errors_after_injection_end_in_timeout() {
        let mut node = MockNode::new();
        node.unreachable_after_inject = true;
        let node = node.into_arc();
        let metrics = Arc::new(Metrics::new().unwrap());
        let config = SubmissionConfig {
            max_poll_cycles: 3,
            ..Default::default()
        };
        let submitter = submitter(node.clone(), config).with_metrics(metrics.clone());
        let options = SubmitOptions {
            wait_for_confirmation: Some(true),
            ..Default::default()
        };

        let err = submitter
            .submit(vec![OperationRequest::transfer(sample_address(3), 10)], options)
            .await
            .unwrap_err();

        let injected = node.injected_bytes.lock().unwrap()[0].clone();
        let expected = OperationHash::of_signed_bytes(&hex::decode(injected).unwrap());
        match err {
            Error::Timeout {
                operation_hash,
                polls,
            } => {
                assert_eq!(operation_hash, expected.to_string());
                assert_eq!(polls, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(node.inject_count(), 1);
        assert_eq!(metrics.submissions_failed.get(), 0);
        assert_eq!(metrics.confirmation_timeouts.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_stops_at_expiry() {
        let mut node = MockNode::new();
        node.include_after = None;
        node.blocks_per_poll = 50;
        let node = node.into_arc();
        let config = SubmissionConfig {
            wait_for_confirmation: true,
            ttl: 60,
            ..Default::default()
        };
        let submitter = submitter(node.clone(), config);

        let err = submitter
            .submit(
                vec![OperationRequest::transfer(sample_address(3), 10)],
                SubmitOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(node.head_calls.load(std::sync::atomic::Ordering::SeqCst) < 10);
    }

    #[test]
    fn test_resolve_source_defaults_to_signer() {
        let signer = bootstrap1_signer();
        let expected = *signer.address();
        let submitter = Submitter::new(
            MockNode::new().into_arc(),
            Arc::new(signer),
            SubmissionConfig::default(),
        );
        assert_eq!(submitter.resolve_source(None).unwrap(), expected);
        assert_eq!(submitter.resolve_source(Some(expected)).unwrap(), expected);
    }

    #[test]
    fn test_plan_uses_transaction_content() {
        let content = Content::from(call("mint_editions", 1));
        assert_eq!(content.kind(), "transaction");
    }
}
