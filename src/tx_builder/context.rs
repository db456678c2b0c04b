//! Per-submission context
//!
//! Holds what the pipeline learned about the node and the signer while
//! completing a batch, plus the stage the submission has reached.

use std::fmt;

use tracing::debug;

use crate::observability::TraceContext;
use crate::rpc::BlockHeader;
use crate::types::{Address, ChainId, PublicKey};

/// Pipeline stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Building,
    SourceResolved,
    Completed,
    Simulated,
    LimitsApplied,
    FeeChecked,
    Signed,
    Broadcast,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Building => "building",
            Stage::SourceResolved => "source_resolved",
            Stage::Completed => "completed",
            Stage::Simulated => "simulated",
            Stage::LimitsApplied => "limits_applied",
            Stage::FeeChecked => "fee_checked",
            Stage::Signed => "signed",
            Stage::Broadcast => "broadcast",
        };
        f.write_str(name)
    }
}

/// Node and signer state a batch was completed against
///
/// The batch's branch is `branch.hash`; it stays valid until the head
/// passes [`expires_at_level`](Self::expires_at_level).
#[derive(Clone)]
pub struct BatchContext {
    pub trace: TraceContext,
    pub chain_id: ChainId,
    pub branch: BlockHeader,
    pub ttl: u64,
    pub source: Address,
    pub public_key: PublicKey,
    /// Whether the source's key was already revealed before this batch
    pub revealed: bool,
    stages: Vec<Stage>,
}

impl fmt::Debug for BatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchContext")
            .field("stage", &self.stage())
            .field("chain_id", &self.chain_id.to_string())
            .field("branch", &format!("{}@{}", self.branch.hash, self.branch.level))
            .field("ttl", &self.ttl)
            .field("source", &self.source.to_string())
            .field("revealed", &self.revealed)
            .field(
                "trace_context",
                &format!("trace_id={}, span_id={}", self.trace.trace_id(), self.trace.span_id()),
            )
            .finish()
    }
}

impl BatchContext {
    /// Context of a batch still being built; the caller advances it through
    /// source resolution and completion
    pub fn new(
        trace: TraceContext,
        chain_id: ChainId,
        branch: BlockHeader,
        ttl: u64,
        source: Address,
        public_key: PublicKey,
        revealed: bool,
    ) -> Self {
        Self {
            trace,
            chain_id,
            branch,
            ttl,
            source,
            public_key,
            revealed,
            stages: vec![Stage::Building],
        }
    }

    pub fn stage(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Building)
    }

    /// Every stage reached so far, in order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Record that the submission reached `stage`; stages never go backwards
    pub fn advance(&mut self, stage: Stage) {
        let current = self.stage();
        if stage <= current {
            return;
        }
        debug!(
            trace_id = %self.trace.trace_id(),
            operation = %self.trace.operation,
            from = %current,
            to = %stage,
            "Submission stage"
        );
        self.stages.push(stage);
    }

    /// Last head level at which the batch can still be included
    pub fn expires_at_level(&self) -> i64 {
        self.branch.level.saturating_add(self.ttl as i64)
    }
}
