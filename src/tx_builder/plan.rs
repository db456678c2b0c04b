//! Batch planning and operation order validation
//!
//! A planned batch is:
//! 1. a reveal of the source key, only when it was never revealed
//! 2. the requested transfers and calls, in request order
//!
//! with consecutive counters starting at the source's next counter.

use crate::errors::{Error, Result};
use crate::types::PublicKey;

use super::operation::{Content, Limits, Operation, OperationRequest};

/// Turn `requests` into counter-numbered operations
///
/// Limits are left at zero; they come from simulation.
pub fn plan_batch(
    reveal: Option<PublicKey>,
    requests: Vec<OperationRequest>,
    first_counter: u64,
) -> Result<Vec<Operation>> {
    if requests.is_empty() {
        return Err(Error::invalid_argument("operations", "batch has no operations"));
    }

    let mut operations = Vec::with_capacity(requests.len() + 1);
    let contents = reveal
        .map(|public_key| Content::Reveal { public_key })
        .into_iter()
        .chain(requests.into_iter().map(Content::from));

    for (offset, content) in contents.enumerate() {
        operations.push(Operation {
            content,
            counter: first_counter + offset as u64,
            limits: Limits::default(),
        });
    }
    Ok(operations)
}

/// Check reveal placement and counter continuity (debug builds only)
#[cfg(debug_assertions)]
pub fn sanity_check_op_order(operations: &[Operation]) -> Result<()> {
    let Some(first) = operations.first() else {
        return Err(Error::internal("operation order: batch is empty"));
    };

    if let Some(pos) = operations.iter().skip(1).position(|op| op.content.is_reveal()) {
        return Err(Error::internal(format!(
            "operation order: reveal at position {}, only position 0 allowed",
            pos + 1
        )));
    }
    if operations.iter().all(|op| op.content.is_reveal()) {
        return Err(Error::internal("operation order: batch holds only a reveal"));
    }

    for (offset, op) in operations.iter().enumerate() {
        let expected = first.counter + offset as u64;
        if op.counter != expected {
            return Err(Error::internal(format!(
                "operation order: counter {} at position {}, expected {}",
                op.counter, offset, expected
            )));
        }
    }
    Ok(())
}

#[cfg(not(debug_assertions))]
#[inline]
pub fn sanity_check_op_order(_operations: &[Operation]) -> Result<()> {
    Ok(())
}
