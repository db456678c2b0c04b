//! Protocol limits, minimal fees and limit application
//!
//! Fees follow the baker defaults: a flat 100 mutez, 1 mutez per byte and
//! 0.1 mutez per gas unit (rounded up). The fee is part of the bytes it pays
//! for, so fees are recomputed until the serialised size stops moving.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

use super::forge::{operation_size, BRANCH_SIZE, SIGNATURE_SIZE};
use super::operation::Batch;
use super::simulate::OperationCost;

pub const MINIMAL_FEE_MUTEZ: u64 = 100;
pub const MINIMAL_MUTEZ_PER_BYTE: u64 = 1;
pub const MINIMAL_NANOTEZ_PER_GAS_UNIT: u64 = 100;

/// Storage burn per byte
pub const BURN_MUTEZ_PER_BYTE: u64 = 250;
/// Storage charged for each allocated account or originated contract
pub const ALLOCATION_STORAGE: u64 = 257;

pub const HARD_GAS_LIMIT_PER_OPERATION: u64 = 1_040_000;
/// Block gas cap assumed when none is configured; no lower than any
/// current network's `hard_gas_limit_per_block`
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 1_040_000;
pub const HARD_STORAGE_LIMIT_PER_OPERATION: u64 = 60_000;

const MAX_FEE_ROUNDS: usize = 8;

/// Safety margins added on top of simulated consumption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margins {
    pub gas: u64,
    pub storage: u64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            gas: 100,
            storage: 20,
        }
    }
}

/// Minimal fee accepted by default bakers for an operation of `size` bytes
pub fn minimal_fee(size: usize, gas_limit: u64) -> u64 {
    MINIMAL_FEE_MUTEZ
        + MINIMAL_MUTEZ_PER_BYTE * size as u64
        + (gas_limit * MINIMAL_NANOTEZ_PER_GAS_UNIT).div_ceil(1000)
}

/// Gas limit given to each operation of an `n`-operation batch during
/// simulation, keeping the whole batch within `block_gas_limit`
pub fn simulation_gas_limit(n: usize, block_gas_limit: u64) -> u64 {
    HARD_GAS_LIMIT_PER_OPERATION.min(block_gas_limit / n.max(1) as u64)
}

/// Storage burn in mutez
pub fn burn_fee(storage: u64) -> u64 {
    storage * BURN_MUTEZ_PER_BYTE
}

/// Set every operation's limits from its simulated cost plus `margins`,
/// then the minimal fee consistent with those limits
///
/// The first operation also pays for the branch and the signature.
pub fn apply_limits(batch: &mut Batch, costs: &[OperationCost], margins: Margins) -> Result<()> {
    if costs.len() != batch.len() {
        return Err(Error::internal(format!(
            "simulation returned {} results for {} operations",
            costs.len(),
            batch.len()
        )));
    }

    for (op, cost) in batch.operations.iter_mut().zip(costs) {
        op.limits.gas = (cost.gas + margins.gas).min(HARD_GAS_LIMIT_PER_OPERATION);
        op.limits.storage = (cost.storage + margins.storage).min(HARD_STORAGE_LIMIT_PER_OPERATION);
        op.limits.fee = 0;
    }

    for _ in 0..MAX_FEE_ROUNDS {
        let mut changed = false;
        for i in 0..batch.operations.len() {
            let overhead = if i == 0 { BRANCH_SIZE + SIGNATURE_SIZE } else { 0 };
            let size = operation_size(&batch.source, &batch.operations[i])? + overhead;
            let op = &mut batch.operations[i];
            let fee = minimal_fee(size, op.limits.gas).max(op.limits.fee);
            if fee != op.limits.fee {
                op.limits.fee = fee;
                changed = true;
            }
        }
        if !changed {
            return Ok(());
        }
    }
    Err(Error::internal("fee computation did not stabilise"))
}

/// Reject the batch when its total fee is above `ceiling`
pub fn check_fee_ceiling(batch: &Batch, ceiling: Option<u64>) -> Result<()> {
    match ceiling {
        Some(ceiling) if batch.total_fee() > ceiling => Err(Error::FeeExceedsCeiling {
            fee: batch.total_fee(),
            ceiling,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::operation::{Content, Limits, Operation};
    use crate::types::{Address, AddressKind, BlockHash};

    fn batch(n: usize) -> Batch {
        Batch {
            source: Address::new(AddressKind::Ed25519, [1; 20]),
            branch: BlockHash::from_bytes([0; 32]),
            operations: (0..n)
                .map(|i| Operation {
                    content: Content::Transaction {
                        amount: 5_000_000,
                        destination: Address::new(AddressKind::Ed25519, [2; 20]),
                        parameters: None,
                    },
                    counter: 10 + i as u64,
                    limits: Limits::default(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_minimal_fee() {
        assert_eq!(minimal_fee(0, 0), 100);
        assert_eq!(minimal_fee(200, 1_000), 100 + 200 + 100);
        assert_eq!(minimal_fee(200, 1_001), 100 + 200 + 101);
    }

    #[test]
    fn test_simulation_gas_limit() {
        assert_eq!(simulation_gas_limit(1, DEFAULT_BLOCK_GAS_LIMIT), 1_040_000);
        assert_eq!(simulation_gas_limit(2, DEFAULT_BLOCK_GAS_LIMIT), 520_000);
        assert_eq!(simulation_gas_limit(0, DEFAULT_BLOCK_GAS_LIMIT), 1_040_000);
        assert_eq!(simulation_gas_limit(4, 2_600_000), 650_000);
        assert_eq!(simulation_gas_limit(2, 2_600_000), 1_040_000);
        for n in 1..=8 {
            let limit = simulation_gas_limit(n, DEFAULT_BLOCK_GAS_LIMIT);
            assert!(limit * n as u64 <= DEFAULT_BLOCK_GAS_LIMIT);
        }
    }

    #[test]
    fn test_apply_limits_adds_margins_per_operation() {
        let mut b = batch(2);
        let costs = [
            OperationCost { gas: 1_000, storage: 0 },
            OperationCost { gas: 2_500, storage: 67 },
        ];
        apply_limits(&mut b, &costs, Margins::default()).unwrap();
        assert_eq!(b.operations[0].limits.gas, 1_100);
        assert_eq!(b.operations[0].limits.storage, 20);
        assert_eq!(b.operations[1].limits.gas, 2_600);
        assert_eq!(b.operations[1].limits.storage, 87);
    }

    #[test]
    fn test_fees_are_a_fixpoint() {
        let mut b = batch(2);
        let costs = [OperationCost { gas: 1_451, storage: 0 }; 2];
        apply_limits(&mut b, &costs, Margins::default()).unwrap();

        for (i, op) in b.operations.iter().enumerate() {
            let overhead = if i == 0 { BRANCH_SIZE + SIGNATURE_SIZE } else { 0 };
            let size = operation_size(&b.source, op).unwrap() + overhead;
            assert_eq!(op.limits.fee, minimal_fee(size, op.limits.gas));
        }
        assert!(b.operations[0].limits.fee > b.operations[1].limits.fee);
    }

    #[test]
    fn test_limits_are_capped() {
        let mut b = batch(1);
        let costs = [OperationCost { gas: 2_000_000, storage: 100_000 }];
        apply_limits(&mut b, &costs, Margins::default()).unwrap();
        assert_eq!(b.operations[0].limits.gas, HARD_GAS_LIMIT_PER_OPERATION);
        assert_eq!(b.operations[0].limits.storage, HARD_STORAGE_LIMIT_PER_OPERATION);
    }

    #[test]
    fn test_cost_count_mismatch() {
        let mut b = batch(2);
        assert!(apply_limits(&mut b, &[OperationCost::default()], Margins::default()).is_err());
    }

    #[test]
    fn test_fee_ceiling() {
        let mut b = batch(1);
        b.operations[0].limits.fee = 5_000;
        assert!(check_fee_ceiling(&b, None).is_ok());
        assert!(check_fee_ceiling(&b, Some(5_000)).is_ok());
        match check_fee_ceiling(&b, Some(4_999)) {
            Err(Error::FeeExceedsCeiling { fee, ceiling }) => {
                assert_eq!(fee, 5_000);
                assert_eq!(ceiling, 4_999);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
