//! Dry-run request construction and result parsing
//!
//! The batch is simulated with generous limits, a zero fee and a dummy
//! signature. Consumption is read back per operation, internal operations
//! included; any non-applied status rejects the whole batch.

use serde::Deserialize;
use serde_json::{json, Value as Json};

use crate::errors::{Error, Result};
use crate::types::{ChainId, Signature, SignatureKind};

use super::fees::{simulation_gas_limit, ALLOCATION_STORAGE, HARD_STORAGE_LIMIT_PER_OPERATION};
use super::forge::SIGNATURE_SIZE;
use super::operation::{Batch, Limits};

/// Simulated consumption of one operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationCost {
    /// Gas units (milligas rounded up)
    pub gas: u64,
    /// Bytes of storage paid, allocations included
    pub storage: u64,
}

/// Copy of `batch` with the limits used for simulation
pub fn with_simulation_limits(batch: &Batch, block_gas_limit: u64) -> Batch {
    let gas = simulation_gas_limit(batch.len(), block_gas_limit);
    let mut sim = batch.clone();
    for op in &mut sim.operations {
        op.limits = Limits {
            gas,
            storage: HARD_STORAGE_LIMIT_PER_OPERATION,
            fee: 0,
        };
    }
    sim
}

/// `run_operation` request body
pub fn run_operation_request(
    batch: &Batch,
    chain_id: &ChainId,
    block_gas_limit: u64,
) -> Result<Json> {
    let dummy = Signature::from_raw(SignatureKind::Generic, &[0u8; SIGNATURE_SIZE])?;
    let mut operation = with_simulation_limits(batch, block_gas_limit).to_json();
    operation["signature"] = json!(dummy.to_string());
    Ok(json!({
        "operation": operation,
        "chain_id": chain_id.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct RunOperationResponse {
    #[serde(default)]
    contents: Vec<ContentResult>,
}

#[derive(Debug, Deserialize)]
struct ContentResult {
    metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    operation_result: Option<OperationResult>,
    #[serde(default)]
    internal_operation_results: Vec<InternalResult>,
}

#[derive(Debug, Deserialize)]
struct InternalResult {
    result: OperationResult,
}

#[derive(Debug, Deserialize)]
struct OperationResult {
    status: String,
    consumed_milligas: Option<String>,
    paid_storage_size_diff: Option<String>,
    #[serde(default)]
    allocated_destination_contract: bool,
    #[serde(default)]
    originated_contracts: Vec<String>,
    #[serde(default)]
    errors: Vec<Json>,
}

impl OperationResult {
    fn is_applied(&self) -> bool {
        self.status == "applied"
    }

    fn milligas(&self) -> Result<u64> {
        parse_counter_field(self.consumed_milligas.as_deref(), "consumed_milligas")
    }

    fn storage(&self) -> Result<u64> {
        let paid = parse_counter_field(
            self.paid_storage_size_diff.as_deref(),
            "paid_storage_size_diff",
        )?;
        let allocations =
            self.originated_contracts.len() as u64 + u64::from(self.allocated_destination_contract);
        Ok(paid + allocations * ALLOCATION_STORAGE)
    }

    fn cause(&self) -> String {
        if self.errors.is_empty() {
            return self.status.clone();
        }
        self.errors
            .iter()
            .map(|e| {
                e.get("id")
                    .and_then(Json::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| e.to_string())
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn parse_counter_field(raw: Option<&str>, name: &str) -> Result<u64> {
    match raw {
        None => Ok(0),
        Some(text) => text
            .parse()
            .map_err(|_| Error::internal(format!("bad {} in simulation result: {:?}", name, text))),
    }
}

/// Per-operation costs from a `run_operation` response
///
/// Fails with `SimulationFailed` on the first operation (in batch order)
/// whose own or internal results are not applied. Failed results are
/// preferred over the backtracked/skipped ones they cause.
pub fn parse_simulation(response: &Json, expected: usize) -> Result<Vec<OperationCost>> {
    let parsed: RunOperationResponse = serde_json::from_value(response.clone())
        .map_err(|e| Error::internal(format!("unexpected simulation response: {}", e)))?;

    if parsed.contents.len() != expected {
        return Err(Error::internal(format!(
            "simulation returned {} results for {} operations",
            parsed.contents.len(),
            expected
        )));
    }

    let mut results = Vec::with_capacity(expected);
    for (index, content) in parsed.contents.iter().enumerate() {
        let metadata = content
            .metadata
            .as_ref()
            .ok_or_else(|| Error::internal(format!("operation {} has no metadata", index)))?;
        let main = metadata
            .operation_result
            .as_ref()
            .ok_or_else(|| Error::internal(format!("operation {} has no result", index)))?;
        let all: Vec<&OperationResult> = std::iter::once(main)
            .chain(metadata.internal_operation_results.iter().map(|r| &r.result))
            .collect();
        results.push((index, all));
    }

    let failed = results
        .iter()
        .flat_map(|(index, all)| all.iter().map(move |r| (*index, *r)))
        .filter(|(_, r)| !r.is_applied());
    let mut first_failure = None;
    for (index, result) in failed {
        if result.status == "failed" {
            first_failure = Some((index, result));
            break;
        }
        first_failure.get_or_insert((index, result));
    }
    if let Some((index, result)) = first_failure {
        return Err(Error::simulation_failed(index, result.cause()));
    }

    results
        .into_iter()
        .map(|(_, all)| {
            let mut milligas = 0u64;
            let mut storage = 0u64;
            for result in all {
                milligas += result.milligas()?;
                storage += result.storage()?;
            }
            Ok(OperationCost {
                gas: milligas.div_ceil(1000),
                storage,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::fees::DEFAULT_BLOCK_GAS_LIMIT;
    use crate::tx_builder::operation::{Content, Operation};
    use crate::types::{Address, AddressKind, BlockHash};

    fn applied(milligas: &str, paid: &str) -> Json {
        json!({
            "status": "applied",
            "consumed_milligas": milligas,
            "paid_storage_size_diff": paid
        })
    }

    #[test]
    fn test_costs_include_internal_operations() {
        let response = json!({ "contents": [
            { "kind": "reveal", "metadata": {
                "operation_result": { "status": "applied", "consumed_milligas": "1000" }
            } },
            { "kind": "transaction", "metadata": {
                "operation_result": applied("2100500", "67"),
                "internal_operation_results": [
                    { "kind": "transaction", "result": {
                        "status": "applied",
                        "consumed_milligas": "100000",
                        "allocated_destination_contract": true
                    } }
                ]
            } }
        ] });
        let costs = parse_simulation(&response, 2).unwrap();
        assert_eq!(costs[0], OperationCost { gas: 1, storage: 0 });
        assert_eq!(costs[1], OperationCost { gas: 2_201, storage: 67 + 257 });
    }

    #[test]
    fn test_failure_reports_index_and_cause() {
        let response = json!({ "contents": [
            { "metadata": {
                "operation_result": { "status": "backtracked", "consumed_milligas": "1000" }
            } },
            { "metadata": { "operation_result": {
                "status": "failed",
                "errors": [{ "kind": "temporary", "id": "proto.alpha.tez.subtraction_underflow" }]
            } } }
        ] });
        match parse_simulation(&response, 2) {
            Err(Error::SimulationFailed { index, cause }) => {
                assert_eq!(index, 1);
                assert_eq!(cause, "proto.alpha.tez.subtraction_underflow");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_internal_failure_rejects_batch() {
        let response = json!({ "contents": [
            { "metadata": {
                "operation_result": applied("1000", "0"),
                "internal_operation_results": [{ "result": {
                    "status": "failed",
                    "errors": [{ "id": "script_rejected" }]
                } }]
            } }
        ] });
        assert!(matches!(
            parse_simulation(&response, 1),
            Err(Error::SimulationFailed { index: 0, .. })
        ));
    }

    #[test]
    fn test_result_count_mismatch() {
        let response = json!({ "contents": [] });
        assert!(matches!(parse_simulation(&response, 1), Err(Error::Internal(_))));
    }

    #[test]
    fn test_run_operation_request() {
        let batch = Batch {
            source: Address::new(AddressKind::Ed25519, [1; 20]),
            branch: BlockHash::from_bytes([9; 32]),
            operations: vec![
                Operation {
                    content: Content::Transaction {
                        amount: 1,
                        destination: Address::new(AddressKind::Ed25519, [2; 20]),
                        parameters: None,
                    },
                    counter: 3,
                    limits: Limits { gas: 1, storage: 1, fee: 1 },
                };
                4
            ],
        };
        let chain: ChainId = "NetXdQprcVkpaWU".parse().unwrap();
        let body = run_operation_request(&batch, &chain, 2_600_000).unwrap();
        assert_eq!(body["chain_id"], "NetXdQprcVkpaWU");
        let contents = body["operation"]["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 4);
        for entry in contents {
            assert_eq!(entry["gas_limit"], "650000");
            assert_eq!(entry["storage_limit"], "60000");
            assert_eq!(entry["fee"], "0");
        }
        assert!(body["operation"]["signature"].as_str().unwrap().starts_with("sig"));

        let body = run_operation_request(&batch, &chain, DEFAULT_BLOCK_GAS_LIMIT).unwrap();
        let total: u64 = body["operation"]["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["gas_limit"].as_str().unwrap().parse::<u64>().unwrap())
            .sum();
        assert!(total <= DEFAULT_BLOCK_GAS_LIMIT);
    }
}
