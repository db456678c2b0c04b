//! Binary operation serialisation and signing bytes
//!
//! Layout: `branch(32) ‖ op₁ ‖ op₂ …`, each manager operation being
//! `tag ‖ source(21) ‖ fee ‖ counter ‖ gas ‖ storage ‖ payload` with
//! unsigned zarith numbers.

use crate::errors::{Error, Result};
use crate::micheline::write_nat;
use crate::types::{blake2b_256, Address, OperationHash, Signature};

use super::operation::{Batch, Content, Operation, Parameters};

const TAG_REVEAL: u8 = 0x6b;
const TAG_TRANSACTION: u8 = 0x6c;

/// Watermark prepended to forged bytes before hashing for a signature
pub const OPERATION_WATERMARK: u8 = 0x03;

/// Length of a branch block hash on the wire
pub const BRANCH_SIZE: usize = 32;

/// Length of an ed25519/secp256k1/p256 signature appended to a batch
pub const SIGNATURE_SIZE: usize = 64;

const MAX_ENTRYPOINT_LEN: usize = 31;

const NAMED_ENTRYPOINTS: [&str; 10] = [
    "default",
    "root",
    "do",
    "set_delegate",
    "remove_delegate",
    "deposit",
    "stake",
    "unstake",
    "finalize_unstake",
    "set_delegate_parameters",
];

fn write_entrypoint(out: &mut Vec<u8>, name: &str) -> Result<()> {
    if let Some(tag) = NAMED_ENTRYPOINTS.iter().position(|known| *known == name) {
        out.push(tag as u8);
        return Ok(());
    }
    if name.is_empty() || name.len() > MAX_ENTRYPOINT_LEN {
        return Err(Error::Forge(format!("invalid entrypoint name {:?}", name)));
    }
    out.push(0xff);
    out.push(name.len() as u8);
    out.extend_from_slice(name.as_bytes());
    Ok(())
}

fn write_parameters(out: &mut Vec<u8>, parameters: Option<&Parameters>) -> Result<()> {
    let Some(params) = parameters else {
        out.push(0x00);
        return Ok(());
    };
    out.push(0xff);
    write_entrypoint(out, &params.entrypoint)?;
    let value = params.value.encode();
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(&value);
    Ok(())
}

/// Append one operation to `out`
pub fn forge_operation(out: &mut Vec<u8>, source: &Address, op: &Operation) -> Result<()> {
    let tag = match op.content {
        Content::Reveal { .. } => TAG_REVEAL,
        Content::Transaction { .. } => TAG_TRANSACTION,
    };
    out.push(tag);
    out.extend_from_slice(&source.to_manager_bytes()?);
    write_nat(out, op.limits.fee);
    write_nat(out, op.counter);
    write_nat(out, op.limits.gas);
    write_nat(out, op.limits.storage);

    match &op.content {
        Content::Reveal { public_key } => {
            if public_key.address() != *source {
                return Err(Error::Forge(format!(
                    "reveal key {} does not belong to {}",
                    public_key, source
                )));
            }
            out.extend_from_slice(&public_key.to_bytes());
            // proof: none
            out.push(0x00);
        }
        Content::Transaction {
            amount,
            destination,
            parameters,
        } => {
            write_nat(out, *amount);
            out.extend_from_slice(&destination.to_bytes22());
            write_parameters(out, parameters.as_ref())?;
        }
    }
    Ok(())
}

/// Serialised size of one operation
pub fn operation_size(source: &Address, op: &Operation) -> Result<usize> {
    let mut out = Vec::new();
    forge_operation(&mut out, source, op)?;
    Ok(out.len())
}

/// Unsigned batch bytes: branch followed by every operation
pub fn forge_batch(batch: &Batch) -> Result<Vec<u8>> {
    if batch.is_empty() {
        return Err(Error::Forge("batch has no operations".to_string()));
    }
    let mut out = Vec::with_capacity(BRANCH_SIZE + batch.len() * 128);
    out.extend_from_slice(batch.branch.as_bytes());
    for op in &batch.operations {
        forge_operation(&mut out, &batch.source, op)?;
    }
    Ok(out)
}

/// blake2b-256 of the watermarked forged bytes; this is what gets signed
pub fn signing_digest(forged: &[u8]) -> [u8; 32] {
    let mut watermarked = Vec::with_capacity(forged.len() + 1);
    watermarked.push(OPERATION_WATERMARK);
    watermarked.extend_from_slice(forged);
    blake2b_256(&watermarked)
}

/// Forged bytes with the raw signature appended
pub fn signed_bytes(forged: &[u8], signature: &Signature) -> Vec<u8> {
    let mut out = Vec::with_capacity(forged.len() + signature.as_bytes().len());
    out.extend_from_slice(forged);
    out.extend_from_slice(signature.as_bytes());
    out
}

/// Hash the node will assign to the injected operation
pub fn operation_hash(signed: &[u8]) -> OperationHash {
    OperationHash::of_signed_bytes(signed)
}
