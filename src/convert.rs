//! Canonical value converters
//!
//! Each converter takes one caller-supplied value and returns its canonical
//! form or a typed error. None of them touch the network.

use chrono::{DateTime, Utc};
use num_bigint::BigInt;

use crate::errors::{Error, Result};
use crate::types::{Address, PublicKey, Signature};

/// Parse a base58check address (tz1/tz2/tz3/tz4/KT1/sr1)
pub fn parse_address(text: &str) -> Result<Address> {
    text.trim().parse()
}

/// Parse a base58check public key
pub fn parse_public_key(text: &str) -> Result<PublicKey> {
    text.trim().parse()
}

/// Parse a base58check signature in any supported encoding
pub fn parse_signature(text: &str) -> Result<Signature> {
    text.trim().parse()
}

fn is_decimal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a base-10 token id of unbounded precision
pub fn parse_token_id(text: &str) -> Result<BigInt> {
    if !is_decimal(text) {
        return Err(Error::InvalidTokenId(text.to_string()));
    }
    text.parse::<BigInt>()
        .map_err(|_| Error::InvalidTokenId(text.to_string()))
}

/// Parse a base-10 integer for a named argument (amounts, edition counts)
pub fn parse_decimal(field: &str, text: &str) -> Result<BigInt> {
    if !is_decimal(text) {
        return Err(Error::invalid_argument(
            field,
            format!("{:?} is not a base-10 integer", text),
        ));
    }
    text.parse::<BigInt>()
        .map_err(|e| Error::invalid_argument(field, e.to_string()))
}

/// Unix-epoch seconds of an absolute instant
pub fn timestamp_seconds(at: &DateTime<Utc>) -> BigInt {
    BigInt::from(at.timestamp())
}

/// Parse an RFC 3339 timestamp into Unix-epoch seconds
pub fn parse_timestamp(field: &str, text: &str) -> Result<BigInt> {
    let at = DateTime::parse_from_rfc3339(text)
        .map_err(|e| Error::invalid_argument(field, format!("{}: {}", text, e)))?;
    Ok(timestamp_seconds(&at.with_timezone(&Utc)))
}

/// Solidity-style `abi.encode(string)`: offset word, length word, padded data
pub fn abi_encode_string(value: &str) -> Vec<u8> {
    let data = value.as_bytes();
    let padded = data.len().div_ceil(32) * 32;
    let mut out = Vec::with_capacity(64 + padded);

    let mut word = [0u8; 32];
    word[31] = 0x20;
    out.extend_from_slice(&word);

    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&(data.len() as u64).to_be_bytes());
    out.extend_from_slice(&word);

    out.extend_from_slice(data);
    out.resize(64 + padded, 0);
    out
}
