//! Entrypoint schema descriptors and the generic parameter encoder
//!
//! A schema is a compile-time constant tree of [`Field`]s. Caller arguments
//! arrive as JSON, are converted leaf-by-leaf into a [`Value`] tree
//! ([`decode_json`]), and the value tree is encoded into a Micheline
//! [`Node`] that mirrors the schema exactly ([`encode`]). Records become
//! right-nested pairs in declared field order; lists become sequences in
//! input order.

use num_bigint::BigInt;
use serde_json::Value as Json;

use crate::convert;
use crate::errors::{Error, Result};
use crate::micheline::Node;
use crate::types::{Address, PublicKey, Signature};

/// Shape of one parameter position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// 22-byte address as `bytes`
    Address,
    /// Tagged public key as `bytes`
    PublicKey,
    /// Raw signature as `bytes`
    Signature,
    /// Base-10 string as `int`
    TokenId,
    /// Non-negative count, JSON number or decimal string, as `int`
    Nat,
    /// RFC 3339 or integer seconds, as `int` seconds
    Timestamp,
    Text,
    /// Hex string as `bytes`
    HexBytes,
    /// UTF-8 link wrapped in a single-entry map: `{ Elt "" 0x… }`
    Annotation,
    /// `abi.encode(string)` as `bytes`
    AbiString,
    /// Constant `int`, never read from arguments
    Fixed(i64),
    /// Named fields, right-nested pairs
    Record(&'static [FieldSpec]),
    /// Homogeneous list, `Seq`
    List(&'static Field),
}

impl Field {
    fn describe(&self) -> &'static str {
        match self {
            Field::Address => "address",
            Field::PublicKey => "public key",
            Field::Signature => "signature",
            Field::TokenId => "token id",
            Field::Nat => "nat",
            Field::Timestamp => "timestamp",
            Field::Text => "text",
            Field::HexBytes => "hex bytes",
            Field::Annotation => "annotation",
            Field::AbiString => "abi string",
            Field::Fixed(_) => "constant",
            Field::Record(_) => "record",
            Field::List(_) => "list",
        }
    }
}

/// A named record field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: Field,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: Field) -> Self {
        Self { name, kind }
    }
}

/// How the encoded items of one call are wrapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Batching {
    /// `[ item… ]`
    List,
    /// Bare tree of a single item
    Single,
    /// `[ Pair(sender, [ item… ]) ]`, items grouped under the signing account
    FromSender,
}

/// Parameter schema of one contract entrypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entrypoint {
    pub name: &'static str,
    /// Shape of one logical request
    pub item: Field,
    pub batching: Batching,
}

/// Converted argument value, ready for encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(BigInt),
    Text(String),
    Bytes(Vec<u8>),
    Address(Address),
    PublicKey(PublicKey),
    Signature(Signature),
    Record(Vec<Value>),
    List(Vec<Value>),
}

impl Value {
    fn describe(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Address(_) => "address",
            Value::PublicKey(_) => "public key",
            Value::Signature(_) => "signature",
            Value::Record(_) => "record",
            Value::List(_) => "list",
        }
    }
}

/// Encode `value` against `field`
///
/// Pure and deterministic. Fails with `SchemaMismatch` when the value tree
/// does not have the schema's shape.
pub fn encode(field: &Field, value: &Value) -> Result<Node> {
    match (field, value) {
        (Field::Address, Value::Address(address)) => Ok(Node::bytes(address.to_bytes22().to_vec())),
        (Field::PublicKey, Value::PublicKey(key)) => Ok(Node::bytes(key.to_bytes())),
        (Field::Signature, Value::Signature(sig)) => Ok(Node::bytes(sig.to_bytes())),
        (Field::TokenId | Field::Nat | Field::Timestamp | Field::Fixed(_), Value::Int(n)) => {
            Ok(Node::Int(n.clone()))
        }
        (Field::Text, Value::Text(text)) => Ok(Node::string(text.clone())),
        (Field::HexBytes | Field::AbiString, Value::Bytes(data)) => Ok(Node::bytes(data.clone())),
        (Field::Annotation, Value::Bytes(data)) => Ok(Node::annotation(data.clone())),
        (Field::Record(specs), Value::Record(values)) => {
            if specs.len() != values.len() {
                return Err(Error::schema_mismatch(
                    format!("record of {} fields", specs.len()),
                    format!("record of {} fields", values.len()),
                ));
            }
            let fields = specs
                .iter()
                .zip(values)
                .map(|(spec, value)| encode(&spec.kind, value))
                .collect::<Result<Vec<_>>>()?;
            Node::right_comb(fields)
        }
        (Field::List(inner), Value::List(items)) => Ok(Node::Seq(
            items
                .iter()
                .map(|item| encode(inner, item))
                .collect::<Result<_>>()?,
        )),
        (field, value) => Err(Error::schema_mismatch(field.describe(), value.describe())),
    }
}

fn child_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn expect_str<'a>(json: &'a Json, path: &str, what: &str) -> Result<&'a str> {
    json.as_str()
        .ok_or_else(|| {
            Error::invalid_argument(path, format!("expected {} string, got {}", what, json))
        })
}

fn integer_arg(json: &Json, path: &str) -> Result<BigInt> {
    match json {
        Json::Number(n) => n
            .as_i64()
            .map(BigInt::from)
            .ok_or_else(|| Error::invalid_argument(path, format!("{} is not an integer", n))),
        Json::String(text) => convert::parse_decimal(path, text),
        other => Err(Error::invalid_argument(
            path,
            format!("expected integer, got {}", other),
        )),
    }
}

/// Convert a JSON argument into a [`Value`] shaped like `field`
///
/// Leaf conversions fail with their specific error (`InvalidAddress`,
/// `InvalidTokenId`, ...); structural problems fail with `InvalidArgument`
/// naming the dotted path of the offending field.
pub fn decode_json(field: &Field, json: &Json, path: &str) -> Result<Value> {
    match field {
        Field::Address => {
            convert::parse_address(expect_str(json, path, "address")?).map(Value::Address)
        }
        Field::PublicKey => {
            convert::parse_public_key(expect_str(json, path, "public key")?).map(Value::PublicKey)
        }
        Field::Signature => {
            convert::parse_signature(expect_str(json, path, "signature")?).map(Value::Signature)
        }
        Field::TokenId => match json {
            Json::String(text) => convert::parse_token_id(text).map(Value::Int),
            other => Err(Error::InvalidTokenId(other.to_string())),
        },
        Field::Nat => {
            let n = integer_arg(json, path)?;
            if n < BigInt::from(0) {
                return Err(Error::invalid_argument(path, "must not be negative"));
            }
            Ok(Value::Int(n))
        }
        Field::Timestamp => match json {
            // epoch seconds sent as a string
            Json::String(text) if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => {
                convert::parse_decimal(path, text).map(Value::Int)
            }
            Json::String(text) => convert::parse_timestamp(path, text).map(Value::Int),
            other => integer_arg(other, path).map(Value::Int),
        },
        Field::Text => Ok(Value::Text(expect_str(json, path, "text")?.to_string())),
        Field::HexBytes => {
            let text = expect_str(json, path, "hex")?;
            hex::decode(text.trim_start_matches("0x"))
                .map(Value::Bytes)
                .map_err(|e| Error::invalid_argument(path, format!("invalid hex: {}", e)))
        }
        Field::Annotation => Ok(Value::Bytes(
            expect_str(json, path, "link")?.as_bytes().to_vec(),
        )),
        Field::AbiString => Ok(Value::Bytes(convert::abi_encode_string(expect_str(
            json, path, "text",
        )?))),
        Field::Fixed(n) => Ok(Value::Int(BigInt::from(*n))),
        Field::Record(specs) => {
            let object = json.as_object().ok_or_else(|| {
                Error::invalid_argument(path, format!("expected object, got {}", json))
            })?;
            specs
                .iter()
                .map(|spec| {
                    let field_path = child_path(path, spec.name);
                    if let Field::Fixed(n) = spec.kind {
                        return Ok(Value::Int(BigInt::from(n)));
                    }
                    let raw = object
                        .get(spec.name)
                        .ok_or_else(|| Error::invalid_argument(&field_path, "missing field"))?;
                    decode_json(&spec.kind, raw, &field_path)
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Record)
        }
        Field::List(inner) => {
            let items = json.as_array().ok_or_else(|| {
                Error::invalid_argument(path, format!("expected array, got {}", json))
            })?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| decode_json(inner, item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()
                .map(Value::List)
        }
    }
}
