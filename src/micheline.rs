//! Micheline parameter trees
//!
//! Binary encoding (the form embedded in forged operations and packed
//! messages) and the JSON form the node RPC speaks. Only the node kinds that
//! contract parameters use are supported: ints, strings, bytes, sequences and
//! the two-argument `Pair` / `Elt` primitives without annotations.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use serde_json::{json, Value as Json};

use crate::errors::{Error, Result};

const TAG_INT: u8 = 0x00;
const TAG_STRING: u8 = 0x01;
const TAG_SEQ: u8 = 0x02;
const TAG_PRIM_2: u8 = 0x07;
const TAG_BYTES: u8 = 0x0a;

const OP_ELT: u8 = 0x04;
const OP_PAIR: u8 = 0x07;

/// Prefix of packed (`PACK`-ed) data
pub const PACK_PREFIX: u8 = 0x05;

/// One node of a parameter tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Int(BigInt),
    String(String),
    Bytes(Vec<u8>),
    Pair(Box<Node>, Box<Node>),
    Seq(Vec<Node>),
    Elt(Box<Node>, Box<Node>),
}

impl Node {
    pub fn int(value: impl Into<BigInt>) -> Self {
        Node::Int(value.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::String(value.into())
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Node::Bytes(value.into())
    }

    pub fn pair(left: Node, right: Node) -> Self {
        Node::Pair(Box::new(left), Box::new(right))
    }

    pub fn elt(key: Node, value: Node) -> Self {
        Node::Elt(Box::new(key), Box::new(value))
    }

    /// Right-comb of `fields`: `Pair(a, Pair(b, Pair(c, d)))`
    ///
    /// A single field is returned as-is; an empty list is an error since
    /// records always carry at least one field.
    pub fn right_comb(fields: Vec<Node>) -> Result<Self> {
        let mut iter = fields.into_iter().rev();
        let last = iter
            .next()
            .ok_or_else(|| Error::schema_mismatch("at least one record field", "none"))?;
        Ok(iter.fold(last, |acc, field| Node::pair(field, acc)))
    }

    /// Single-entry annotation map: `{ Elt "" value }`
    pub fn annotation(value: impl Into<Vec<u8>>) -> Self {
        Node::Seq(vec![Node::elt(Node::string(""), Node::bytes(value))])
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Node::Int(_) => "int",
            Node::String(_) => "string",
            Node::Bytes(_) => "bytes",
            Node::Pair(..) => "pair",
            Node::Seq(_) => "sequence",
            Node::Elt(..) => "elt",
        }
    }

    /// Binary encoding
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Node::Int(value) => {
                out.push(TAG_INT);
                write_zarith(out, value);
            }
            Node::String(value) => {
                out.push(TAG_STRING);
                write_len_prefixed(out, value.as_bytes());
            }
            Node::Bytes(value) => {
                out.push(TAG_BYTES);
                write_len_prefixed(out, value);
            }
            Node::Seq(items) => {
                let mut body = Vec::new();
                for item in items {
                    item.write(&mut body);
                }
                out.push(TAG_SEQ);
                write_len_prefixed(out, &body);
            }
            Node::Pair(left, right) => {
                out.extend_from_slice(&[TAG_PRIM_2, OP_PAIR]);
                left.write(out);
                right.write(out);
            }
            Node::Elt(key, value) => {
                out.extend_from_slice(&[TAG_PRIM_2, OP_ELT]);
                key.write(out);
                value.write(out);
            }
        }
    }

    /// Decode a complete binary encoding; trailing bytes are rejected
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let node = reader.node()?;
        if !reader.is_empty() {
            return Err(Error::Decode(format!(
                "{} trailing bytes after node",
                reader.remaining()
            )));
        }
        Ok(node)
    }

    /// `PACK` form: `0x05 ‖ encode()`
    pub fn pack(&self) -> Vec<u8> {
        let mut out = vec![PACK_PREFIX];
        self.write(&mut out);
        out
    }

    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        match bytes.split_first() {
            Some((&PACK_PREFIX, rest)) => Self::decode(rest),
            _ => Err(Error::Decode("missing pack prefix".to_string())),
        }
    }

    /// JSON form accepted by the node RPC
    pub fn to_json(&self) -> Json {
        match self {
            Node::Int(value) => json!({ "int": value.to_string() }),
            Node::String(value) => json!({ "string": value }),
            Node::Bytes(value) => json!({ "bytes": hex::encode(value) }),
            Node::Seq(items) => Json::Array(items.iter().map(Node::to_json).collect()),
            Node::Pair(left, right) => {
                json!({ "prim": "Pair", "args": [left.to_json(), right.to_json()] })
            }
            Node::Elt(key, value) => {
                json!({ "prim": "Elt", "args": [key.to_json(), value.to_json()] })
            }
        }
    }

    /// Parse the JSON form; `Pair` with more than two args is read as a right comb
    pub fn from_json(value: &Json) -> Result<Self> {
        match value {
            Json::Array(items) => Ok(Node::Seq(
                items.iter().map(Node::from_json).collect::<Result<_>>()?,
            )),
            Json::Object(map) => {
                if let Some(int) = map.get("int").and_then(Json::as_str) {
                    return int
                        .parse::<BigInt>()
                        .map(Node::Int)
                        .map_err(|_| Error::Decode(format!("bad int literal {:?}", int)));
                }
                if let Some(text) = map.get("string").and_then(Json::as_str) {
                    return Ok(Node::string(text));
                }
                if let Some(hex_str) = map.get("bytes").and_then(Json::as_str) {
                    return hex::decode(hex_str)
                        .map(Node::Bytes)
                        .map_err(|e| Error::Decode(format!("bad bytes literal: {}", e)));
                }
                let prim = map
                    .get("prim")
                    .and_then(Json::as_str)
                    .ok_or_else(|| Error::Decode(format!("unsupported node {}", value)))?;
                let args = map
                    .get("args")
                    .and_then(Json::as_array)
                    .map(|args| args.iter().map(Node::from_json).collect::<Result<Vec<_>>>())
                    .transpose()?
                    .unwrap_or_default();
                match (prim, args.len()) {
                    ("Pair", n) if n >= 2 => Node::right_comb(args),
                    ("Elt", 2) => {
                        let mut args = args.into_iter();
                        match (args.next(), args.next()) {
                            (Some(key), Some(value)) => Ok(Node::elt(key, value)),
                            _ => Err(Error::internal("Elt arity checked above")),
                        }
                    }
                    (other, n) => Err(Error::Decode(format!(
                        "unsupported primitive {} with {} args",
                        other, n
                    ))),
                }
            }
            other => Err(Error::Decode(format!("unsupported node {}", other))),
        }
    }

    /// Expect an int node
    pub fn as_int(&self) -> Result<&BigInt> {
        match self {
            Node::Int(value) => Ok(value),
            other => Err(Error::schema_mismatch("int", other.kind_name())),
        }
    }
}

fn write_len_prefixed(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

fn low_bits(value: &BigUint) -> u8 {
    value.iter_u32_digits().next().unwrap_or(0) as u8
}

/// Signed zarith: sign in bit 6 of the first byte, 6 then 7 value bits per byte
pub(crate) fn write_zarith(out: &mut Vec<u8>, value: &BigInt) {
    let mut magnitude = value.magnitude().clone();
    let mut byte = low_bits(&magnitude) & 0x3f;
    if value.sign() == Sign::Minus {
        byte |= 0x40;
    }
    magnitude >>= 6u32;
    while !magnitude.is_zero() {
        out.push(byte | 0x80);
        byte = low_bits(&magnitude) & 0x7f;
        magnitude >>= 7u32;
    }
    out.push(byte);
}

/// Unsigned zarith (operation fees, counters, limits, amounts)
pub(crate) fn write_nat(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::Decode(format!(
                "needed {} bytes at offset {}, {} left",
                len,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn len_prefixed(&mut self) -> Result<&'a [u8]> {
        let raw = self.take(4)?;
        let len = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
        self.take(len)
    }

    fn zarith(&mut self) -> Result<BigInt> {
        let first = self.byte()?;
        let negative = first & 0x40 != 0;
        let mut magnitude = BigUint::from(first & 0x3f);
        let mut shift = 6u32;
        let mut byte = first;
        while byte & 0x80 != 0 {
            byte = self.byte()?;
            if byte == 0 {
                return Err(Error::Decode("non-canonical zarith encoding".to_string()));
            }
            magnitude += BigUint::from(byte & 0x7f) << shift;
            shift += 7;
        }
        let sign = if negative { Sign::Minus } else { Sign::Plus };
        Ok(BigInt::from_biguint(sign, magnitude))
    }

    fn node(&mut self) -> Result<Node> {
        match self.byte()? {
            TAG_INT => Ok(Node::Int(self.zarith()?)),
            TAG_STRING => {
                let raw = self.len_prefixed()?;
                String::from_utf8(raw.to_vec())
                    .map(Node::String)
                    .map_err(|e| Error::Decode(format!("string is not utf-8: {}", e)))
            }
            TAG_BYTES => Ok(Node::Bytes(self.len_prefixed()?.to_vec())),
            TAG_SEQ => {
                let mut inner = Reader::new(self.len_prefixed()?);
                let mut items = Vec::new();
                while !inner.is_empty() {
                    items.push(inner.node()?);
                }
                Ok(Node::Seq(items))
            }
            TAG_PRIM_2 => {
                let op = self.byte()?;
                let left = self.node()?;
                let right = self.node()?;
                match op {
                    OP_PAIR => Ok(Node::pair(left, right)),
                    OP_ELT => Ok(Node::elt(left, right)),
                    other => Err(Error::Decode(format!("unsupported primitive 0x{:02x}", other))),
                }
            }
            other => Err(Error::Decode(format!("unsupported node tag 0x{:02x}", other))),
        }
    }
}
