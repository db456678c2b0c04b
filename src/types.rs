//! Ledger identifiers and their canonical binary forms
//!
//! Every identifier travels as base58check text with a fixed prefix and
//! has a raw byte form used on the wire. Parsing is all-or-nothing: a value
//! either decodes to its full canonical form or yields a typed error.

use std::fmt;
use std::str::FromStr;

use blake2::digest::consts::{U20, U32};
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

type Blake2b160 = Blake2b<U20>;
type Blake2b256 = Blake2b<U32>;

/// Length of an address hash payload
pub const ADDRESS_HASH_LEN: usize = 20;

/// blake2b with a 20-byte digest (implicit account hashes)
pub fn blake2b_160(data: &[u8]) -> [u8; ADDRESS_HASH_LEN] {
    let digest = Blake2b160::digest(data);
    let mut out = [0u8; ADDRESS_HASH_LEN];
    out.copy_from_slice(&digest);
    out
}

/// blake2b with a 32-byte digest (signing digests, operation hashes)
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let digest = Blake2b256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

pub(crate) fn encode_check(prefix: &[u8], payload: &[u8]) -> String {
    let mut buf = Vec::with_capacity(prefix.len() + payload.len());
    buf.extend_from_slice(prefix);
    buf.extend_from_slice(payload);
    bs58::encode(buf).with_check().into_string()
}

/// Decode base58check text and strip `prefix`, requiring an exact payload length
pub(crate) fn decode_check(text: &str, prefix: &[u8], len: usize) -> Option<Vec<u8>> {
    let raw = bs58::decode(text).with_check(None).into_vec().ok()?;
    if raw.len() != prefix.len() + len || !raw.starts_with(prefix) {
        return None;
    }
    Some(raw[prefix.len()..].to_vec())
}

/// Kind of account or contract an address designates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// tz1
    Ed25519,
    /// tz2
    Secp256k1,
    /// tz3
    P256,
    /// tz4
    Bls,
    /// KT1
    Contract,
    /// sr1
    SmartRollup,
}

impl AddressKind {
    pub const ALL: [AddressKind; 6] = [
        AddressKind::Ed25519,
        AddressKind::Secp256k1,
        AddressKind::P256,
        AddressKind::Bls,
        AddressKind::Contract,
        AddressKind::SmartRollup,
    ];

    fn prefix(self) -> &'static [u8] {
        match self {
            AddressKind::Ed25519 => &[6, 161, 159],
            AddressKind::Secp256k1 => &[6, 161, 161],
            AddressKind::P256 => &[6, 161, 164],
            AddressKind::Bls => &[6, 161, 166],
            AddressKind::Contract => &[2, 90, 121],
            AddressKind::SmartRollup => &[6, 124, 117],
        }
    }

    /// Signature-scheme tag of an implicit account
    fn implicit_tag(self) -> Option<u8> {
        match self {
            AddressKind::Ed25519 => Some(0),
            AddressKind::Secp256k1 => Some(1),
            AddressKind::P256 => Some(2),
            AddressKind::Bls => Some(3),
            AddressKind::Contract | AddressKind::SmartRollup => None,
        }
    }

    fn from_implicit_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(AddressKind::Ed25519),
            1 => Some(AddressKind::Secp256k1),
            2 => Some(AddressKind::P256),
            3 => Some(AddressKind::Bls),
            _ => None,
        }
    }
}

/// Canonical account or contract address
///
/// Two addresses are equal iff their 22-byte forms are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    kind: AddressKind,
    hash: [u8; ADDRESS_HASH_LEN],
}

impl Address {
    pub fn new(kind: AddressKind, hash: [u8; ADDRESS_HASH_LEN]) -> Self {
        Self { kind, hash }
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    pub fn hash(&self) -> &[u8; ADDRESS_HASH_LEN] {
        &self.hash
    }

    /// Whether this is a key-controlled (tz*) account
    pub fn is_implicit(&self) -> bool {
        self.kind.implicit_tag().is_some()
    }

    /// 22-byte padded form used in contract parameters and as destination
    ///
    /// Implicit: `00 ‖ scheme ‖ hash`. Originated: `tag ‖ hash ‖ 00`.
    pub fn to_bytes22(&self) -> [u8; 22] {
        let mut out = [0u8; 22];
        match self.kind.implicit_tag() {
            Some(tag) => {
                out[1] = tag;
                out[2..].copy_from_slice(&self.hash);
            }
            None => {
                out[0] = match self.kind {
                    AddressKind::Contract => 0x01,
                    _ => 0x03,
                };
                out[1..21].copy_from_slice(&self.hash);
            }
        }
        out
    }

    /// Inverse of [`Address::to_bytes22`]
    pub fn from_bytes22(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 22 {
            return Err(Error::InvalidAddress(format!(
                "expected 22 bytes, got {}",
                bytes.len()
            )));
        }
        let mut hash = [0u8; ADDRESS_HASH_LEN];
        let kind = match bytes[0] {
            0x00 => {
                hash.copy_from_slice(&bytes[2..]);
                AddressKind::from_implicit_tag(bytes[1]).ok_or_else(|| {
                    Error::InvalidAddress(format!("unknown implicit tag {}", bytes[1]))
                })?
            }
            tag @ (0x01 | 0x03) => {
                if bytes[21] != 0 {
                    return Err(Error::InvalidAddress("non-zero padding byte".to_string()));
                }
                hash.copy_from_slice(&bytes[1..21]);
                if tag == 0x01 {
                    AddressKind::Contract
                } else {
                    AddressKind::SmartRollup
                }
            }
            other => {
                return Err(Error::InvalidAddress(format!("unknown address tag {}", other)));
            }
        };
        Ok(Self { kind, hash })
    }

    /// 21-byte manager form (operation sources); implicit accounts only
    pub fn to_manager_bytes(&self) -> Result<[u8; 21], Error> {
        let tag = self.kind.implicit_tag().ok_or_else(|| {
            Error::InvalidAddress(format!("{} cannot be an operation source", self))
        })?;
        let mut out = [0u8; 21];
        out[0] = tag;
        out[1..].copy_from_slice(&self.hash);
        Ok(out)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for kind in AddressKind::ALL {
            if let Some(payload) = decode_check(s, kind.prefix(), ADDRESS_HASH_LEN) {
                let mut hash = [0u8; ADDRESS_HASH_LEN];
                hash.copy_from_slice(&payload);
                return Ok(Self { kind, hash });
            }
        }
        Err(Error::InvalidAddress(s.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_check(self.kind.prefix(), &self.hash))
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

/// Signature scheme of a public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Ed25519,
    Secp256k1,
    P256,
    Bls,
}

impl KeyKind {
    const ALL: [KeyKind; 4] = [KeyKind::Ed25519, KeyKind::Secp256k1, KeyKind::P256, KeyKind::Bls];

    fn prefix(self) -> &'static [u8] {
        match self {
            KeyKind::Ed25519 => &[13, 15, 37, 217],
            KeyKind::Secp256k1 => &[3, 254, 226, 86],
            KeyKind::P256 => &[3, 178, 139, 127],
            KeyKind::Bls => &[6, 149, 135, 204],
        }
    }

    fn key_len(self) -> usize {
        match self {
            KeyKind::Ed25519 => 32,
            KeyKind::Secp256k1 | KeyKind::P256 => 33,
            KeyKind::Bls => 48,
        }
    }

    fn tag(self) -> u8 {
        match self {
            KeyKind::Ed25519 => 0,
            KeyKind::Secp256k1 => 1,
            KeyKind::P256 => 2,
            KeyKind::Bls => 3,
        }
    }

    fn address_kind(self) -> AddressKind {
        match self {
            KeyKind::Ed25519 => AddressKind::Ed25519,
            KeyKind::Secp256k1 => AddressKind::Secp256k1,
            KeyKind::P256 => AddressKind::P256,
            KeyKind::Bls => AddressKind::Bls,
        }
    }
}

/// Public key of an implicit account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey {
    kind: KeyKind,
    data: Vec<u8>,
}

impl PublicKey {
    /// Build from raw key bytes, checking the length for the scheme
    pub fn from_raw(kind: KeyKind, data: &[u8]) -> Result<Self, Error> {
        if data.len() != kind.key_len() {
            return Err(Error::InvalidPublicKey(format!(
                "expected {} key bytes, got {}",
                kind.key_len(),
                data.len()
            )));
        }
        Ok(Self {
            kind,
            data: data.to_vec(),
        })
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Tagged raw form: `scheme ‖ key bytes`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.data.len());
        out.push(self.kind.tag());
        out.extend_from_slice(&self.data);
        out
    }

    /// Implicit account controlled by this key
    pub fn address(&self) -> Address {
        Address::new(self.kind.address_kind(), blake2b_160(&self.data))
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyKind::ALL
            .iter()
            .find_map(|kind| {
                decode_check(s, kind.prefix(), kind.key_len())
                    .map(|data| Self { kind: *kind, data })
            })
            .ok_or_else(|| Error::InvalidPublicKey(s.to_string()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_check(self.kind.prefix(), &self.data))
    }
}

impl TryFrom<String> for PublicKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PublicKey> for String {
    fn from(value: PublicKey) -> Self {
        value.to_string()
    }
}

/// Encoding family of a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    /// Scheme-agnostic `sig…` encoding
    Generic,
    Ed25519,
    Secp256k1,
    P256,
    Bls,
}

impl SignatureKind {
    const ALL: [SignatureKind; 5] = [
        SignatureKind::Generic,
        SignatureKind::Ed25519,
        SignatureKind::Secp256k1,
        SignatureKind::P256,
        SignatureKind::Bls,
    ];

    fn prefix(self) -> &'static [u8] {
        match self {
            SignatureKind::Generic => &[4, 130, 43],
            SignatureKind::Ed25519 => &[9, 245, 205, 134, 18],
            SignatureKind::Secp256k1 => &[13, 115, 101, 19, 63],
            SignatureKind::P256 => &[54, 240, 44, 52],
            SignatureKind::Bls => &[40, 171, 64, 207],
        }
    }

    fn sig_len(self) -> usize {
        match self {
            SignatureKind::Bls => 96,
            _ => 64,
        }
    }
}

/// Detached signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature {
    kind: SignatureKind,
    data: Vec<u8>,
}

impl Signature {
    pub fn from_raw(kind: SignatureKind, data: &[u8]) -> Result<Self, Error> {
        if data.len() != kind.sig_len() {
            return Err(Error::InvalidSignature(format!(
                "expected {} signature bytes, got {}",
                kind.sig_len(),
                data.len()
            )));
        }
        Ok(Self {
            kind,
            data: data.to_vec(),
        })
    }

    pub fn kind(&self) -> SignatureKind {
        self.kind
    }

    /// Raw signature bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Re-encode in the scheme-agnostic `sig…` form (64-byte signatures only)
    pub fn to_generic(&self) -> Result<Self, Error> {
        Self::from_raw(SignatureKind::Generic, &self.data)
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignatureKind::ALL
            .iter()
            .find_map(|kind| {
                decode_check(s, kind.prefix(), kind.sig_len())
                    .map(|data| Self { kind: *kind, data })
            })
            .ok_or_else(|| Error::InvalidSignature(s.to_string()))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_check(self.kind.prefix(), &self.data))
    }
}

impl TryFrom<String> for Signature {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Signature> for String {
    fn from(value: Signature) -> Self {
        value.to_string()
    }
}

/// Fixed-length hash identifiers sharing one base58check shape
macro_rules! prefixed_hash {
    ($(#[$meta:meta])* $name:ident, $prefix:expr, $len:expr, $what:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let payload = decode_check(s, &$prefix, $len)
                    .ok_or_else(|| {
                        Error::invalid_argument($what, format!("malformed value {}", s))
                    })?;
                let mut bytes = [0u8; $len];
                bytes.copy_from_slice(&payload);
                Ok(Self(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&encode_check(&$prefix, &self.0))
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }
    };
}

prefixed_hash!(
    /// Block hash (`B…`), used as the branch of an operation
    BlockHash, [1u8, 52], 32, "block_hash"
);
prefixed_hash!(
    /// Operation hash (`o…`)
    OperationHash, [5u8, 116], 32, "operation_hash"
);
prefixed_hash!(
    /// Chain identifier (`Net…`)
    ChainId, [87u8, 82, 0], 4, "chain_id"
);

impl OperationHash {
    /// Hash of signed operation bytes
    pub fn of_signed_bytes(bytes: &[u8]) -> Self {
        Self(blake2b_256(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip_every_kind() {
        for (i, kind) in AddressKind::ALL.into_iter().enumerate() {
            let address = Address::new(kind, [i as u8 + 7; ADDRESS_HASH_LEN]);
            let text = address.to_string();
            let parsed: Address = text.parse().expect("Should parse own encoding");
            assert_eq!(parsed, address);

            let decoded = Address::from_bytes22(&address.to_bytes22()).expect("Should decode");
            assert_eq!(decoded, address);
        }
    }

    #[test]
    fn test_address_text_prefixes() {
        let hash = [1u8; ADDRESS_HASH_LEN];
        assert!(Address::new(AddressKind::Ed25519, hash).to_string().starts_with("tz1"));
        assert!(Address::new(AddressKind::Secp256k1, hash).to_string().starts_with("tz2"));
        assert!(Address::new(AddressKind::P256, hash).to_string().starts_with("tz3"));
        assert!(Address::new(AddressKind::Bls, hash).to_string().starts_with("tz4"));
        assert!(Address::new(AddressKind::Contract, hash).to_string().starts_with("KT1"));
        assert!(Address::new(AddressKind::SmartRollup, hash).to_string().starts_with("sr1"));
    }

    #[test]
    fn test_bytes22_layout() {
        let hash = [0xab; ADDRESS_HASH_LEN];
        let implicit = Address::new(AddressKind::Secp256k1, hash).to_bytes22();
        assert_eq!(&implicit[..2], &[0x00, 0x01]);
        assert_eq!(&implicit[2..], &hash);

        let contract = Address::new(AddressKind::Contract, hash).to_bytes22();
        assert_eq!(contract[0], 0x01);
        assert_eq!(&contract[1..21], &hash);
        assert_eq!(contract[21], 0x00);
    }

    #[test]
    fn test_manager_bytes_rejects_contract() {
        let contract = Address::new(AddressKind::Contract, [2; ADDRESS_HASH_LEN]);
        assert!(matches!(contract.to_manager_bytes(), Err(Error::InvalidAddress(_))));

        let implicit = Address::new(AddressKind::Ed25519, [2; ADDRESS_HASH_LEN]);
        let bytes = implicit.to_manager_bytes().expect("implicit source");
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..], &[2; ADDRESS_HASH_LEN]);
    }

    #[test]
    fn test_malformed_address_rejected() {
        assert!(matches!(
            "tz1notanaddress".parse::<Address>(),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!("".parse::<Address>(), Err(Error::InvalidAddress(_))));
        // Valid base58check, wrong prefix (a block hash)
        let block = BlockHash::from_bytes([3; 32]).to_string();
        assert!(matches!(block.parse::<Address>(), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn test_public_key_address_derivation() {
        let pk: PublicKey = "edpkuBknW28nW72KG6RoHtYW7p12T6GKc7nAbwYX5m8Wd9sDVC9yav"
            .parse()
            .expect("Should parse edpk");
        assert_eq!(pk.kind(), KeyKind::Ed25519);
        assert_eq!(pk.to_bytes().len(), 33);
        assert_eq!(pk.to_bytes()[0], 0);
        assert_eq!(
            pk.address().to_string(),
            "tz1KqTpEZ7Yob7QbPE4Hy4Wo8fHG8LhKxZSx"
        );
    }

    #[test]
    fn test_signature_roundtrip_and_generic() {
        let sig = Signature::from_raw(SignatureKind::Ed25519, &[9u8; 64]).unwrap();
        let text = sig.to_string();
        assert!(text.starts_with("edsig"));
        assert_eq!(text.parse::<Signature>().unwrap(), sig);

        let generic = sig.to_generic().unwrap();
        assert!(generic.to_string().starts_with("sig"));
        assert_eq!(generic.as_bytes(), sig.as_bytes());
    }

    #[test]
    fn test_malformed_signature_rejected() {
        assert!(matches!(
            "edsigbogus".parse::<Signature>(),
            Err(Error::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_hash_identifiers() {
        let chain: ChainId = "NetXdQprcVkpaWU".parse().expect("mainnet chain id");
        assert_eq!(chain.to_string(), "NetXdQprcVkpaWU");

        let branch = BlockHash::from_bytes([5; 32]);
        assert!(branch.to_string().starts_with('B'));
        assert_eq!(branch.to_string().parse::<BlockHash>().unwrap(), branch);

        let op = OperationHash::of_signed_bytes(b"payload");
        assert!(op.to_string().starts_with('o'));
    }
}
