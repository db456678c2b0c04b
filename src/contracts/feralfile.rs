//! Feral File exhibition contracts
//!
//! Both versions share the FA2 transfer and edition entrypoints; V2 (the
//! "feature" contract) adds expiring authorizations, royalty data on
//! registration and burning.

use super::ContractVersion;
use crate::schema::{Batching, Entrypoint, Field, FieldSpec};

const TRANSFER_TX: &[FieldSpec] = &[
    FieldSpec::new("to", Field::Address),
    FieldSpec::new("token_id", Field::TokenId),
    FieldSpec::new("amount", Field::Fixed(1)),
];

const AUTHORIZED_TX: &[FieldSpec] = &[
    FieldSpec::new("to", Field::Address),
    FieldSpec::new("token_id", Field::TokenId),
    FieldSpec::new("amount", Field::Fixed(1)),
    FieldSpec::new("signature", Field::Signature),
];

const AUTHORIZED_TRANSFER_V1: &[FieldSpec] = &[
    FieldSpec::new("from", Field::Address),
    FieldSpec::new("pk", Field::PublicKey),
    FieldSpec::new("timestamp", Field::Timestamp),
    FieldSpec::new("txs", Field::List(&Field::Record(AUTHORIZED_TX))),
];

const AUTHORIZED_TRANSFER_V2: &[FieldSpec] = &[
    FieldSpec::new("from", Field::Address),
    FieldSpec::new("pk", Field::PublicKey),
    FieldSpec::new("expiry", Field::Timestamp),
    FieldSpec::new("txs", Field::List(&Field::Record(AUTHORIZED_TX))),
];

const REGISTER_ARTWORK_V1: &[FieldSpec] = &[
    FieldSpec::new("title", Field::Text),
    FieldSpec::new("artist_name", Field::Text),
    FieldSpec::new("fingerprint", Field::AbiString),
    FieldSpec::new("max_edition", Field::Nat),
];

const REGISTER_ARTWORK_V2: &[FieldSpec] = &[
    FieldSpec::new("title", Field::Text),
    FieldSpec::new("artist_name", Field::Text),
    FieldSpec::new("fingerprint", Field::AbiString),
    FieldSpec::new("max_edition", Field::Nat),
    FieldSpec::new("ae_amount", Field::Nat),
    FieldSpec::new("pp_amount", Field::Nat),
    FieldSpec::new("royalty_address", Field::Address),
];

const MINT_TOKEN: &[FieldSpec] = &[
    FieldSpec::new("ipfs_link", Field::Annotation),
    FieldSpec::new("artwork_id", Field::HexBytes),
    FieldSpec::new("edition", Field::Nat),
];

const MINT_EDITION: &[FieldSpec] = &[
    FieldSpec::new("owner", Field::Address),
    FieldSpec::new("tokens", Field::List(&Field::Record(MINT_TOKEN))),
];

const UPDATE_EDITION_METADATA: &[FieldSpec] = &[
    FieldSpec::new("token_id", Field::TokenId),
    FieldSpec::new("ipfs_link", Field::Annotation),
];

const fn batched(name: &'static str, item: Field) -> Entrypoint {
    Entrypoint {
        name,
        item,
        batching: Batching::List,
    }
}

/// FA2 `transfer`, every request sent from the signing account
pub const FA2_TRANSFER: Entrypoint = Entrypoint {
    name: "transfer",
    item: Field::Record(TRANSFER_TX),
    batching: Batching::FromSender,
};

pub static FERALFILE_EXHIBITION_V1: ContractVersion = ContractVersion {
    name: "FeralfileExhibitionV1",
    entrypoints: &[
        FA2_TRANSFER,
        batched("authorized_transfers", Field::Record(AUTHORIZED_TRANSFER_V1)),
        batched("register_artworks", Field::Record(REGISTER_ARTWORK_V1)),
        batched("mint_editions", Field::Record(MINT_EDITION)),
        batched("update_edition_metadata", Field::Record(UPDATE_EDITION_METADATA)),
    ],
};

pub static FERALFILE_EXHIBITION_V2: ContractVersion = ContractVersion {
    name: "FeralfileExhibitionV2",
    entrypoints: &[
        FA2_TRANSFER,
        batched("authorized_transfer", Field::Record(AUTHORIZED_TRANSFER_V2)),
        batched("register_artworks", Field::Record(REGISTER_ARTWORK_V2)),
        batched("mint_editions", Field::Record(MINT_EDITION)),
        batched("update_edition_metadata", Field::Record(UPDATE_EDITION_METADATA)),
        batched("burn_editions", Field::TokenId),
    ],
};

/// Built-in versions, registered by `ContractRegistry::with_defaults`
pub static VERSIONS: [&ContractVersion; 2] = [&FERALFILE_EXHIBITION_V1, &FERALFILE_EXHIBITION_V2];
