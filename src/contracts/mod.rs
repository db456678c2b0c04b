//! Contract calls, contract versions and the version registry
//!
//! A contract version is a table of entrypoint schemas. Building a call
//! decodes the caller's JSON arguments against the entrypoint schema,
//! encodes each logical request and hands the encoded items to [`assemble`].

pub mod authorization;
pub mod feralfile;

use std::collections::HashMap;
use std::fmt;

use serde_json::Value as Json;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::micheline::Node;
use crate::schema::{self, Batching, Entrypoint};
use crate::types::Address;

pub use authorization::authorized_transfer_message;

/// A fully encoded entrypoint invocation
///
/// Built once by [`assemble`] and consumed by the submission pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    entrypoint: String,
    parameter: Node,
    destination: Address,
}

impl ContractCall {
    /// Call with an already encoded parameter
    pub fn new(entrypoint: impl Into<String>, parameter: Node, destination: Address) -> Self {
        Self {
            entrypoint: entrypoint.into(),
            parameter,
            destination,
        }
    }

    pub fn entrypoint(&self) -> &str {
        &self.entrypoint
    }

    pub fn parameter(&self) -> &Node {
        &self.parameter
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }
}

/// Wrap encoded items into the entrypoint's outer shape
///
/// Returns `None` when `items` is empty; callers treat that as a no-op.
/// `Single` entrypoints take the first item as the bare parameter.
pub fn assemble(
    entrypoint: &Entrypoint,
    items: Vec<Node>,
    destination: Address,
    sender: &Address,
) -> Option<ContractCall> {
    if items.is_empty() {
        return None;
    }
    let parameter = match entrypoint.batching {
        Batching::List => Node::Seq(items),
        Batching::Single => items.into_iter().next()?,
        Batching::FromSender => Node::Seq(vec![Node::pair(
            Node::bytes(sender.to_bytes22().to_vec()),
            Node::Seq(items),
        )]),
    };
    Some(ContractCall {
        entrypoint: entrypoint.name.to_string(),
        parameter,
        destination,
    })
}

/// A deployed contract interface: a named set of entrypoint schemas
#[derive(Debug, PartialEq, Eq)]
pub struct ContractVersion {
    pub name: &'static str,
    pub entrypoints: &'static [Entrypoint],
}

impl ContractVersion {
    pub fn entrypoint(&self, method: &str) -> Option<&'static Entrypoint> {
        self.entrypoints.iter().find(|ep| ep.name == method)
    }
}

/// A contract version bound to its on-chain address
#[derive(Debug, Clone, Copy)]
pub struct Contract {
    version: &'static ContractVersion,
    address: Address,
}

impl Contract {
    pub fn new(version: &'static ContractVersion, address: Address) -> Self {
        Self { version, address }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn version(&self) -> &'static ContractVersion {
        self.version
    }

    /// Build the call for `method` from JSON arguments
    ///
    /// Batched entrypoints take a JSON array of requests; single-record
    /// entrypoints take one object. `sender` is the resolved signing account.
    pub fn build_call(
        &self,
        method: &str,
        arguments: &Json,
        sender: &Address,
    ) -> Result<Option<ContractCall>> {
        let entrypoint = self
            .version
            .entrypoint(method)
            .ok_or_else(|| Error::UnknownEntrypoint {
                contract: self.version.name.to_string(),
                method: method.to_string(),
            })?;

        let items = match entrypoint.batching {
            Batching::Single => {
                let value = schema::decode_json(&entrypoint.item, arguments, "")?;
                vec![schema::encode(&entrypoint.item, &value)?]
            }
            Batching::List | Batching::FromSender => {
                let requests = arguments.as_array().ok_or_else(|| {
                    Error::invalid_argument(method, "expected an array of requests")
                })?;
                requests
                    .iter()
                    .enumerate()
                    .map(|(i, request)| {
                        let value =
                            schema::decode_json(&entrypoint.item, request, &format!("[{}]", i))?;
                        schema::encode(&entrypoint.item, &value)
                    })
                    .collect::<Result<Vec<_>>>()?
            }
        };

        debug!(
            contract = self.version.name,
            entrypoint = entrypoint.name,
            items = items.len(),
            "Encoded contract call parameters"
        );
        Ok(assemble(entrypoint, items, self.address, sender))
    }
}

/// Explicit name → contract version mapping, built at startup
#[derive(Clone, Default)]
pub struct ContractRegistry {
    versions: HashMap<&'static str, &'static ContractVersion>,
}

impl fmt::Debug for ContractRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.versions.keys().collect();
        names.sort();
        f.debug_struct("ContractRegistry")
            .field("versions", &names)
            .finish()
    }
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in contract version
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for version in feralfile::VERSIONS.iter().copied() {
            // Built-in names are distinct
            registry.versions.insert(version.name, version);
        }
        registry
    }

    /// Add a version; a name can only be registered once
    pub fn register(&mut self, version: &'static ContractVersion) -> Result<()> {
        if self.versions.contains_key(version.name) {
            return Err(Error::Configuration(format!(
                "contract version {} already registered",
                version.name
            )));
        }
        self.versions.insert(version.name, version);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&'static ContractVersion> {
        self.versions
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownContract(name.to_string()))
    }

    /// Bind a registered version to an address
    pub fn contract(&self, name: &str, address: Address) -> Result<Contract> {
        Ok(Contract::new(self.get(name)?, address))
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.versions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
