//! Error types for tezos-vault
//!
//! One taxonomy covers the whole path from raw caller input to an injected
//! operation:
//! - Value conversion (addresses, keys, signatures, token ids)
//! - Parameter encoding against an entrypoint schema
//! - Node communication and chain identity
//! - Simulation, fee limits, signing and confirmation
//!
//! Conversion and encoding errors are always raised before any network call.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for parameter building and operation submission
#[derive(Error, Debug)]
pub enum Error {
    /// The text is not a recognised address encoding
    #[error("Invalid address provided: {0}")]
    InvalidAddress(String),

    /// The text is not a recognised public key encoding
    #[error("Invalid public key provided: {0}")]
    InvalidPublicKey(String),

    /// The text is not a recognised signature encoding
    #[error("Invalid signature provided: {0}")]
    InvalidSignature(String),

    /// The token id is not a base-10 integer
    #[error("Invalid tokenID provided: {0}")]
    InvalidTokenId(String),

    /// A caller-supplied argument is missing or has the wrong type
    #[error("Invalid argument (field={field}): {reason}")]
    InvalidArgument {
        /// Name of the offending field in the argument record
        field: String,
        /// Detailed reason for the failure
        reason: String,
    },

    /// A converted value does not fit the entrypoint schema
    #[error("Schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch {
        expected: String,
        found: String,
    },

    /// No contract version registered under this name
    #[error("Unknown contract: {0}")]
    UnknownContract(String),

    /// The contract version does not expose this entrypoint
    #[error("Unsupported method {method} for contract {contract}")]
    UnknownEntrypoint {
        contract: String,
        method: String,
    },

    /// Connected node serves a different chain from the configured one
    #[error("Connected node serves chain {actual}, expected {expected}")]
    ChainMismatch {
        expected: String,
        actual: String,
    },

    /// Transport-level failure talking to the node
    #[error("Node unreachable: {message} (endpoint: {endpoint})")]
    NodeUnreachable {
        endpoint: String,
        message: String,
    },

    /// The node answered with an error status or an undecodable body
    #[error("RPC error: {message} (endpoint: {endpoint}, status: {status:?})")]
    Rpc {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// Dry-run of the batch reported a failing operation
    ///
    /// The whole batch is rejected; `index` points at the first failing
    /// operation inside the batch (reveal included).
    #[error("Simulation failed (operation {index}): {cause}")]
    SimulationFailed {
        index: usize,
        cause: String,
    },

    /// The computed fee is above the caller's ceiling
    #[error("Fee {fee} mutez exceeds ceiling of {ceiling} mutez")]
    FeeExceedsCeiling {
        fee: u64,
        ceiling: u64,
    },

    /// Signer unavailable or refused to sign
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Confirmation wait gave up; the operation may still be included
    #[error("Timed out waiting for {operation_hash} after {polls} polls")]
    Timeout {
        operation_hash: String,
        polls: u32,
    },

    /// The batch could not be serialised
    #[error("Forge error: {0}")]
    Forge(String),

    /// Bytes are not a well-formed encoding of the expected structure
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is potentially retryable
    ///
    /// `Timeout` is not retryable: the outcome is unknown and resubmitting
    /// may double-spend the counter.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NodeUnreachable { .. } => true,
            Self::Rpc { status, .. } => matches!(status, Some(s) if (500..600).contains(s)),
            Self::FeeExceedsCeiling { .. } => true,

            Self::InvalidAddress(_)
            | Self::InvalidPublicKey(_)
            | Self::InvalidSignature(_)
            | Self::InvalidTokenId(_)
            | Self::InvalidArgument { .. }
            | Self::SchemaMismatch { .. }
            | Self::UnknownContract(_)
            | Self::UnknownEntrypoint { .. }
            | Self::ChainMismatch { .. }
            | Self::SimulationFailed { .. }
            | Self::Signing(_)
            | Self::Timeout { .. }
            | Self::Forge(_)
            | Self::Decode(_)
            | Self::Configuration(_)
            | Self::Internal(_) => false,
        }
    }

    /// Get the error category (the failing stage) for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_)
            | Self::InvalidPublicKey(_)
            | Self::InvalidSignature(_)
            | Self::InvalidTokenId(_)
            | Self::InvalidArgument { .. } => "validation",
            Self::SchemaMismatch { .. } | Self::Decode(_) => "encoding",
            Self::UnknownContract(_) | Self::UnknownEntrypoint { .. } => "dispatch",
            Self::ChainMismatch { .. } => "chain",
            Self::NodeUnreachable { .. } | Self::Rpc { .. } => "rpc",
            Self::SimulationFailed { .. } => "simulation",
            Self::FeeExceedsCeiling { .. } => "fee",
            Self::Signing(_) => "signing",
            Self::Timeout { .. } => "confirmation",
            Self::Forge(_) => "forge",
            Self::Configuration(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

// Convenience constructors for common error scenarios
impl Error {
    /// Create an invalid argument error for a named field
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a simulation failure error
    pub fn simulation_failed(index: usize, cause: impl Into<String>) -> Self {
        Self::SimulationFailed {
            index,
            cause: cause.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::FeeExceedsCeiling {
            fee: 2_500,
            ceiling: 2_000,
        };
        assert_eq!(err.to_string(), "Fee 2500 mutez exceeds ceiling of 2000 mutez");

        let err = Error::invalid_argument("token_id", "missing");
        assert_eq!(err.to_string(), "Invalid argument (field=token_id): missing");
    }

    #[test]
    fn test_error_retryability() {
        assert!(Error::NodeUnreachable {
            endpoint: "http://localhost".to_string(),
            message: "connection refused".to_string(),
        }
        .is_retryable());
        assert!(Error::Rpc {
            endpoint: "http://localhost".to_string(),
            status: Some(502),
            message: "bad gateway".to_string(),
        }
        .is_retryable());

        assert!(!Error::Rpc {
            endpoint: "http://localhost".to_string(),
            status: Some(400),
            message: "bad request".to_string(),
        }
        .is_retryable());
        assert!(!Error::simulation_failed(0, "balance_too_low").is_retryable());
        assert!(!Error::Timeout {
            operation_hash: "oo".to_string(),
            polls: 3,
        }
        .is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::InvalidTokenId("x".to_string()).category(), "validation");
        assert_eq!(Error::simulation_failed(1, "x").category(), "simulation");
        assert_eq!(
            Error::FeeExceedsCeiling { fee: 1, ceiling: 0 }.category(),
            "fee"
        );
    }
}
