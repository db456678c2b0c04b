//! Configuration for tezos-vault
//!
//! Loaded from a TOML file; a `.env` file and the process environment can
//! override the node URL and the secret key.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::tx_builder::fees::{
    Margins, DEFAULT_BLOCK_GAS_LIMIT, HARD_GAS_LIMIT_PER_OPERATION,
    HARD_STORAGE_LIMIT_PER_OPERATION,
};
use crate::types::{Address, ChainId};

pub const ENV_SECRET_KEY: &str = "TEZOS_VAULT_SECRET_KEY";
pub const ENV_RPC_URL: &str = "TEZOS_VAULT_RPC_URL";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub signer: SignerConfig,

    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Contract name → deployed instance
    #[serde(default)]
    pub contracts: HashMap<String, ContractEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// Retries for read-only requests
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Rate limit (requests per second)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: u32,

    /// Expected network; checked on connect when set
    #[serde(default)]
    pub chain_id: Option<ChainId>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SignerConfig {
    /// `edsk…` secret key
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl std::fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerConfig")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_gas_margin")]
    pub gas_margin: u64,

    #[serde(default = "default_storage_margin")]
    pub storage_margin: u64,

    /// Blocks after the branch during which the batch stays valid
    #[serde(default = "default_ttl")]
    pub ttl: u64,

    /// Fee ceiling in mutez for a whole batch; `None` disables the check
    #[serde(default = "default_max_fee")]
    pub max_fee: Option<u64>,

    #[serde(default)]
    pub wait_for_confirmation: bool,

    /// Blocks that must be baked on top of inclusion, inclusion counting as 1
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_poll_cycles")]
    pub max_poll_cycles: u32,

    #[serde(default = "default_confirmation_deadline")]
    pub confirmation_deadline_secs: u64,

    /// Mutez added to a fee estimated with the minimal probe amount
    #[serde(default = "default_probe_fee_buffer")]
    pub probe_fee_buffer: u64,

    /// The network's `hard_gas_limit_per_block`; simulated batches stay under it
    #[serde(default = "default_block_gas_limit")]
    pub block_gas_limit: u64,
}

impl SubmissionConfig {
    pub fn margins(&self) -> Margins {
        Margins {
            gas: self.gas_margin,
            storage: self.storage_margin,
        }
    }
}

/// One deployed contract: schema version name and address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEntry {
    pub version: String,
    pub address: Address,
}

fn default_rpc_url() -> String { "http://localhost:8732".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_rate_limit() -> u32 { 20 }
fn default_gas_margin() -> u64 { Margins::default().gas }
fn default_storage_margin() -> u64 { Margins::default().storage }
fn default_ttl() -> u64 { 120 }
fn default_max_fee() -> Option<u64> { Some(1_000_000) }
fn default_confirmations() -> u64 { 1 }
fn default_poll_interval_ms() -> u64 { 5_000 }
fn default_max_poll_cycles() -> u32 { 60 }
fn default_confirmation_deadline() -> u64 { 300 }
fn default_probe_fee_buffer() -> u64 { 1_000 }
fn default_block_gas_limit() -> u64 { DEFAULT_BLOCK_GAS_LIMIT }

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            timeout_secs: default_rpc_timeout(),
            max_retries: default_max_retries(),
            rate_limit_rps: default_rate_limit(),
            chain_id: None,
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            gas_margin: default_gas_margin(),
            storage_margin: default_storage_margin(),
            ttl: default_ttl(),
            max_fee: default_max_fee(),
            wait_for_confirmation: false,
            confirmations: default_confirmations(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_cycles: default_max_poll_cycles(),
            confirmation_deadline_secs: default_confirmation_deadline(),
            probe_fee_buffer: default_probe_fee_buffer(),
            block_gas_limit: default_block_gas_limit(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)
            .map_err(|e| Error::Configuration(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Load configuration with `.env` and environment overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `lookup`, normally the process environment
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_RPC_URL).filter(|v| !v.is_empty()) {
            self.node.rpc_url = url;
        }
        if let Some(key) = lookup(ENV_SECRET_KEY).filter(|v| !v.is_empty()) {
            self.signer.secret_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = &self.node.rpc_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Configuration(format!(
                "node.rpc_url must be an http(s) URL, got {:?}",
                url
            )));
        }
        if self.node.rate_limit_rps == 0 {
            return Err(Error::Configuration("node.rate_limit_rps must be positive".into()));
        }
        let s = &self.submission;
        if s.gas_margin > HARD_GAS_LIMIT_PER_OPERATION {
            return Err(Error::Configuration(
                "submission.gas_margin exceeds the per-operation gas limit".into(),
            ));
        }
        if s.storage_margin > HARD_STORAGE_LIMIT_PER_OPERATION {
            return Err(Error::Configuration(
                "submission.storage_margin exceeds the per-operation storage limit".into(),
            ));
        }
        if s.block_gas_limit == 0 {
            return Err(Error::Configuration("submission.block_gas_limit must be positive".into()));
        }
        if s.ttl == 0 || s.confirmations == 0 || s.max_poll_cycles == 0 {
            return Err(Error::Configuration(
                "submission.ttl, confirmations and max_poll_cycles must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.node.rpc_url, "http://localhost:8732");
        assert_eq!(config.submission.margins(), Margins { gas: 100, storage: 20 });
        assert_eq!(config.submission.max_fee, Some(1_000_000));
        assert!(!config.submission.wait_for_confirmation);
        assert!(config.contracts.is_empty());
        assert_eq!(config.submission.block_gas_limit, DEFAULT_BLOCK_GAS_LIMIT);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[node]
rpc_url = "https://ghostnet.example.org"
chain_id = "NetXnHfVqm9iesp"

[submission]
gas_margin = 500
wait_for_confirmation = true

[contracts.exhibition]
version = "FeralfileExhibitionV2"
address = "KT1BEqzn5Wx8uJrZNvuS9DVHmLvG9td3fDLi"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.node.rpc_url, "https://ghostnet.example.org");
        assert_eq!(config.node.chain_id.unwrap().to_string(), "NetXnHfVqm9iesp");
        assert_eq!(config.submission.gas_margin, 500);
        assert_eq!(config.submission.storage_margin, 20);
        assert!(config.submission.wait_for_confirmation);
        assert_eq!(config.contracts["exhibition"].version, "FeralfileExhibitionV2");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            ENV_RPC_URL => Some("https://rpc.example.org".to_string()),
            ENV_SECRET_KEY => Some("edsk-secret".to_string()),
            _ => None,
        });
        assert_eq!(config.node.rpc_url, "https://rpc.example.org");
        assert_eq!(config.signer.secret_key.as_deref(), Some("edsk-secret"));
        assert!(!format!("{:?}", config.signer).contains("edsk-secret"));
    }

    #[test]
    fn test_validation() {
        assert!(Config::from_toml("[node]\nrpc_url = \"localhost\"").is_err());
        assert!(Config::from_toml("[submission]\nttl = 0").is_err());
        assert!(Config::from_toml("[submission]\nblock_gas_limit = 0").is_err());
        let config = Config::from_toml("[submission]\nblock_gas_limit = 2600000").unwrap();
        assert_eq!(config.submission.block_gas_limit, 2_600_000);
        assert!(Config::from_toml("[node]\nchain_id = \"nope\"").is_err());
        assert!(Config::from_file("/nonexistent/tezos-vault.toml").is_err());
    }
}
