//! Wallet: a signer bound to a node and a set of deployed contracts

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use tracing::{info, instrument};

use crate::config::Config;
use crate::contracts::{authorized_transfer_message, Contract, ContractRegistry};
use crate::convert::{parse_token_id, timestamp_seconds};
use crate::errors::{Error, Result};
use crate::metrics::Metrics;
use crate::rpc::{HttpNode, NodeClient};
use crate::signer::{InMemorySigner, Signer};
use crate::tx_builder::{
    FeeEstimate, FeeEstimator, OperationRequest, Receipt, SubmitOptions, Submitter,
};
use crate::types::{blake2b_256, Address, ChainId, Signature};

pub const MAINNET_CHAIN_ID: &str = "NetXdQprcVkpaWU";
pub const GHOSTNET_CHAIN_ID: &str = "NetXnHfVqm9iesp";

/// Well-known network name of `chain_id`
pub fn network_name(chain_id: &ChainId) -> Option<&'static str> {
    match chain_id.to_string().as_str() {
        MAINNET_CHAIN_ID => Some("mainnet"),
        GHOSTNET_CHAIN_ID => Some("ghostnet"),
        _ => None,
    }
}

pub struct Wallet {
    submitter: Submitter,
    account: Address,
    chain_id: ChainId,
    contracts: HashMap<String, Contract>,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut aliases: Vec<_> = self.contracts.keys().collect();
        aliases.sort();
        f.debug_struct("Wallet")
            .field("account", &self.account.to_string())
            .field("chain_id", &self.chain_id.to_string())
            .field("contracts", &aliases)
            .finish_non_exhaustive()
    }
}

impl Wallet {
    /// Connect to `node` and check it serves the configured network
    ///
    /// Every `[contracts]` entry of `config` is bound through `registry`.
    #[instrument(skip_all, fields(endpoint = node.endpoint()))]
    pub async fn connect(
        node: Arc<dyn NodeClient>,
        signer: Arc<dyn Signer>,
        config: &Config,
        registry: &ContractRegistry,
    ) -> Result<Self> {
        let chain_id = node.chain_id().await?;
        if let Some(expected) = config.node.chain_id {
            if expected != chain_id {
                return Err(Error::ChainMismatch {
                    expected: expected.to_string(),
                    actual: chain_id.to_string(),
                });
            }
        }

        let account = signer
            .addresses()
            .first()
            .copied()
            .ok_or_else(|| Error::Signing("signer holds no keys".to_string()))?;

        let contracts = config
            .contracts
            .iter()
            .map(|(alias, entry)| {
                Ok((alias.clone(), registry.contract(&entry.version, entry.address)?))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        info!(
            account = %account,
            chain_id = %chain_id,
            network = network_name(&chain_id).unwrap_or("custom"),
            contracts = contracts.len(),
            "Wallet connected"
        );
        Ok(Self {
            submitter: Submitter::new(node, signer, config.submission.clone()),
            account,
            chain_id,
            contracts,
        })
    }

    /// Build the HTTP node and in-memory signer described by `config`
    pub async fn from_config(config: &Config) -> Result<Self> {
        let secret = config
            .signer
            .secret_key
            .as_deref()
            .ok_or_else(|| Error::Configuration("signer.secret_key is not set".to_string()))?;
        let signer = Arc::new(InMemorySigner::from_secret_key(secret)?);
        let node = Arc::new(HttpNode::new(&config.node)?);
        Self::connect(node, signer, config, &ContractRegistry::with_defaults()).await
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.submitter = self.submitter.with_metrics(metrics);
        self
    }

    /// Signing account
    pub fn account(&self) -> &Address {
        &self.account
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    pub fn submitter(&self) -> &Submitter {
        &self.submitter
    }

    /// Deployed contract configured under `alias`
    pub fn contract(&self, alias: &str) -> Result<&Contract> {
        self.contracts
            .get(alias)
            .ok_or_else(|| Error::UnknownContract(alias.to_string()))
    }

    /// Call `method` on the contract configured under `alias`
    ///
    /// `Ok(None)` means the arguments held no requests and nothing was sent.
    pub async fn call_contract(
        &self,
        alias: &str,
        method: &str,
        arguments: &Json,
    ) -> Result<Option<Receipt>> {
        let contract = *self.contract(alias)?;
        self.call(&contract, method, arguments, SubmitOptions::default()).await
    }

    pub async fn call(
        &self,
        contract: &Contract,
        method: &str,
        arguments: &Json,
        options: SubmitOptions,
    ) -> Result<Option<Receipt>> {
        let sender = options.source.unwrap_or(self.account);
        let Some(call) = contract.build_call(method, arguments, &sender)? else {
            info!(contract = contract.version().name, method, "No requests, nothing to submit");
            return Ok(None);
        };
        self.submitter
            .submit(vec![call.into()], options)
            .await
            .map(Some)
    }

    /// Send `amount` mutez to `destination`
    pub async fn transfer(&self, destination: Address, amount: u64) -> Result<Receipt> {
        self.submitter
            .submit(
                vec![OperationRequest::transfer(destination, amount)],
                SubmitOptions::default(),
            )
            .await
    }

    pub async fn estimate_transfers(&self, transfers: &[(Address, u64)]) -> Result<FeeEstimate> {
        FeeEstimator::new(self.submitter.clone())
            .estimate(transfers, Some(self.account))
            .await
    }

    /// Signature authorising a transfer of `token_id` to `recipient`,
    /// valid for `timestamp`
    pub async fn sign_auth_transfer_message(
        &self,
        recipient: &Address,
        token_id: &str,
        timestamp: &DateTime<Utc>,
    ) -> Result<Signature> {
        let token_id = parse_token_id(token_id)?;
        let message =
            authorized_transfer_message(&timestamp_seconds(timestamp), recipient, &token_id);
        let digest = blake2b_256(&message);
        self.submitter.signer().sign_digest(&self.account, &digest).await
    }
}
