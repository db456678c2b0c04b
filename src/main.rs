//! tezos-vault command line
//!
//! Thin front end over [`tezos_vault::Wallet`]: contract calls, tez
//! transfers, cost estimates, authorised-transfer signatures and offline
//! parameter encoding.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::Value as Json;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tezos_vault::config::Config;
use tezos_vault::contracts::ContractRegistry;
use tezos_vault::metrics::Metrics;
use tezos_vault::observability::CorrelationId;
use tezos_vault::tx_builder::{FeeCeiling, OperationRequest, SubmitOptions};
use tezos_vault::types::Address;
use tezos_vault::Wallet;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "tezos-vault.toml", env = "TEZOS_VAULT_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics to stderr when done
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Call an entrypoint of a configured contract
    Call {
        /// Contract alias from the `[contracts]` table
        #[arg(long)]
        contract: String,
        #[arg(long)]
        method: String,
        /// JSON arguments, or `@path` to read them from a file
        #[arg(long)]
        args: String,
        #[command(flatten)]
        submit: SubmitFlags,
    },
    /// Send tez
    Transfer {
        #[arg(long)]
        to: String,
        /// Amount in mutez
        #[arg(long)]
        amount: u64,
        #[command(flatten)]
        submit: SubmitFlags,
    },
    /// Estimate the cost of one batch of transfers
    Estimate {
        /// `address:mutez`, repeatable
        #[arg(long = "transfer", required = true)]
        transfers: Vec<String>,
    },
    /// Sign an authorised-transfer message
    SignAuth {
        #[arg(long)]
        to: String,
        #[arg(long)]
        token_id: String,
        /// RFC 3339 timestamp
        #[arg(long)]
        timestamp: String,
    },
    /// Encode call parameters without contacting a node
    Encode {
        /// Contract version name, e.g. FeralfileExhibitionV2
        #[arg(long)]
        version: String,
        #[arg(long)]
        method: String,
        /// Contract address
        #[arg(long)]
        address: String,
        #[arg(long)]
        args: String,
        /// Signing account used by sender-grouped entrypoints
        #[arg(long)]
        sender: String,
    },
}

#[derive(ClapArgs, Debug, Default)]
struct SubmitFlags {
    /// Fee ceiling in mutez for this submission
    #[arg(long, conflicts_with = "no_fee_limit")]
    max_fee: Option<u64>,

    /// Submit whatever the fee
    #[arg(long)]
    no_fee_limit: bool,

    /// Wait for inclusion at the configured depth
    #[arg(long)]
    wait: bool,

    /// Request id to carry through logs and the receipt
    #[arg(long)]
    correlation_id: Option<String>,
}

impl SubmitFlags {
    fn options(&self) -> SubmitOptions {
        let fee_ceiling = match (self.max_fee, self.no_fee_limit) {
            (Some(limit), _) => FeeCeiling::Limit(limit),
            (None, true) => FeeCeiling::Unlimited,
            (None, false) => FeeCeiling::Configured,
        };
        SubmitOptions {
            source: None,
            fee_ceiling,
            wait_for_confirmation: self.wait.then_some(true),
            correlation_id: self.correlation_id.as_deref().map(CorrelationId::from),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs)?;

    let metrics = Arc::new(Metrics::new().context("Failed to create metrics")?);
    let result = run(&args, metrics.clone()).await;
    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    if args.metrics {
        eprintln!("{}", metrics.render()?);
    }
    result
}

async fn run(args: &Args, metrics: Arc<Metrics>) -> Result<()> {
    if let Command::Encode {
        version,
        method,
        address,
        args: raw,
        sender,
    } = &args.command
    {
        return encode(version, method, address, raw, sender);
    }

    let config = load_config(&args.config)?;
    let wallet = Wallet::from_config(&config)
        .await
        .context("Failed to connect wallet")?
        .with_metrics(metrics);
    info!(account = %wallet.account(), "Using account");

    match &args.command {
        Command::Call {
            contract,
            method,
            args: raw,
            submit,
        } => {
            let arguments = read_json(raw)?;
            let contract = *wallet.contract(contract)?;
            match wallet.call(&contract, method, &arguments, submit.options()).await? {
                Some(receipt) => print_json(&receipt)?,
                None => warn!("No requests in arguments, nothing submitted"),
            }
        }
        Command::Transfer { to, amount, submit } => {
            let destination: Address = to.parse().context("Invalid destination")?;
            let receipt = wallet
                .submitter()
                .submit(
                    vec![OperationRequest::transfer(destination, *amount)],
                    submit.options(),
                )
                .await?;
            print_json(&receipt)?;
        }
        Command::Estimate { transfers } => {
            let transfers = transfers
                .iter()
                .map(|t| parse_transfer(t))
                .collect::<Result<Vec<_>>>()?;
            let estimate = wallet.estimate_transfers(&transfers).await?;
            print_json(&serde_json::json!({
                "fee": estimate.fee,
                "burn": estimate.burn,
                "total": estimate.total(),
                "probed": estimate.probed,
            }))?;
        }
        Command::SignAuth {
            to,
            token_id,
            timestamp,
        } => {
            let recipient: Address = to.parse().context("Invalid recipient")?;
            let at: DateTime<Utc> = DateTime::parse_from_rfc3339(timestamp)
                .context("Invalid timestamp")?
                .with_timezone(&Utc);
            let signature = wallet
                .sign_auth_transfer_message(&recipient, token_id, &at)
                .await?;
            println!("{}", signature);
        }
        Command::Encode { .. } => unreachable!("handled before connecting"),
    }
    Ok(())
}

fn encode(version: &str, method: &str, address: &str, raw: &str, sender: &str) -> Result<()> {
    let registry = ContractRegistry::with_defaults();
    let address: Address = address.parse().context("Invalid contract address")?;
    let sender: Address = sender.parse().context("Invalid sender")?;
    let contract = registry.contract(version, address)?;
    let arguments = read_json(raw)?;
    match contract.build_call(method, &arguments, &sender)? {
        Some(call) => print_json(&serde_json::json!({
            "destination": call.destination().to_string(),
            "entrypoint": call.entrypoint(),
            "value": call.parameter().to_json(),
            "packed": hex::encode(call.parameter().pack()),
        })),
        None => {
            warn!("No requests in arguments, nothing encoded");
            Ok(())
        }
    }
}

fn parse_transfer(text: &str) -> Result<(Address, u64)> {
    let Some((address, amount)) = text.rsplit_once(':') else {
        bail!("expected address:mutez, got {:?}", text);
    };
    let address = address
        .parse()
        .with_context(|| format!("Invalid address in {:?}", text))?;
    let amount = amount
        .parse()
        .with_context(|| format!("Invalid amount in {:?}", text))?;
    Ok((address, amount))
}

fn read_json(raw: &str) -> Result<Json> {
    let text = match raw.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?
        }
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("Arguments are not valid JSON")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_filter = if verbose {
        "tezos_vault=debug,info"
    } else {
        "tezos_vault=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }
    Ok(())
}

/// Load configuration, falling back to defaults plus environment overrides
fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }
}
