//! Wallet over the HTTP node client, against a mocked node

use std::sync::Arc;

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use tezos_vault::config::{Config, NodeConfig};
use tezos_vault::rpc::HttpNode;
use tezos_vault::types::{BlockHash, OperationHash};
use tezos_vault::{ContractRegistry, Error, InMemorySigner, Wallet};

const SECRET_KEY: &str = "edsk3gUfUPyBSfrS9CCgmCiQsTCHGkviBDusMxDJstFtojtc1zcpsh";
const PUBLIC_KEY: &str = "edpkuBknW28nW72KG6RoHtYW7p12T6GKc7nAbwYX5m8Wd9sDVC9yav";
const ADDRESS: &str = "tz1KqTpEZ7Yob7QbPE4Hy4Wo8fHG8LhKxZSx";
const MAINNET: &str = "NetXdQprcVkpaWU";
const GHOSTNET: &str = "NetXnHfVqm9iesp";

fn config(url: &str) -> Config {
    let mut config = Config::default();
    config.node = NodeConfig {
        rpc_url: url.to_string(),
        timeout_secs: 5,
        max_retries: 0,
        rate_limit_rps: 1_000,
        chain_id: Some(MAINNET.parse().unwrap()),
    };
    config
}

async fn connect(config: &Config) -> tezos_vault::Result<Wallet> {
    let node = Arc::new(HttpNode::new(&config.node)?);
    let signer = Arc::new(InMemorySigner::from_secret_key(SECRET_KEY)?);
    Wallet::connect(node, signer, config, &ContractRegistry::with_defaults()).await
}

async fn mock_chain(server: &mut ServerGuard, chain_id: &str) -> mockito::Mock {
    server
        .mock("GET", "/chains/main/chain_id")
        .with_status(200)
        .with_body(format!("\"{}\"", chain_id))
        .create_async()
        .await
}

/// Head, counter and manager key of a revealed account
async fn mock_account_state(server: &mut ServerGuard) {
    let branch = BlockHash::from_bytes([7; 32]);
    server
        .mock("GET", "/chains/main/blocks/head/header")
        .with_status(200)
        .with_body(json!({ "hash": branch.to_string(), "level": 100 }).to_string())
        .create_async()
        .await;
    server
        .mock(
            "GET",
            format!("/chains/main/blocks/head/context/contracts/{}/counter", ADDRESS).as_str(),
        )
        .with_status(200)
        .with_body("\"41\"")
        .create_async()
        .await;
    server
        .mock(
            "GET",
            format!("/chains/main/blocks/head/context/contracts/{}/manager_key", ADDRESS).as_str(),
        )
        .with_status(200)
        .with_body(format!("\"{}\"", PUBLIC_KEY))
        .create_async()
        .await;
}

async fn mock_simulation(server: &mut ServerGuard, milligas: &str) -> mockito::Mock {
    server
        .mock("POST", "/chains/main/blocks/head/helpers/scripts/run_operation")
        .match_body(Matcher::PartialJson(json!({ "chain_id": MAINNET })))
        .with_status(200)
        .with_body(
            json!({
                "contents": [{
                    "kind": "transaction",
                    "metadata": { "operation_result": {
                        "status": "applied",
                        "consumed_milligas": milligas,
                    } }
                }]
            })
            .to_string(),
        )
        .create_async()
        .await
}

#[tokio::test]
async fn test_transfer_end_to_end() {
    let mut server = Server::new_async().await;
    mock_chain(&mut server, MAINNET).await;
    mock_account_state(&mut server).await;
    let simulation = mock_simulation(&mut server, "1000000").await;
    let injected = OperationHash::from_bytes([9; 32]);
    let injection = server
        .mock("POST", "/injection/operation")
        .match_query(Matcher::UrlEncoded("chain".into(), "main".into()))
        .with_status(200)
        .with_body(format!("\"{}\"", injected))
        .expect(1)
        .create_async()
        .await;

    let wallet = connect(&config(&server.url())).await.unwrap();
    let receipt = wallet
        .transfer(ADDRESS.parse().unwrap(), 1_000_000)
        .await
        .unwrap();

    assert_eq!(receipt.operation_hash, injected);
    assert_eq!(receipt.operations, 1);
    assert_eq!(receipt.gas_limit, 1_000 + 100);
    assert_eq!(receipt.storage_limit, 20);
    assert!(!receipt.revealed_key);
    assert!(receipt.fee > 100);
    simulation.assert_async().await;
    injection.assert_async().await;
}

#[tokio::test]
async fn test_fee_ceiling_blocks_injection() {
    let mut server = Server::new_async().await;
    mock_chain(&mut server, MAINNET).await;
    mock_account_state(&mut server).await;
    mock_simulation(&mut server, "1000000").await;
    let injection = server
        .mock("POST", "/injection/operation")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut config = config(&server.url());
    config.submission.max_fee = Some(10);
    let wallet = connect(&config).await.unwrap();

    match wallet.transfer(ADDRESS.parse().unwrap(), 1).await {
        Err(Error::FeeExceedsCeiling { fee, ceiling }) => {
            assert_eq!(ceiling, 10);
            assert!(fee > ceiling);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    injection.assert_async().await;
}

#[tokio::test]
async fn test_connect_rejects_other_network() {
    let mut server = Server::new_async().await;
    mock_chain(&mut server, GHOSTNET).await;

    match connect(&config(&server.url())).await {
        Err(Error::ChainMismatch { expected, actual }) => {
            assert_eq!(expected, MAINNET);
            assert_eq!(actual, GHOSTNET);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_connect_to_unreachable_node() {
    let config = config("http://127.0.0.1:1");
    assert!(matches!(
        connect(&config).await,
        Err(Error::NodeUnreachable { .. })
    ));
}
