//! HTTP node client
//!
//! Requests are rate limited per client. Read-only GETs are retried with
//! jittered exponential backoff on transport errors and 5xx answers;
//! simulation and injection are never retried here.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, instrument, warn};

use crate::config::NodeConfig;
use crate::errors::{Error, Result};
use crate::types::{Address, BlockHash, ChainId, OperationHash, PublicKey};

use super::{BlockHeader, NodeClient};

/// reqwest-backed [`NodeClient`]
pub struct HttpNode {
    base_url: String,
    client: reqwest::Client,
    limiter: DefaultDirectRateLimiter,
    max_retries: usize,
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
}

impl std::fmt::Debug for HttpNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNode")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .field("total_requests", &self.total_requests)
            .field("failed_requests", &self.failed_requests)
            .finish_non_exhaustive()
    }
}

#[derive(serde::Deserialize)]
struct HeaderResponse {
    hash: BlockHash,
    level: i64,
}

impl HttpNode {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("HTTP client: {}", e)))?;
        let rps = NonZeroU32::new(config.rate_limit_rps).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            base_url: config.rpc_url.trim_end_matches('/').to_string(),
            client,
            limiter: RateLimiter::direct(Quota::per_second(rps)),
            max_retries: config.max_retries as usize,
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
        })
    }

    /// (total, failed) request counts since creation
    pub fn request_stats(&self) -> (u64, u64) {
        (
            self.total_requests.load(Ordering::Relaxed),
            self.failed_requests.load(Ordering::Relaxed),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        Error::NodeUnreachable {
            endpoint: self.base_url.clone(),
            message: err.to_string(),
        }
    }

    async fn read_response<T: DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(Error::Rpc {
                endpoint: self.url(path),
                status: Some(status.as_u16()),
                message: body,
            });
        }
        serde_json::from_str(&body).map_err(|e| Error::Rpc {
            endpoint: self.url(path),
            status: Some(status.as_u16()),
            message: format!("undecodable body: {}", e),
        })
    }

    async fn get_once<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.limiter.until_ready().await;
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        debug!(path, "GET");
        let result = match self.client.get(self.url(path)).send().await {
            Ok(response) => self.read_response(path, response).await,
            Err(e) => Err(self.transport_error(e)),
        };
        if result.is_err() {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(50)
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(self.max_retries);
        RetryIf::spawn(
            strategy,
            || self.get_once(path),
            |e: &Error| {
                let retry = e.is_retryable();
                if retry {
                    warn!(path, error = %e, "Retrying node request");
                }
                retry
            },
        )
        .await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Json) -> Result<T> {
        self.limiter.until_ready().await;
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        debug!(path, "POST");
        let result = match self.client.post(self.url(path)).json(body).send().await {
            Ok(response) => self.read_response(path, response).await,
            Err(e) => Err(self.transport_error(e)),
        };
        if result.is_err() {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}

fn parse_number(path: &str, text: &str) -> Result<u64> {
    text.parse().map_err(|_| Error::Rpc {
        endpoint: path.to_string(),
        status: None,
        message: format!("expected a decimal counter, got {:?}", text),
    })
}

#[async_trait]
impl NodeClient for HttpNode {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self))]
    async fn chain_id(&self) -> Result<ChainId> {
        self.get("/chains/main/chain_id").await
    }

    async fn head(&self) -> Result<BlockHeader> {
        let header: HeaderResponse = self.get("/chains/main/blocks/head/header").await?;
        Ok(BlockHeader {
            hash: header.hash,
            level: header.level,
        })
    }

    async fn counter(&self, address: &Address) -> Result<u64> {
        let path = format!("/chains/main/blocks/head/context/contracts/{}/counter", address);
        let raw: String = self.get(&path).await?;
        parse_number(&path, &raw)
    }

    async fn manager_key(&self, address: &Address) -> Result<Option<PublicKey>> {
        let path = format!(
            "/chains/main/blocks/head/context/contracts/{}/manager_key",
            address
        );
        let raw: Option<String> = self.get(&path).await?;
        raw.map(|key| key.parse()).transpose()
    }

    #[instrument(skip(self, request))]
    async fn run_operation(&self, request: &Json) -> Result<Json> {
        self.post("/chains/main/blocks/head/helpers/scripts/run_operation", request)
            .await
    }

    #[instrument(skip(self, signed_hex))]
    async fn inject(&self, signed_hex: &str) -> Result<OperationHash> {
        self.post("/injection/operation?chain=main", &Json::String(signed_hex.to_string()))
            .await
    }

    async fn operation_hashes(&self, level: i64) -> Result<Vec<OperationHash>> {
        let passes: Vec<Vec<OperationHash>> = self
            .get(&format!("/chains/main/blocks/{}/operation_hashes", level))
            .await?;
        Ok(passes.into_iter().flatten().collect())
    }
}
