use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonempty::NonEmpty;
use parking_lot::Mutex;
use serde_json::{json, Value};
use thiserror::Error;

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::felt::Felt;
use crate::multicall::Call;

/// Block a read is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockId {
    #[default]
    Latest,
    Pending,
    Number(u64),
}

impl BlockId {
    pub fn to_json(self) -> Value {
        match self {
            BlockId::Latest => json!("latest"),
            BlockId::Pending => json!("pending"),
            BlockId::Number(n) => json!({ "block_number": n }),
        }
    }
}

impl FromStr for BlockId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latest" => Ok(BlockId::Latest),
            "pending" => Ok(BlockId::Pending),
            other => other
                .parse::<u64>()
                .map(BlockId::Number)
                .map_err(|_| format!("invalid block id: {s}")),
        }
    }
}

/// Classification of RPC failures for retry and reporting logic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcErrorType {
    /// The call reverted inside the contract
    ContractError,
    ContractNotFound,
    BlockNotFound,
    RateLimited,
    Timeout,
    Http,
    InvalidResponse,
    Other(String),
}

impl RpcErrorType {
    /// Reverts and malformed payloads will not change on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            RpcErrorType::ContractError | RpcErrorType::ContractNotFound | RpcErrorType::InvalidResponse
        )
    }
}

impl fmt::Display for RpcErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcErrorType::ContractError => f.write_str("contract error"),
            RpcErrorType::ContractNotFound => f.write_str("contract not found"),
            RpcErrorType::BlockNotFound => f.write_str("block not found"),
            RpcErrorType::RateLimited => f.write_str("rate limited"),
            RpcErrorType::Timeout => f.write_str("timeout"),
            RpcErrorType::Http => f.write_str("http"),
            RpcErrorType::InvalidResponse => f.write_str("invalid response"),
            RpcErrorType::Other(message) => write!(f, "rpc error ({message})"),
        }
    }
}

/// Classify a JSON-RPC error object into an [`RpcErrorType`]
pub fn classify_rpc_error(code: i64, message: &str) -> RpcErrorType {
    let msg = message.to_lowercase();
    match code {
        40 | 21 => RpcErrorType::ContractError,
        20 => RpcErrorType::ContractNotFound,
        24 => RpcErrorType::BlockNotFound,
        429 | -32005 => RpcErrorType::RateLimited,
        _ if msg.contains("rate limit") || msg.contains("too many requests") => RpcErrorType::RateLimited,
        _ if msg.contains("contract error") || msg.contains("execution reverted") => RpcErrorType::ContractError,
        _ => RpcErrorType::Other(message.to_string()),
    }
}

/// A failed read. The whole batch it belonged to is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{endpoint}: {kind}: {message}")]
pub struct TransportError {
    pub kind: RpcErrorType,
    pub endpoint: String,
    pub message: String,
}

impl TransportError {
    pub fn new<E: Into<String>, M: Into<String>>(kind: RpcErrorType, endpoint: E, message: M) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn is_contract_error(&self) -> bool {
        matches!(self.kind, RpcErrorType::ContractError | RpcErrorType::ContractNotFound)
    }
}

/// `starknet_call` request body.
pub fn call_request_body(id: u64, call: &Call, block: BlockId) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "starknet_call",
        "params": {
            "request": {
                "contract_address": call.to.felt().to_hex(),
                "entry_point_selector": call.selector.to_hex(),
                "calldata": call.calldata.iter().map(Felt::to_hex).collect::<Vec<_>>(),
            },
            "block_id": block.to_json(),
        }
    })
}

/// Extract the result felts (or the classified error) from a JSON-RPC reply.
pub fn parse_call_response(endpoint: &str, value: &Value) -> Result<Vec<Felt>, TransportError> {
    if let Some(error) = value.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        let detail = match error.get("data") {
            Some(data) if !data.is_null() => format!("{message}: {data}"),
            _ => message.clone(),
        };
        return Err(TransportError::new(classify_rpc_error(code, &message), endpoint, detail));
    }

    let words = value
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| TransportError::new(RpcErrorType::InvalidResponse, endpoint, "missing result array"))?;

    words
        .iter()
        .map(|word| {
            word.as_str()
                .and_then(|text| Felt::from_hex(text).ok())
                .ok_or_else(|| {
                    TransportError::new(RpcErrorType::InvalidResponse, endpoint, format!("bad felt in result: {word}"))
                })
        })
        .collect()
}

/// Read-only contract access. Allows injecting mock implementations for tests.
#[async_trait]
pub trait ContractReader: Send + Sync + fmt::Debug {
    async fn call_contract(&self, call: &Call, block: BlockId) -> Result<Vec<Felt>, TransportError>;
}

/// Endpoint performance metrics for adaptive ranking
#[derive(Debug, Clone, Default)]
pub struct EndpointMetrics {
    pub success_count: u64,
    pub error_count: u64,
    pub total_latency_ms: u64,
}

impl EndpointMetrics {
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.error_count;
        if total == 0 {
            1.0 // Assume good until proven otherwise
        } else {
            self.success_count as f64 / total as f64
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.success_count == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.success_count as f64
        }
    }

    fn record_success(&mut self, latency_ms: u64) {
        self.success_count += 1;
        self.total_latency_ms += latency_ms;
    }

    fn record_error(&mut self) {
        self.error_count += 1;
    }
}

/// Transport tuning, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub timeout: Duration,
    pub retry_attempts: usize,
    pub requests_per_second: u32,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(8_000),
            retry_attempts: 3,
            requests_per_second: 20,
        }
    }
}

impl From<&Config> for RpcSettings {
    fn from(config: &Config) -> Self {
        Self {
            timeout: Duration::from_millis(config.rpc_timeout_ms),
            retry_attempts: config.rpc_retry_attempts,
            requests_per_second: config.rpc_requests_per_second,
        }
    }
}

/// JSON-RPC client over one or more Starknet nodes.
pub struct StarknetRpc {
    endpoints: Vec<String>,
    http: reqwest::Client,
    rotation: AtomicUsize,
    next_id: AtomicU64,
    limiter: DefaultDirectRateLimiter,
    metrics: Mutex<HashMap<String, EndpointMetrics>>,
    settings: RpcSettings,
}

impl fmt::Debug for StarknetRpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StarknetRpc")
            .field("endpoints", &self.endpoints)
            .field("settings", &self.settings)
            .finish()
    }
}

impl StarknetRpc {
    pub fn new(endpoints: NonEmpty<String>, settings: RpcSettings) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| TransportError::new(RpcErrorType::Http, endpoints.head.clone(), e.to_string()))?;
        let rate = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            endpoints: endpoints.into_iter().collect(),
            http,
            rotation: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            limiter: RateLimiter::direct(Quota::per_second(rate)),
            metrics: Mutex::new(HashMap::new()),
            settings,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let endpoints = NonEmpty::from_vec(config.rpc_endpoints.clone()).ok_or_else(|| {
            TransportError::new(RpcErrorType::Other("configuration".into()), "", "no RPC endpoints configured")
        })?;
        Self::new(endpoints, RpcSettings::from(config))
    }

    pub fn endpoint_metrics(&self) -> HashMap<String, EndpointMetrics> {
        self.metrics.lock().clone()
    }

    /// Rotation order, preferring the endpoint with the best success rate.
    fn pick_endpoint(&self) -> String {
        let start = self.rotation.fetch_add(1, Ordering::Relaxed);
        let metrics = self.metrics.lock();
        let rate = |endpoint: &String| metrics.get(endpoint).map(EndpointMetrics::success_rate).unwrap_or(1.0);

        let n = self.endpoints.len();
        let mut best = &self.endpoints[start % n];
        for k in 1..n {
            let candidate = &self.endpoints[(start + k) % n];
            if rate(candidate) > rate(best) {
                best = candidate;
            }
        }
        best.clone()
    }

    fn record(&self, endpoint: &str, outcome: &Result<Vec<Felt>, TransportError>, latency: Duration) {
        let mut metrics = self.metrics.lock();
        let entry = metrics.entry(endpoint.to_string()).or_default();
        match outcome {
            // a revert still means the node answered
            Err(e) if !e.is_contract_error() => entry.record_error(),
            _ => entry.record_success(latency.as_millis() as u64),
        }
    }

    async fn send(&self, endpoint: &str, body: &Value) -> Result<Vec<Felt>, TransportError> {
        let response = self.http.post(endpoint).json(body).send().await.map_err(|e| {
            let kind = if e.is_timeout() { RpcErrorType::Timeout } else { RpcErrorType::Http };
            TransportError::new(kind, endpoint, e.to_string())
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(TransportError::new(RpcErrorType::RateLimited, endpoint, status.to_string()));
        }
        if !status.is_success() {
            return Err(TransportError::new(RpcErrorType::Http, endpoint, status.to_string()));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| TransportError::new(RpcErrorType::InvalidResponse, endpoint, e.to_string()))?;
        parse_call_response(endpoint, &value)
    }

    async fn post_once(&self, body: &Value) -> Result<Vec<Felt>, TransportError> {
        let endpoint = self.pick_endpoint();
        self.limiter.until_ready().await;

        let started = Instant::now();
        let outcome = match timeout(self.settings.timeout, self.send(&endpoint, body)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(TransportError::new(
                RpcErrorType::Timeout,
                endpoint.as_str(),
                format!("no response within {:?}", self.settings.timeout),
            )),
        };
        let latency = started.elapsed();
        self.record(&endpoint, &outcome, latency);

        match &outcome {
            Ok(words) => debug!(endpoint = %endpoint, words = words.len(), latency_ms = latency.as_millis() as u64, "starknet_call ok"),
            Err(e) => warn!(endpoint = %endpoint, kind = %e.kind, "starknet_call failed: {}", e.message),
        }
        outcome
    }
}

#[async_trait]
impl ContractReader for StarknetRpc {
    async fn call_contract(&self, call: &Call, block: BlockId) -> Result<Vec<Felt>, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = call_request_body(id, call, block);

        let strategy = ExponentialBackoff::from_millis(50)
            .max_delay(Duration::from_millis(1_000))
            .map(jitter)
            .take(self.settings.retry_attempts);

        let result = RetryIf::start(strategy, || self.post_once(&body), |e: &TransportError| e.is_retryable()).await;
        if let Err(e) = &result {
            info!(request_id = id, to = %call.to, "read gave up: {}", e);
        }
        result
    }
}
