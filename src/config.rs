use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::felt::Address;
use crate::registry::{Network, NetworkContext};
use crate::rpc_manager::BlockId;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable tracing output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("no factory address configured for {0}")]
    MissingFactory(Network),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: Network,

    // Transport
    #[serde(default = "default_rpc_endpoints")]
    pub rpc_endpoints: Vec<String>,
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    #[serde(default = "default_rpc_retry_attempts")]
    pub rpc_retry_attempts: usize,
    #[serde(default = "default_rpc_requests_per_second")]
    pub rpc_requests_per_second: u32,
    /// "latest", "pending" or a block number
    #[serde(default = "default_block")]
    pub block: String,

    // Contract overrides; Sepolia has no default factory
    #[serde(default)]
    pub factory_address: Option<Address>,
    #[serde(default)]
    pub multicall_address: Option<Address>,

    /// How long definitive resolutions stay cached
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            rpc_endpoints: default_rpc_endpoints(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            rpc_retry_attempts: default_rpc_retry_attempts(),
            rpc_requests_per_second: default_rpc_requests_per_second(),
            block: default_block(),
            factory_address: None,
            multicall_address: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            log_format: LogFormat::Pretty,
        }
    }
}

fn default_rpc_endpoints() -> Vec<String> {
    vec!["https://starknet-mainnet.public.blastapi.io/rpc/v0_7".to_string()]
}
fn default_rpc_timeout_ms() -> u64 {
    8_000
}
fn default_rpc_retry_attempts() -> usize {
    3
}
fn default_rpc_requests_per_second() -> u32 {
    20
}
fn default_block() -> String {
    "latest".to_string()
}
fn default_cache_ttl_secs() -> u64 {
    15
}

impl Config {
    /// Load from `$MEMECOIN_CONFIG` (or "config.toml") when present, else
    /// defaults. Environment overrides win:
    /// - STARKNET_NETWORK=mainnet | sepolia
    /// - STARKNET_RPC_URL=<url>[,<url>...]
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("MEMECOIN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = if Path::new(&path).exists() {
            Self::load_from(&path)?
        } else {
            Config::default()
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate().map_err(ConfigError::Invalid)?;
        Ok(cfg)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str::<Config>(&text)?)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(network) = lookup("STARKNET_NETWORK") {
            self.network = network.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(urls) = lookup("STARKNET_RPC_URL") {
            let endpoints: Vec<String> = urls
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
            if !endpoints.is_empty() {
                self.rpc_endpoints = endpoints;
            }
        }
        Ok(())
    }

    /// Validate configuration consistency and constraints
    pub fn validate(&self) -> Result<(), String> {
        if self.rpc_endpoints.is_empty() {
            return Err("At least one RPC endpoint must be configured".to_string());
        }

        if let Some(bad) = self
            .rpc_endpoints
            .iter()
            .find(|u| !(u.starts_with("http://") || u.starts_with("https://")))
        {
            return Err(format!("RPC endpoint must be an http(s) URL: {bad}"));
        }

        if self.rpc_timeout_ms == 0 {
            return Err("rpc_timeout_ms must be greater than 0".to_string());
        }

        if self.rpc_requests_per_second == 0 {
            return Err("rpc_requests_per_second must be greater than 0".to_string());
        }

        self.block_id()?;

        Ok(())
    }

    pub fn block_id(&self) -> Result<BlockId, String> {
        self.block.parse()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn network_context(&self) -> Result<NetworkContext, ConfigError> {
        let factory = self
            .factory_address
            .or_else(|| NetworkContext::default_factory(self.network))
            .ok_or(ConfigError::MissingFactory(self.network))?;
        let multicall = self
            .multicall_address
            .unwrap_or_else(|| NetworkContext::default_multicall(self.network));
        Ok(NetworkContext::new(self.network, factory, multicall))
    }
}
