use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::errors::{DecodeError, ResolveError};
use crate::felt::Address;
use crate::multicall::Multicall;
use crate::registry::NetworkContext;
use crate::rpc_manager::{BlockId, ContractReader};
use crate::structured_logging::PipelineContext;

use super::decoder::{self, PhaseOne, PhaseTwo};
use super::MemecoinState;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15);
const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Outcome of resolving one address.
///
/// Decode mismatches are not part of this: they come back as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome")]
pub enum Resolution {
    Memecoin(Box<MemecoinState>),
    NotAMemecoin,
    /// Plausibly launched, but the factory or lock manager has not caught up.
    Indexing,
    TransientError { reason: String },
}

impl Resolution {
    pub fn memecoin(&self) -> Option<&MemecoinState> {
        match self {
            Resolution::Memecoin(state) => Some(state),
            _ => None,
        }
    }

    /// Only these survive in the cache.
    pub fn is_definitive(&self) -> bool {
        matches!(self, Resolution::Memecoin(_) | Resolution::NotAMemecoin)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Memecoin(_) => "memecoin",
            Resolution::NotAMemecoin => "not_a_memecoin",
            Resolution::Indexing => "indexing",
            Resolution::TransientError { .. } => "transient_error",
        }
    }

    fn transient(error: impl ToString) -> Self {
        Resolution::TransientError {
            reason: error.to_string(),
        }
    }
}

// Outcomes that flow through the single-flight path without being cached.
#[derive(Debug)]
enum Uncached {
    Outcome(Resolution),
    Decode(DecodeError),
}

/// Resolves memecoin addresses against one network.
#[derive(Debug, Clone)]
pub struct MemecoinResolver {
    ctx: NetworkContext,
    multicall: Multicall,
    block: BlockId,
    cache: Cache<Address, Resolution>,
}

impl MemecoinResolver {
    pub fn new(ctx: NetworkContext, reader: Arc<dyn ContractReader>) -> Self {
        let multicall = Multicall::new(reader, ctx.multicall);
        Self {
            ctx,
            multicall,
            block: BlockId::Latest,
            cache: Cache::builder()
                .max_capacity(DEFAULT_CACHE_CAPACITY)
                .time_to_live(DEFAULT_CACHE_TTL)
                .build(),
        }
    }

    pub fn with_block(mut self, block: BlockId) -> Self {
        self.block = block;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Cache::builder()
            .max_capacity(DEFAULT_CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        self
    }

    pub fn context(&self) -> &NetworkContext {
        &self.ctx
    }

    pub fn multicall(&self) -> &Multicall {
        &self.multicall
    }

    /// One uncached resolution: a phase-one batch, then one lock-manager read
    /// when the token is launched.
    pub async fn resolve(&self, address: Address) -> Result<Resolution, DecodeError> {
        let pipeline = PipelineContext::new("memecoin_resolver");
        let started = Instant::now();

        let outcome = self.resolve_inner(address).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(resolution) => pipeline.logger.log_resolution(&address, resolution, elapsed_ms),
            Err(e) => {
                error!(memecoin = %address, "contract interface mismatch: {}", e);
                pipeline.logger.log_decode_failure(&address, e);
            }
        }
        outcome
    }

    async fn resolve_inner(&self, address: Address) -> Result<Resolution, DecodeError> {
        let calls = decoder::phase_one_calls(&self.ctx, address);
        let response = match self.multicall.aggregate(&calls, self.block).await {
            Ok(response) => response,
            Err(ResolveError::Decode(e)) => return Err(e),
            Err(ResolveError::Transport(e)) if e.is_contract_error() => {
                debug!(memecoin = %address, "phase one reverted, probing factory: {}", e);
                return self.check_registration(address).await;
            }
            Err(ResolveError::Transport(e)) => return Ok(Resolution::transient(e)),
        };

        let pending = match decoder::decode_phase_one(address, &response.results)? {
            PhaseOne::NotAMemecoin => return Ok(Resolution::NotAMemecoin),
            PhaseOne::Indexing => return Ok(Resolution::Indexing),
            PhaseOne::NotLaunched(base) => {
                return Ok(Resolution::Memecoin(Box::new(MemecoinState {
                    base,
                    launch: super::LaunchStatus::NotLaunched,
                })))
            }
            PhaseOne::Launched(pending) => *pending,
        };

        // read the lock at the block phase one saw
        let block = match self.block {
            BlockId::Pending => BlockId::Pending,
            _ => BlockId::Number(response.block_number),
        };
        let words = match self.multicall.reader().call_contract(&pending.phase_two_call(), block).await {
            Ok(words) => words,
            Err(e) => return Ok(Resolution::transient(e)),
        };

        Ok(match decoder::decode_phase_two(&self.ctx, pending, &words)? {
            PhaseTwo::Resolved(state) => Resolution::Memecoin(Box::new(state)),
            PhaseTwo::Indexing => Resolution::Indexing,
        })
    }

    // A reverted batch is expected for addresses that are not memecoins, but a
    // registered memecoin reverting means the node is behind or flaky.
    async fn check_registration(&self, address: Address) -> Result<Resolution, DecodeError> {
        let call = decoder::is_memecoin_call(&self.ctx, address);
        let words = match self.multicall.reader().call_contract(&call, self.block).await {
            Ok(words) => words,
            Err(e) => return Ok(Resolution::transient(e)),
        };
        if decoder::decode_is_memecoin(&words)? {
            Ok(Resolution::transient("phase one reverted for a registered memecoin"))
        } else {
            Ok(Resolution::NotAMemecoin)
        }
    }

    /// Like [`resolve`](Self::resolve), but concurrent callers for one address
    /// share a single resolution, and definitive outcomes are cached briefly.
    pub async fn resolve_shared(&self, address: Address) -> Result<Resolution, DecodeError> {
        let shared = self
            .cache
            .try_get_with(address, async {
                match self.resolve(address).await {
                    Ok(resolution) if resolution.is_definitive() => Ok(resolution),
                    Ok(resolution) => Err(Uncached::Outcome(resolution)),
                    Err(e) => Err(Uncached::Decode(e)),
                }
            })
            .await;

        match shared {
            Ok(resolution) => Ok(resolution),
            Err(uncached) => match uncached.as_ref() {
                Uncached::Outcome(resolution) => Ok(resolution.clone()),
                Uncached::Decode(e) => Err(e.clone()),
            },
        }
    }

    /// Drop a cached outcome, e.g. after a launch was observed.
    pub async fn invalidate(&self, address: &Address) {
        self.cache.invalidate(address).await;
        info!(memecoin = %address, "resolution cache entry invalidated");
    }

    /// Independent resolutions run concurrently; results keep input order.
    pub async fn resolve_many(&self, addresses: &[Address]) -> Vec<(Address, Result<Resolution, DecodeError>)> {
        let resolutions = join_all(addresses.iter().map(|a| self.resolve_shared(*a))).await;
        addresses.iter().copied().zip(resolutions).collect()
    }
}
