//! Command-line inspection: resolve memecoins, classify them and preview
//! launch calldata. Nothing is signed or broadcast.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use memecoin_resolver::config::Config;
use memecoin_resolver::errors::{ErrorContext, MemecoinError};
use memecoin_resolver::felt::Address;
use memecoin_resolver::memecoin::{Amm, MemecoinResolver, Resolution};
use memecoin_resolver::numeric::{Fraction, Percent, U256};
use memecoin_resolver::quote_price::QuotePriceFetcher;
use memecoin_resolver::rpc_manager::{ContractReader, StarknetRpc};
use memecoin_resolver::security::classify_resolution;
use memecoin_resolver::structured_logging::{init_tracing, PipelineContext};
use memecoin_resolver::tx_builder::{build_launch_calldata, LaunchContext, LaunchPlan, LockDuration};

#[derive(Parser, Debug)]
#[command(name = "memecoin-inspect", about = "Inspect memecoins and preview launch calldata")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve one or more addresses and classify their safety
    Resolve {
        #[arg(required = true)]
        addresses: Vec<Address>,
    },
    /// Build launch calldata for a memecoin that is not launched yet
    Launch {
        memecoin: Address,
        #[arg(long)]
        amm: Amm,
        /// Quote token symbol from the registry
        #[arg(long, default_value = "ETH")]
        quote: String,
        /// Starting market cap in USD, decimal
        #[arg(long)]
        market_cap: String,
        /// Team allocation entry as `address:raw_amount`, repeatable
        #[arg(long = "holder")]
        holders: Vec<String>,
        #[arg(long, default_value_t = 100)]
        hold_limit_bp: u64,
        #[arg(long, default_value_t = 0)]
        anti_bot_seconds: u64,
        /// Lock duration in days; omit with --forever
        #[arg(long)]
        lock_days: Option<u64>,
        #[arg(long)]
        forever: bool,
        /// Ekubo fee in basis points
        #[arg(long)]
        fee_bp: Option<u64>,
    },
}

fn parse_holder(entry: &str) -> anyhow::Result<(Address, U256)> {
    let (address, amount) = entry
        .split_once(':')
        .ok_or_else(|| anyhow!("holder must look like address:amount, got {entry}"))?;
    let address = address.parse::<Address>().with_context(|| format!("bad holder address {address}"))?;
    let amount = U256::from_dec_str(amount).map_err(|e| anyhow!("bad holder amount {amount}: {e:?}"))?;
    Ok((address, amount))
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

fn print_json(value: &serde_json::Value) -> Result<(), MemecoinError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| anyhow::Error::from(e).system_context("failed to render output"))?;
    println!("{text}");
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // --help and usage errors must not need a config or an endpoint
    let cli = Cli::parse();
    let cfg = Config::load()?;
    init_tracing(cfg.log_format);
    info!(network = %cfg.network, endpoints = cfg.rpc_endpoints.len(), "configuration loaded");

    let ctx = cfg.network_context()?;
    let block = cfg.block_id().map_err(|e| anyhow!(e))?;
    let rpc: Arc<dyn ContractReader> = Arc::new(StarknetRpc::from_config(&cfg)?);
    let resolver = MemecoinResolver::new(ctx.clone(), rpc)
        .with_block(block)
        .with_cache_ttl(cfg.cache_ttl());
    let prices = QuotePriceFetcher::new(resolver.multicall().clone());
    let pipeline = PipelineContext::new("memecoin_inspect");

    match cli.command {
        Command::Resolve { addresses } => {
            let now = now_secs();
            let mut reports = Vec::with_capacity(addresses.len());
            for (address, outcome) in resolver.resolve_many(&addresses).await {
                let resolution = match outcome {
                    Ok(resolution) => resolution,
                    Err(e) => {
                        reports.push(json!({ "address": address, "error": e.to_string() }));
                        continue;
                    }
                };
                let price = match resolution.memecoin() {
                    Some(state) => prices.price_at_launch(state).await.map_err(MemecoinError::from)?,
                    None => None,
                };
                let safety = classify_resolution(&resolution, price.as_ref(), now);
                pipeline.logger.log_safety(&address, &safety);
                let market_cap = resolution
                    .memecoin()
                    .and_then(|s| s.starting_market_cap(price.as_ref()))
                    .map(|m| m.to_fixed(2));
                reports.push(json!({
                    "address": address,
                    "resolution": resolution,
                    "quote_price_at_launch": price.map(|p| p.to_fixed(6)),
                    "starting_market_cap_usd": market_cap,
                    "safety": safety,
                }));
            }
            print_json(&json!(reports))?;
        }
        Command::Launch {
            memecoin,
            amm,
            quote,
            market_cap,
            holders,
            hold_limit_bp,
            anti_bot_seconds,
            lock_days,
            forever,
            fee_bp,
        } => {
            let state = match resolver.resolve(memecoin).await? {
                Resolution::Memecoin(state) => state,
                other => return Err(anyhow!("cannot launch {memecoin}: {}", other.label())),
            };
            let quote_token = ctx
                .quote_token_by_symbol(&quote)
                .ok_or_else(|| anyhow!("unknown quote token {quote} on {}", ctx.network))?;
            let quote_price = prices
                .usd_price(quote_token, block)
                .await
                .map_err(MemecoinError::from)?
                .ok_or_else(|| anyhow!("no USD price available for {quote}"))?;

            let (holder_addresses, amounts): (Vec<_>, Vec<_>) = holders
                .iter()
                .map(|h| parse_holder(h))
                .collect::<anyhow::Result<Vec<_>>>()?
                .into_iter()
                .unzip();
            let lock_duration = match (forever, lock_days) {
                (true, _) => Some(LockDuration::Forever),
                (false, Some(days)) => Some(LockDuration::Seconds(days.saturating_mul(86_400))),
                (false, None) => None,
            };

            let plan = LaunchPlan {
                amm,
                quote_token: quote_token.address,
                team_allocation_holders: holder_addresses,
                team_allocation_amounts: amounts,
                hold_limit: Percent::from_basis_points(hold_limit_bp),
                anti_bot_seconds,
                starting_market_cap_usd: Fraction::from_decimal_str(&market_cap)
                    .ok_or_else(|| anyhow!("bad market cap {market_cap}"))?,
                lock_duration,
                ekubo_fee: fee_bp.map(Percent::from_basis_points),
            };
            let launch = LaunchContext {
                quote_token_price_usd: quote_price,
                now: now_secs(),
            };
            let calldata = build_launch_calldata(&ctx, &state, &plan, &launch).map_err(MemecoinError::from)?;
            pipeline.logger.log_launch_calldata(&memecoin, &amm.to_string(), calldata.calls.len());
            print_json(&json!(calldata))?;
        }
    }

    Ok(())
}
