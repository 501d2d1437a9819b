use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::felt::{Address, Felt};
use crate::memecoin::{Amm, MemecoinState, LIQUIDITY_LOCK_FOREVER_TIMESTAMP};
use crate::multicall::Call;
use crate::numeric::{to_limbs, to_mag_sign, Fraction, Percent, U256};
use crate::registry::{NetworkContext, QuoteToken};
use crate::tick_math::{self, TickMathError, MAX_TICK_BOUND, TICK_SPACING};

pub const MAX_TEAM_ALLOCATION_HOLDERS: usize = 10;
pub const MAX_ANTI_BOT_SECONDS: u64 = 24 * 3600;

fn min_hold_limit() -> Percent {
    Percent::from_basis_points(50)
}

fn max_hold_limit() -> Percent {
    Percent::from_basis_points(10_000)
}

fn max_ekubo_fee() -> Percent {
    Percent::from_basis_points(200)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockDuration {
    Forever,
    Seconds(u64),
}

/// Caller-chosen launch configuration. Validated, then consumed once.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    pub amm: Amm,
    pub quote_token: Address,
    pub team_allocation_holders: Vec<Address>,
    /// Raw memecoin units, index-aligned with the holders.
    pub team_allocation_amounts: Vec<U256>,
    pub hold_limit: Percent,
    pub anti_bot_seconds: u64,
    pub starting_market_cap_usd: Fraction,
    /// Required for JediSwap and StarkDeFi.
    pub lock_duration: Option<LockDuration>,
    /// Required for Ekubo.
    pub ekubo_fee: Option<Percent>,
}

/// Market inputs and wall clock at build time.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchContext {
    pub quote_token_price_usd: Fraction,
    pub now: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanValidationError {
    #[error("memecoin {0} is already launched")]
    AlreadyLaunched(Address),
    #[error("{holders} team allocation holders but {amounts} amounts")]
    LengthMismatch { holders: usize, amounts: usize },
    #[error("{count} team allocation holders, at most {max} allowed")]
    TooManyHolders { count: usize, max: usize },
    #[error("team allocation holder #{0} is the zero address")]
    ZeroHolder(usize),
    #[error("team allocation {total} must stay below total supply {supply}")]
    TeamAllocationTooLarge { total: String, supply: String },
    #[error("hold limit {0} outside [0.50%, 100.00%]")]
    HoldLimitOutOfRange(String),
    #[error("anti-bot period of {seconds}s exceeds {max}s")]
    AntiBotTooLong { seconds: u64, max: u64 },
    #[error("starting market cap must be positive")]
    NonPositiveMarketCap,
    #[error("quote token price must be positive")]
    NonPositivePrice,
    #[error("quote token {0} is not in the registry")]
    UnknownQuoteToken(Address),
    #[error("Ekubo launches need a fee")]
    MissingEkuboFee,
    #[error("fee {0} outside (0.00%, 2.00%]")]
    FeeOutOfRange(String),
    #[error("{0} launches need a liquidity lock duration")]
    MissingLockDuration(Amm),
    #[error("liquidity lock duration must be non-zero")]
    ZeroLockDuration,
    #[error("unlock time {0} is not below the forever sentinel")]
    UnlockTimeOutOfRange(u64),
    #[error("{0} does not fit in a u256")]
    AmountOverflow(&'static str),
    #[error("starting tick: {0}")]
    StartingTick(#[from] TickMathError),
    #[error("invalid {field}: {value:?}")]
    InvalidShortString { field: &'static str, value: String },
    #[error("initial supply must be positive")]
    ZeroSupply,
}

/// Liquidity expected to be locked by the launch, in raw units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictedLiquidity {
    pub quote_amount: U256,
    pub memecoin_amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchCalldata {
    pub calls: Vec<Call>,
    pub predicted_liquidity: PredictedLiquidity,
    /// Quote tokens leaving the caller's wallet, raw units.
    pub quote_cost: U256,
}

fn push_u256(calldata: &mut Vec<Felt>, value: U256) {
    let (low, high) = to_limbs(value);
    calldata.push(Felt::from(low));
    calldata.push(Felt::from(high));
}

fn floor_raw(value: Fraction, what: &'static str) -> Result<U256, PlanValidationError> {
    value.floor_u256().ok_or(PlanValidationError::AmountOverflow(what))
}

/// What survives validation: the plan plus the numbers every path needs.
struct Validated<'a> {
    plan: &'a LaunchPlan,
    quote: &'static QuoteToken,
    supply: U256,
    team_total: U256,
    team_share: Fraction,
    /// Starting market cap expressed in whole quote tokens.
    market_cap_quote: Fraction,
}

impl LaunchPlan {
    fn validate<'a>(
        &'a self,
        ctx: &NetworkContext,
        state: &MemecoinState,
        launch: &LaunchContext,
    ) -> Result<Validated<'a>, PlanValidationError> {
        if state.is_launched() {
            return Err(PlanValidationError::AlreadyLaunched(state.base.address));
        }

        let holders = self.team_allocation_holders.len();
        let amounts = self.team_allocation_amounts.len();
        if holders != amounts {
            return Err(PlanValidationError::LengthMismatch { holders, amounts });
        }
        if holders > MAX_TEAM_ALLOCATION_HOLDERS {
            return Err(PlanValidationError::TooManyHolders {
                count: holders,
                max: MAX_TEAM_ALLOCATION_HOLDERS,
            });
        }
        if let Some(index) = self.team_allocation_holders.iter().position(Address::is_zero) {
            return Err(PlanValidationError::ZeroHolder(index));
        }

        let supply = state.base.total_supply;
        let team_total = self
            .team_allocation_amounts
            .iter()
            .try_fold(U256::zero(), |acc, amount| acc.checked_add(*amount));
        let team_total = match team_total {
            Some(total) if total < supply => total,
            total => {
                return Err(PlanValidationError::TeamAllocationTooLarge {
                    total: total.map(|t| t.to_string()).unwrap_or_else(|| "overflow".into()),
                    supply: supply.to_string(),
                })
            }
        };

        if self.hold_limit < min_hold_limit() || self.hold_limit > max_hold_limit() {
            return Err(PlanValidationError::HoldLimitOutOfRange(self.hold_limit.to_string()));
        }
        if self.anti_bot_seconds > MAX_ANTI_BOT_SECONDS {
            return Err(PlanValidationError::AntiBotTooLong {
                seconds: self.anti_bot_seconds,
                max: MAX_ANTI_BOT_SECONDS,
            });
        }
        if !self.starting_market_cap_usd.is_positive() {
            return Err(PlanValidationError::NonPositiveMarketCap);
        }
        if !launch.quote_token_price_usd.is_positive() {
            return Err(PlanValidationError::NonPositivePrice);
        }
        let quote = ctx
            .quote_token(&self.quote_token)
            .ok_or(PlanValidationError::UnknownQuoteToken(self.quote_token))?;

        match self.amm {
            Amm::Ekubo => {
                let fee = self.ekubo_fee.as_ref().ok_or(PlanValidationError::MissingEkuboFee)?;
                if !fee.as_fraction().is_positive() || *fee > max_ekubo_fee() {
                    return Err(PlanValidationError::FeeOutOfRange(fee.to_string()));
                }
            }
            Amm::JediSwap | Amm::StarkDeFi => {
                match self.lock_duration {
                    None => return Err(PlanValidationError::MissingLockDuration(self.amm)),
                    Some(LockDuration::Seconds(0)) => return Err(PlanValidationError::ZeroLockDuration),
                    Some(_) => {}
                }
                self.unlock_time(launch.now)?;
            }
        }

        Ok(Validated {
            plan: self,
            quote,
            supply,
            team_total,
            team_share: Fraction::new(team_total, supply),
            market_cap_quote: &self.starting_market_cap_usd / &launch.quote_token_price_usd,
        })
    }

    /// Absolute unlock timestamp; "forever" is the sentinel itself.
    pub fn unlock_time(&self, now: u64) -> Result<u64, PlanValidationError> {
        match self.lock_duration {
            None => Err(PlanValidationError::MissingLockDuration(self.amm)),
            Some(LockDuration::Forever) => Ok(LIQUIDITY_LOCK_FOREVER_TIMESTAMP),
            Some(LockDuration::Seconds(secs)) => match now.checked_add(secs) {
                Some(at) if at < LIQUIDITY_LOCK_FOREVER_TIMESTAMP => Ok(at),
                at => Err(PlanValidationError::UnlockTimeOutOfRange(at.unwrap_or(u64::MAX))),
            },
        }
    }
}

impl Validated<'_> {
    fn quote_scale(&self) -> Fraction {
        Fraction::decimal_scale(self.quote.decimals as u32)
    }

    /// `[memecoin, anti_bot, hold_limit_bp, quote, holders[], amounts[]]`
    fn common_arguments(&self, memecoin: Address) -> Result<Vec<Felt>, PlanValidationError> {
        let plan = self.plan;
        let hold_limit_bp = plan
            .hold_limit
            .to_basis_points()
            .ok_or_else(|| PlanValidationError::HoldLimitOutOfRange(plan.hold_limit.to_string()))?;

        let mut calldata = vec![
            memecoin.felt(),
            Felt::from(plan.anti_bot_seconds),
            Felt::from(hold_limit_bp),
            plan.quote_token.felt(),
        ];
        calldata.push(Felt::from(plan.team_allocation_holders.len() as u64));
        calldata.extend(plan.team_allocation_holders.iter().map(Address::felt));
        calldata.push(Felt::from(plan.team_allocation_amounts.len() as u64));
        for amount in &plan.team_allocation_amounts {
            push_u256(&mut calldata, *amount);
        }
        Ok(calldata)
    }

    fn build_standard_amm(&self, ctx: &NetworkContext, memecoin: Address, now: u64) -> Result<LaunchCalldata, PlanValidationError> {
        let plan = self.plan;
        let quote_amount = floor_raw(
            &self.market_cap_quote * &(Fraction::one() - &self.team_share) * self.quote_scale(),
            "quote amount",
        )?;
        let unlock_time = plan.unlock_time(now)?;

        let mut approve = vec![ctx.factory.felt()];
        push_u256(&mut approve, quote_amount);

        let mut launch = self.common_arguments(memecoin)?;
        push_u256(&mut launch, quote_amount);
        launch.push(Felt::from(unlock_time));

        Ok(LaunchCalldata {
            calls: vec![
                Call::new(plan.quote_token, "approve", approve),
                Call::new(ctx.factory, plan.amm.launch_entrypoint(), launch),
            ],
            predicted_liquidity: PredictedLiquidity {
                quote_amount,
                memecoin_amount: self.supply - self.team_total,
            },
            quote_cost: quote_amount,
        })
    }

    fn build_ekubo(&self, ctx: &NetworkContext, memecoin: Address) -> Result<LaunchCalldata, PlanValidationError> {
        let plan = self.plan;
        let fee = plan.ekubo_fee.as_ref().ok_or(PlanValidationError::MissingEkuboFee)?;

        // the team allocation is bought back out of the pool, fees included
        let team_quote = floor_raw(
            &self.market_cap_quote * &self.team_share * (Fraction::one() + fee.as_fraction()) * self.quote_scale(),
            "team allocation quote amount",
        )?;

        let whole_supply = Fraction::from(self.supply) / Fraction::decimal_scale(crate::memecoin::MEMECOIN_DECIMALS as u32);
        let starting_tick = tick_math::starting_tick(&(&self.market_cap_quote / &whole_supply))?;
        let (tick_mag, tick_sign) = to_mag_sign(starting_tick as i128);
        let fee_raw = tick_math::fee_to_u128(fee).ok_or_else(|| PlanValidationError::FeeOutOfRange(fee.to_string()))?;

        let mut transfer = vec![ctx.factory.felt()];
        push_u256(&mut transfer, team_quote);

        let mut launch = self.common_arguments(memecoin)?;
        launch.extend([
            Felt::from(fee_raw),
            Felt::from(TICK_SPACING as u64),
            Felt::from(tick_mag),
            Felt::from(tick_sign),
            Felt::from(MAX_TICK_BOUND as u64),
        ]);

        Ok(LaunchCalldata {
            calls: vec![
                Call::new(plan.quote_token, "transfer", transfer),
                Call::new(ctx.factory, Amm::Ekubo.launch_entrypoint(), launch),
            ],
            predicted_liquidity: PredictedLiquidity {
                quote_amount: U256::zero(),
                memecoin_amount: self.supply - self.team_total,
            },
            quote_cost: team_quote,
        })
    }
}

/// Validate `plan` against a not-yet-launched memecoin and produce the
/// ordered calls to submit. Nothing is signed or sent.
pub fn build_launch_calldata(
    ctx: &NetworkContext,
    state: &MemecoinState,
    plan: &LaunchPlan,
    launch: &LaunchContext,
) -> Result<LaunchCalldata, PlanValidationError> {
    let validated = plan.validate(ctx, state, launch)?;
    let memecoin = state.base.address;
    let calldata = match plan.amm {
        Amm::Ekubo => validated.build_ekubo(ctx, memecoin)?,
        Amm::JediSwap | Amm::StarkDeFi => validated.build_standard_amm(ctx, memecoin, launch.now)?,
    };

    info!(
        memecoin = %memecoin,
        amm = %plan.amm,
        quote = validated.quote.symbol,
        holders = plan.team_allocation_holders.len(),
        quote_cost = %calldata.quote_cost,
        "launch calldata built"
    );
    Ok(calldata)
}

/// Factory deployment of a fresh memecoin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    pub owner: Address,
    pub name: String,
    pub symbol: String,
    pub initial_supply: U256,
    pub salt: Felt,
}

pub fn build_create_memecoin_call(ctx: &NetworkContext, plan: &DeployPlan) -> Result<Call, PlanValidationError> {
    let short = |field: &'static str, value: &str| {
        Felt::from_short_string(value).map_err(|_| PlanValidationError::InvalidShortString {
            field,
            value: value.to_string(),
        })
    };
    if plan.initial_supply.is_zero() {
        return Err(PlanValidationError::ZeroSupply);
    }

    let mut calldata = vec![plan.owner.felt(), short("name", &plan.name)?, short("symbol", &plan.symbol)?];
    push_u256(&mut calldata, plan.initial_supply);
    calldata.push(plan.salt);
    Ok(Call::new(ctx.factory, "create_memecoin", calldata))
}
