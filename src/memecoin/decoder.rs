//! Two-phase decoding of memecoin state.
//!
//! Phase one is a single aggregated batch of identity and launch reads. When
//! it shows a launched token, phase two reads the lock manager, whose address
//! is only known once phase one is decoded.

use tracing::warn;

use crate::errors::DecodeError;
use crate::felt::{Address, Felt};
use crate::multicall::Call;
use crate::numeric::U256;
use crate::registry::NetworkContext;

use super::cursor::{GroupReader, Read, ResultCursor};
use super::{
    Amm, BaseMemecoin, ConcentratedLiquidity, LaunchStatus, LaunchedMemecoin, Liquidity, MemecoinState,
    PoolKey, StandardAmmLiquidity, TickBounds, LIQUIDITY_LOCK_FOREVER_TIMESTAMP, MEMECOIN_DECIMALS,
};

const IS_MEMECOIN: Read = Read::exact("is_memecoin", 1);
const NAME: Read = Read::exact("name", 1);
const SYMBOL: Read = Read::exact("symbol", 1);
const IS_LAUNCHED: Read = Read::exact("is_launched", 1);
const TOTAL_SUPPLY: Read = Read::exact("total_supply", 2);
const TEAM_ALLOCATION: Read = Read::exact("get_team_allocation", 2);
const OWNER: Read = Read::exact("owner", 1);
const LOCKED_LIQUIDITY: Read = Read::variable("locked_liquidity", 1);
const LAUNCH_BLOCK: Read = Read::exact("launched_at_block_number", 1);
const LAUNCH_PARAMETERS: Read = Read::variable("launched_with_liquidity_parameters", 1);

const LOCK_DETAILS: Read = Read::exact("get_lock_details", 5);
const POSITION_DETAILS: Read = Read::exact("liquidity_position_details", 11);

/// Entrypoint names in phase-one order.
pub const PHASE_ONE_ENTRYPOINTS: [&str; 10] = [
    IS_MEMECOIN.name,
    NAME.name,
    SYMBOL.name,
    IS_LAUNCHED.name,
    TOTAL_SUPPLY.name,
    TEAM_ALLOCATION.name,
    OWNER.name,
    LOCKED_LIQUIDITY.name,
    LAUNCH_BLOCK.name,
    LAUNCH_PARAMETERS.name,
];

/// How the launch liquidity is held, as recorded by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidityKind {
    JediSwapErc20 { lock_position: Address },
    StarkDeFiErc20 { lock_position: Address },
    EkuboNft { position_id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockDescriptor {
    pub lock_manager: Address,
    pub kind: LiquidityKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EkuboLaunchParameters {
    pub owner: Address,
    pub token: Address,
    pub quote: Address,
    pub lp_supply: U256,
    pub fee: u128,
    pub tick_spacing: u128,
    pub starting_tick: i64,
    pub bound: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc20LaunchParameters {
    pub quote: Address,
    pub quote_amount: U256,
    pub caller: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchParameters {
    Ekubo(EkuboLaunchParameters),
    JediSwap(Erc20LaunchParameters),
    StarkDeFi(Erc20LaunchParameters),
}

/// A launch that phase one agreed on, waiting for its lock details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLaunch {
    pub base: BaseMemecoin,
    pub team_allocation: U256,
    pub block_number: u64,
    pub lock: LockDescriptor,
    pub parameters: LaunchParameters,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOne {
    NotAMemecoin,
    NotLaunched(BaseMemecoin),
    /// Launched, but the factory has not recorded the launch block yet.
    Indexing,
    Launched(Box<PendingLaunch>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseTwo {
    Resolved(MemecoinState),
    Indexing,
}

pub fn phase_one_calls(ctx: &NetworkContext, memecoin: Address) -> Vec<Call> {
    let target = memecoin.felt();
    vec![
        Call::new(ctx.factory, IS_MEMECOIN.name, vec![target]),
        Call::new(memecoin, NAME.name, vec![]),
        Call::new(memecoin, SYMBOL.name, vec![]),
        Call::new(memecoin, IS_LAUNCHED.name, vec![]),
        Call::new(memecoin, TOTAL_SUPPLY.name, vec![]),
        Call::new(memecoin, TEAM_ALLOCATION.name, vec![]),
        Call::new(memecoin, OWNER.name, vec![]),
        Call::new(ctx.factory, LOCKED_LIQUIDITY.name, vec![target]),
        Call::new(memecoin, LAUNCH_BLOCK.name, vec![]),
        Call::new(memecoin, LAUNCH_PARAMETERS.name, vec![]),
    ]
}

/// Stand-alone `is_memecoin` read, used when the batch reverts.
pub fn is_memecoin_call(ctx: &NetworkContext, memecoin: Address) -> Call {
    Call::new(ctx.factory, IS_MEMECOIN.name, vec![memecoin.felt()])
}

pub fn decode_is_memecoin(words: &[Felt]) -> Result<bool, DecodeError> {
    let mut group = GroupReader::new(IS_MEMECOIN, words)?;
    let flag = group.bool("is_memecoin")?;
    group.finish()?;
    Ok(flag)
}

fn decode_lock(mut group: GroupReader<'_>) -> Result<Option<LockDescriptor>, DecodeError> {
    if !group.option("locked_liquidity")? {
        group.expect_remaining(0)?;
        return Ok(None);
    }
    group.expect_remaining(3)?;
    let lock_manager = group.address("lock_manager")?;
    let kind = match group.tag("liquidity_type")? {
        0 => LiquidityKind::JediSwapErc20 {
            lock_position: group.address("lock_position")?,
        },
        1 => LiquidityKind::StarkDeFiErc20 {
            lock_position: group.address("lock_position")?,
        },
        2 => LiquidityKind::EkuboNft {
            position_id: group.u64("position_id")?,
        },
        other => return Err(group.unknown_tag("liquidity_type", other)),
    };
    group.finish()?;
    Ok(Some(LockDescriptor { lock_manager, kind }))
}

fn decode_erc20_parameters(group: &mut GroupReader<'_>) -> Result<Erc20LaunchParameters, DecodeError> {
    group.expect_remaining(4)?;
    Ok(Erc20LaunchParameters {
        quote: group.address("quote_address")?,
        quote_amount: group.u256("quote_amount")?,
        caller: group.address("caller")?,
    })
}

fn decode_launch_parameters(mut group: GroupReader<'_>) -> Result<Option<LaunchParameters>, DecodeError> {
    if !group.option("launch_parameters")? {
        group.expect_remaining(0)?;
        return Ok(None);
    }
    let parameters = match group.tag("liquidity_parameters")? {
        0 => {
            group.expect_remaining(10)?;
            LaunchParameters::Ekubo(EkuboLaunchParameters {
                owner: group.address("owner")?,
                token: group.address("token_address")?,
                quote: group.address("quote_address")?,
                lp_supply: group.u256("lp_supply")?,
                fee: group.u128("fee")?,
                tick_spacing: group.u128("tick_spacing")?,
                starting_tick: group.i129("starting_price")?,
                bound: group.u128("bound")?,
            })
        }
        1 => LaunchParameters::JediSwap(decode_erc20_parameters(&mut group)?),
        2 => LaunchParameters::StarkDeFi(decode_erc20_parameters(&mut group)?),
        other => return Err(group.unknown_tag("liquidity_parameters", other)),
    };
    group.finish()?;
    Ok(Some(parameters))
}

fn single<T>(
    cursor: &mut ResultCursor<'_>,
    read: Read,
    decode: impl FnOnce(&mut GroupReader<'_>) -> Result<T, DecodeError>,
) -> Result<T, DecodeError> {
    let mut group = cursor.group(read)?;
    let value = decode(&mut group)?;
    group.finish()?;
    Ok(value)
}

fn lock_matches(lock: &LiquidityKind, parameters: &LaunchParameters) -> bool {
    matches!(
        (lock, parameters),
        (LiquidityKind::JediSwapErc20 { .. }, LaunchParameters::JediSwap(_))
            | (LiquidityKind::StarkDeFiErc20 { .. }, LaunchParameters::StarkDeFi(_))
            | (LiquidityKind::EkuboNft { .. }, LaunchParameters::Ekubo(_))
    )
}

/// Decode the phase-one groups for `address`, in [`phase_one_calls`] order.
pub fn decode_phase_one(address: Address, groups: &[Vec<Felt>]) -> Result<PhaseOne, DecodeError> {
    let mut cursor = ResultCursor::new(groups);

    if !single(&mut cursor, IS_MEMECOIN, |g| g.bool("is_memecoin"))? {
        return Ok(PhaseOne::NotAMemecoin);
    }

    let name = single(&mut cursor, NAME, |g| g.short_string("name"))?;
    let symbol = single(&mut cursor, SYMBOL, |g| g.short_string("symbol"))?;
    let is_launched = single(&mut cursor, IS_LAUNCHED, |g| g.bool("is_launched"))?;
    let total_supply = single(&mut cursor, TOTAL_SUPPLY, |g| g.u256("total_supply"))?;
    let team_allocation = single(&mut cursor, TEAM_ALLOCATION, |g| g.u256("team_allocation"))?;
    let owner = single(&mut cursor, OWNER, |g| g.address("owner"))?;
    let lock = decode_lock(cursor.group(LOCKED_LIQUIDITY)?)?;
    let block_number = single(&mut cursor, LAUNCH_BLOCK, |g| g.u64("launched_at_block_number"))?;
    let parameters = decode_launch_parameters(cursor.group(LAUNCH_PARAMETERS)?)?;
    cursor.finish()?;

    if team_allocation > total_supply {
        return Err(DecodeError::Invariant(format!(
            "team allocation {team_allocation} exceeds total supply {total_supply}"
        )));
    }

    let base = BaseMemecoin {
        address,
        name,
        symbol,
        owner,
        decimals: MEMECOIN_DECIMALS,
        total_supply,
    };

    let (lock, parameters) = match (is_launched, lock, parameters) {
        (true, Some(lock), Some(parameters)) => (lock, parameters),
        (false, None, None) => return Ok(PhaseOne::NotLaunched(base)),
        (flag, lock, parameters) => {
            warn!(
                memecoin = %address,
                is_launched = flag,
                liquidity_locked = lock.is_some(),
                launch_parameters = parameters.is_some(),
                "launch flags disagree, treating as not launched"
            );
            return Ok(PhaseOne::NotLaunched(base));
        }
    };

    if !lock_matches(&lock.kind, &parameters) {
        return Err(DecodeError::Invariant(format!(
            "liquidity lock {:?} does not match launch parameters {:?}",
            lock.kind, parameters
        )));
    }

    if block_number == 0 {
        return Ok(PhaseOne::Indexing);
    }

    Ok(PhaseOne::Launched(Box::new(PendingLaunch {
        base,
        team_allocation,
        block_number,
        lock,
        parameters,
    })))
}

impl PendingLaunch {
    /// The single lock-manager read phase two needs.
    pub fn phase_two_call(&self) -> Call {
        match self.lock.kind {
            LiquidityKind::JediSwapErc20 { lock_position } | LiquidityKind::StarkDeFiErc20 { lock_position } => {
                Call::new(self.lock.lock_manager, LOCK_DETAILS.name, vec![lock_position.felt()])
            }
            LiquidityKind::EkuboNft { position_id } => Call::new(
                self.lock.lock_manager,
                POSITION_DETAILS.name,
                vec![Felt::from(position_id)],
            ),
        }
    }
}

/// Decode the lock-manager reply and assemble the final state.
pub fn decode_phase_two(
    ctx: &NetworkContext,
    pending: PendingLaunch,
    words: &[Felt],
) -> Result<PhaseTwo, DecodeError> {
    let PendingLaunch {
        base,
        team_allocation,
        block_number,
        lock,
        parameters,
    } = pending;

    let liquidity = match (lock.kind, parameters) {
        (
            LiquidityKind::JediSwapErc20 { lock_position } | LiquidityKind::StarkDeFiErc20 { lock_position },
            LaunchParameters::JediSwap(params) | LaunchParameters::StarkDeFi(params),
        ) => {
            let amm = match lock.kind {
                LiquidityKind::StarkDeFiErc20 { .. } => Amm::StarkDeFi,
                _ => Amm::JediSwap,
            };
            let mut group = GroupReader::new(LOCK_DETAILS, words)?;
            let pair = group.address("token")?;
            let owner = group.address("owner")?;
            let unlock_time = group.u64("unlock_time")?;
            let _amount = group.u256("amount")?;
            group.finish()?;

            Liquidity::StandardAmm(StandardAmmLiquidity {
                amm,
                lock_manager: lock.lock_manager,
                lock_position,
                pair,
                quote_token: params.quote,
                quote_amount: params.quote_amount,
                unlock_time,
                owner,
            })
        }
        (LiquidityKind::EkuboNft { position_id }, LaunchParameters::Ekubo(params)) => {
            let mut group = GroupReader::new(POSITION_DETAILS, words)?;
            let owner = group.address("owner")?;
            let quote_token = group.address("quote_address")?;
            let pool_key = PoolKey {
                token0: group.address("token0")?,
                token1: group.address("token1")?,
                fee: group.u128("fee")?,
                tick_spacing: group.u128("tick_spacing")?,
                extension: group.address("extension")?,
            };
            let bounds = TickBounds {
                lower: group.i129("lower")?,
                upper: group.i129("upper")?,
            };
            group.finish()?;

            if quote_token != params.quote {
                return Err(DecodeError::Invariant(format!(
                    "position quote {quote_token} differs from launch quote {}",
                    params.quote
                )));
            }

            Liquidity::ConcentratedLiquidity(ConcentratedLiquidity {
                lock_manager: lock.lock_manager,
                position_id,
                quote_token,
                pool_key,
                starting_tick: params.starting_tick,
                bounds,
                unlock_time: LIQUIDITY_LOCK_FOREVER_TIMESTAMP,
                owner,
            })
        }
        (kind, parameters) => {
            return Err(DecodeError::Invariant(format!(
                "liquidity lock {kind:?} does not match launch parameters {parameters:?}"
            )))
        }
    };

    if liquidity.owner().is_zero() {
        return Ok(PhaseTwo::Indexing);
    }

    let quote_token = ctx.quote_token(&liquidity.quote_token()).cloned();
    Ok(PhaseTwo::Resolved(MemecoinState {
        base,
        launch: LaunchStatus::Launched(LaunchedMemecoin {
            team_allocation,
            block_number,
            liquidity,
            quote_token,
        }),
    }))
}
