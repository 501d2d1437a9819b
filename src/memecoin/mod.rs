//! Typed memecoin state as resolved from the factory and the token itself.

pub mod cursor;
pub mod decoder;
pub mod resolver;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::felt::Address;
use crate::numeric::{Fraction, Percent, U256};
use crate::tick_math;

pub use crate::registry::QuoteToken;
pub use resolver::{MemecoinResolver, Resolution};

/// Unlock timestamp reserved for "locked forever".
pub const LIQUIDITY_LOCK_FOREVER_TIMESTAMP: u64 = 9_999_999_999;

pub const MEMECOIN_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Amm {
    Ekubo,
    #[serde(alias = "jedi")]
    JediSwap,
    StarkDeFi,
}

impl Amm {
    pub fn launch_entrypoint(&self) -> &'static str {
        match self {
            Amm::Ekubo => "launch_on_ekubo",
            Amm::JediSwap => "launch_on_jediswap",
            Amm::StarkDeFi => "launch_on_starkdefi",
        }
    }

    pub fn is_concentrated(&self) -> bool {
        matches!(self, Amm::Ekubo)
    }
}

impl fmt::Display for Amm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Amm::Ekubo => "Ekubo",
            Amm::JediSwap => "JediSwap",
            Amm::StarkDeFi => "StarkDeFi",
        })
    }
}

impl FromStr for Amm {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ekubo" => Ok(Amm::Ekubo),
            "jediswap" | "jedi" => Ok(Amm::JediSwap),
            "starkdefi" => Ok(Amm::StarkDeFi),
            other => Err(format!("unknown AMM: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseMemecoin {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub owner: Address,
    pub decimals: u8,
    pub total_supply: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolKey {
    pub token0: Address,
    pub token1: Address,
    /// Fixed-point fraction of 2^128.
    pub fee: u128,
    pub tick_spacing: u128,
    pub extension: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickBounds {
    pub lower: i64,
    pub upper: i64,
}

/// Liquidity minted as an ERC20 LP token and held by the lock manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandardAmmLiquidity {
    pub amm: Amm,
    pub lock_manager: Address,
    pub lock_position: Address,
    pub pair: Address,
    pub quote_token: Address,
    pub quote_amount: U256,
    pub unlock_time: u64,
    pub owner: Address,
}

/// Liquidity held as an NFT position by the concentrated-liquidity launcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConcentratedLiquidity {
    pub lock_manager: Address,
    pub position_id: u64,
    pub quote_token: Address,
    pub pool_key: PoolKey,
    pub starting_tick: i64,
    pub bounds: TickBounds,
    pub unlock_time: u64,
    pub owner: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Liquidity {
    StandardAmm(StandardAmmLiquidity),
    ConcentratedLiquidity(ConcentratedLiquidity),
}

impl Liquidity {
    pub fn amm(&self) -> Amm {
        match self {
            Liquidity::StandardAmm(l) => l.amm,
            Liquidity::ConcentratedLiquidity(_) => Amm::Ekubo,
        }
    }

    pub fn lock_manager(&self) -> Address {
        match self {
            Liquidity::StandardAmm(l) => l.lock_manager,
            Liquidity::ConcentratedLiquidity(l) => l.lock_manager,
        }
    }

    pub fn quote_token(&self) -> Address {
        match self {
            Liquidity::StandardAmm(l) => l.quote_token,
            Liquidity::ConcentratedLiquidity(l) => l.quote_token,
        }
    }

    pub fn unlock_time(&self) -> u64 {
        match self {
            Liquidity::StandardAmm(l) => l.unlock_time,
            Liquidity::ConcentratedLiquidity(l) => l.unlock_time,
        }
    }

    pub fn owner(&self) -> Address {
        match self {
            Liquidity::StandardAmm(l) => l.owner,
            Liquidity::ConcentratedLiquidity(l) => l.owner,
        }
    }

    pub fn is_locked_forever(&self) -> bool {
        self.unlock_time() >= LIQUIDITY_LOCK_FOREVER_TIMESTAMP
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchedMemecoin {
    pub team_allocation: U256,
    pub block_number: u64,
    pub liquidity: Liquidity,
    /// Registry entry for the pool's quote token. `None` means unrecognized.
    pub quote_token: Option<QuoteToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum LaunchStatus {
    NotLaunched,
    Launched(LaunchedMemecoin),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemecoinState {
    pub base: BaseMemecoin,
    pub launch: LaunchStatus,
}

impl MemecoinState {
    pub fn is_launched(&self) -> bool {
        matches!(self.launch, LaunchStatus::Launched(_))
    }

    pub fn launched(&self) -> Option<&LaunchedMemecoin> {
        match &self.launch {
            LaunchStatus::Launched(launched) => Some(launched),
            LaunchStatus::NotLaunched => None,
        }
    }

    /// `team_allocation / total_supply`, exact.
    pub fn team_allocation_percent(&self) -> Option<Percent> {
        let launched = self.launched()?;
        if self.base.total_supply.is_zero() {
            return None;
        }
        Some(Percent::from_fraction(Fraction::new(
            launched.team_allocation,
            self.base.total_supply,
        )))
    }

    /// Market cap in USD at launch, given the quote token's USD price then.
    ///
    /// `None` when not launched, when the quote token is unknown or unpriced,
    /// or when the whole supply went to the team.
    pub fn starting_market_cap(&self, quote_price_usd: Option<&Fraction>) -> Option<Fraction> {
        let launched = self.launched()?;
        let quote = launched.quote_token.as_ref()?;
        let price = quote_price_usd?;
        let supply = self.base.total_supply;

        match &launched.liquidity {
            Liquidity::StandardAmm(l) => {
                let circulating = supply.checked_sub(launched.team_allocation)?;
                if circulating.is_zero() {
                    return None;
                }
                let quote_amount =
                    Fraction::from(l.quote_amount) / Fraction::decimal_scale(quote.decimals as u32);
                Some(quote_amount * price * Fraction::new(supply, circulating))
            }
            Liquidity::ConcentratedLiquidity(l) => {
                let tick_price = tick_math::price_at_tick(l.starting_tick, quote.decimals).ok()?;
                let supply = Fraction::from(supply) / Fraction::decimal_scale(MEMECOIN_DECIMALS as u32);
                Some(tick_price * supply * price)
            }
        }
    }
}
