//! Risk tiers for a resolved memecoin.
//!
//! Pure and synchronous. The wall clock is an argument like everything else,
//! so the same inputs always give the same assessment.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::memecoin::{MemecoinState, QuoteToken, Resolution, LIQUIDITY_LOCK_FOREVER_TIMESTAMP};
use crate::numeric::{Fraction, Percent};

const DAY_SECS: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Safety {
    Safe,
    Correct,
    Dangerous,
    /// The state could not be resolved. Not a risk judgment.
    Unknown,
}

impl Safety {
    /// Ordering for the known tiers; `Unknown` has none.
    pub fn severity(&self) -> Option<u8> {
        match self {
            Safety::Safe => Some(0),
            Safety::Correct => Some(1),
            Safety::Dangerous => Some(2),
            Safety::Unknown => None,
        }
    }

    /// `Unknown` absorbs, otherwise the more severe tier wins.
    pub fn worst(self, other: Safety) -> Safety {
        match (self.severity(), other.severity()) {
            (Some(a), Some(b)) => {
                if a >= b {
                    self
                } else {
                    other
                }
            }
            _ => Safety::Unknown,
        }
    }
}

impl fmt::Display for Safety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Safety::Safe => "safe",
            Safety::Correct => "correct",
            Safety::Dangerous => "dangerous",
            Safety::Unknown => "unknown",
        })
    }
}

/// Tier boundaries. Lower bounds are inclusive.
#[derive(Debug, Clone)]
pub struct SafetyThresholds {
    pub team_allocation_safe: Percent,
    pub team_allocation_correct: Percent,
    pub lock_safe_secs: u64,
    pub lock_correct_secs: u64,
    /// Weighted mcap, `starting mcap × (1 − team allocation)` in USD, at or
    /// above which the starting market cap is Safe.
    pub market_cap_safe_floor_usd: Fraction,
    /// Weighted mcap at or above which it is Correct. Anything below is Dangerous.
    pub market_cap_correct_floor_usd: Fraction,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            team_allocation_safe: Percent::from_ratio(1, 100),
            team_allocation_correct: Percent::from_ratio(10, 100),
            lock_safe_secs: 100 * 365 * DAY_SECS,
            lock_correct_secs: 90 * DAY_SECS,
            market_cap_safe_floor_usd: Fraction::from(10_000u64),
            market_cap_correct_floor_usd: Fraction::from(5_000u64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyAssessment {
    pub team_allocation: Safety,
    pub liquidity_lock: Safety,
    pub quote_token: Safety,
    pub starting_market_cap: Safety,
    pub aggregate: Safety,
}

impl SafetyAssessment {
    pub fn new(team_allocation: Safety, liquidity_lock: Safety, quote_token: Safety, starting_market_cap: Safety) -> Self {
        let aggregate = team_allocation
            .worst(liquidity_lock)
            .worst(quote_token)
            .worst(starting_market_cap);
        Self {
            team_allocation,
            liquidity_lock,
            quote_token,
            starting_market_cap,
            aggregate,
        }
    }

    pub fn unknown() -> Self {
        Self::new(Safety::Unknown, Safety::Unknown, Safety::Unknown, Safety::Unknown)
    }

    /// Metrics that are not `Safe`, as `(name, tier)`.
    pub fn flagged(&self) -> Vec<(&'static str, Safety)> {
        [
            ("team_allocation", self.team_allocation),
            ("liquidity_lock", self.liquidity_lock),
            ("quote_token", self.quote_token),
            ("starting_market_cap", self.starting_market_cap),
        ]
        .into_iter()
        .filter(|(_, tier)| *tier != Safety::Safe)
        .collect()
    }
}

pub fn team_allocation_safety(team: &Percent, thresholds: &SafetyThresholds) -> Safety {
    if *team <= thresholds.team_allocation_safe {
        Safety::Safe
    } else if *team <= thresholds.team_allocation_correct {
        Safety::Correct
    } else {
        Safety::Dangerous
    }
}

pub fn liquidity_lock_safety(unlock_time: u64, now: u64, thresholds: &SafetyThresholds) -> Safety {
    if unlock_time >= LIQUIDITY_LOCK_FOREVER_TIMESTAMP {
        return Safety::Safe;
    }
    let remaining = unlock_time.saturating_sub(now);
    if remaining >= thresholds.lock_safe_secs {
        Safety::Safe
    } else if remaining >= thresholds.lock_correct_secs {
        Safety::Correct
    } else {
        Safety::Dangerous
    }
}

pub fn quote_token_safety(quote: Option<&QuoteToken>) -> Safety {
    match quote {
        Some(_) => Safety::Safe,
        None => Safety::Dangerous,
    }
}

pub fn starting_market_cap_safety(
    market_cap: Option<&Fraction>,
    team: &Percent,
    thresholds: &SafetyThresholds,
) -> Safety {
    let Some(market_cap) = market_cap else {
        return Safety::Dangerous;
    };
    let weighted = market_cap * &(Fraction::one() - team.as_fraction());
    if weighted >= thresholds.market_cap_safe_floor_usd {
        Safety::Safe
    } else if weighted >= thresholds.market_cap_correct_floor_usd {
        Safety::Correct
    } else {
        Safety::Dangerous
    }
}

/// Classify with [`SafetyThresholds::default`].
pub fn classify(state: &MemecoinState, quote_price_at_launch: Option<&Fraction>, now: u64) -> SafetyAssessment {
    classify_with(&SafetyThresholds::default(), state, quote_price_at_launch, now)
}

pub fn classify_with(
    thresholds: &SafetyThresholds,
    state: &MemecoinState,
    quote_price_at_launch: Option<&Fraction>,
    now: u64,
) -> SafetyAssessment {
    let (Some(launched), Some(team)) = (state.launched(), state.team_allocation_percent()) else {
        return SafetyAssessment::unknown();
    };

    let market_cap = state.starting_market_cap(quote_price_at_launch);
    let assessment = SafetyAssessment::new(
        team_allocation_safety(&team, thresholds),
        liquidity_lock_safety(launched.liquidity.unlock_time(), now, thresholds),
        quote_token_safety(launched.quote_token.as_ref()),
        starting_market_cap_safety(market_cap.as_ref(), &team, thresholds),
    );
    debug!(
        memecoin = %state.base.address,
        team_allocation = %team,
        aggregate = %assessment.aggregate,
        "safety classified"
    );
    assessment
}

/// Everything but a resolved launched memecoin is `Unknown` across the board.
pub fn classify_resolution(
    resolution: &Resolution,
    quote_price_at_launch: Option<&Fraction>,
    now: u64,
) -> SafetyAssessment {
    match resolution.memecoin() {
        Some(state) => classify(state, quote_price_at_launch, now),
        None => SafetyAssessment::unknown(),
    }
}
