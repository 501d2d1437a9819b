//! Concentrated-liquidity tick ↔ price conversion.
//!
//! This is the single floating-point boundary of the crate. `ln`/`powf` have
//! no exact rational form, so prices cross into `f64` here and are rounded to
//! the quote token's decimals and turned back into a [`Fraction`] before any
//! other arithmetic sees them. Nothing outside this module converts to or from
//! floats.

use thiserror::Error;

use crate::numeric::{bigint::U1024, Fraction, Percent};

/// Price ratio between two adjacent ticks.
pub const TICK_SIZE: f64 = 1.000001;

/// Quantization grid for launch ticks.
pub const TICK_SPACING: i64 = 5982;

/// Upper launch bound, `tick_from_price(2^128)`.
pub const MAX_TICK_BOUND: i64 = 88_719_042;

// Tolerance in grid steps, not ticks. One step is TICK_SPACING ticks, so a
// value up to ~0.006 tick under a grid line snaps onto that line. `ln` and
// `powf` round-trips land within 1e-9 steps; a full tick below is ~1.7e-4.
const GRID_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickMathError {
    #[error("price must be strictly positive, got {0}")]
    NonPositivePrice(String),
    #[error("tick {0} lies outside the launch bound ±{MAX_TICK_BOUND}")]
    TickOutOfBounds(i64),
    #[error("price at tick {0} is not representable")]
    Unrepresentable(i64),
}

/// `TICK_SIZE^tick`.
pub fn price_from_tick(tick: i64) -> f64 {
    TICK_SIZE.powf(tick as f64)
}

/// `floor(log(price) / log(TICK_SIZE) / TICK_SPACING) * TICK_SPACING`.
///
/// Floors toward negative infinity, and `tick_from_price(price_from_tick(t)) == t`
/// for every multiple of [`TICK_SPACING`] in the launch range.
pub fn tick_from_price(price: f64) -> i64 {
    let steps = price.ln() / TICK_SIZE.ln() / TICK_SPACING as f64;
    (steps + GRID_EPSILON).floor() as i64 * TICK_SPACING
}

/// Exact price at `tick`, rounded to `decimals` fractional digits.
pub fn price_at_tick(tick: i64, decimals: u8) -> Result<Fraction, TickMathError> {
    let price = price_from_tick(tick);
    if !price.is_finite() {
        return Err(TickMathError::Unrepresentable(tick));
    }
    // `{:.N}` prints the exact binary value correctly rounded to N places
    let text = format!("{:.*}", decimals as usize, price);
    Fraction::from_decimal_str(&text).ok_or(TickMathError::Unrepresentable(tick))
}

/// Launch tick for an exact price of one memecoin expressed in quote tokens.
pub fn starting_tick(price: &Fraction) -> Result<i64, TickMathError> {
    if !price.is_positive() {
        return Err(TickMathError::NonPositivePrice(price.to_string()));
    }
    let tick = tick_from_price(fraction_to_f64(price));
    if tick.abs() > MAX_TICK_BOUND {
        return Err(TickMathError::TickOutOfBounds(tick));
    }
    Ok(tick)
}

/// Pool fee as the `u128` fixed-point fraction of `2^128` the pool expects.
pub fn fee_to_u128(fee: &Percent) -> Option<u128> {
    let scaled = fee.as_fraction() * &Fraction::from(crate::numeric::U256::one() << 128);
    let raw = scaled.floor_u256()?;
    (raw.bits() <= 128).then(|| raw.low_u128())
}

fn bits(value: &U1024) -> i64 {
    value.bits() as i64
}

// Positive rationals only. Scales the division so the integer quotient keeps
// 64 significant bits, then applies the binary exponent.
fn fraction_to_f64(value: &Fraction) -> f64 {
    let numerator = value.numerator();
    let denominator = value.denominator();
    let shift = 64 + bits(&denominator) - bits(&numerator);
    let quotient = if shift >= 0 {
        (numerator << shift as usize) / denominator
    } else {
        numerator / (denominator << (-shift) as usize)
    };
    quotient.low_u128() as f64 * 2f64.powi(-shift as i32)
}
