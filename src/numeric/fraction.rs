//! Exact rationals and percentages.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Serialize, Serializer};

use super::bigint::{checked_pow10, gcd, narrow, pow10, u1024_from_u128, widen, U1024, U256};

const OVERFLOW: &str = "fraction arithmetic overflowed 1024 bits";

/// Largest power of ten that still fits in a u256.
pub const MAX_DECIMAL_PLACES: usize = 77;

fn mul(a: U1024, b: U1024) -> U1024 {
    a.checked_mul(b).expect(OVERFLOW)
}

fn add(a: U1024, b: U1024) -> U1024 {
    a.checked_add(b).expect(OVERFLOW)
}

/// Signed rational number, always stored reduced with a positive denominator.
///
/// Zero is never negative, so structural equality is value equality.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fraction {
    negative: bool,
    numerator: U1024,
    denominator: U1024,
}

impl Fraction {
    fn normalized(negative: bool, numerator: U1024, denominator: U1024) -> Self {
        assert!(!denominator.is_zero(), "fraction denominator must be non-zero");
        if numerator.is_zero() {
            return Self::zero();
        }
        let g = gcd(numerator, denominator);
        Self {
            negative,
            numerator: numerator / g,
            denominator: denominator / g,
        }
    }

    /// `numerator / denominator` for on-chain quantities.
    ///
    /// # Panics
    /// When `denominator` is zero.
    pub fn new(numerator: U256, denominator: U256) -> Self {
        Self::normalized(false, widen(numerator), widen(denominator))
    }

    pub fn from_ratio(numerator: u128, denominator: u128) -> Self {
        Self::normalized(false, u1024_from_u128(numerator), u1024_from_u128(denominator))
    }

    pub fn from_signed_ratio(numerator: i128, denominator: u128) -> Self {
        Self::normalized(
            numerator < 0,
            u1024_from_u128(numerator.unsigned_abs()),
            u1024_from_u128(denominator),
        )
    }

    pub fn zero() -> Self {
        Self {
            negative: false,
            numerator: U1024::zero(),
            denominator: U1024::one(),
        }
    }

    pub fn one() -> Self {
        Self::from_ratio(1, 1)
    }

    /// `10^exp` as a fraction, used to move between raw and display units.
    pub fn decimal_scale(exp: u32) -> Self {
        Self::normalized(false, pow10(exp), U1024::one())
    }

    /// Parse a plain decimal literal such as `"-12.0450"` without going
    /// through a float.
    ///
    /// The digits without the point must fit in a u256 and there may be at
    /// most [`MAX_DECIMAL_PLACES`] fractional digits; anything larger is `None`.
    pub fn from_decimal_str(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }
        if frac_part.len() > MAX_DECIMAL_PLACES {
            return None;
        }
        let joined = format!("{int_part}{frac_part}");
        let joined = joined.trim_start_matches('0');
        let numerator = if joined.is_empty() {
            U256::zero()
        } else {
            U256::from_dec_str(joined).ok()?
        };
        let denominator = checked_pow10(u32::try_from(frac_part.len()).ok()?)?;
        Some(Self::normalized(negative, widen(numerator), denominator))
    }

    pub fn numerator(&self) -> U1024 {
        self.numerator
    }

    pub fn denominator(&self) -> U1024 {
        self.denominator
    }

    pub fn is_zero(&self) -> bool {
        self.numerator.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_positive(&self) -> bool {
        !self.negative && !self.is_zero()
    }

    pub fn abs(&self) -> Self {
        Self {
            negative: false,
            ..self.clone()
        }
    }

    /// # Panics
    /// When `self` is zero.
    pub fn invert(&self) -> Self {
        assert!(!self.is_zero(), "cannot invert a zero fraction");
        Self::normalized(self.negative, self.denominator, self.numerator)
    }

    /// Integer part of the magnitude (truncates toward zero).
    pub fn quotient(&self) -> U1024 {
        self.numerator / self.denominator
    }

    /// Floor of a non-negative value as a u256, `None` when negative or too wide.
    pub fn floor_u256(&self) -> Option<U256> {
        if self.negative {
            return None;
        }
        narrow(self.quotient())
    }

    /// Fixed-point rendering with `decimals` digits, rounding half away from zero.
    pub fn to_fixed(&self, decimals: u32) -> String {
        let scaled = mul(self.numerator, pow10(decimals));
        let rounded = add(mul(scaled, U1024::from(2u64)), self.denominator)
            / mul(self.denominator, U1024::from(2u64));
        let digits = rounded.to_string();
        let sign = if self.negative && !rounded.is_zero() { "-" } else { "" };
        if decimals == 0 {
            return format!("{sign}{digits}");
        }
        let width = decimals as usize + 1;
        let padded = format!("{digits:0>width$}");
        let (int_part, frac_part) = padded.split_at(padded.len() - decimals as usize);
        format!("{sign}{int_part}.{frac_part}")
    }

    fn signed_terms(&self, other: &Self) -> (U1024, U1024, U1024) {
        (
            mul(self.numerator, other.denominator),
            mul(other.numerator, self.denominator),
            mul(self.denominator, other.denominator),
        )
    }

    fn add_signed(&self, other: &Self, flip_other: bool) -> Self {
        let other_negative = other.negative ^ flip_other;
        let (a, b, denominator) = self.signed_terms(other);
        if self.negative == other_negative {
            return Self::normalized(self.negative, add(a, b), denominator);
        }
        match a.cmp(&b) {
            Ordering::Equal => Self::zero(),
            Ordering::Greater => Self::normalized(self.negative, a - b, denominator),
            Ordering::Less => Self::normalized(other_negative, b - a, denominator),
        }
    }

    fn multiply(&self, other: &Self) -> Self {
        // cross-reduce first to keep intermediates narrow
        let g1 = gcd(self.numerator, other.denominator);
        let g2 = gcd(other.numerator, self.denominator);
        Self::normalized(
            self.negative ^ other.negative,
            mul(self.numerator / g1, other.numerator / g2),
            mul(self.denominator / g2, other.denominator / g1),
        )
    }
}

impl Default for Fraction {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u64> for Fraction {
    fn from(value: u64) -> Self {
        Self::from_ratio(value as u128, 1)
    }
}

impl From<u128> for Fraction {
    fn from(value: u128) -> Self {
        Self::from_ratio(value, 1)
    }
}

impl From<U256> for Fraction {
    fn from(value: U256) -> Self {
        Self::new(value, U256::one())
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (negative, _) => {
                let (a, b, _) = self.signed_terms(other);
                if negative {
                    b.cmp(&a)
                } else {
                    a.cmp(&b)
                }
            }
        }
    }
}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, |$a:ident, $b:ident| $body:expr) => {
        impl<'a> $trait<&'a Fraction> for &'a Fraction {
            type Output = Fraction;
            fn $method(self, rhs: &'a Fraction) -> Fraction {
                let ($a, $b) = (self, rhs);
                $body
            }
        }

        impl $trait for Fraction {
            type Output = Fraction;
            fn $method(self, rhs: Fraction) -> Fraction {
                (&self).$method(&rhs)
            }
        }

        impl<'a> $trait<&'a Fraction> for Fraction {
            type Output = Fraction;
            fn $method(self, rhs: &'a Fraction) -> Fraction {
                (&self).$method(rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, |a, b| a.add_signed(b, false));
impl_binary_op!(Sub, sub, |a, b| a.add_signed(b, true));
impl_binary_op!(Mul, mul, |a, b| a.multiply(b));
impl_binary_op!(Div, div, |a, b| a.multiply(&b.invert()));

impl Neg for Fraction {
    type Output = Fraction;
    fn neg(self) -> Fraction {
        if self.is_zero() {
            return self;
        }
        Self {
            negative: !self.negative,
            ..self
        }
    }
}

impl fmt::Debug for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fraction({self})")
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.negative { "-" } else { "" };
        if self.denominator == U1024::one() {
            write!(f, "{sign}{}", self.numerator)
        } else {
            write!(f, "{sign}{}/{}", self.numerator, self.denominator)
        }
    }
}

impl Serialize for Fraction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A ratio shown as a percentage: `Percent::from_ratio(1, 100)` is `1%`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Percent(Fraction);

impl Percent {
    pub fn from_fraction(ratio: Fraction) -> Self {
        Self(ratio)
    }

    pub fn from_ratio(numerator: u128, denominator: u128) -> Self {
        Self(Fraction::from_ratio(numerator, denominator))
    }

    pub fn from_basis_points(bp: u64) -> Self {
        Self::from_ratio(bp as u128, 10_000)
    }

    /// Floor of the value in basis points, `None` for negatives or absurd widths.
    pub fn to_basis_points(&self) -> Option<u64> {
        let bp = &self.0 * &Fraction::from(10_000u64);
        bp.floor_u256()
            .filter(|v| v.bits() <= 64)
            .map(|v| v.low_u64())
    }

    pub fn as_fraction(&self) -> &Fraction {
        &self.0
    }

    pub fn into_fraction(self) -> Fraction {
        self.0
    }

    /// Value ×100 as a fixed-point string, without the `%` sign.
    pub fn to_fixed(&self, decimals: u32) -> String {
        (&self.0 * &Fraction::from(100u64)).to_fixed(decimals)
    }
}

impl fmt::Debug for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Percent({}%)", self.to_fixed(4))
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.to_fixed(2))
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(n: i128, d: u128) -> Fraction {
        Fraction::from_signed_ratio(n, d)
    }

    #[test]
    fn reduces_and_normalizes() {
        assert_eq!(f(6, 8), f(3, 4));
        assert_eq!(f(0, 5), Fraction::zero());
        assert!(!f(0, 5).is_negative());
        assert_eq!(f(-2, 4).to_string(), "-1/2");
    }

    #[test]
    fn arithmetic() {
        assert_eq!(f(1, 3) + f(1, 6), f(1, 2));
        assert_eq!(f(1, 3) - f(1, 2), f(-1, 6));
        assert_eq!(f(-1, 3) - f(-1, 3), Fraction::zero());
        assert_eq!(f(2, 3) * f(9, 4), f(3, 2));
        assert_eq!(f(2, 3) / f(4, 9), f(3, 2));
        assert_eq!(f(-2, 3).invert(), f(-3, 2));
        assert_eq!(-f(1, 2), f(-1, 2));
    }

    #[test]
    fn ordering_across_signs() {
        assert!(f(-1, 2) < f(1, 3));
        assert!(f(-1, 2) < f(-1, 3));
        assert!(f(2, 3) > f(3, 5));
        assert_eq!(f(4, 6).cmp(&f(2, 3)), Ordering::Equal);
    }

    #[test]
    #[should_panic(expected = "denominator must be non-zero")]
    fn zero_denominator_panics() {
        Fraction::from_ratio(1, 0);
    }

    #[test]
    #[should_panic(expected = "cannot invert")]
    fn division_by_zero_panics() {
        let _ = f(1, 2) / Fraction::zero();
    }

    #[test]
    fn exact_at_u256_scale() {
        let supply = U256::from(21_000_000u64) * U256::exp10(18);
        let team = U256::from(4_000_000u64) * U256::exp10(18);
        let ratio = Fraction::new(team, supply);
        assert_eq!(ratio, f(4, 21));
        let max = U256::max_value();
        let near = Fraction::new(max - U256::one(), max);
        assert!(near < Fraction::one());
        assert_eq!(near.clone() * Fraction::from(max), Fraction::from(max - U256::one()));
    }

    #[test]
    fn decimal_parsing() {
        assert_eq!(Fraction::from_decimal_str("0.000000078924051425"), Some(f(78_924_051_425, 1_000_000_000_000_000_000)));
        assert_eq!(Fraction::from_decimal_str("-12.50"), Some(f(-25, 2)));
        assert_eq!(Fraction::from_decimal_str("3000"), Some(Fraction::from(3000u64)));
        assert_eq!(Fraction::from_decimal_str("1e5"), None);
        assert_eq!(Fraction::from_decimal_str("."), None);
    }

    #[test]
    fn decimal_parsing_rejects_oversized_literals() {
        let long_fraction = format!("0.{}1", "0".repeat(320));
        assert_eq!(Fraction::from_decimal_str(&long_fraction), None);
        assert_eq!(Fraction::from_decimal_str(&"9".repeat(400)), None);

        let smallest = format!("0.{}1", "0".repeat(MAX_DECIMAL_PLACES - 1));
        let parsed = Fraction::from_decimal_str(&smallest).unwrap();
        assert_eq!(parsed.denominator(), pow10(MAX_DECIMAL_PLACES as u32));
        assert_eq!(Fraction::from_decimal_str(&format!("{smallest}0")), None);
    }

    #[test]
    fn fixed_rendering() {
        assert_eq!(f(4, 21).to_fixed(4), "0.1905");
        assert_eq!(f(1, 8).to_fixed(2), "0.13");
        assert_eq!(f(-1, 3).to_fixed(3), "-0.333");
        assert_eq!(f(-1, 3000).to_fixed(2), "0.00");
        assert_eq!(f(7, 2).to_fixed(0), "4");
        assert_eq!(Fraction::from(5u64).to_fixed(2), "5.00");
    }

    #[test]
    fn percent_views() {
        let p = Percent::from_fraction(f(4, 21));
        assert_eq!(p.to_string(), "19.05%");
        assert_eq!(Percent::from_basis_points(250).to_fixed(1), "2.5");
        assert_eq!(Percent::from_ratio(1, 100).to_basis_points(), Some(100));
        assert_eq!(Percent::from_ratio(1, 3).to_basis_points(), Some(3333));
        assert!(Percent::from_ratio(1, 100) < Percent::from_ratio(2, 100));
    }
}
