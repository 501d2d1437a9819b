//! Fixed-width integers and the limb/sign packings used by Cairo calldata.

pub use primitive_types::U256;
use uint::construct_uint;

construct_uint! {
    /// Scratch integer for rational arithmetic. Cross-multiplying two
    /// reduced 256-bit ratios needs 512 bits; the rest is headroom for
    /// chained operations before reduction.
    pub struct U1024(16);
}

/// Split a u256 into its `(low, high)` 128-bit limbs.
pub fn to_limbs(value: U256) -> (u128, u128) {
    let [l0, l1, l2, l3] = value.0;
    let low = (l0 as u128) | ((l1 as u128) << 64);
    let high = (l2 as u128) | ((l3 as u128) << 64);
    (low, high)
}

/// Rebuild a u256 from `(low, high)` limbs.
pub fn from_limbs(low: u128, high: u128) -> U256 {
    U256([
        low as u64,
        (low >> 64) as u64,
        high as u64,
        (high >> 64) as u64,
    ])
}

/// Encode a signed integer as Cairo `i129 { mag, sign }`. Zero is `(0, false)`.
pub fn to_mag_sign(value: i128) -> (u128, bool) {
    (value.unsigned_abs(), value < 0)
}

/// Decode `i129 { mag, sign }`, returning `None` when the magnitude does not
/// fit an `i128`.
pub fn checked_from_mag_sign(mag: u128, sign: bool) -> Option<i128> {
    if sign {
        if mag == 1u128 << 127 {
            Some(i128::MIN)
        } else {
            i128::try_from(mag).ok().map(|m| -m)
        }
    } else {
        i128::try_from(mag).ok()
    }
}

/// Decode `i129 { mag, sign }`.
///
/// # Panics
/// When the magnitude exceeds the `i128` range. Callers decoding untrusted
/// data use [`checked_from_mag_sign`].
pub fn from_mag_sign(mag: u128, sign: bool) -> i128 {
    match checked_from_mag_sign(mag, sign) {
        Some(v) => v,
        None => panic!("i129 magnitude {mag} exceeds the i128 range"),
    }
}

pub fn widen(value: U256) -> U1024 {
    let mut limbs = [0u64; 16];
    limbs[..4].copy_from_slice(&value.0);
    U1024(limbs)
}

pub fn narrow(value: U1024) -> Option<U256> {
    if value.0[4..].iter().any(|limb| *limb != 0) {
        return None;
    }
    Some(U256([value.0[0], value.0[1], value.0[2], value.0[3]]))
}

pub fn u1024_from_u128(value: u128) -> U1024 {
    let mut limbs = [0u64; 16];
    limbs[0] = value as u64;
    limbs[1] = (value >> 64) as u64;
    U1024(limbs)
}

pub fn pow10(exp: u32) -> U1024 {
    U1024::exp10(exp as usize)
}

/// `10^exp`, or `None` past 1024 bits.
pub fn checked_pow10(exp: u32) -> Option<U1024> {
    let ten = U1024::from(10u64);
    (0..exp).try_fold(U1024::one(), |acc, _| acc.checked_mul(ten))
}

pub fn gcd(mut a: U1024, mut b: U1024) -> U1024 {
    while !b.is_zero() {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}
