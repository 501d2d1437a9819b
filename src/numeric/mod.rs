//! Exact arithmetic used by every layer above the transport.
//!
//! Token quantities reach 2^256, so nothing in here touches floating point.
//! The only float in the crate lives in [`crate::tick_math`].

pub mod bigint;
pub mod fraction;

pub use bigint::{from_limbs, from_mag_sign, to_limbs, to_mag_sign, U1024, U256};
pub use fraction::{Fraction, Percent};
