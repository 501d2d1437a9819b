//! Starknet field elements, contract addresses and entrypoint selectors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::numeric::U256;

/// Field prime `2^251 + 17 * 2^192 + 1`.
pub const FIELD_PRIME: U256 = U256([1, 0, 0, 0x0800_0000_0000_0011]);

/// Addresses live below `2^251`.
const ADDRESS_BOUND: U256 = U256([0, 0, 0, 0x0800_0000_0000_0000]);

const SHORT_STRING_MAX_LEN: usize = 31;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeltError {
    #[error("invalid hex felt: {0}")]
    InvalidHex(String),
    #[error("value {0} is not below the field prime")]
    OutOfField(String),
    #[error("value {0} is not a valid contract address")]
    OutOfAddressRange(String),
    #[error("short string must be 1-31 ASCII bytes, got {0:?}")]
    InvalidShortString(String),
}

fn be_bytes(value: &U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, limb) in value.0.iter().enumerate() {
        let start = 32 - (i + 1) * 8;
        out[start..start + 8].copy_from_slice(&limb.to_be_bytes());
    }
    out
}

fn keccak(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// A felt252.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Felt(U256);

impl Felt {
    pub const ZERO: Felt = Felt(U256([0, 0, 0, 0]));
    pub const ONE: Felt = Felt(U256([1, 0, 0, 0]));

    pub fn from_u256(value: U256) -> Result<Self, FeltError> {
        if value >= FIELD_PRIME {
            return Err(FeltError::OutOfField(hex::encode(be_bytes(&value))));
        }
        Ok(Self(value))
    }

    pub fn from_hex(text: &str) -> Result<Self, FeltError> {
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        if digits.is_empty() || digits.len() > 64 {
            return Err(FeltError::InvalidHex(text.to_string()));
        }
        let padded = format!("{digits:0>64}");
        let bytes = hex::decode(&padded).map_err(|_| FeltError::InvalidHex(text.to_string()))?;
        Self::from_u256(U256::from_big_endian(&bytes))
    }

    /// Cairo short string, e.g. `"PEPE"`.
    pub fn from_short_string(text: &str) -> Result<Self, FeltError> {
        if text.is_empty() || text.len() > SHORT_STRING_MAX_LEN || !text.is_ascii() {
            return Err(FeltError::InvalidShortString(text.to_string()));
        }
        Ok(Self(U256::from_big_endian(text.as_bytes())))
    }

    /// Strip the short-string packing. `None` when the bytes are not ASCII.
    /// Zero decodes to the empty string.
    pub fn to_short_string(&self) -> Option<String> {
        let bytes = be_bytes(&self.0);
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let text = &bytes[start..];
        if !text.is_ascii() {
            return None;
        }
        String::from_utf8(text.to_vec()).ok()
    }

    pub fn to_u256(&self) -> U256 {
        self.0
    }

    pub fn to_bytes_be(&self) -> [u8; 32] {
        be_bytes(&self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_u64(&self) -> Option<u64> {
        (self.0.bits() <= 64).then(|| self.0.low_u64())
    }

    pub fn to_u128(&self) -> Option<u128> {
        (self.0.bits() <= 128).then(|| self.0.low_u128())
    }

    pub fn to_bool(&self) -> Option<bool> {
        match self.to_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        }
    }

    /// Minimal `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        let encoded = hex::encode(self.to_bytes_be());
        let trimmed = encoded.trim_start_matches('0');
        if trimmed.is_empty() {
            "0x0".to_string()
        } else {
            format!("0x{trimmed}")
        }
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<u128> for Felt {
    fn from(value: u128) -> Self {
        Self(crate::numeric::from_limbs(value, 0))
    }
}

impl From<bool> for Felt {
    fn from(value: bool) -> Self {
        if value {
            Self::ONE
        } else {
            Self::ZERO
        }
    }
}

impl FromStr for Felt {
    type Err = FeltError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Felt({})", self.to_hex())
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Felt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Felt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Felt::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// Entrypoint selector: `keccak256(name)` masked to 250 bits.
pub fn selector(name: &str) -> Felt {
    let mut digest = keccak(name.as_bytes());
    digest[0] &= 0x03;
    Felt(U256::from_big_endian(&digest))
}

/// A contract address. Displays in checksummed form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(Felt);

impl Address {
    pub const ZERO: Address = Address(Felt::ZERO);

    pub fn from_felt(felt: Felt) -> Result<Self, FeltError> {
        if felt.0 >= ADDRESS_BOUND {
            return Err(FeltError::OutOfAddressRange(felt.to_hex()));
        }
        Ok(Self(felt))
    }

    pub fn parse(text: &str) -> Result<Self, FeltError> {
        Self::from_felt(Felt::from_hex(text)?)
    }

    pub fn felt(&self) -> Felt {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Mixed-case hex, padded to 64 nibbles.
    pub fn to_checksum(&self) -> String {
        let bytes = self.0.to_bytes_be();
        // hash covers the minimal big-endian encoding, at least one byte
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(31);
        let hash = keccak(&bytes[start..]);

        let mut chars: Vec<char> = hex::encode(bytes).chars().collect();
        for (i, ch) in chars.iter_mut().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if nibble >= 8 {
                ch.make_ascii_uppercase();
            }
        }
        let body: String = chars.into_iter().collect();
        format!("0x{body}")
    }
}

impl From<Address> for Felt {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl TryFrom<Felt> for Address {
    type Error = FeltError;
    fn try_from(felt: Felt) -> Result<Self, Self::Error> {
        Self::from_felt(felt)
    }
}

impl FromStr for Address {
    type Err = FeltError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Address::parse(&text).map_err(serde::de::Error::custom)
    }
}
