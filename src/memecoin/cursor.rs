//! Typed cursor over aggregated result groups.
//!
//! Every read declares its arity up front. Offsets never leak out of here: a
//! decoder asks for "the next u256" and gets a [`DecodeError`] naming the read
//! when the layout is off.

use crate::errors::DecodeError;
use crate::felt::{Address, Felt};
use crate::numeric::{bigint::checked_from_mag_sign, from_limbs, U256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// At least `min` words; the rest is declared with
    /// [`GroupReader::expect_remaining`] once a tag has been read.
    Variable { min: usize },
}

/// Static description of one read in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Read {
    pub name: &'static str,
    pub arity: Arity,
}

impl Read {
    pub const fn exact(name: &'static str, words: usize) -> Self {
        Self {
            name,
            arity: Arity::Exact(words),
        }
    }

    pub const fn variable(name: &'static str, min: usize) -> Self {
        Self {
            name,
            arity: Arity::Variable { min },
        }
    }

    fn check(&self, got: usize) -> Result<(), DecodeError> {
        let ok = match self.arity {
            Arity::Exact(n) => got == n,
            Arity::Variable { min } => got >= min,
        };
        if ok {
            return Ok(());
        }
        let expected = match self.arity {
            Arity::Exact(n) => n.to_string(),
            Arity::Variable { min } => format!("at least {min}"),
        };
        Err(DecodeError::Arity {
            call: self.name,
            expected,
            got,
        })
    }
}

/// Hands out result groups in request order.
#[derive(Debug)]
pub struct ResultCursor<'a> {
    groups: &'a [Vec<Felt>],
    next: usize,
}

impl<'a> ResultCursor<'a> {
    pub fn new(groups: &'a [Vec<Felt>]) -> Self {
        Self { groups, next: 0 }
    }

    pub fn group(&mut self, read: Read) -> Result<GroupReader<'a>, DecodeError> {
        let words = self.groups.get(self.next).ok_or(DecodeError::GroupCount {
            expected: self.next + 1,
            got: self.groups.len(),
        })?;
        self.next += 1;
        GroupReader::new(read, words)
    }

    pub fn finish(self) -> Result<(), DecodeError> {
        if self.next == self.groups.len() {
            Ok(())
        } else {
            Err(DecodeError::GroupCount {
                expected: self.next,
                got: self.groups.len(),
            })
        }
    }
}

/// Word-level reader for one result group.
#[derive(Debug)]
pub struct GroupReader<'a> {
    call: &'static str,
    words: &'a [Felt],
    position: usize,
}

impl<'a> GroupReader<'a> {
    pub fn new(read: Read, words: &'a [Felt]) -> Result<Self, DecodeError> {
        read.check(words.len())?;
        Ok(Self {
            call: read.name,
            words,
            position: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.words.len() - self.position
    }

    /// Declare how many words are left after a tag.
    pub fn expect_remaining(&self, words: usize) -> Result<(), DecodeError> {
        if self.remaining() == words {
            return Ok(());
        }
        Err(DecodeError::Arity {
            call: self.call,
            expected: (self.position + words).to_string(),
            got: self.words.len(),
        })
    }

    pub fn felt(&mut self) -> Result<Felt, DecodeError> {
        let word = self.words.get(self.position).copied().ok_or(DecodeError::Truncated {
            call: self.call,
            position: self.position,
        })?;
        self.position += 1;
        Ok(word)
    }

    fn invalid(&self, field: &'static str, kind: &'static str, word: Felt) -> DecodeError {
        DecodeError::InvalidValue {
            call: self.call,
            field,
            kind,
            value: word.to_hex(),
        }
    }

    fn overflow(&self, field: &'static str, value: String) -> DecodeError {
        DecodeError::Overflow {
            call: self.call,
            field,
            value,
        }
    }

    pub fn address(&mut self, field: &'static str) -> Result<Address, DecodeError> {
        let word = self.felt()?;
        Address::from_felt(word).map_err(|_| self.invalid(field, "address", word))
    }

    pub fn bool(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        let word = self.felt()?;
        word.to_bool().ok_or_else(|| self.invalid(field, "bool", word))
    }

    pub fn u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        let word = self.felt()?;
        word.to_u64().ok_or_else(|| self.overflow(field, word.to_hex()))
    }

    pub fn u128(&mut self, field: &'static str) -> Result<u128, DecodeError> {
        let word = self.felt()?;
        word.to_u128().ok_or_else(|| self.overflow(field, word.to_hex()))
    }

    /// `(low, high)` limb pair.
    pub fn u256(&mut self, field: &'static str) -> Result<U256, DecodeError> {
        let low = self.u128(field)?;
        let high = self.u128(field)?;
        Ok(from_limbs(low, high))
    }

    /// `{mag, sign}` pair, narrowed to a tick.
    pub fn i129(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        let mag = self.u128(field)?;
        let sign = self.bool(field)?;
        checked_from_mag_sign(mag, sign)
            .and_then(|v| i64::try_from(v).ok())
            .ok_or_else(|| self.overflow(field, format!("{}{mag}", if sign { "-" } else { "" })))
    }

    pub fn short_string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let word = self.felt()?;
        word.to_short_string()
            .ok_or_else(|| self.invalid(field, "short string", word))
    }

    /// Cairo `Option` tag: `0` is `Some`, `1` is `None`.
    pub fn option(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        match self.felt()?.to_u64() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(DecodeError::UnknownTag {
                call: self.call,
                field,
                tag: self.words[self.position - 1].to_hex(),
            }),
        }
    }

    /// Enum variant index.
    pub fn tag(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        let word = self.felt()?;
        word.to_u64().ok_or_else(|| DecodeError::UnknownTag {
            call: self.call,
            field,
            tag: word.to_hex(),
        })
    }

    pub fn unknown_tag(&self, field: &'static str, tag: u64) -> DecodeError {
        DecodeError::UnknownTag {
            call: self.call,
            field,
            tag: tag.to_string(),
        }
    }

    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            left => Err(DecodeError::TrailingWords { call: self.call, left }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[u64]) -> Vec<Felt> {
        values.iter().map(|v| Felt::from(*v)).collect()
    }

    #[test]
    fn exact_arity_is_enforced() {
        let group = words(&[1, 2]);
        let err = GroupReader::new(Read::exact("total_supply", 3), &group).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Arity {
                call: "total_supply",
                expected: "3".into(),
                got: 2
            }
        );
        assert!(GroupReader::new(Read::variable("locked_liquidity", 1), &[]).is_err());
    }

    #[test]
    fn reads_typed_values_in_order() {
        let group = vec![
            Felt::from(5u64),
            Felt::from(1u64),
            Felt::from(u128::MAX),
            Felt::from(3u64),
            Felt::from(42u64),
            Felt::ONE,
            Felt::from_short_string("PEPE").unwrap(),
        ];
        let mut reader = GroupReader::new(Read::exact("mixed", 7), &group).unwrap();
        assert_eq!(reader.u64("a").unwrap(), 5);
        assert!(reader.bool("b").unwrap());
        assert_eq!(reader.u256("c").unwrap(), from_limbs(u128::MAX, 3));
        assert_eq!(reader.i129("d").unwrap(), -42);
        assert_eq!(reader.short_string("e").unwrap(), "PEPE");
        reader.finish().unwrap();
    }

    #[test]
    fn variable_groups_declare_their_tail() {
        let group = words(&[0, 7, 8, 9]);
        let mut reader = GroupReader::new(Read::variable("locked_liquidity", 1), &group).unwrap();
        assert!(reader.option("lock").unwrap());
        assert!(reader.expect_remaining(2).is_err());
        reader.expect_remaining(3).unwrap();

        let none = words(&[1]);
        let mut reader = GroupReader::new(Read::variable("locked_liquidity", 1), &none).unwrap();
        assert!(!reader.option("lock").unwrap());
        reader.expect_remaining(0).unwrap();
    }

    #[test]
    fn rejects_bad_words() {
        let group = words(&[2, 7]);
        let mut reader = GroupReader::new(Read::exact("flags", 2), &group).unwrap();
        assert!(matches!(reader.bool("is_launched"), Err(DecodeError::InvalidValue { .. })));
        assert!(matches!(reader.option("x"), Err(DecodeError::UnknownTag { .. })));
        assert!(matches!(reader.felt(), Err(DecodeError::Truncated { position: 2, .. })));

        let group = words(&[1, 2]);
        let mut reader = GroupReader::new(Read::exact("pair", 2), &group).unwrap();
        reader.felt().unwrap();
        assert_eq!(
            reader.finish(),
            Err(DecodeError::TrailingWords { call: "pair", left: 1 })
        );
    }

    #[test]
    fn cursor_walks_groups_once() {
        let groups = vec![words(&[1]), words(&[2, 3])];
        let mut cursor = ResultCursor::new(&groups);
        cursor.group(Read::exact("first", 1)).unwrap();
        let early = ResultCursor::new(&groups);
        assert!(early.finish().is_err());
        cursor.group(Read::exact("second", 2)).unwrap();
        assert!(cursor.group(Read::exact("third", 1)).is_err());
    }
}
