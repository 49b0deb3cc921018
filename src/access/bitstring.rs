// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fixed-width access bitstring.
//!
//! ```text
//! index:  0   1   2  ...  N-2 │ N-1
//!         ─────────────────── │ ──────
//!         hash(principal)     │ public
//!         mod (N-1)           │ flag
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Smallest usable width: one principal bit plus the public bit.
pub const MIN_BITSTRING_SIZE: usize = 2;

const WORD_BITS: usize = 64;

/// Errors building or parsing a bitstring.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BitstringError {
    #[error("Bitstring size must be at least 2, got {0}")]
    TooSmall(usize),

    #[error("Bitstring length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Invalid bitstring digit '{found}' at position {position}")]
    InvalidDigit { position: usize, found: char },
}

/// Bit index of `principal` in a bitstring of `size` bits.
///
/// SHA-256 of the UTF-8 bytes, first 8 bytes as a big-endian `u64`, reduced
/// modulo `size - 1` so the public bit is never hit.
pub fn principal_index(principal: &str, size: usize) -> usize {
    let digest = Sha256::digest(principal.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let span = size.saturating_sub(1).max(1) as u64;
    (u64::from_be_bytes(prefix) % span) as usize
}

/// Per-document access bitstring.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessBitstring {
    words: Vec<u64>,
    size: usize,
}

impl AccessBitstring {
    /// All-zero bitstring of `size` bits.
    pub fn new(size: usize) -> Result<Self, BitstringError> {
        if size < MIN_BITSTRING_SIZE {
            return Err(BitstringError::TooSmall(size));
        }
        Ok(Self {
            words: vec![0; size.div_ceil(WORD_BITS)],
            size,
        })
    }

    /// Build the bitstring for a document.
    ///
    /// An absent owner sets the public bit instead of a hashed bit.
    pub fn encode<S: AsRef<str>>(
        size: usize,
        owner: Option<&str>,
        groups: &[S],
        is_public: bool,
    ) -> Result<Self, BitstringError> {
        let mut bits = Self::new(size)?;
        match owner {
            Some(owner) => {
                bits.add(owner);
            }
            None => bits.set_public(true),
        }
        for group in groups {
            bits.add(group.as_ref());
        }
        if is_public {
            bits.set_public(true);
        }
        Ok(bits)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Index of the reserved public bit.
    pub fn public_index(&self) -> usize {
        self.size - 1
    }

    pub fn index_of(&self, principal: &str) -> usize {
        principal_index(principal, self.size)
    }

    fn get(&self, index: usize) -> bool {
        self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }

    fn set(&mut self, index: usize, value: bool) {
        let mask = 1u64 << (index % WORD_BITS);
        let word = &mut self.words[index / WORD_BITS];
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Set the principal's bit. Returns whether it was previously clear.
    pub fn add(&mut self, principal: &str) -> bool {
        let index = self.index_of(principal);
        let was_set = self.get(index);
        self.set(index, true);
        !was_set
    }

    /// Clear the principal's bit. Returns whether it was previously set.
    ///
    /// A colliding principal loses its bit too.
    pub fn remove(&mut self, principal: &str) -> bool {
        let index = self.index_of(principal);
        let was_set = self.get(index);
        self.set(index, false);
        was_set
    }

    /// Probabilistic membership: false positives on hash collision.
    pub fn contains(&self, principal: &str) -> bool {
        self.get(self.index_of(principal))
    }

    pub fn is_public(&self) -> bool {
        self.get(self.public_index())
    }

    pub fn set_public(&mut self, public: bool) {
        let index = self.public_index();
        self.set(index, public);
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Bitwise OR of two bitstrings of the same width.
    pub fn union(&self, other: &Self) -> Result<Self, BitstringError> {
        if self.size != other.size {
            return Err(BitstringError::LengthMismatch {
                expected: self.size,
                actual: other.size,
            });
        }
        Ok(Self {
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a | b)
                .collect(),
            size: self.size,
        })
    }

    /// Coarse read check: public, or any of the caller's principals present.
    pub fn visible_to<S: AsRef<str>>(&self, user: Option<&str>, groups: &[S]) -> bool {
        self.is_public()
            || user.is_some_and(|u| self.contains(u))
            || groups.iter().any(|g| self.contains(g.as_ref()))
    }
}

impl fmt::Display for AccessBitstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits: String = (0..self.size)
            .map(|i| if self.get(i) { '1' } else { '0' })
            .collect();
        f.write_str(&digits)
    }
}

impl FromStr for AccessBitstring {
    type Err = BitstringError;

    /// Parse the persisted digit string; its length is the width.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bits = Self::new(s.chars().count())?;
        for (position, found) in s.chars().enumerate() {
            match found {
                '0' => {}
                '1' => bits.set(position, true),
                _ => return Err(BitstringError::InvalidDigit { position, found }),
            }
        }
        Ok(bits)
    }
}

impl AccessBitstring {
    /// Parse a persisted digit string that must have exactly `size` bits.
    pub fn parse_sized(s: &str, size: usize) -> Result<Self, BitstringError> {
        let actual = s.chars().count();
        if actual != size {
            return Err(BitstringError::LengthMismatch {
                expected: size,
                actual,
            });
        }
        s.parse()
    }
}

impl Serialize for AccessBitstring {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccessBitstring {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_GROUPS: &[&str] = &[];

    #[test]
    fn test_index_never_hits_public_bit() {
        for size in [2, 3, 64, 65, 1024] {
            for principal in ["alice", "bob", "group:admins", "", "ünïcødé"] {
                assert!(principal_index(principal, size) < size - 1);
            }
        }
        assert_eq!(principal_index("anyone", 2), 0);
    }

    #[test]
    fn test_index_is_stable() {
        // First 8 bytes of SHA-256("alice") = 0x2bd806c97f0e00af
        let expected = (0x2bd8_06c9_7f0e_00afu64 % 1023) as usize;
        assert_eq!(principal_index("alice", 1024), expected);
    }

    #[test]
    fn test_encode_owner_and_groups() {
        let bits = AccessBitstring::encode(1024, Some("alice"), &["team-a", "team-b"], false).unwrap();
        assert!(bits.contains("alice"));
        assert!(bits.contains("team-a"));
        assert!(bits.contains("team-b"));
        assert!(!bits.is_public());
        assert!(bits.count_ones() <= 3);
    }

    #[test]
    fn test_absent_owner_is_public() {
        let bits = AccessBitstring::encode(64, None, NO_GROUPS, false).unwrap();
        assert!(bits.is_public());
        assert_eq!(bits.count_ones(), 1);
    }

    #[test]
    fn test_public_flag_is_unconditional() {
        let bits = AccessBitstring::encode(64, Some("alice"), NO_GROUPS, true).unwrap();
        assert!(bits.is_public());
        assert!(bits.contains("alice"));
        assert!(bits.visible_to(None, NO_GROUPS));
    }

    #[test]
    fn test_add_remove_round_trip() {
        let bits = AccessBitstring::encode(1024, Some("owner"), &["staff"], false).unwrap();
        let mut updated = bits.clone();
        assert!(!updated.contains("alice"));
        assert!(updated.add("alice"));
        assert!(updated.contains("alice"));
        assert!(updated.remove("alice"));
        assert_eq!(updated, bits);
    }

    #[test]
    fn test_visible_to() {
        let bits = AccessBitstring::encode(1024, Some("alice"), &["analysts"], false).unwrap();
        assert!(bits.visible_to(Some("alice"), NO_GROUPS));
        assert!(bits.visible_to(Some("bob"), &["analysts"]));
        assert!(!bits.visible_to(None, NO_GROUPS));
    }

    #[test]
    fn test_display_and_parse() {
        let mut bits = AccessBitstring::new(8).unwrap();
        bits.set_public(true);
        let index = bits.index_of("alice");
        bits.add("alice");

        let rendered = bits.to_string();
        assert_eq!(rendered.len(), 8);
        assert_eq!(rendered.chars().nth(7), Some('1'));
        assert_eq!(rendered.chars().nth(index), Some('1'));
        assert_eq!(rendered.parse::<AccessBitstring>().unwrap(), bits);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "0120".parse::<AccessBitstring>().unwrap_err(),
            BitstringError::InvalidDigit {
                position: 2,
                found: '2'
            }
        );
        assert_eq!(
            "1".parse::<AccessBitstring>().unwrap_err(),
            BitstringError::TooSmall(1)
        );
        assert_eq!(
            AccessBitstring::parse_sized("0000", 8).unwrap_err(),
            BitstringError::LengthMismatch {
                expected: 8,
                actual: 4
            }
        );
    }

    #[test]
    fn test_union() {
        let a = AccessBitstring::encode(128, Some("alice"), NO_GROUPS, false).unwrap();
        let b = AccessBitstring::encode(128, Some("bob"), NO_GROUPS, true).unwrap();
        let both = a.union(&b).unwrap();
        assert!(both.contains("alice") && both.contains("bob") && both.is_public());

        let other = AccessBitstring::new(64).unwrap();
        assert!(a.union(&other).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let bits = AccessBitstring::encode(16, None, NO_GROUPS, false).unwrap();
        let json = serde_json::to_value(&bits).unwrap();
        assert_eq!(json, serde_json::json!("0000000000000001"));
        let back: AccessBitstring = serde_json::from_value(json).unwrap();
        assert_eq!(back, bits);
    }
}
