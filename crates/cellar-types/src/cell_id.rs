use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum number of base-36 characters in one address block.
pub const BLOCK_LEN: usize = 8;

/// Number of distinct values one block can encode (36^8).
const BLOCK_SPACE: u64 = 2_821_109_907_456;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque address of a value cell.
///
/// Addresses have the textual form `block-block`, where each block is one
/// to eight lowercase base-36 characters. Two independently random blocks
/// give roughly 82 bits of entropy; uniqueness among live cells is still
/// enforced by the registry, which retries on collision.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellId(String);

impl CellId {
    /// Generate a fresh random address.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self::from_blocks(rng.gen_range(0..BLOCK_SPACE), rng.gen_range(0..BLOCK_SPACE))
    }

    /// Build an address from two numeric blocks.
    ///
    /// Each block is reduced modulo 36^8 so it always fits in eight
    /// characters.
    pub fn from_blocks(high: u64, low: u64) -> Self {
        Self(format!(
            "{}-{}",
            to_base36(high % BLOCK_SPACE),
            to_base36(low % BLOCK_SPACE)
        ))
    }

    /// Parse and validate an address string.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidCellId {
            address: s.to_string(),
            reason: reason.to_string(),
        };

        let (high, low) = s.split_once('-').ok_or_else(|| invalid("missing '-' separator"))?;
        for block in [high, low] {
            if block.is_empty() || block.len() > BLOCK_LEN {
                return Err(invalid("block must be 1 to 8 characters"));
            }
            if !block.bytes().all(|b| ALPHABET.contains(&b)) {
                return Err(invalid("block must be lowercase base-36"));
            }
        }
        Ok(Self(s.to_string()))
    }

    /// The address text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".into();
    }
    let mut digits = Vec::with_capacity(BLOCK_LEN);
    while n > 0 {
        digits.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

impl TryFrom<String> for CellId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<CellId> for String {
    fn from(id: CellId) -> Self {
        id.0
    }
}

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellId({})", self.0)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
