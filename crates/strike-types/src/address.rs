//! 20-byte identities for assets, pricers, bots, feeds and owners.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Length of an [`Address`] in bytes.
pub const ADDRESS_LEN: usize = 20;

/// An opaque account-style identity.
///
/// Rendered as `0x`-prefixed lowercase hex. The all-zero address is the
/// empty identity returned for unassigned lookups.
#[serde_as]
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(#[serde_as(as = "serde_with::hex::Hex")] [u8; ADDRESS_LEN]);

/// Errors produced when parsing an [`Address`] from text.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected 20 bytes, got {0}")]
    InvalidLength(usize),
}

impl Address {
    /// The empty identity.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Build an address whose every byte is `byte`. Handy for fixtures.
    pub const fn repeat_byte(byte: u8) -> Self {
        Self([byte; ADDRESS_LEN])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Parse from a byte slice of exactly [`ADDRESS_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressParseError> {
        let arr: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| AddressParseError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes =
            hex::decode(digits).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}
