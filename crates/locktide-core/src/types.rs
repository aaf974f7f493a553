//! Core ledger types: addresses, amounts, epochs and stream records.
//!
//! Amounts and weights are `u128` base units. Epoch indices and timestamps
//! are `u64` (seconds for timestamps).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AddressError;

/// Token amount or duration-weighted balance, in base units.
pub type Amount = u128;

/// Epoch index counted from genesis.
pub type Epoch = u64;

/// A 20-byte account identifier.
///
/// Identifies participants, the engine vault, and fee tokens alike.
/// Displays and serializes as `0x`-prefixed lowercase hex.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Address(pub [u8; 20]);

/// Tokens are identified by their contract address.
pub type TokenId = Address;

impl Address {
    /// The all-zero address.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Create an address from a byte array.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.as_bytes()))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|_| AddressError::InvalidHex(s.to_string()))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| AddressError::InvalidLength(b.len()))?;
        Ok(Self(bytes))
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Matured principal being released linearly over one epoch.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct ExitStream {
    /// Timestamp the stream was opened.
    pub start: u64,
    /// Total principal released by this stream.
    pub amount: Amount,
    /// Portion already paid out.
    pub claimed: Amount,
}

impl ExitStream {
    /// Principal not yet paid out.
    pub fn remaining(&self) -> Amount {
        self.amount.saturating_sub(self.claimed)
    }
}

/// Cached claim state for the most recently touched fee epoch of one
/// `(account, token)` pair.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct FeeStream {
    /// Epoch whose fees this checkpoint streams.
    pub epoch: Epoch,
    /// The account's full share of that epoch's fees.
    pub amount: Amount,
    /// Portion of `amount` already paid out.
    pub claimed: Amount,
}

impl FeeStream {
    /// Share not yet paid out.
    pub fn remaining(&self) -> Amount {
        self.amount.saturating_sub(self.claimed)
    }
}

/// Principal scheduled to unlock a given number of epochs from now.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnlockBucket {
    /// Epochs remaining until the principal matures.
    pub weeks_to_unlock: u64,
    /// Principal maturing at that offset.
    pub amount: Amount,
}
