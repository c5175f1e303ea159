//! # Amounts
//!
//! Custodied value in smallest units. There is a single asset, so an amount
//! is a bare unsigned integer; arithmetic on custody totals is done by the
//! ledger with checked operations.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A value in smallest units of the single custodied asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Wrap a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Whether this amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::str::FromStr for Amount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ValidationError::InvalidAmount(s.to_string()))
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
