//! Fixed-scale decimal amount backed by `rust_decimal`.
//!
//! `Amount` pairs a `Decimal` value with the token's number of fractional
//! digits. Every amount that enters the pipeline is validated against that
//! scale once, at construction, so later conversions to ledger base units are
//! lossless.
//!
//! Key properties:
//! - **Fixed scale**: values with more fractional digits than the token
//!   supports are rejected instead of silently truncated.
//! - **Integer round-trip**: `from_units`/`to_units` convert to and from the
//!   signed 64-bit base units the native token service and the token manager
//!   contract both use.
//! - **String serde**: serializes as a decimal string (`"1.50"`), never as a
//!   float.

use std::cmp::Ordering;
use std::fmt::{Debug, Display};
use std::str::FromStr;

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Largest number of fractional digits a token can declare.
pub const MAX_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AmountError {
    #[error("amount {value} has more than {decimals} fractional digits")]
    DecimalsOverRange { value: Decimal, decimals: u8 },
    #[error("token decimals {0} exceed the supported maximum of {MAX_DECIMALS}")]
    UnsupportedDecimals(u8),
    #[error("amount {0} is negative")]
    Negative(Decimal),
    #[error("amount {value} does not fit in 64-bit base units at {decimals} decimals")]
    Overflow { value: Decimal, decimals: u8 },
    #[error("invalid decimal string: {0}")]
    Parse(#[from] rust_decimal::Error),
}

/// Non-negative decimal amount with a fixed number of fractional digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Amount {
    value: Decimal,
    decimals: u8,
}

impl Amount {
    /// Validates `value` against the token's `decimals`.
    ///
    /// The stored value is rescaled to exactly `decimals` digits so that
    /// `Display` and base-unit conversion agree.
    pub fn new(value: Decimal, decimals: u8) -> Result<Self, AmountError> {
        if decimals > MAX_DECIMALS {
            return Err(AmountError::UnsupportedDecimals(decimals));
        }

        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative(value));
        }

        let normalized = value.normalize();
        if normalized.scale() > u32::from(decimals) {
            return Err(AmountError::DecimalsOverRange { value, decimals });
        }

        let mut value = normalized;
        value.rescale(u32::from(decimals));

        Ok(Self { value, decimals })
    }

    /// Parse a decimal string such as `"12.5"` at the given scale.
    pub fn parse(value: &str, decimals: u8) -> Result<Self, AmountError> {
        Self::new(Decimal::from_str(value)?, decimals)
    }

    /// Build an amount from integer base units.
    ///
    /// E.g., `from_units(1_500, 3)` produces `1.500`.
    pub fn from_units(units: i64, decimals: u8) -> Result<Self, AmountError> {
        if decimals > MAX_DECIMALS {
            return Err(AmountError::UnsupportedDecimals(decimals));
        }

        let value = Decimal::try_from_i128_with_scale(i128::from(units), u32::from(decimals))?;
        Self::new(value, decimals)
    }

    pub const fn zero(decimals: u8) -> Self {
        Self {
            value: Decimal::ZERO,
            decimals,
        }
    }

    /// Convert to signed 64-bit base units.
    pub fn to_units(self) -> Result<i64, AmountError> {
        let overflow = || AmountError::Overflow {
            value: self.value,
            decimals: self.decimals,
        };

        let multiplier = Decimal::from_i128_with_scale(10_i128.pow(u32::from(self.decimals)), 0);
        self.value
            .checked_mul(multiplier)
            .and_then(|units| units.trunc().to_i64())
            .ok_or_else(overflow)
    }

    /// Base units as a 256-bit word for contract arguments.
    pub fn to_u256(self) -> Result<U256, AmountError> {
        let units = self.to_units()?;
        Ok(U256::from(units.unsigned_abs()))
    }

    pub const fn decimals(self) -> u8 {
        self.decimals
    }

    pub const fn value(self) -> Decimal {
        self.value
    }

    pub fn is_zero(self) -> bool {
        self.value.is_zero()
    }
}

impl Debug for Amount {
    fn fmt(&self, dest: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(dest, "Amount({}, decimals={})", self.value, self.decimals)
    }
}

impl Display for Amount {
    fn fmt(&self, dest: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(dest, "{}", self.value)
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by value, then by scale, so that `cmp` agrees with `Eq`.
impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then(self.decimals.cmp(&other.decimals))
    }
}

/// Wire form: `{ "value": "1.50", "decimals": 2 }`.
#[derive(Serialize, Deserialize)]
struct AmountRepr {
    #[serde(with = "rust_decimal::serde::str")]
    value: Decimal,
    decimals: u8,
}

impl Serialize for Amount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AmountRepr {
            value: self.value,
            decimals: self.decimals,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = AmountRepr::deserialize(deserializer)?;
        Self::new(repr.value, repr.decimals).map_err(serde::de::Error::custom)
    }
}
