//! `decimal` columns carry a fixed scale (default 2, max 10) instead of
//! floating point, so money-shaped values round-trip exactly as strings on
//! the wire. Arbitrary-precision floats are explicitly out of scope.

use std::{convert::TryFrom, fmt};

use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const DEFAULT_SCALE: u32 = 2;
pub const MAX_SCALE: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecimalError {
    #[error("invalid decimal value: {0}")]
    Invalid(String),

    #[error("scale {0} exceeds the maximum of {MAX_SCALE}")]
    ScaleTooLarge(u32),

    #[error("value has more fractional digits than the declared scale of {scale}")]
    TooManyFractionalDigits { scale: u32 },
}

/// Validates a column's declared scale at DDL time.
pub fn validate_scale(scale: u32) -> Result<(), DecimalError> {
    if scale > MAX_SCALE {
        Err(DecimalError::ScaleTooLarge(scale))
    } else {
        Ok(())
    }
}

/// A decimal value fixed to a column's declared scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FixedDecimal {
    value: Decimal,
    scale: u32,
}

impl FixedDecimal {
    /// Parses `input` against `scale`, rejecting values with more
    /// fractional digits than the column declares (we never silently round
    /// a client's money value).
    pub fn parse(input: &str, scale: u32) -> Result<Self, DecimalError> {
        validate_scale(scale)?;
        let value = Decimal::from_str_exact(input.trim())
            .map_err(|_| DecimalError::Invalid(input.to_owned()))?;
        if value.scale() > scale {
            return Err(DecimalError::TooManyFractionalDigits { scale });
        }
        Ok(FixedDecimal {
            value: value.round_dp(scale),
            scale,
        })
    }

    /// The zero value for a nullable column's type-derived default.
    pub fn zero(scale: u32) -> Self {
        FixedDecimal {
            value: Decimal::new(0, scale),
            scale,
        }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn inner(&self) -> Decimal {
        self.value
    }

    pub fn checked_add(&self, other: &FixedDecimal) -> Option<FixedDecimal> {
        self.value.checked_add(other.value).map(|value| FixedDecimal {
            value,
            scale: self.scale.max(other.scale),
        })
    }
}

impl fmt::Display for FixedDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.*}", self.scale as usize, self.value)
    }
}

impl TryFrom<(Decimal, u32)> for FixedDecimal {
    type Error = DecimalError;

    fn try_from((value, scale): (Decimal, u32)) -> Result<Self, Self::Error> {
        validate_scale(scale)?;
        Ok(FixedDecimal {
            value: value.round_dp(scale),
            scale,
        })
    }
}

impl Serialize for FixedDecimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FixedDecimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // The wire format doesn't know the declared scale; callers that
        // need scale-aware validation should go through `parse` directly
        // against the column's schema. This impl accepts up to the max
        // scale so generic (de)serialization round-trips.
        FixedDecimal::parse(&raw, MAX_SCALE).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_at_declared_scale() {
        let d = FixedDecimal::parse("29.99", 2).unwrap();
        assert_eq!(d.to_string(), "29.99");
    }

    #[test]
    fn pads_to_declared_scale() {
        let d = FixedDecimal::parse("30", 2).unwrap();
        assert_eq!(d.to_string(), "30.00");
    }

    #[test]
    fn rejects_excess_fractional_digits() {
        let err = FixedDecimal::parse("1.005", 2).unwrap_err();
        assert_eq!(err, DecimalError::TooManyFractionalDigits { scale: 2 });
    }

    #[test]
    fn rejects_scale_above_max() {
        assert_eq!(
            validate_scale(11).unwrap_err(),
            DecimalError::ScaleTooLarge(11)
        );
    }

    #[test]
    fn sums_preserve_scale() {
        let a = FixedDecimal::parse("10.00", 2).unwrap();
        let b = FixedDecimal::parse("20.00", 2).unwrap();
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum.to_string(), "30.00");
    }
}
