//! Human-readable price parsing.
//!
//! Route prices are written the way a person would write them: `"$0.001"`,
//! `"0.01"`, `"1,000"`. [`MoneyAmount`] strips currency symbols and thousand
//! separators and keeps the value as a precise decimal. On the wire it
//! serializes as a plain decimal string.

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// A non-negative decimal amount in the route's stated currency unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyAmount(pub Decimal);

mod bounds {
    use super::*;
    use std::sync::LazyLock;

    pub const MIN_STR: &str = "0.000000001";
    pub const MAX_STR: &str = "999999999";

    pub static MIN: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MIN_STR).expect("valid decimal"));
    pub static MAX: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));
}

/// Errors that can occur when parsing a monetary amount.
#[derive(Debug, thiserror::Error)]
pub enum MoneyAmountParseError {
    /// The input string could not be parsed as a number.
    #[error("Invalid number format")]
    InvalidFormat,
    /// The value is outside the allowed range.
    #[error("Amount must be between {} and {}", bounds::MIN_STR, bounds::MAX_STR)]
    OutOfRange,
    /// Negative values are not allowed.
    #[error("Negative value is not allowed")]
    Negative,
}

impl MoneyAmount {
    /// Parses a human-readable currency string.
    ///
    /// Currency symbols, thousand separators, and whitespace are stripped
    /// before parsing.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a number, is negative, or is
    /// outside the allowed range.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        // Remove anything that isn't digit, dot, minus
        let cleaned = Regex::new(r"[^\d\.\-]+")
            .expect("valid regex")
            .replace_all(input, "")
            .to_string();

        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| MoneyAmountParseError::InvalidFormat)?;

        if parsed.is_sign_negative() {
            return Err(MoneyAmountParseError::Negative);
        }

        if parsed < *bounds::MIN || parsed > *bounds::MAX {
            return Err(MoneyAmountParseError::OutOfRange);
        }

        Ok(MoneyAmount(parsed))
    }

    /// Returns the number of decimal places in the original input.
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl TryFrom<&str> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        MoneyAmount::from_str(value)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Serialize for MoneyAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MoneyAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        MoneyAmount::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dollar_prices() {
        let amount = MoneyAmount::parse("$0.001").unwrap();
        assert_eq!(amount.to_string(), "0.001");
        assert_eq!(amount.scale(), 3);
    }

    #[test]
    fn parses_thousand_separators() {
        let amount = MoneyAmount::parse("1,000.50").unwrap();
        assert_eq!(amount.to_string(), "1000.5");
    }

    #[test]
    fn rejects_negative_and_garbage() {
        assert!(matches!(
            MoneyAmount::parse("-5"),
            Err(MoneyAmountParseError::Negative)
        ));
        assert!(matches!(
            MoneyAmount::parse("five dollars"),
            Err(MoneyAmountParseError::InvalidFormat)
        ));
        assert!(matches!(
            MoneyAmount::parse("0.0000000001"),
            Err(MoneyAmountParseError::OutOfRange)
        ));
    }

    #[test]
    fn serde_round_trip_as_string() {
        let amount = MoneyAmount::parse("0.01").unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"0.01\"");
        let back: MoneyAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}
