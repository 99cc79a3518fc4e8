//! Amount type for handling monetary values as returned by the model or typed by the user.
//!
//! This module provides the `Amount` type which wraps `Decimal`. It accepts JSON numbers as well
//! as numeric strings that may include a leading currency symbol and thousands separators, and it
//! always serializes back to a JSON number.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Currency symbols that are tolerated, and discarded, in front of a numeric string.
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹'];

/// Represents a monetary amount with no particular minor-unit assumption.
///
/// Display renders the shortest decimal form, which is also the form used in the flattened items
/// list sent to the webhook:
///
/// ```
/// # use receipt_sync::model::Amount;
/// # use std::str::FromStr;
/// assert_eq!(Amount::from_str("4.50").unwrap().to_string(), "4.5");
/// assert_eq!(Amount::from_str("$3.00").unwrap().to_string(), "3");
/// assert_eq!(Amount::from_str("1,234.5").unwrap().to_string(), "1234.5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    pub const ZERO: Amount = Amount {
        value: Decimal::ZERO,
    };

    /// Creates a new Amount from a Decimal value.
    pub const fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value().is_zero()
    }

    /// Returns true if the amount is negative. Negative zero is not negative.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value().is_sign_negative()
    }

    /// Creates an Amount from a float, as received in JSON. Returns `None` for NaN or infinity.
    pub fn from_f64(value: f64) -> Option<Self> {
        Decimal::from_f64(value).map(Self::new)
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        // "-$5.00", "$5.00", "5.00"
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };
        let unsigned = unsigned.trim_start_matches(CURRENCY_SYMBOLS).trim_start();
        if unsigned.starts_with(&['-', '+'][..]) {
            return Err(AmountError(rust_decimal::Error::ErrorString(format!(
                "'{trimmed}' has more than one sign"
            ))));
        }
        let digits = unsigned.replace(',', "");

        let value = Decimal::from_str(&digits).map_err(AmountError)?;
        Ok(Amount::new(if negative { -value } else { value }))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.value.normalize(), f)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Whole numbers go out as JSON integers so that 3.0 is written as `3`, not `3.0`.
        let normalized = self.value.normalize();
        if normalized.scale() == 0 {
            if let Some(whole) = normalized.to_i64() {
                return serializer.serialize_i64(whole);
            }
        }
        match normalized.to_f64() {
            Some(float) => serializer.serialize_f64(float),
            None => serializer.serialize_str(&normalized.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(Amount::new(Decimal::from(v)))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(Amount::new(Decimal::from(v)))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Amount::from_f64(v).ok_or_else(|| E::custom(format!("{v} is not a representable amount")))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Amount::from_str(v).map_err(E::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_plain() {
        let amount = Amount::from_str("50.00").unwrap();
        assert_eq!(amount.value(), dec("50.00"));
    }

    #[test]
    fn test_parse_with_symbol_and_commas() {
        assert_eq!(Amount::from_str("$1,234.56").unwrap().value(), dec("1234.56"));
        assert_eq!(Amount::from_str("€ 7.50").unwrap().value(), dec("7.50"));
        assert_eq!(Amount::from_str("-$50.00").unwrap().value(), dec("-50.00"));
    }

    #[test]
    fn test_parse_empty_string() {
        let amount = Amount::from_str("   ").unwrap();
        assert!(amount.is_zero());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(Amount::from_str("twelve").is_err());
    }

    #[test]
    fn test_parse_doubled_sign() {
        assert!(Amount::from_str("--5").is_err());
        assert!(Amount::from_str("-+5").is_err());
        assert!(Amount::from_str("-$-5").is_err());
        assert_eq!(Amount::from_str("-$5").unwrap().to_string(), "-5");
    }

    #[test]
    fn test_display_shortest_form() {
        assert_eq!(Amount::from_str("4.50").unwrap().to_string(), "4.5");
        assert_eq!(Amount::from_str("3.0").unwrap().to_string(), "3");
        assert_eq!(Amount::from_str("0.00").unwrap().to_string(), "0");
        assert_eq!(Amount::from_str("12.345").unwrap().to_string(), "12.345");
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&Amount::from_str("12.50").unwrap()).unwrap();
        assert_eq!(json, "12.5");
        let json = serde_json::to_string(&Amount::from_str("3.00").unwrap()).unwrap();
        assert_eq!(json, "3");
        let json = serde_json::to_string(&Amount::ZERO).unwrap();
        assert_eq!(json, "0");
    }

    #[test]
    fn test_deserialize_number_and_string() {
        let a: Amount = serde_json::from_str("4.5").unwrap();
        assert_eq!(a.value(), dec("4.5"));
        let b: Amount = serde_json::from_str("3").unwrap();
        assert_eq!(b.value(), dec("3"));
        let c: Amount = serde_json::from_str("\"$8.25\"").unwrap();
        assert_eq!(c.value(), dec("8.25"));
        assert!(serde_json::from_str::<Amount>("true").is_err());
    }

    #[test]
    fn test_is_negative() {
        assert!(Amount::from_str("-0.01").unwrap().is_negative());
        assert!(!Amount::from_str("-0").unwrap().is_negative());
        assert!(!Amount::from_str("0.01").unwrap().is_negative());
    }

    #[test]
    fn test_ordering() {
        let a1 = Amount::from_str("30.00").unwrap();
        let a2 = Amount::from_str("$50.00").unwrap();
        assert!(a1 < a2);
    }
}
