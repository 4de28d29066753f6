//! Amount type for monetary and count measures coming out of untyped JSON payloads.
//!
//! The reporting service is inconsistent about how it sends numbers: most measures arrive as
//! JSON numbers, some as strings, and some with a comma as the decimal separator. `Amount` wraps
//! `Decimal` and knows how to coerce all of those, falling back to zero when it cannot.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// Represents a numeric measure, such as a revenue sum or a write-off item cost.
///
/// # Examples
///
/// Coercing untyped values:
/// ```
/// # use iiko_report::model::Amount;
/// # use serde_json::json;
/// assert_eq!(Amount::coerce(&json!(12.5)).to_string(), "12.50");
/// assert_eq!(Amount::coerce(&json!("1 250,75")).to_string(), "1250.75");
/// assert!(Amount::coerce(&json!("n/a")).is_zero());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    pub const ZERO: Amount = Amount::new(Decimal::ZERO);

    pub const fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// The value rounded half away from zero to two decimal places.
    pub fn rounded(&self) -> Amount {
        Amount::new(
            self.value
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Converts for consumers that only speak floating point, like spreadsheet writers.
    pub fn to_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or_default()
    }

    /// Converts a JSON value into an `Amount` without failing. Numbers are taken as-is, strings
    /// are parsed with `FromStr`, and everything else (including unparseable strings) is zero.
    pub fn coerce(value: &Value) -> Amount {
        Self::try_coerce(value).unwrap_or_default()
    }

    /// Like `coerce` but reports whether the value was actually numeric.
    pub fn try_coerce(value: &Value) -> Option<Amount> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Amount::from(Decimal::from(i)))
                } else if let Some(u) = n.as_u64() {
                    Some(Amount::from(Decimal::from(u)))
                } else {
                    n.as_f64().and_then(Decimal::from_f64).map(Amount::from)
                }
            }
            Value::String(s) => Amount::from_str(s).ok(),
            _ => None,
        }
    }
}

/// An error that can occur when parsing strings into `Decimal` values.
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

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Drop thousands separators, which show up as plain or non-breaking spaces
        let compact: String = s
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
            .collect();

        if compact.is_empty() {
            return Ok(Amount::default());
        }

        // "1,234.50" uses commas for thousands, "1234,50" uses a comma as the decimal point
        let normalized = if compact.contains('.') {
            compact.replace(',', "")
        } else {
            compact.replace(',', ".")
        };

        let value = Decimal::from_str(&normalized)
            .or_else(|_| Decimal::from_scientific(&normalized))
            .map_err(AmountError)?;
        Ok(Amount { value })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.rounded().value)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount::new(self.value + rhs.value)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.value += rhs.value;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.value.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Amount::coerce(&value))
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
