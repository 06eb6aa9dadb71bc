//! Fixed-point money. Never a binary float (spec §9).

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Money scaled to 2 decimal places. All arithmetic is exact `Decimal`
/// arithmetic; construction always rescales/rounds to 2 places so that
/// invariants elsewhere (amount conservation, `amount_due <= original_amount`)
/// can rely on byte-identical comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Construct from a `Decimal`, rescaling to 2 decimal places.
    pub fn new(value: Decimal) -> Self {
        Money(value.round_dp(2))
    }

    pub fn zero() -> Self {
        Self::ZERO
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money::new)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money::new)
    }

    /// True precision check: the value given has no more than 2 decimal
    /// places, i.e. it was not truncated by [`Money::new`].
    pub fn has_valid_precision(value: Decimal) -> bool {
        value.round_dp(2) == value
    }

    /// Parse the canonical wire form (`"1234.56"`) per spec §6.
    pub fn parse_canonical(s: &str) -> Result<Self, MoneyParseError> {
        let decimal =
            Decimal::from_str(s).map_err(|_| MoneyParseError::NotDecimal)?;
        if !Self::has_valid_precision(decimal) {
            return Err(MoneyParseError::TooManyDecimals);
        }
        Ok(Money(decimal))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MoneyParseError {
    #[error("value is not a valid decimal number")]
    NotDecimal,
    #[error("value has more than 2 decimal places")]
    TooManyDecimals,
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl std::ops::Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money::new(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money::new(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

/// Canonical JSON wire form: a string, e.g. `"1234.56"`, per spec §6.
impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Money::parse_canonical(&s).map_err(de::Error::custom)
    }
}

/// An ISO 4217 three-letter uppercase currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    pub fn parse(s: &str) -> Result<Self, CurrencyError> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_uppercase()) {
            return Err(CurrencyError::InvalidFormat(s.to_owned()));
        }
        let mut arr = [0u8; 3];
        arr.copy_from_slice(bytes);
        Ok(Currency(arr))
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: constructed only from ASCII uppercase letters.
        std::str::from_utf8(&self.0).expect("ascii")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CurrencyError {
    #[error("'{0}' is not a 3-letter uppercase ISO 4217 currency code")]
    InvalidFormat(String),
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::parse(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = CurrencyError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Currency::parse(&s)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> String {
        c.as_str().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn parses_canonical_form() {
        let m = Money::parse_canonical("1234.56").unwrap();
        assert_eq!(m.as_decimal(), dec!(1234.56));
        assert_eq!(m.to_string(), "1234.56");
    }

    #[test]
    fn rejects_excess_precision() {
        assert!(Money::parse_canonical("1.005").is_err());
    }

    #[test]
    fn add_sub_are_exact() {
        let a = Money::parse_canonical("500.00").unwrap();
        let b = Money::parse_canonical("300.00").unwrap();
        assert_eq!((a + b).to_string(), "800.00");
        assert_eq!((a - b).to_string(), "200.00");
    }

    #[test]
    fn currency_rejects_lowercase_and_wrong_length() {
        assert!(Currency::parse("eur").is_err());
        assert!(Currency::parse("EURO").is_err());
        assert!(Currency::parse("EUR").is_ok());
    }

    #[test]
    fn money_serde_roundtrip() {
        let m = Money::parse_canonical("42.10").unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"42.10\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
