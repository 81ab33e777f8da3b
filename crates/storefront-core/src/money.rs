//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  The remote store sends prices as JSON decimals:  "price": 9.99         │
//! │    9.99 * 3 in binary floats = 29.969999999999995  ❌                   │
//! │                                                                         │
//! │  OUR SOLUTION: parse the decimal text straight into cents               │
//! │    "9.99" ──► 999 cents ──► × 3 ──► 2997 cents ──► "$29.97"  ✅         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Arithmetic saturates at the `i64` bounds. Prices from the store are not
//! range-checked beyond fitting in cents.
//!
//! ## Usage
//! ```rust
//! use storefront_core::money::Money;
//!
//! let price = Money::from_cents(999); // $9.99
//! let line = price.multiply_quantity(3);
//! assert_eq!(line.to_string(), "$29.97");
//!
//! let parsed = Money::parse_decimal("9.99").unwrap();
//! assert_eq!(parsed, price);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents.
///
/// Serializes as a plain integer of cents. Remote records that carry decimal
/// prices use the [`decimal`] adapter instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the dollars portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies money by a quantity, saturating at the `i64` bounds.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Parses decimal text (`"9.99"`, `"12"`, `"-0.5"`, `"1.5e1"`) into cents.
    ///
    /// Digits beyond the second decimal place are rounded half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("109.95").unwrap().cents(), 10995);
    /// assert_eq!(Money::parse_decimal("22.3").unwrap().cents(), 2230);
    /// assert_eq!(Money::parse_decimal("0.125").unwrap().cents(), 13);
    /// assert!(Money::parse_decimal("abc").is_err());
    /// ```
    pub fn parse_decimal(text: &str) -> Result<Money, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "price".to_string(),
            reason: reason.to_string(),
        };

        let text = text.trim();
        let (negative, unsigned) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            Some(_) => (false, text),
            None => return Err(invalid("empty")),
        };

        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(pos) => {
                let exp: i32 = unsigned[pos + 1..]
                    .parse()
                    .map_err(|_| invalid("bad exponent"))?;
                (&unsigned[..pos], exp)
            }
            None => (unsigned, 0),
        };

        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid("no digits"));
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid("not a decimal number"));
        }

        let digits = format!("{int_part}{frac_part}");
        let digits = digits.trim_start_matches('0');
        if digits.len() > 30 {
            return Err(invalid("too many digits"));
        }
        let value: i128 = if digits.is_empty() {
            0
        } else {
            digits.parse().map_err(|_| invalid("not a decimal number"))?
        };

        // value * 10^(exponent - frac_len) dollars == value * 10^shift cents
        let shift = 2 + exponent - frac_part.len() as i32;
        let cents = if shift >= 0 {
            if shift > 30 {
                return Err(invalid("out of range"));
            }
            value
                .checked_mul(10_i128.pow(shift as u32))
                .ok_or_else(|| invalid("out of range"))?
        } else if -shift > 30 {
            0
        } else {
            let divisor = 10_i128.pow((-shift) as u32);
            let (quotient, remainder) = (value / divisor, value % divisor);
            if remainder * 2 >= divisor {
                quotient + 1
            } else {
                quotient
            }
        };

        let cents = i64::try_from(cents).map_err(|_| invalid("out of range"))?;
        Ok(Money(if negative { -cents } else { cents }))
    }

    /// Decimal dollars as a float, for wire formats that expect a JSON number.
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Decimal Serde Adapter
// =============================================================================

/// Reads and writes `Money` as a decimal JSON number (`9.99`).
///
/// Use with `#[serde(with = "storefront_core::money::decimal")]`. Accepts
/// integers, floats and numeric strings on input.
pub mod decimal {
    use super::Money;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(money: &Money, serializer: S) -> Result<S::Ok, S::Error> {
        if money.cents() % 100 == 0 {
            serializer.serialize_i64(money.dollars())
        } else {
            serializer.serialize_f64(money.as_decimal())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }

    struct DecimalVisitor;

    impl<'de> Visitor<'de> for DecimalVisitor {
        type Value = Money;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a decimal price")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
            v.checked_mul(100)
                .map(Money::from_cents)
                .ok_or_else(|| E::custom("price out of range"))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
            i64::try_from(v)
                .ok()
                .and_then(|v| v.checked_mul(100))
                .map(Money::from_cents)
                .ok_or_else(|| E::custom("price out of range"))
        }

        // f64 Display is the shortest text that round-trips, so 9.99 prints
        // as "9.99" and parses back to exactly 999 cents.
        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
            if !v.is_finite() {
                return Err(E::custom("price is not finite"));
            }
            Money::parse_decimal(&v.to_string()).map_err(E::custom)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
            Money::parse_decimal(v).map_err(E::custom)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Priced {
        #[serde(with = "decimal")]
        price: Money,
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(999)), "$9.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::zero()), "$0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);
        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = vec![a, b, Money::from_cents(1)].into_iter().sum();
        assert_eq!(total.cents(), 1501);
    }

    #[test]
    fn test_parse_decimal_exact() {
        assert_eq!(Money::parse_decimal("9.99").unwrap().cents(), 999);
        assert_eq!(Money::parse_decimal("0.1").unwrap().cents(), 10);
        assert_eq!(Money::parse_decimal("15").unwrap().cents(), 1500);
        assert_eq!(Money::parse_decimal(".5").unwrap().cents(), 50);
        assert_eq!(Money::parse_decimal("-3.25").unwrap().cents(), -325);
        assert_eq!(Money::parse_decimal("1.5e1").unwrap().cents(), 1500);
        assert_eq!(Money::parse_decimal("2.5E-1").unwrap().cents(), 25);
    }

    #[test]
    fn test_parse_decimal_rounds_extra_places() {
        assert_eq!(Money::parse_decimal("0.125").unwrap().cents(), 13);
        assert_eq!(Money::parse_decimal("0.124").unwrap().cents(), 12);
        assert_eq!(Money::parse_decimal("-0.125").unwrap().cents(), -13);
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert!(Money::parse_decimal("").is_err());
        assert!(Money::parse_decimal("-").is_err());
        assert!(Money::parse_decimal("1.2.3").is_err());
        assert!(Money::parse_decimal("12abc").is_err());
        assert!(Money::parse_decimal("1e").is_err());
    }

    #[test]
    fn test_decimal_adapter_reads_json_numbers() {
        let p: Priced = serde_json::from_str(r#"{"price": 9.99}"#).unwrap();
        assert_eq!(p.price.cents(), 999);

        let p: Priced = serde_json::from_str(r#"{"price": 22}"#).unwrap();
        assert_eq!(p.price.cents(), 2200);

        let p: Priced = serde_json::from_str(r#"{"price": "7.50"}"#).unwrap();
        assert_eq!(p.price.cents(), 750);

        assert!(serde_json::from_str::<Priced>(r#"{"price": true}"#).is_err());
    }

    #[test]
    fn test_decimal_adapter_writes_json_numbers() {
        let json = serde_json::to_value(Priced { price: Money::from_cents(999) }).unwrap();
        assert_eq!(json["price"], serde_json::json!(9.99));

        let json = serde_json::to_value(Priced { price: Money::from_cents(2200) }).unwrap();
        assert_eq!(json["price"], serde_json::json!(22));
    }

    #[test]
    fn test_huge_prices_saturate() {
        let huge = Money::from_cents(i64::MAX / 2 + 1);
        assert_eq!(huge.multiply_quantity(2).cents(), i64::MAX);
        assert_eq!((huge * 3).cents(), i64::MAX);
        assert_eq!((Money::from_cents(i64::MIN) - Money::from_cents(1)).cents(), i64::MIN);

        let total: Money = vec![huge, huge, huge].into_iter().sum();
        assert_eq!(total.cents(), i64::MAX);

        let mut running = huge;
        running += huge;
        assert_eq!(running.cents(), i64::MAX);
    }

    /// 3 × 9.99 in floats is 29.969999999999995; cents keep it exact.
    #[test]
    fn test_line_totals_stay_exact() {
        let price = Money::parse_decimal("9.99").unwrap();
        assert_eq!(price.multiply_quantity(3).to_string(), "$29.97");
    }
}
