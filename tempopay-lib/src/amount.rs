//! Safe financial arithmetic using fixed-point decimal
//!
//! Prices and balances are expressed in whole currency units (e.g. `24` or
//! `19.99` AlphaUSD). On chain, token amounts are integers scaled by the
//! token's decimal precision ("minor units"). [`Amount`] converts between the
//! two exactly; **never use f64 for financial calculations!**
//!
//! # Security
//!
//! - Uses `Decimal` internally (28-29 significant digits)
//! - Minor-unit conversion rejects values that would lose precision
//! - Serializes as string (preserves precision)

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Result, WalletError};

/// Financial amount in whole currency units
///
/// # Examples
///
/// ```rust
/// use tempopay_lib::Amount;
///
/// let price = Amount::from_units(24);
/// assert_eq!(price.to_minor_units(6).unwrap(), 24_000_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    /// Create from a whole number of currency units.
    pub fn from_units(units: i64) -> Self {
        Self {
            value: Decimal::from(units),
        }
    }

    /// Create from a Decimal value.
    pub fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Create from decimal string (e.g., "123.45")
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as a valid decimal.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tempopay_lib::Amount;
    /// let amt = Amount::from_str_checked("100.50").unwrap();
    /// assert_eq!(amt.to_string(), "100.50");
    /// ```
    pub fn from_str_checked(s: &str) -> Result<Self> {
        Decimal::from_str(s.trim())
            .map(|value| Self { value })
            .map_err(|e| WalletError::invalid_data("amount", e.to_string()))
    }

    /// Scale to integer minor units (`value * 10^decimals`).
    ///
    /// # Errors
    ///
    /// Fails for negative amounts, amounts with more fractional digits than
    /// `decimals`, and values that overflow.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tempopay_lib::Amount;
    /// let amt = Amount::from_str_checked("1.5").unwrap();
    /// assert_eq!(amt.to_minor_units(6).unwrap(), 1_500_000);
    /// assert!(Amount::from_str_checked("0.0000001").unwrap().to_minor_units(6).is_err());
    /// ```
    pub fn to_minor_units(&self, decimals: u32) -> Result<u128> {
        if self.value.is_sign_negative() && !self.value.is_zero() {
            return Err(WalletError::invalid_data("amount", "must not be negative"));
        }
        let scale = 10i64
            .checked_pow(decimals)
            .map(Decimal::from)
            .ok_or_else(|| WalletError::invalid_data("decimals", "too large"))?;
        let scaled = self
            .value
            .checked_mul(scale)
            .ok_or_else(|| WalletError::invalid_data("amount", "overflow"))?;
        if scaled.trunc() != scaled {
            return Err(WalletError::invalid_data(
                "amount",
                format!("more than {} decimal places", decimals),
            ));
        }
        scaled
            .to_u128()
            .ok_or_else(|| WalletError::invalid_data("amount", "not representable"))
    }

    /// Create from integer minor units.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tempopay_lib::Amount;
    /// let amt = Amount::from_minor_units(264_000_000, 6).unwrap();
    /// assert_eq!(amt, Amount::from_units(264));
    /// ```
    pub fn from_minor_units(units: u128, decimals: u32) -> Result<Self> {
        let units = i128::try_from(units)
            .map_err(|_| WalletError::invalid_data("amount", "overflow"))?;
        Decimal::try_from_i128_with_scale(units, decimals)
            .map(|value| Self {
                value: value.normalize(),
            })
            .map_err(|e| WalletError::invalid_data("amount", e.to_string()))
    }

    /// Checked addition (returns None on overflow)
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        self.value
            .checked_add(other.value)
            .map(|value| Self { value })
    }

    /// Checked subtraction (returns None on overflow)
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        self.value
            .checked_sub(other.value)
            .map(|value| Self { value })
    }

    /// Checked multiplication by a quantity.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tempopay_lib::Amount;
    /// let price = Amount::from_units(24);
    /// assert_eq!(price.checked_mul(12), Some(Amount::from_units(288)));
    /// ```
    pub fn checked_mul(&self, quantity: u32) -> Option<Self> {
        self.value
            .checked_mul(Decimal::from(quantity))
            .map(|value| Self { value })
    }

    /// Check if this amount is less than or equal to another
    pub fn is_within_limit(&self, limit: &Self) -> bool {
        self.value <= limit.value
    }

    /// Get zero amount
    pub fn zero() -> Self {
        Self {
            value: Decimal::ZERO,
        }
    }

    /// Check if amount is zero
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Check if amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    /// Number of digits after the decimal point.
    pub fn scale(&self) -> u32 {
        self.value.normalize().scale()
    }

    /// Get the internal Decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.value
    }

    /// Format the way the wallet shows a balance.
    ///
    /// Below 1000 two decimals are shown; from 1000 upwards the value is
    /// rounded to whole units and grouped with thousands separators.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tempopay_lib::Amount;
    /// assert_eq!(Amount::from_str_checked("76.5").unwrap().format_balance(), "76.50");
    /// assert_eq!(Amount::from_str_checked("12345.6").unwrap().format_balance(), "12,346");
    /// ```
    pub fn format_balance(&self) -> String {
        let thousand = Decimal::from(1000);
        if self.value.abs() >= thousand {
            let rounded = self
                .value
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
            group_thousands(&rounded.trunc().to_string(), None)
        } else {
            let rounded = self
                .value
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            let text = format!("{:.2}", rounded);
            match text.split_once('.') {
                Some((int, frac)) => group_thousands(int, Some(frac)),
                None => text,
            }
        }
    }
}

fn group_thousands(int_part: &str, frac: Option<&str>) -> String {
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    match frac {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for Amount {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_checked(s)
    }
}
