//! Money types with precise decimal arithmetic
//!
//! Monetary values are carried as `rust_decimal::Decimal` paired with an ISO
//! currency. Amounts keep full precision until a caller explicitly rounds them
//! with [`Money::round_to_currency`], so billing code can defer rounding to
//! line-total and invoice-total boundaries.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CHF,
    INR,
    AUD,
    CAD,
    MXN,
    BRL,
}

impl Currency {
    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Returns the currency symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
            Currency::CHF => "CHF",
            Currency::INR => "₹",
            Currency::AUD => "A$",
            Currency::CAD => "C$",
            Currency::MXN => "MX$",
            Currency::BRL => "R$",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::CHF => "CHF",
            Currency::INR => "INR",
            Currency::AUD => "AUD",
            Currency::CAD => "CAD",
            Currency::MXN => "MXN",
            Currency::BRL => "BRL",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "JPY" => Ok(Currency::JPY),
            "CHF" => Ok(Currency::CHF),
            "INR" => Ok(Currency::INR),
            "AUD" => Ok(Currency::AUD),
            "CAD" => Ok(Currency::CAD),
            "MXN" => Ok(Currency::MXN),
            "BRL" => Ok(Currency::BRL),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Overflow during calculation")]
    Overflow,
}

/// A monetary amount with associated currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value without rounding
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates Money from an integer amount in minor units (e.g., cents)
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self::new(
            Decimal::new(minor_units, currency.decimal_places()),
            currency,
        )
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: dec!(0),
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Returns true when the amount carries no more precision than the
    /// currency's minor unit
    pub fn fits_currency_precision(&self) -> bool {
        self.amount.normalize().scale() <= self.currency.decimal_places()
    }

    /// Rounds to the currency's minor unit, midpoints away from zero
    pub fn round_to_currency(&self) -> Self {
        Self {
            amount: round_commercial(self.amount, self.currency.decimal_places()),
            currency: self.currency,
        }
    }

    /// Checked addition that returns an error on currency mismatch
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        self.amount
            .checked_add(other.amount)
            .map(|amount| Self::new(amount, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    /// Checked subtraction that returns an error on currency mismatch
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        self.amount
            .checked_sub(other.amount)
            .map(|amount| Self::new(amount, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    /// Multiplies by a scalar (quantity, hours, rate)
    ///
    /// Fails with `Overflow` instead of panicking when the product does not
    /// fit a `Decimal`.
    pub fn multiply(&self, factor: Decimal) -> Result<Money, MoneyError> {
        self.amount
            .checked_mul(factor)
            .map(|amount| Self::new(amount, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    /// Sums an iterator of amounts, all of which must share `currency`
    pub fn sum<'a>(
        currency: Currency,
        amounts: impl IntoIterator<Item = &'a Money>,
    ) -> Result<Money, MoneyError> {
        amounts
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(())
    }
}

/// Rounds half away from zero, the convention used on printed invoices
pub fn round_commercial(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency.decimal_places();
        write!(
            f,
            "{} {:.dp$}",
            self.currency.symbol(),
            self.amount,
            dp = dp as usize
        )
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if self.currency != other.currency {
            return None;
        }
        self.amount.partial_cmp(&other.amount)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.checked_add(&other)
            .expect("Currency mismatch in Money::add")
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.checked_sub(&other)
            .expect("Currency mismatch in Money::sub")
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.amount, self.currency)
    }
}

/// A percentage expressed as a fraction (0.18 for 18%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage {
    value: Decimal,
}

impl Percentage {
    /// Creates a percentage from a fraction (e.g., 0.05 for 5%)
    pub fn from_fraction(value: Decimal) -> Self {
        Self { value }
    }

    /// Creates a percentage from a whole-number percent (e.g., 5 for 5%)
    pub fn from_percent(percent: Decimal) -> Self {
        Self {
            value: percent / dec!(100),
        }
    }

    pub fn zero() -> Self {
        Self { value: Decimal::ZERO }
    }

    pub fn as_fraction(&self) -> Decimal {
        self.value
    }

    pub fn as_percent(&self) -> Decimal {
        self.value * dec!(100)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Applies this percentage to an amount without rounding
    pub fn apply(&self, amount: Decimal) -> Result<Decimal, MoneyError> {
        amount.checked_mul(self.value).ok_or(MoneyError::Overflow)
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percent().normalize())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn money_sum_is_order_independent(
            mut minors in proptest::collection::vec(-1_000_000i64..1_000_000i64, 0..20)
        ) {
            let forward: Vec<Money> = minors.iter().map(|m| Money::from_minor(*m, Currency::USD)).collect();
            let a = Money::sum(Currency::USD, &forward).unwrap();

            minors.reverse();
            let backward: Vec<Money> = minors.iter().map(|m| Money::from_minor(*m, Currency::USD)).collect();
            let b = Money::sum(Currency::USD, &backward).unwrap();

            prop_assert_eq!(a, b);
        }

        #[test]
        fn rounding_moves_at_most_half_a_cent(minor in -10_000_000i64..10_000_000i64) {
            let raw = Money::new(Decimal::new(minor, 3), Currency::USD);
            let rounded = raw.round_to_currency();
            let diff = (rounded.amount() - raw.amount()).abs();
            prop_assert!(diff <= dec!(0.005));
        }
    }
}
