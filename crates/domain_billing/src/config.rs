//! Billing configuration
//!
//! Every tunable used by the calculator, the ledger and the engine lives here
//! so nothing is hard-coded at a call site.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{CoreError, Currency, Money, Percentage, Timezone};

/// Hourly rate billed when the contract has no rate for the service category
pub const DEFAULT_HOURLY_RATE: Decimal = dec!(75.00);

/// Sales tax applied to the discounted subtotal (18%)
pub const DEFAULT_TAX_RATE: Decimal = dec!(0.18);

/// Days between issue and due date when no contract applies
pub const DEFAULT_PAYMENT_TERMS_DAYS: u32 = 30;

/// Local hour at which daytime rates begin
pub const DEFAULT_DAY_START_HOUR: u32 = 8;

/// Local hour at which night rates begin
pub const DEFAULT_DAY_END_HOUR: u32 = 18;

/// Attempts at committing an invoice before number allocation gives up
pub const DEFAULT_MAX_NUMBER_ALLOCATION_ATTEMPTS: u32 = 5;

/// Attempts at appending a payment before a version conflict is surfaced
pub const DEFAULT_MAX_PAYMENT_ATTEMPTS: u32 = 5;

/// Configuration for invoice generation and payment recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Invoice currency; contract rates and materials must match it
    pub currency: Currency,
    pub default_hourly_rate: Decimal,
    /// Tax rate as a fraction (0.18 for 18%)
    pub tax_rate: Percentage,
    pub default_payment_terms_days: u32,
    /// Zone used for issue dates, numbering periods and rate conditions
    pub timezone: Timezone,
    /// Dates billed at the holiday multiplier
    pub holidays: Vec<NaiveDate>,
    pub day_start_hour: u32,
    pub day_end_hour: u32,
    pub allow_overpayment: bool,
    pub max_number_allocation_attempts: u32,
    pub max_payment_attempts: u32,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            currency: Currency::USD,
            default_hourly_rate: DEFAULT_HOURLY_RATE,
            tax_rate: Percentage::from_fraction(DEFAULT_TAX_RATE),
            default_payment_terms_days: DEFAULT_PAYMENT_TERMS_DAYS,
            timezone: Timezone::default(),
            holidays: Vec::new(),
            day_start_hour: DEFAULT_DAY_START_HOUR,
            day_end_hour: DEFAULT_DAY_END_HOUR,
            allow_overpayment: false,
            max_number_allocation_attempts: DEFAULT_MAX_NUMBER_ALLOCATION_ATTEMPTS,
            max_payment_attempts: DEFAULT_MAX_PAYMENT_ATTEMPTS,
        }
    }
}

impl BillingConfig {
    /// The fallback hourly rate in the invoice currency
    pub fn default_rate(&self) -> Money {
        Money::new(self.default_hourly_rate, self.currency)
    }

    /// Returns true if `hour` (local, 0-23) falls outside the day window
    pub fn is_night_hour(&self, hour: u32) -> bool {
        hour < self.day_start_hour || hour >= self.day_end_hour
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// Checks the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.default_hourly_rate <= Decimal::ZERO {
            return Err(CoreError::configuration(
                "default_hourly_rate must be positive",
            ));
        }
        let tax = self.tax_rate.as_fraction();
        if tax < Decimal::ZERO || tax >= Decimal::ONE {
            return Err(CoreError::configuration(format!(
                "tax_rate must be a fraction in [0, 1), got {}",
                tax
            )));
        }
        if self.day_start_hour >= self.day_end_hour || self.day_end_hour > 24 {
            return Err(CoreError::configuration(format!(
                "day window {}..{} is not a valid range of hours",
                self.day_start_hour, self.day_end_hour
            )));
        }
        if self.max_number_allocation_attempts == 0 || self.max_payment_attempts == 0 {
            return Err(CoreError::configuration("retry bounds must be at least 1"));
        }
        Ok(())
    }
}
