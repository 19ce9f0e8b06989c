//! Service contracts
//!
//! A contract fixes a client's payment terms, discount and per-category
//! hourly rates. SLA thresholds travel with it but play no part in billing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, ContractId, Money, Percentage};
use domain_workorder::ServiceCategory;

use crate::config::DEFAULT_PAYMENT_TERMS_DAYS;

/// Condition multipliers applied to a base hourly rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateMultipliers {
    pub night: Decimal,
    pub weekend: Decimal,
    pub holiday: Decimal,
    pub emergency: Decimal,
}

impl Default for RateMultipliers {
    fn default() -> Self {
        Self {
            night: Decimal::ONE,
            weekend: Decimal::ONE,
            holiday: Decimal::ONE,
            emergency: Decimal::ONE,
        }
    }
}

/// Hourly rate for one service category within one contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRate {
    pub service_category: ServiceCategory,
    pub hourly_rate: Money,
    #[serde(default)]
    pub multipliers: RateMultipliers,
}

impl ContractRate {
    pub fn new(service_category: ServiceCategory, hourly_rate: Money) -> Self {
        Self {
            service_category,
            hourly_rate,
            multipliers: RateMultipliers::default(),
        }
    }

    pub fn with_multipliers(mut self, multipliers: RateMultipliers) -> Self {
        self.multipliers = multipliers;
        self
    }
}

/// Response and resolution targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlaThresholds {
    pub response_hours: Option<u32>,
    pub resolution_hours: Option<u32>,
}

/// A client's service agreement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub client_id: ClientId,
    pub name: String,
    pub payment_terms_days: u32,
    pub discount: Percentage,
    /// One entry per service category, in contract order
    pub rates: Vec<ContractRate>,
    #[serde(default)]
    pub sla: SlaThresholds,
}

impl Contract {
    /// Creates a contract with standard terms, no discount and no rates
    pub fn new(client_id: ClientId, name: impl Into<String>) -> Self {
        Self {
            id: ContractId::new_v7(),
            client_id,
            name: name.into(),
            payment_terms_days: DEFAULT_PAYMENT_TERMS_DAYS,
            discount: Percentage::zero(),
            rates: Vec::new(),
            sla: SlaThresholds::default(),
        }
    }

    pub fn with_payment_terms(mut self, days: u32) -> Self {
        self.payment_terms_days = days;
        self
    }

    /// Sets the discount as a whole-number percent (10 for 10%)
    pub fn with_discount_percent(mut self, percent: Decimal) -> Self {
        self.discount = Percentage::from_percent(percent);
        self
    }

    pub fn with_rate(mut self, rate: ContractRate) -> Self {
        self.rates.push(rate);
        self
    }

    pub fn with_sla(mut self, sla: SlaThresholds) -> Self {
        self.sla = sla;
        self
    }

    /// The rate for `category`, if the contract defines one
    pub fn rate_for(&self, category: &ServiceCategory) -> Option<&ContractRate> {
        self.rates.iter().find(|r| &r.service_category == category)
    }
}
