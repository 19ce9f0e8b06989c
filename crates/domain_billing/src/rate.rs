//! Rate resolution
//!
//! The base rate comes from the contract entry for the work order's service
//! category, or from the configured default when there is none. Conditions
//! derived from the schedule and priority select a multiplier; when several
//! apply, the highest wins.

use chrono::{Datelike, Timelike, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use core_kernel::{Money, MoneyError};
use domain_workorder::{Priority, WorkOrder};

use crate::config::BillingConfig;
use crate::contract::{Contract, RateMultipliers};

/// A circumstance that changes the hourly rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateCondition {
    Night,
    Weekend,
    Holiday,
    Emergency,
}

impl RateCondition {
    fn multiplier(&self, multipliers: &RateMultipliers) -> Decimal {
        match self {
            RateCondition::Night => multipliers.night,
            RateCondition::Weekend => multipliers.weekend,
            RateCondition::Holiday => multipliers.holiday,
            RateCondition::Emergency => multipliers.emergency,
        }
    }
}

/// Where the base rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateSource {
    Contract,
    Default,
}

/// Outcome of rate resolution for one work order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub base_rate: Money,
    pub multiplier: Decimal,
    pub conditions: Vec<RateCondition>,
    pub source: RateSource,
}

impl ResolvedRate {
    /// Base rate times multiplier, unrounded
    pub fn effective_rate(&self) -> Result<Money, MoneyError> {
        self.base_rate.multiply(self.multiplier)
    }
}

/// Resolves hourly rates against a contract and the billing configuration
#[derive(Debug, Clone, Copy)]
pub struct RateResolver<'a> {
    config: &'a BillingConfig,
}

impl<'a> RateResolver<'a> {
    pub fn new(config: &'a BillingConfig) -> Self {
        Self { config }
    }

    pub fn resolve(&self, work_order: &WorkOrder, contract: Option<&Contract>) -> ResolvedRate {
        let conditions = self.conditions(work_order);

        let contract_rate =
            contract.and_then(|c| c.rate_for(&work_order.service_category));

        let (base_rate, multipliers, source) = match contract_rate {
            Some(rate) => (rate.hourly_rate, rate.multipliers, RateSource::Contract),
            None => {
                warn!(
                    work_order_id = %work_order.id,
                    service_category = %work_order.service_category,
                    contract_id = ?contract.map(|c| c.id),
                    default_rate = %self.config.default_rate(),
                    "no contract rate for service category, using default hourly rate"
                );
                (
                    self.config.default_rate(),
                    RateMultipliers::default(),
                    RateSource::Default,
                )
            }
        };

        let multiplier = conditions
            .iter()
            .map(|c| c.multiplier(&multipliers))
            .max()
            .unwrap_or(Decimal::ONE);

        ResolvedRate {
            base_rate,
            multiplier,
            conditions,
            source,
        }
    }

    /// Conditions that apply to the work order's scheduled visit
    pub fn conditions(&self, work_order: &WorkOrder) -> Vec<RateCondition> {
        let mut conditions = Vec::new();

        if work_order.priority == Priority::Emergency {
            conditions.push(RateCondition::Emergency);
        }

        if let Some(start) = work_order.scheduled_start {
            let local = self.config.timezone.to_local(start);
            if self.config.is_holiday(local.date_naive()) {
                conditions.push(RateCondition::Holiday);
            }
            if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
                conditions.push(RateCondition::Weekend);
            }
            if self.config.is_night_hour(local.hour()) {
                conditions.push(RateCondition::Night);
            }
        }

        conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use core_kernel::{ClientId, Currency};
    use domain_workorder::ServiceCategory;
    use rust_decimal_macros::dec;

    use crate::contract::ContractRate;

    fn work_order(priority: Priority) -> WorkOrder {
        WorkOrder::new(
            ClientId::new(),
            ServiceCategory::new("hvac"),
            "Compressor failure",
            priority,
        )
    }

    fn contract() -> Contract {
        Contract::new(ClientId::new(), "Premium").with_rate(
            ContractRate::new(ServiceCategory::new("hvac"), Money::new(dec!(80), Currency::USD))
                .with_multipliers(RateMultipliers {
                    night: dec!(1.5),
                    weekend: dec!(1.25),
                    holiday: dec!(2),
                    emergency: dec!(1.75),
                }),
        )
    }

    #[test]
    fn test_contract_rate_without_conditions() {
        let config = BillingConfig::default();
        let wo = work_order(Priority::Normal);
        let rate = RateResolver::new(&config).resolve(&wo, Some(&contract()));

        assert_eq!(rate.source, RateSource::Contract);
        assert_eq!(rate.multiplier, Decimal::ONE);
        assert_eq!(rate.effective_rate().unwrap().amount(), dec!(80));
    }

    #[test]
    fn test_falls_back_to_default_rate() {
        let config = BillingConfig::default();
        let mut wo = work_order(Priority::Normal);
        wo.service_category = ServiceCategory::new("roofing");
        let rate = RateResolver::new(&config).resolve(&wo, Some(&contract()));

        assert_eq!(rate.source, RateSource::Default);
        assert_eq!(rate.base_rate, config.default_rate());
    }

    #[test]
    fn test_highest_multiplier_wins() {
        let config = BillingConfig::default();
        let mut wo = work_order(Priority::Emergency);
        // Saturday 2024-03-09, 21:00 UTC: weekend, night and emergency
        wo.scheduled_start = Some(Utc.with_ymd_and_hms(2024, 3, 9, 21, 0, 0).unwrap());

        let rate = RateResolver::new(&config).resolve(&wo, Some(&contract()));
        assert_eq!(rate.conditions.len(), 3);
        assert_eq!(rate.multiplier, dec!(1.75));
        assert_eq!(rate.effective_rate().unwrap().amount(), dec!(140));
    }

    #[test]
    fn test_holiday_from_config() {
        let config = BillingConfig {
            holidays: vec![NaiveDate::from_ymd_opt(2024, 12, 25).unwrap()],
            ..BillingConfig::default()
        };
        let mut wo = work_order(Priority::Normal);
        wo.scheduled_start = Some(Utc.with_ymd_and_hms(2024, 12, 25, 10, 0, 0).unwrap());

        let rate = RateResolver::new(&config).resolve(&wo, Some(&contract()));
        assert_eq!(rate.conditions, vec![RateCondition::Holiday]);
        assert_eq!(rate.multiplier, dec!(2));
    }

    #[test]
    fn test_default_rate_ignores_multipliers() {
        let config = BillingConfig::default();
        let wo = work_order(Priority::Emergency);
        let rate = RateResolver::new(&config).resolve(&wo, None);

        assert_eq!(rate.conditions, vec![RateCondition::Emergency]);
        assert_eq!(rate.multiplier, Decimal::ONE);
    }
}
