//! Pre-built Test Fixtures
//!
//! Consistent, predictable data for tests across the billing crates. The
//! reference instant is 2024-03-15 10:00 UTC, a Friday.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{BillingPeriod, ClientId, Currency, FixedClock, Money};
use domain_billing::{Contract, ContractRate};
use domain_workorder::{Priority, ServiceCategory, WorkOrder};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use crate::builders::{ContractBuilder, WorkOrderBuilder};

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    pub fn usd_zero() -> Money {
        Money::zero(Currency::USD)
    }

    /// A EUR amount for currency mismatch tests
    pub fn eur_100() -> Money {
        Money::new(dec!(100.00), Currency::EUR)
    }
}

/// Fixture for clocks and dates
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// The reference "now" used throughout the suite
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    pub fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Self::now()))
    }

    /// The day the work was done
    pub fn work_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
    }

    pub fn completed_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 16, 0, 0).unwrap()
    }

    pub fn march_2024() -> BillingPeriod {
        BillingPeriod::new(2024, 3).unwrap()
    }
}

/// Fixture for contracts
pub struct ContractFixtures;

impl ContractFixtures {
    /// Plumbing at 50.00/h, 10% discount, 14-day terms
    pub fn standard(client_id: ClientId) -> Contract {
        ContractBuilder::new()
            .client(client_id)
            .payment_terms(14)
            .discount_percent(dec!(10))
            .rate(ContractRate::new(
                ServiceCategory::new("plumbing"),
                MoneyFixtures::usd(dec!(50.00)),
            ))
            .build()
    }
}

/// Fixture for work orders
pub struct WorkOrderFixtures;

impl WorkOrderFixtures {
    /// 3.5h of plumbing and 2 x 25.00 of parts, completed
    ///
    /// Billed under [`ContractFixtures::standard`] this comes to 238.95.
    pub fn billable(contract: &Contract) -> WorkOrder {
        WorkOrderBuilder::new()
            .client(contract.client_id)
            .contract(contract.id)
            .category("plumbing")
            .hours(dec!(3.5))
            .material("Copper fitting", MoneyFixtures::usd(dec!(25.00)), dec!(2))
            .completed()
            .build()
    }

    /// No time or materials, a 300.00 budget and no contract, completed
    ///
    /// Billed with default settings this comes to 354.00.
    pub fn flat_fee() -> WorkOrder {
        WorkOrderBuilder::new()
            .category("inspection")
            .budget(MoneyFixtures::usd(dec!(300.00)))
            .completed()
            .build()
    }

    /// A freshly requested emergency call-out
    pub fn emergency_request() -> WorkOrder {
        WorkOrderBuilder::new()
            .category("electrical")
            .priority(Priority::Emergency)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_workorder::WorkOrderStatus;

    #[test]
    fn test_billable_fixture_shape() {
        let contract = ContractFixtures::standard(ClientId::new());
        let wo = WorkOrderFixtures::billable(&contract);
        assert_eq!(wo.status(), WorkOrderStatus::Completed);
        assert_eq!(wo.total_hours(), dec!(3.5));
        assert_eq!(wo.contract_id, Some(contract.id));
        assert_eq!(wo.client_id, contract.client_id);
        assert!(contract.rate_for(&wo.service_category).is_some());
    }

    #[test]
    fn test_flat_fee_fixture_shape() {
        let wo = WorkOrderFixtures::flat_fee();
        assert!(wo.time_entries.is_empty());
        assert!(wo.materials.is_empty());
        assert_eq!(wo.budget, Some(MoneyFixtures::usd(dec!(300.00))));
        assert_eq!(wo.contract_id, None);
    }
}
