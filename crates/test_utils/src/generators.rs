//! Property-Based Test Generators
//!
//! Proptest strategies for billable work that respect the domain's own
//! validation rules (positive hours up to a shift, positive quantities,
//! non-negative prices).

use core_kernel::{Currency, Money};
use domain_billing::PaymentMethod;
use domain_workorder::Priority;
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Hours in quarter-hour steps from 0.25 to 12.00
pub fn hours_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=48i64).prop_map(|quarters| Decimal::new(quarters * 25, 2))
}

/// Quantities from 0.5 to 50.0 in tenths
pub fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (5i64..=500i64).prop_map(|tenths| Decimal::new(tenths, 1))
}

/// USD unit prices from 0.01 to 999.99
pub fn unit_price_strategy() -> impl Strategy<Value = Money> {
    (1i64..100_000i64).prop_map(|cents| Money::from_minor(cents, Currency::USD))
}

/// Hourly rates from 20.00 to 250.00
pub fn hourly_rate_strategy() -> impl Strategy<Value = Money> {
    (2_000i64..=25_000i64).prop_map(|cents| Money::from_minor(cents, Currency::USD))
}

/// Whole percentages from 0 to 50
pub fn discount_percent_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..=50u32).prop_map(Decimal::from)
}

/// Material lines as `(unit price, quantity)` pairs
pub fn materials_strategy(max_lines: usize) -> impl Strategy<Value = Vec<(Money, Decimal)>> {
    prop::collection::vec((unit_price_strategy(), quantity_strategy()), 0..=max_lines)
}

pub fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Normal),
        Just(Priority::High),
        Just(Priority::Emergency),
    ]
}

pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop::sample::select(PaymentMethod::ALL.to_vec())
}

/// Splits `total_cents` into 1..=`max_parts` positive installments summing to it
pub fn installments_strategy(total_cents: i64, max_parts: usize) -> impl Strategy<Value = Vec<i64>> {
    let max_parts = max_parts.clamp(1, total_cents.max(1) as usize);
    (1..=max_parts)
        .prop_flat_map(move |parts| {
            prop::collection::btree_set(1..total_cents.max(2), parts - 1)
                .prop_map(move |cuts| {
                    let mut bounds: Vec<i64> = cuts.into_iter().collect();
                    bounds.push(total_cents);
                    let mut previous = 0;
                    bounds
                        .into_iter()
                        .map(|bound| {
                            let part = bound - previous;
                            previous = bound;
                            part
                        })
                        .collect()
                })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_hours_within_shift(hours in hours_strategy()) {
            prop_assert!(hours > Decimal::ZERO);
            prop_assert!(hours <= Decimal::from(12));
        }

        #[test]
        fn prop_installments_sum_to_total(parts in installments_strategy(23_895, 5)) {
            prop_assert!(!parts.is_empty());
            prop_assert!(parts.iter().all(|p| *p > 0));
            prop_assert_eq!(parts.iter().sum::<i64>(), 23_895);
        }
    }
}
