//! Property tests for invoice calculation and the payment ledger

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{ClientId, Currency, Money, ProductId, TechnicianId};
use domain_billing::{
    BillingConfig, Contract, ContractRate, Invoice, InvoiceCalculator, InvoiceHeader,
    InvoiceStatus, NewPayment, PaymentLedger, PaymentMethod,
};
use domain_workorder::{MaterialUsage, Priority, ServiceCategory, TimeEntry, WorkOrder};

fn usd(amount: Decimal) -> Money {
    Money::new(amount, Currency::USD)
}

/// Hours in quarter-hour steps, 0.25 to 12
fn hours() -> impl Strategy<Value = Decimal> {
    (1i64..=48).prop_map(|q| Decimal::new(q * 25, 2))
}

/// Prices in cents, 0.01 to 999.99
fn price() -> impl Strategy<Value = Decimal> {
    (1i64..100_000).prop_map(|c| Decimal::new(c, 2))
}

fn quantity() -> impl Strategy<Value = Decimal> {
    (1i64..=200).prop_map(|q| Decimal::new(q, 1))
}

fn discount_percent() -> impl Strategy<Value = Decimal> {
    (0i64..=50).prop_map(Decimal::from)
}

fn build_work_order(entries: &[Decimal], materials: &[(Decimal, Decimal)]) -> WorkOrder {
    let mut wo = WorkOrder::new(
        ClientId::new(),
        ServiceCategory::new("electrical"),
        "Rewire panel",
        Priority::Normal,
    );
    let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    for hours in entries {
        wo.log_time(TimeEntry::new(TechnicianId::new(), *hours, date).unwrap())
            .unwrap();
    }
    for (i, (qty, unit)) in materials.iter().enumerate() {
        let usage = MaterialUsage::new(ProductId::new(), format!("Part {}", i), usd(*unit), *qty)
            .unwrap();
        wo.add_material(usage).unwrap();
    }
    wo
}

fn contract(rate: Decimal, discount: Decimal) -> Contract {
    Contract::new(ClientId::new(), "Service agreement")
        .with_discount_percent(discount)
        .with_rate(ContractRate::new(ServiceCategory::new("electrical"), usd(rate)))
}

proptest! {
    #[test]
    fn total_matches_formula_within_a_cent(
        entries in prop::collection::vec(hours(), 0..5),
        materials in prop::collection::vec((quantity(), price()), 1..6),
        rate in price(),
        discount in discount_percent(),
    ) {
        let wo = build_work_order(&entries, &materials);
        let contract = contract(rate, discount);
        let config = BillingConfig::default();
        let calc = InvoiceCalculator::new(config.clone()).calculate(&wo, Some(&contract)).unwrap();

        let labor = calc.labor_subtotal.amount();
        let mats = calc.materials_subtotal.amount();
        let exact_discount = (labor + mats) * discount / dec!(100);
        let expected = (labor + mats - exact_discount) * (Decimal::ONE + config.tax_rate.as_fraction());

        prop_assert!((calc.total_amount.amount() - expected).abs() <= dec!(0.01));
        prop_assert_eq!(calc.subtotal.amount(), labor + mats);
        prop_assert!(calc.total_amount.amount().scale() <= 2);
    }

    #[test]
    fn total_is_invariant_under_reordering(
        entries in prop::collection::vec(hours(), 1..5),
        materials in prop::collection::vec((quantity(), price()), 1..6),
        rate in price(),
        discount in discount_percent(),
    ) {
        let contract = contract(rate, discount);
        let calculator = InvoiceCalculator::new(BillingConfig::default());

        let forward = build_work_order(&entries, &materials);
        let mut rev_entries = entries.clone();
        rev_entries.reverse();
        let mut rev_materials = materials.clone();
        rev_materials.reverse();
        let backward = build_work_order(&rev_entries, &rev_materials);

        let a = calculator.calculate(&forward, Some(&contract)).unwrap();
        let b = calculator.calculate(&backward, Some(&contract)).unwrap();

        prop_assert_eq!(a.total_amount, b.total_amount);
        prop_assert_eq!(a.discount_amount, b.discount_amount);
        prop_assert_eq!(a.tax_amount, b.tax_amount);
    }

    #[test]
    fn ledger_never_exceeds_total(
        total_cents in 100i64..1_000_000,
        payments in prop::collection::vec(1i64..500_000, 1..8),
    ) {
        let wo = build_work_order(&[], &[(Decimal::ONE, Decimal::new(total_cents, 2))]);
        let calc = InvoiceCalculator::new(BillingConfig::default()).calculate(&wo, None).unwrap();
        let mut invoice = Invoice::issue(
            InvoiceHeader {
                invoice_number: "INV-202406-0001".into(),
                work_order_id: wo.id,
                client_id: wo.client_id,
                contract_id: None,
                issue_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                due_date: NaiveDate::from_ymd_opt(2024, 7, 3).unwrap(),
            },
            calc,
            Utc::now(),
        );

        let ledger = PaymentLedger::default();
        for cents in payments {
            let request = NewPayment::new(Money::from_minor(cents, Currency::USD), PaymentMethod::Check);
            match ledger.record_payment(&invoice, &request, Utc::now()) {
                Ok(updated) => invoice = updated,
                Err(_) => {
                    prop_assert!(request.amount > invoice.balance_due().unwrap());
                }
            }
            let paid = invoice.total_paid().unwrap();
            prop_assert!(paid <= invoice.total_amount);
            let expected = if paid == invoice.total_amount {
                InvoiceStatus::Paid
            } else if paid.is_positive() {
                InvoiceStatus::PartiallyPaid
            } else {
                InvoiceStatus::Draft
            };
            prop_assert_eq!(invoice.status, expected);
        }
    }
}

#[test]
fn worked_example_labor_materials_discount_tax() {
    let wo = build_work_order(&[dec!(3.5)], &[(dec!(2), dec!(25.00))]);
    let calc = InvoiceCalculator::new(BillingConfig::default())
        .calculate(&wo, Some(&contract(dec!(50.00), dec!(10))))
        .unwrap();

    assert_eq!(calc.labor_subtotal, usd(dec!(175.00)));
    assert_eq!(calc.materials_subtotal, usd(dec!(50.00)));
    assert_eq!(calc.subtotal, usd(dec!(225.00)));
    assert_eq!(calc.discount_amount, usd(dec!(22.50)));
    assert_eq!(calc.taxable_amount, usd(dec!(202.50)));
    assert_eq!(calc.tax_amount, usd(dec!(36.45)));
    assert_eq!(calc.total_amount, usd(dec!(238.95)));
}

#[test]
fn worked_example_flat_budget() {
    let wo = build_work_order(&[], &[]).with_budget(usd(dec!(300.00)));
    let calc = InvoiceCalculator::new(BillingConfig::default())
        .calculate(&wo, None)
        .unwrap();

    assert_eq!(calc.total_amount, usd(dec!(354.00)));
    assert!(calc.discount_amount.is_zero());
}
