//! Custom Test Assertions
//!
//! Assertion helpers for money and invoices that give more useful failure
//! messages than a bare `assert_eq!`.

use core_kernel::{BillingPeriod, Money};
use domain_billing::{parse_invoice_number, Invoice, InvoiceStatus};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Panics
///
/// Panics if the currencies don't match or the amounts differ by more than tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );

    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

/// Asserts that two Money values agree to within one cent
pub fn assert_money_within_cent(actual: &Money, expected: &Money) {
    assert_money_approx_eq(actual, expected, dec!(0.01));
}

/// Asserts that a Money value carries no more decimals than its currency allows
pub fn assert_money_rounded(money: &Money) {
    assert!(
        money.fits_currency_precision(),
        "Expected {} rounded to {} decimal places",
        money,
        money.currency().decimal_places()
    );
}

/// Asserts that `number` is a well-formed invoice number in `period`
///
/// Returns the sequence part for further checks.
pub fn assert_invoice_number_in_period(number: &str, period: BillingPeriod) -> u32 {
    let (parsed, sequence) = parse_invoice_number(number)
        .unwrap_or_else(|| panic!("'{}' is not of the form INV-YYYYMM-NNNN", number));
    assert_eq!(parsed, period, "Invoice number {} is not in {}", number, period);
    assert!(sequence >= 1, "Invoice sequence must start at 1, got {}", sequence);
    sequence
}

/// Asserts the internal consistency of an invoice
///
/// - every line total is rounded and the subtotal is their sum
/// - `subtotal - discount + tax` matches the total within a cent
/// - the stored status agrees with the payment history
pub fn assert_invoice_consistent(invoice: &Invoice) {
    let lines_sum = invoice
        .line_items
        .iter()
        .fold(Decimal::ZERO, |acc, line| acc + line.line_total.amount());
    for line in &invoice.line_items {
        assert_money_rounded(&line.line_total);
    }
    assert_eq!(
        invoice.subtotal.amount(),
        lines_sum,
        "Subtotal {} does not equal the sum of line totals {}",
        invoice.subtotal,
        lines_sum
    );

    assert_money_rounded(&invoice.total_amount);
    let recomputed = invoice.subtotal.amount() - invoice.discount_amount.amount()
        + invoice.tax_amount.amount();
    assert_money_within_cent(
        &invoice.total_amount,
        &Money::new(recomputed, invoice.currency),
    );

    if invoice.payments.is_empty() {
        assert!(
            matches!(invoice.status, InvoiceStatus::Draft | InvoiceStatus::Sent),
            "Unpaid invoice {} has status {}",
            invoice.invoice_number,
            invoice.status
        );
    } else {
        assert_eq!(
            invoice.status,
            invoice.status_from_payments().unwrap(),
            "Status of {} disagrees with its payments",
            invoice.invoice_number
        );
    }
}
