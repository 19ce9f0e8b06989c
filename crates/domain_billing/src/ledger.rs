//! Payment ledger
//!
//! Records a payment against an invoice and re-derives the invoice status
//! from the complete payment history. There is no running "amount paid"
//! field to drift out of sync; `Invoice::total_paid` always sums payments.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::BillingError;
use crate::invoice::Invoice;
use crate::payment::{NewPayment, Payment};

/// Applies payments to invoices
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentLedger {
    allow_overpayment: bool,
}

impl PaymentLedger {
    pub fn new(allow_overpayment: bool) -> Self {
        Self { allow_overpayment }
    }

    /// Returns a copy of `invoice` with the payment appended
    ///
    /// The input invoice is never modified, so a rejected payment leaves no
    /// trace.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if the amount is not positive, is in another
    ///   currency, or has more decimals than the currency allows
    /// - `Overpayment` if the payment would take the total paid above the
    ///   invoice total and overpayment is not allowed
    pub fn record_payment(
        &self,
        invoice: &Invoice,
        request: &NewPayment,
        at: DateTime<Utc>,
    ) -> Result<Invoice, BillingError> {
        let amount = request.amount;

        if amount.currency() != invoice.currency {
            return Err(BillingError::InvalidAmount(format!(
                "payment in {} against an invoice in {}",
                amount.currency(),
                invoice.currency
            )));
        }
        if !amount.is_positive() {
            return Err(BillingError::InvalidAmount(format!(
                "payment amount must be positive, got {}",
                amount.amount()
            )));
        }
        if !amount.fits_currency_precision() {
            return Err(BillingError::InvalidAmount(format!(
                "{} has more than {} decimal places",
                amount.amount(),
                amount.currency().decimal_places()
            )));
        }

        let balance_due = invoice.balance_due()?;
        if !self.allow_overpayment && amount > balance_due {
            return Err(BillingError::Overpayment {
                attempted: amount,
                balance_due,
            });
        }

        let mut updated = invoice.clone();
        updated.payments.push(Payment::record(invoice.id, request, at));
        updated.status = updated.status_from_payments()?;
        updated.updated_at = at;
        let total_paid = updated.total_paid()?;

        debug!(
            invoice_id = %invoice.id,
            amount = %amount,
            status = %updated.status,
            total_paid = %total_paid,
            "payment applied"
        );

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{ClientId, Currency, InvoiceId, Money, Percentage, WorkOrderId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::invoice::InvoiceStatus;
    use crate::payment::PaymentMethod;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    fn invoice(total: Decimal) -> Invoice {
        Invoice {
            id: InvoiceId::new(),
            invoice_number: "INV-202405-0007".into(),
            work_order_id: WorkOrderId::new(),
            client_id: ClientId::new(),
            contract_id: None,
            status: InvoiceStatus::Sent,
            issue_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
            currency: Currency::USD,
            line_items: Vec::new(),
            subtotal: usd(total),
            discount_amount: usd(Decimal::ZERO),
            tax_rate: Percentage::zero(),
            tax_amount: usd(Decimal::ZERO),
            total_amount: usd(total),
            payments: Vec::new(),
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn cash(amount: Decimal) -> NewPayment {
        NewPayment::new(usd(amount), PaymentMethod::Cash)
    }

    #[test]
    fn test_exact_payment_marks_paid() {
        let inv = invoice(dec!(238.95));
        let paid = PaymentLedger::default()
            .record_payment(&inv, &cash(dec!(238.95)), Utc::now())
            .unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(paid.payments.len(), 1);
        assert!(inv.payments.is_empty());
    }

    #[test]
    fn test_partial_payments_accumulate() {
        let ledger = PaymentLedger::default();
        let inv = invoice(dec!(100));

        let inv = ledger.record_payment(&inv, &cash(dec!(30)), Utc::now()).unwrap();
        assert_eq!(inv.status, InvoiceStatus::PartiallyPaid);

        let inv = ledger.record_payment(&inv, &cash(dec!(70)), Utc::now()).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert_eq!(inv.total_paid().unwrap().amount(), dec!(100));
    }

    #[test]
    fn test_overpayment_rejected_and_invoice_unchanged() {
        let ledger = PaymentLedger::default();
        let inv = ledger
            .record_payment(&invoice(dec!(100)), &cash(dec!(60)), Utc::now())
            .unwrap();
        let before = inv.clone();

        let result = ledger.record_payment(&inv, &cash(dec!(40.01)), Utc::now());
        assert!(matches!(result, Err(BillingError::Overpayment { .. })));
        assert_eq!(inv, before);
    }

    #[test]
    fn test_overpayment_allowed_by_configuration() {
        let inv = PaymentLedger::new(true)
            .record_payment(&invoice(dec!(100)), &cash(dec!(120)), Utc::now())
            .unwrap();
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert!(inv.balance_due().unwrap().is_zero());
    }

    #[test]
    fn test_invalid_amounts() {
        let ledger = PaymentLedger::default();
        let inv = invoice(dec!(100));

        for amount in [dec!(0), dec!(-5), dec!(10.001)] {
            let result = ledger.record_payment(&inv, &cash(amount), Utc::now());
            assert!(matches!(result, Err(BillingError::InvalidAmount(_))), "{}", amount);
        }

        let euros = NewPayment::new(Money::new(dec!(10), Currency::EUR), PaymentMethod::BankTransfer);
        assert!(matches!(
            ledger.record_payment(&inv, &euros, Utc::now()),
            Err(BillingError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_paid_invoice_rejects_further_payment() {
        let ledger = PaymentLedger::default();
        let inv = ledger
            .record_payment(&invoice(dec!(50)), &cash(dec!(50)), Utc::now())
            .unwrap();
        assert!(matches!(
            ledger.record_payment(&inv, &cash(dec!(0.01)), Utc::now()),
            Err(BillingError::Overpayment { .. })
        ));
    }
}
