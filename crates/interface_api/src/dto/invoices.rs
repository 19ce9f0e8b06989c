//! Invoice and payment DTOs

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::Currency;
use domain_billing::{BillingError, Invoice, InvoiceLineItem, Payment, PaymentMethod};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    /// Defaults to the billing currency
    pub currency: Option<Currency>,
    pub method: PaymentMethod,
    #[validate(length(min = 1, max = 100))]
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LineItemResponse {
    pub kind: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl From<&InvoiceLineItem> for LineItemResponse {
    fn from(line: &InvoiceLineItem) -> Self {
        Self {
            kind: line.kind.as_str().to_string(),
            description: line.description.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price.amount(),
            line_total: line.line_total.amount(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub payment_date: DateTime<Utc>,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id.into(),
            amount: payment.amount.amount(),
            method: payment.method,
            reference: payment.reference.clone(),
            payment_date: payment.payment_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub invoice_number: String,
    pub work_order_id: Uuid,
    pub client_id: Uuid,
    pub contract_id: Option<Uuid>,
    /// Stored status, or `OVERDUE` once an unpaid sent invoice passes its due date
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: Currency,
    pub line_items: Vec<LineItemResponse>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
    pub payments: Vec<PaymentResponse>,
    pub version: u64,
}

impl InvoiceResponse {
    /// Renders `invoice` as seen on `today` in the billing time zone
    pub fn new(invoice: &Invoice, today: NaiveDate) -> Result<Self, BillingError> {
        Ok(Self {
            id: invoice.id.into(),
            invoice_number: invoice.invoice_number.clone(),
            work_order_id: invoice.work_order_id.into(),
            client_id: invoice.client_id.into(),
            contract_id: invoice.contract_id.map(Into::into),
            status: invoice.effective_status(today).as_str().to_string(),
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            currency: invoice.currency,
            line_items: invoice.line_items.iter().map(Into::into).collect(),
            subtotal: invoice.subtotal.amount(),
            discount_amount: invoice.discount_amount.amount(),
            tax_rate: invoice.tax_rate.as_fraction(),
            tax_amount: invoice.tax_amount.amount(),
            total_amount: invoice.total_amount.amount(),
            amount_paid: invoice.total_paid()?.amount(),
            balance_due: invoice.balance_due()?.amount(),
            payments: invoice.payments.iter().map(Into::into).collect(),
            version: invoice.version,
        })
    }
}
