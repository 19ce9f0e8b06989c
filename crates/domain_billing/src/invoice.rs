//! Invoices
//!
//! An invoice is issued once from a completed work order. Afterwards only its
//! status and payment list change; the amounts are fixed at issue.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    ClientId, ContractId, Currency, InvoiceId, LineItemId, Money, MoneyError, Percentage,
    WorkOrderId,
};

use crate::calculator::InvoiceCalculation;
use crate::payment::Payment;

/// Invoice status
///
/// `Overdue` is never stored; it is derived by [`Invoice::effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    PartiallyPaid,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::PartiallyPaid => "PARTIALLY_PAID",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            InvoiceStatus::PartiallyPaid,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
        ]
        .into_iter()
        .find(|status| status.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("unknown invoice status '{}'", s))
    }
}

/// Kind of invoice line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineItemKind {
    Labor,
    /// Work order budget billed in place of labor
    FlatFee,
    Material,
}

impl LineItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineItemKind::Labor => "LABOR",
            LineItemKind::FlatFee => "FLAT_FEE",
            LineItemKind::Material => "MATERIAL",
        }
    }
}

impl FromStr for LineItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [LineItemKind::Labor, LineItemKind::FlatFee, LineItemKind::Material]
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown line item kind '{}'", s))
    }
}

/// One line on an invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub id: LineItemId,
    pub kind: LineItemKind,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    /// `quantity * unit_price`, rounded to the currency
    pub line_total: Money,
}

impl InvoiceLineItem {
    pub fn new(
        kind: LineItemKind,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Money,
    ) -> Result<Self, MoneyError> {
        Ok(Self {
            id: LineItemId::new_v7(),
            kind,
            description: description.into(),
            quantity,
            unit_price,
            line_total: unit_price.multiply(quantity)?.round_to_currency(),
        })
    }
}

/// A billing document for one completed work order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// `INV-YYYYMM-NNNN`, unique
    pub invoice_number: String,
    /// Unique: a work order is invoiced at most once
    pub work_order_id: WorkOrderId,
    pub client_id: ClientId,
    pub contract_id: Option<ContractId>,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: Currency,
    pub line_items: Vec<InvoiceLineItem>,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_rate: Percentage,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub payments: Vec<Payment>,
    /// Optimistic concurrency token
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Header fields that do not come from the calculation
#[derive(Debug, Clone)]
pub struct InvoiceHeader {
    pub invoice_number: String,
    pub work_order_id: WorkOrderId,
    pub client_id: ClientId,
    pub contract_id: Option<ContractId>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
}

impl Invoice {
    /// Builds a draft invoice from a finished calculation
    pub fn issue(header: InvoiceHeader, calculation: InvoiceCalculation, at: DateTime<Utc>) -> Self {
        Self {
            id: InvoiceId::new_v7(),
            invoice_number: header.invoice_number,
            work_order_id: header.work_order_id,
            client_id: header.client_id,
            contract_id: header.contract_id,
            status: InvoiceStatus::Draft,
            issue_date: header.issue_date,
            due_date: header.due_date,
            currency: calculation.currency,
            line_items: calculation.line_items,
            subtotal: calculation.subtotal,
            discount_amount: calculation.discount_amount,
            tax_rate: calculation.tax_rate,
            tax_amount: calculation.tax_amount,
            total_amount: calculation.total_amount,
            payments: Vec::new(),
            version: 1,
            created_at: at,
            updated_at: at,
        }
    }

    /// Sum of recorded payments
    pub fn total_paid(&self) -> Result<Money, MoneyError> {
        Money::sum(self.currency, self.payments.iter().map(|p| &p.amount))
    }

    /// Outstanding amount, never negative
    pub fn balance_due(&self) -> Result<Money, MoneyError> {
        let balance = self.total_amount.checked_sub(&self.total_paid()?)?;
        if balance.is_negative() {
            return Ok(Money::zero(self.currency));
        }
        Ok(balance)
    }

    /// Status implied by the payment history, falling back to `current`
    pub fn status_from_payments(&self) -> Result<InvoiceStatus, MoneyError> {
        let paid = self.total_paid()?.amount();
        let status = if paid >= self.total_amount.amount() && !self.payments.is_empty() {
            InvoiceStatus::Paid
        } else if paid > Decimal::ZERO {
            InvoiceStatus::PartiallyPaid
        } else {
            self.status
        };
        Ok(status)
    }

    /// Stored status, or `Overdue` when a sent invoice is unpaid past its due date
    pub fn effective_status(&self, today: NaiveDate) -> InvoiceStatus {
        match self.status {
            InvoiceStatus::Sent | InvoiceStatus::PartiallyPaid if today > self.due_date => {
                InvoiceStatus::Overdue
            }
            status => status,
        }
    }
}
