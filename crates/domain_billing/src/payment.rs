//! Payments recorded against invoices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{InvoiceId, Money, PaymentId};

/// How a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Check,
    BankTransfer,
    CreditCard,
    DebitCard,
    DigitalWallet,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::Cash,
        PaymentMethod::Check,
        PaymentMethod::BankTransfer,
        PaymentMethod::CreditCard,
        PaymentMethod::DebitCard,
        PaymentMethod::DigitalWallet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Check => "CHECK",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::DebitCard => "DEBIT_CARD",
            PaymentMethod::DigitalWallet => "DIGITAL_WALLET",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown payment method '{}'", s))
    }
}

/// A payment request before it is accepted by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub amount: Money,
    pub method: PaymentMethod,
    /// External reference (bank ref, card authorisation, cheque number)
    pub reference: Option<String>,
}

impl NewPayment {
    pub fn new(amount: Money, method: PaymentMethod) -> Self {
        Self {
            amount,
            method,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// A recorded payment; append-only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub payment_date: DateTime<Utc>,
}

impl Payment {
    pub fn record(invoice_id: InvoiceId, request: &NewPayment, at: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::new_v7(),
            invoice_id,
            amount: request.amount,
            method: request.method,
            reference: request.reference.clone(),
            payment_date: at,
        }
    }
}
