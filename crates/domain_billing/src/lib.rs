//! Billing Domain - invoicing and payment reconciliation for field service work
//!
//! This crate turns a completed work order into a numbered, immutable invoice
//! and reconciles payments against it.
//!
//! # Components
//!
//! - **RateResolver**: picks the hourly rate for a work order's service
//!   category and applies condition multipliers
//! - **InvoiceCalculator**: pure computation of line items, discount, tax and
//!   total
//! - **InvoiceNumberGenerator**: `INV-YYYYMM-NNNN` numbers from an atomic
//!   per-month sequence
//! - **PaymentLedger**: appends payments and derives invoice status from the
//!   full payment history
//! - **BillingEngine**: orchestrates the above over the storage ports
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillingEngine, NewPayment, PaymentMethod};
//!
//! let invoice = engine.generate_invoice(work_order_id).await?;
//! engine.mark_invoice_sent(invoice.id).await?;
//!
//! let payment = NewPayment::new(invoice.total_amount, PaymentMethod::BankTransfer)
//!     .with_reference("TRX-88412");
//! let invoice = engine.record_payment(invoice.id, payment).await?;
//! ```

pub mod adapters;
pub mod calculator;
pub mod config;
pub mod contract;
pub mod engine;
pub mod error;
pub mod invoice;
pub mod ledger;
pub mod numbering;
pub mod payment;
pub mod ports;
pub mod rate;

pub use adapters::MemoryStore;
pub use calculator::{InvoiceCalculation, InvoiceCalculator};
pub use config::{
    BillingConfig, DEFAULT_HOURLY_RATE, DEFAULT_PAYMENT_TERMS_DAYS, DEFAULT_TAX_RATE,
};
pub use contract::{Contract, ContractRate, RateMultipliers, SlaThresholds};
pub use engine::BillingEngine;
pub use error::BillingError;
pub use invoice::{Invoice, InvoiceHeader, InvoiceLineItem, InvoiceStatus, LineItemKind};
pub use ledger::PaymentLedger;
pub use numbering::{
    format_invoice_number, parse_invoice_number, InvoiceNumberGenerator, InvoiceSequence,
};
pub use payment::{NewPayment, Payment, PaymentMethod};
pub use ports::{BillingStore, INVOICE_NUMBER_KEY, INVOICE_WORK_ORDER_KEY};
pub use rate::{RateCondition, RateResolver, RateSource, ResolvedRate};
