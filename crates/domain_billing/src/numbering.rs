//! Invoice numbering
//!
//! Numbers have the form `INV-{YYYYMM}-{NNNN}`. The sequence restarts at 1
//! each calendar month and is handed out by an [`InvoiceSequence`] that
//! increments atomically, so concurrent callers never share a value.

use async_trait::async_trait;
use std::sync::Arc;

use core_kernel::{BillingPeriod, DomainPort, PortError};

use crate::error::BillingError;

/// Atomic per-period counter
#[async_trait]
pub trait InvoiceSequence: DomainPort {
    /// Increments the counter for `period` and returns the new value (1-based)
    async fn next_value(&self, period: BillingPeriod) -> Result<u32, PortError>;
}

/// Formats an invoice number
pub fn format_invoice_number(period: BillingPeriod, sequence: u32) -> String {
    format!("INV-{}-{:04}", period.key(), sequence)
}

/// Splits an invoice number into its period and sequence
pub fn parse_invoice_number(number: &str) -> Option<(BillingPeriod, u32)> {
    let rest = number.strip_prefix("INV-")?;
    let (period, sequence) = rest.split_once('-')?;
    Some((period.parse().ok()?, sequence.parse().ok()?))
}

/// Allocates invoice numbers from a sequence
#[derive(Clone)]
pub struct InvoiceNumberGenerator {
    sequence: Arc<dyn InvoiceSequence>,
}

impl InvoiceNumberGenerator {
    pub fn new(sequence: Arc<dyn InvoiceSequence>) -> Self {
        Self { sequence }
    }

    pub async fn next(&self, period: BillingPeriod) -> Result<String, BillingError> {
        let value = self.sequence.next_value(period).await?;
        Ok(format_invoice_number(period, value))
    }
}
