//! Billing domain errors

use core_kernel::{BillingPeriod, Money, MoneyError, PortError, WorkOrderId};
use domain_workorder::WorkOrderError;
use thiserror::Error;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// A work order, contract or invoice does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A lifecycle precondition does not hold
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The work order already has an invoice
    #[error("Work order {0} has already been invoiced")]
    DuplicateInvoice(WorkOrderId),

    /// Recording the payment would exceed the invoice total
    #[error("Payment of {attempted} exceeds balance due {balance_due}")]
    Overpayment { attempted: Money, balance_due: Money },

    /// Non-positive or over-precise amount or quantity
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Nothing billable on the work order
    #[error("Missing billing data: {0}")]
    MissingData(String),

    /// Every candidate invoice number collided
    #[error("Could not allocate an invoice number for {period} after {attempts} attempts")]
    NumberAllocationExhausted { period: BillingPeriod, attempts: u32 },

    /// A versioned write lost to another writer
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Arithmetic failure (currency mismatch, overflow)
    #[error("Calculation error: {0}")]
    Calculation(String),

    /// Storage failure
    #[error("Storage error: {0}")]
    Storage(#[source] PortError),
}

impl BillingError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        BillingError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Returns true when the same call may succeed if repeated
    pub fn is_retryable(&self) -> bool {
        match self {
            BillingError::ConcurrentModification(_) => true,
            BillingError::Storage(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<PortError> for BillingError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound { entity_type, id } => BillingError::NotFound {
                entity: entity_type,
                id,
            },
            PortError::Conflict { message } => BillingError::ConcurrentModification(message),
            other => BillingError::Storage(other),
        }
    }
}

impl From<MoneyError> for BillingError {
    fn from(error: MoneyError) -> Self {
        BillingError::Calculation(error.to_string())
    }
}

impl From<WorkOrderError> for BillingError {
    fn from(error: WorkOrderError) -> Self {
        match error {
            WorkOrderError::NotFound(id) => BillingError::not_found("WorkOrder", id),
            WorkOrderError::ConcurrentModification(message) => {
                BillingError::ConcurrentModification(message)
            }
            WorkOrderError::Storage(e) => BillingError::from(e),
            other => BillingError::InvalidState(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_conflict_is_retryable() {
        let error = BillingError::from(PortError::conflict("stale invoice version"));
        assert!(matches!(error, BillingError::ConcurrentModification(_)));
        assert!(error.is_retryable());
    }

    #[test]
    fn test_business_errors_are_not_retryable() {
        assert!(!BillingError::DuplicateInvoice(WorkOrderId::new()).is_retryable());
        assert!(!BillingError::MissingData("nothing billable".into()).is_retryable());
        assert!(!BillingError::from(PortError::validation("bad row")).is_retryable());
        assert!(BillingError::from(PortError::connection("reset")).is_retryable());
    }

    #[test]
    fn test_not_found_keeps_entity() {
        let error = BillingError::from(PortError::not_found("Invoice", "INV-1"));
        assert_eq!(error.to_string(), "Invoice not found: INV-1");
    }
}
