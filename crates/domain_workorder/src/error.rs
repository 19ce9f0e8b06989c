//! Work order domain errors

use core_kernel::PortError;
use thiserror::Error;

use crate::lifecycle::WorkOrderStatus;

/// Errors that can occur in the work order domain
#[derive(Debug, Error)]
pub enum WorkOrderError {
    /// Work order not found
    #[error("Work order not found: {0}")]
    NotFound(String),

    /// The lifecycle does not allow the requested transition
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        from: WorkOrderStatus,
        to: WorkOrderStatus,
    },

    /// The work order is cancelled or invoiced and can no longer change
    #[error("Work order is in terminal state {0}")]
    TerminalState(WorkOrderStatus),

    /// Rejected time entry
    #[error("Invalid time entry: {0}")]
    InvalidTimeEntry(String),

    /// Rejected material usage
    #[error("Invalid material usage: {0}")]
    InvalidMaterial(String),

    /// Rejected schedule
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Another writer changed the work order first
    #[error("Work order {0} was modified concurrently")]
    ConcurrentModification(String),

    /// Storage failure
    #[error("Storage error: {0}")]
    Storage(#[source] PortError),
}

impl From<PortError> for WorkOrderError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound { id, .. } => WorkOrderError::NotFound(id),
            PortError::Conflict { message } => WorkOrderError::ConcurrentModification(message),
            other => WorkOrderError::Storage(other),
        }
    }
}
