//! Work order lifecycle state machine
//!
//! The transition table is deliberately small: the engine only guards the
//! edges billing depends on. Everything else between non-terminal states is a
//! staff decision.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WorkOrderError;
use crate::work_order::WorkOrder;

/// Lifecycle state of a work order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    /// Raised by a client or staff member
    Requested,
    /// A visit has been scheduled
    Scheduled,
    /// A technician is on the job
    InProgress,
    /// Waiting on parts, client, or approval
    Pending,
    /// Work finished, ready for invoicing
    Completed,
    /// Abandoned; terminal
    Cancelled,
    /// Billed; terminal
    Invoiced,
}

impl WorkOrderStatus {
    pub const ALL: [WorkOrderStatus; 7] = [
        WorkOrderStatus::Requested,
        WorkOrderStatus::Scheduled,
        WorkOrderStatus::InProgress,
        WorkOrderStatus::Pending,
        WorkOrderStatus::Completed,
        WorkOrderStatus::Cancelled,
        WorkOrderStatus::Invoiced,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkOrderStatus::Cancelled | WorkOrderStatus::Invoiced)
    }

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Requested => "REQUESTED",
            WorkOrderStatus::Scheduled => "SCHEDULED",
            WorkOrderStatus::InProgress => "IN_PROGRESS",
            WorkOrderStatus::Pending => "PENDING",
            WorkOrderStatus::Completed => "COMPLETED",
            WorkOrderStatus::Cancelled => "CANCELLED",
            WorkOrderStatus::Invoiced => "INVOICED",
        }
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkOrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown work order status '{}'", s))
    }
}

/// Returns whether `current -> next` is a legal lifecycle edge
///
/// - nothing leaves a terminal state
/// - `INVOICED` is reachable only from `COMPLETED`
/// - `CANCELLED` is reachable from every non-terminal state
/// - a state never transitions to itself
pub fn can_transition(current: WorkOrderStatus, next: WorkOrderStatus) -> bool {
    if current.is_terminal() || current == next {
        return false;
    }
    match next {
        WorkOrderStatus::Invoiced => current == WorkOrderStatus::Completed,
        _ => true,
    }
}

/// Moves a completed work order to `INVOICED`
///
/// This is the only function that produces an `INVOICED` work order. The
/// result must be persisted in the same transaction as the invoice.
pub fn mark_invoiced(mut work_order: WorkOrder) -> Result<WorkOrder, WorkOrderError> {
    let current = work_order.status();
    if current != WorkOrderStatus::Completed {
        return Err(WorkOrderError::InvalidState {
            from: current,
            to: WorkOrderStatus::Invoiced,
        });
    }
    work_order.set_status(WorkOrderStatus::Invoiced);
    Ok(work_order)
}

/// Validates a staff-driven transition; `INVOICED` is refused here
pub(crate) fn check_staff_transition(
    current: WorkOrderStatus,
    next: WorkOrderStatus,
) -> Result<(), WorkOrderError> {
    if current.is_terminal() {
        return Err(WorkOrderError::TerminalState(current));
    }
    if next == WorkOrderStatus::Invoiced || !can_transition(current, next) {
        return Err(WorkOrderError::InvalidState { from: current, to: next });
    }
    Ok(())
}
