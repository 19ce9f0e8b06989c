//! Work Order Domain
//!
//! A work order is a unit of requested field service work. It carries the
//! technician's logged hours and the materials consumed, and moves through a
//! lifecycle that ends either in cancellation or in invoicing.
//!
//! # Lifecycle
//!
//! ```text
//! REQUESTED -> SCHEDULED -> IN_PROGRESS <-> PENDING -> COMPLETED -> INVOICED
//!      \____________\______________\___________\_________> CANCELLED
//! ```
//!
//! `CANCELLED` and `INVOICED` are terminal. `INVOICED` is only ever reached
//! through [`lifecycle::mark_invoiced`], which the billing engine persists
//! together with the invoice it creates.

pub mod work_order;
pub mod lifecycle;
pub mod ports;
pub mod services;
pub mod error;

pub use work_order::{WorkOrder, TimeEntry, MaterialUsage, Priority, ServiceCategory};
pub use lifecycle::{WorkOrderStatus, can_transition, mark_invoiced};
pub use ports::WorkOrderPort;
pub use services::WorkOrderService;
pub use error::WorkOrderError;
