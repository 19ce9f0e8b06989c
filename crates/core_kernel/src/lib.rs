//! Core Kernel - Foundational types for the field service billing system
//!
//! This crate provides the building blocks shared by every domain crate:
//! - Money and percentages with precise decimal arithmetic
//! - Clocks, time zones and monthly billing periods
//! - Strongly-typed identifiers
//! - Port error types and adapter health checks

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;
pub mod error;

pub use money::{Money, Currency, MoneyError, Percentage, round_commercial};
pub use temporal::{BillingPeriod, Clock, FixedClock, SystemClock, TemporalError, Timezone};
pub use identifiers::{
    WorkOrderId, TimeEntryId, MaterialUsageId, TechnicianId, ProductId,
    ClientId, ContractId, InvoiceId, LineItemId, PaymentId,
};
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
pub use error::CoreError;
