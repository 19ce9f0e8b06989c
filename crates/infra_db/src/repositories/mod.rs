//! Repository implementations for the billing aggregates
//!
//! Repositories own the SQL and speak in row types; the adapters in
//! `crate::adapters` convert rows to domain values.
//!
//! - runtime-checked queries (`sqlx::query` / `query_as` with `bind`)
//! - one transaction per multi-table write
//! - optimistic concurrency through `version` guards

pub mod billing;
pub mod work_order;

pub use billing::BillingRepository;
pub use work_order::WorkOrderRepository;
