//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for work orders, contracts, invoices and payments
//! using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: repositories own the SQL and
//! row types, and [`adapters::PostgresBillingAdapter`] implements the domain
//! ports (`WorkOrderPort`, `BillingStore`, `InvoiceSequence`) on top of them.
//!
//! Two database guarantees carry the billing invariants:
//!
//! - `invoices_work_order_id_key` and `invoices_invoice_number_key` unique
//!   constraints, reported to the domain with their constraint names
//! - `INSERT ... ON CONFLICT ... RETURNING` on `invoice_sequences`, which
//!   allocates invoice numbers atomically per period
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool_from_url, run_migrations, PostgresBillingAdapter};
//!
//! let pool = create_pool_from_url("postgres://localhost/billing").await?;
//! run_migrations(&pool).await?;
//! let adapter = PostgresBillingAdapter::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, create_pool_from_url, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use adapters::PostgresBillingAdapter;
