//! Adapters for the billing ports
//!
//! - **MemoryStore**: in-process implementation of `WorkOrderPort`,
//!   `BillingStore` and `InvoiceSequence` behind one lock. Used by the engine
//!   and API test suites and for running the server without a database.
//!
//! The PostgreSQL implementation lives in `infra_db`.

pub mod memory;

pub use memory::MemoryStore;
