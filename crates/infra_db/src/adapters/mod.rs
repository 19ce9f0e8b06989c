//! Port adapters
//!
//! Each adapter implements domain port traits on top of the repository layer
//! and converts between row types and domain values.

pub mod billing;

pub use billing::PostgresBillingAdapter;
