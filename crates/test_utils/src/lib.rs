//! Test Utilities Crate
//!
//! Shared test infrastructure, fixtures, and helpers for the field service
//! billing test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built work orders, contracts and clocks
//! - `builders`: Builder patterns for test data construction
//! - `database`: PostgreSQL testcontainer management
//! - `assertions`: Custom assertion helpers for money and invoices
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
