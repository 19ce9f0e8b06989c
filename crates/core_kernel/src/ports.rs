//! Ports and Adapters Infrastructure
//!
//! Foundational types for the hexagonal layout used by the domain crates.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Application Services                        │
//! │          (BillingEngine, WorkOrderService)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Port Traits                             │
//! │     (WorkOrderPort, BillingStore, InvoiceSequence)           │
//! └─────────────────────────────────────────────────────────────┘
//!                    ▲                         ▲
//!         ┌─────────┴─────────┐     ┌────────┴────────┐
//!         │ PostgreSQL adapter│     │ In-memory adapter│
//!         └───────────────────┘     └──────────────────┘
//! ```
//!
//! Every port returns `PortError`, so services can branch on the failure kind
//! without knowing which adapter produced it.

use std::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for port operations
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested entity was not found
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// The adapter refused the data
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// A guarded write found the stored row in an unexpected state
    /// (stale version or changed status)
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// A uniqueness constraint rejected the write
    #[error("Unique constraint '{constraint}' violated: {message}")]
    UniqueViolation {
        constraint: String,
        message: String,
    },

    /// Connection to the underlying system failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation timed out
    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
    },

    /// An internal error occurred
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a Validation error with field information
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    /// Creates a UniqueViolation error for the named constraint
    pub fn unique_violation(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        PortError::UniqueViolation {
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    /// Creates a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if this error indicates a transient failure that may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortError::Connection { .. } | PortError::Timeout { .. }
        )
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }

    /// Returns true if this error came from the named unique constraint
    pub fn violates(&self, name: &str) -> bool {
        matches!(self, PortError::UniqueViolation { constraint, .. } if constraint == name)
    }
}

/// Marker trait for all domain ports
///
/// All port traits should extend this marker to ensure they are
/// thread-safe and can be used in async contexts.
pub trait DomainPort: Send + Sync + 'static {}

/// Health status for an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check result for an adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Adapter identifier
    pub adapter_id: String,
    /// Current health status
    pub status: AdapterHealth,
    /// Latency of the health check in milliseconds
    pub latency_ms: u64,
    /// Optional message with additional details
    pub message: Option<String>,
    /// Timestamp of the health check
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

impl HealthCheckResult {
    pub fn is_healthy(&self) -> bool {
        self.status == AdapterHealth::Healthy
    }
}

/// Trait for adapters that support health checks
#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    /// Performs a health check on the adapter
    async fn health_check(&self) -> HealthCheckResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_not_found() {
        let error = PortError::not_found("Invoice", "123");
        assert!(error.is_not_found());
        assert!(!error.is_transient());
        assert!(error.to_string().contains("Invoice"));
        assert!(error.to_string().contains("123"));
    }

    #[test]
    fn test_port_error_transient() {
        let timeout = PortError::Timeout {
            operation: "commit_invoice".to_string(),
            duration_ms: 5000,
        };
        assert!(timeout.is_transient());

        let validation = PortError::validation("Invalid hours");
        assert!(!validation.is_transient());
    }

    #[test]
    fn test_unique_violation_matches_constraint() {
        let error = PortError::unique_violation("invoices_work_order_id_key", "duplicate key");
        assert!(error.violates("invoices_work_order_id_key"));
        assert!(!error.violates("invoices_invoice_number_key"));
        assert!(!PortError::conflict("stale").violates("invoices_work_order_id_key"));
    }
}
