//! API error handling
//!
//! Domain errors are mapped onto HTTP statuses here and nowhere else.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use core_kernel::PortError;
use domain_billing::BillingError;
use domain_workorder::WorkOrderError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String, Option<Vec<String>>),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Validation(msg, details) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg, details)
            }
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None)
            }
            ApiError::Internal(msg) => {
                error!(%msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None)
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into(), None)
    }

    fn from_port(error: &PortError) -> Self {
        match error {
            PortError::NotFound { .. } => ApiError::NotFound(error.to_string()),
            PortError::Validation { .. } => ApiError::validation(error.to_string()),
            PortError::Conflict { .. } | PortError::UniqueViolation { .. } => {
                ApiError::Conflict(error.to_string())
            }
            e if e.is_transient() => ApiError::Unavailable(error.to_string()),
            _ => ApiError::Internal(error.to_string()),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        let message = err.to_string();
        match err {
            BillingError::NotFound { .. } => ApiError::NotFound(message),
            BillingError::InvalidState(_)
            | BillingError::DuplicateInvoice(_)
            | BillingError::ConcurrentModification(_) => ApiError::Conflict(message),
            BillingError::Overpayment { .. }
            | BillingError::InvalidAmount(_)
            | BillingError::MissingData(_)
            | BillingError::Calculation(_) => ApiError::validation(message),
            BillingError::NumberAllocationExhausted { .. } => ApiError::Unavailable(message),
            BillingError::Storage(port) => ApiError::from_port(&port),
        }
    }
}

impl From<WorkOrderError> for ApiError {
    fn from(err: WorkOrderError) -> Self {
        let message = err.to_string();
        match err {
            WorkOrderError::NotFound(_) => ApiError::NotFound(message),
            WorkOrderError::InvalidState { .. }
            | WorkOrderError::TerminalState(_)
            | WorkOrderError::ConcurrentModification(_) => ApiError::Conflict(message),
            WorkOrderError::InvalidTimeEntry(_)
            | WorkOrderError::InvalidMaterial(_)
            | WorkOrderError::InvalidSchedule(_) => ApiError::validation(message),
            WorkOrderError::Storage(port) => ApiError::from_port(&port),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        ApiError::Validation("request validation failed".to_string(), Some(details))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => ApiError::validation(e.body_text()),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}
