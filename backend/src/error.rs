//! Error handling for the warehouse stock ledger
//!
//! Every failure of the engine is a typed `AppError`. Handlers return them
//! unchanged and the `IntoResponse` impl renders a consistent JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::InputError;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    // Lifecycle errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Nothing to validate: operation has no lines")]
    EmptyOperation,

    // Stock rule violations
    #[error("Insufficient stock for product {product_id} at location {location_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: Uuid,
        location_id: Uuid,
        available: i64,
        requested: i64,
    },

    #[error("Stock for product {product_id} at location {location_id} would exceed the largest storable quantity")]
    QuantityOverflow { product_id: Uuid, location_id: Uuid },

    #[error("Cannot release {requested}: only {reserved} reserved")]
    InvalidRelease { reserved: i64, requested: i64 },

    // Input errors
    #[error("Malformed input: {field}: {message}")]
    MalformedInput { field: String, message: String },

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    // Storage errors
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn malformed(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::MalformedInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the failed call left nothing behind and may be repeated as is
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Persistence(_) | AppError::DatabaseError(_))
    }
}

impl From<InputError> for AppError {
    fn from(err: InputError) -> Self {
        AppError::MalformedInput {
            field: err.field,
            message: err.message,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::InvalidState(msg) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("INVALID_STATE", msg.clone()),
            ),
            AppError::EmptyOperation => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("EMPTY_OPERATION", "No lines to validate"),
            ),
            AppError::InsufficientStock {
                product_id,
                location_id,
                available,
                requested,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: Some(serde_json::json!({
                        "product_id": product_id,
                        "location_id": location_id,
                        "available": available,
                        "requested": requested,
                    })),
                    ..ErrorDetail::new("INSUFFICIENT_STOCK", self.to_string())
                },
            ),
            AppError::QuantityOverflow {
                product_id,
                location_id,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: Some(serde_json::json!({
                        "product_id": product_id,
                        "location_id": location_id,
                    })),
                    ..ErrorDetail::new("QUANTITY_OVERFLOW", self.to_string())
                },
            ),
            AppError::InvalidRelease {
                reserved,
                requested,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: Some(serde_json::json!({
                        "reserved": reserved,
                        "requested": requested,
                    })),
                    ..ErrorDetail::new("INVALID_RELEASE", self.to_string())
                },
            ),
            AppError::MalformedInput { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("MALFORMED_INPUT", message.clone())
                },
            ),
            AppError::Conflict { resource, message } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(resource.clone()),
                    ..ErrorDetail::new("CONFLICT", message.clone())
                },
            ),
            AppError::Persistence(_) | AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "PERSISTENCE_FAILURE",
                    "A storage error occurred; no changes were applied",
                ),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for the engine and handlers
pub type AppResult<T> = Result<T, AppError>;
