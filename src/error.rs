//! # Engine Errors
//!
//! Error taxonomy shared by every subsystem of the collection engine.
//!
//! Request-level faults abort a call before any storage interaction.
//! Per-item faults in batch operations are captured as item outcomes and
//! only surface here when no item succeeded.

use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    // ==================
    // Definition Errors
    // ==================
    /// Unknown collection or column, or an invalid column definition
    #[error("Schema error: {0}")]
    Schema(String),

    // ==================
    // Request Errors
    // ==================
    /// Type mismatch, constraint violation or malformed query
    #[error("Validation error on '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Cursor does not resolve under the active filter and sort
    #[error("Cursor error: {0}")]
    Cursor(String),

    /// Missing record or collection
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write capability missing from the caller context
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Page size outside the accepted range
    #[error("Limit {value} outside accepted range [{min}, {max}]")]
    Limit { value: i64, min: usize, max: usize },

    // ==================
    // Collaborator Errors
    // ==================
    /// Failure surfaced verbatim from the storage adapter
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// Invalid engine configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Internal invariant failure (poisoned lock etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a validation error for a field or query parameter
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a cursor error
    pub fn cursor(msg: impl Into<String>) -> Self {
        Self::Cursor(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a permission error
    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Cursor(_) => "CURSOR_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Permission(_) => "PERMISSION_DENIED",
            Self::Limit { .. } => "LIMIT_ERROR",
            Self::Storage(StorageError::UniqueViolation { .. }) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::Schema(_) => 400,
            Self::Validation { .. } => 400,
            Self::Cursor(_) => 400,
            Self::Limit { .. } => 400,

            // 403 / 404
            Self::Permission(_) => 403,
            Self::NotFound(_) => 404,

            // Storage
            Self::Storage(StorageError::UniqueViolation { .. }) => 409,
            Self::Storage(StorageError::TableNotFound(_)) => 404,
            Self::Storage(StorageError::UnknownColumn(_) | StorageError::MissingColumn(_)) => 409,
            Self::Storage(StorageError::Unavailable(_)) => 503,
            Self::Storage(_) => 500,

            // 500 Internal Server Error
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Field the error is attached to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            Self::Storage(StorageError::UniqueViolation { column }) => Some(column),
            _ => None,
        }
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        Self {
            error: err.to_string(),
            code: err.code(),
            status: err.status_code(),
            field: err.field().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(EngineError::schema("x").status_code(), 400);
        assert_eq!(EngineError::validation("price", "bad").status_code(), 400);
        assert_eq!(EngineError::not_found("x").status_code(), 404);
        assert_eq!(EngineError::permission("x").status_code(), 403);
        assert_eq!(
            EngineError::Limit {
                value: 500,
                min: 1,
                max: 100
            }
            .status_code(),
            400
        );
    }

    #[test]
    fn test_storage_error_propagation() {
        let err = EngineError::from(StorageError::UniqueViolation {
            column: "sku".to_string(),
        });
        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.field(), Some("sku"));
    }

    #[test]
    fn test_error_response_body() {
        let err = EngineError::validation("quantity", "expected integer");
        let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["status"], 400);
        assert_eq!(body["field"], "quantity");

        let body = serde_json::to_value(ErrorResponse::from(&EngineError::not_found("x"))).unwrap();
        assert!(body.get("field").is_none());
    }
}
