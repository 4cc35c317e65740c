//! Storage adapter error types

use thiserror::Error;

/// Result type for storage adapter calls
pub type StorageResult<T> = Result<T, StorageError>;

/// Failures a storage adapter may surface. The engine passes them through
/// verbatim; it never retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// No table backs the collection
    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// A table already backs the collection
    #[error("table '{0}' already exists")]
    TableExists(String),

    /// A unique column already holds the value
    #[error("unique constraint violated on column '{column}'")]
    UniqueViolation { column: String },

    /// Row carries a column the table does not have
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// Row lacks a column the table has
    #[error("row is missing column '{0}'")]
    MissingColumn(String),

    /// Transient failure; the caller may retry
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage failure: {0}")]
    Internal(String),
}

impl StorageError {
    /// Returns true if retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }

    /// Returns true if the row was shaped for another version of the table
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(
            self,
            StorageError::UnknownColumn(_) | StorageError::MissingColumn(_)
        )
    }
}
