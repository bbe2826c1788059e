//! Errors raised by the columnar engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The schema handed to `create_table` is malformed.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A table of this name exists with a different schema.
    #[error("table '{table}' already exists with a different schema")]
    SchemaMismatch { table: String },

    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// A row does not fit the table schema (arity, type or nullability).
    #[error("row rejected by table '{table}': {reason}")]
    RowShape { table: String, reason: String },

    /// The predicate literal cannot be compared with the column.
    #[error("invalid predicate on column '{column}': {reason}")]
    InvalidPredicate { column: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    #[error("could not prepare storage directory {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write-ahead log error: {0}")]
    Wal(#[from] rusqlite::Error),

    #[error("row serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl EngineError {
    /// True for errors caused by the caller's context rather than the engine.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, EngineError::Cancelled | EngineError::DeadlineExceeded)
    }
}
