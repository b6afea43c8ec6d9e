//! Error types for the simulation engine

use thiserror::Error;

/// Top-level error kind, mapped to HTTP status at the API boundary.
#[derive(Error, Debug)]
pub enum SimError {
    /// Missing job, configuration, patient, or facility
    #[error("not found: {0}")]
    NotFound(String),

    /// Schema or constraint violation on caller input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Missing or mismatched API key
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Operation not valid in the current state (e.g. cancelling a completed job)
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// File, archive, or repository I/O problem
    #[error("storage error: {0}")]
    StorageError(String),

    /// Resource governor tripped a cap; the owning job is failed, not the process
    #[error("resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    /// Anything else — never leaks internal detail past the API boundary
    #[error("internal error: {0}")]
    InternalError(String),
}

/// Result type for the simulation engine
pub type SimResult<T> = Result<T, SimError>;

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        SimError::StorageError(e.to_string())
    }
}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        SimError::InvalidInput(e.to_string())
    }
}
