//! Errors raised by the LMS stores.

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failure of a directory, task, submission or certificate store call.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Unknown task or submission id. The message names the record.
    #[error("{0}")]
    NotFound(String),

    /// A uniqueness constraint refused the write: a task id, an attempt
    /// number, or a second certificate for one student and project.
    #[error("duplicate record: {0}")]
    Conflict(String),

    /// The review compare-and-set lost. The submission was already reviewed
    /// or a newer attempt superseded it.
    #[error("review transition refused: {0}")]
    ReviewTransition(String),

    #[error("rejected input: {0}")]
    InvalidInput(String),

    /// A stored row does not map back onto a domain record.
    #[error("unreadable row: {0}")]
    Serialization(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}
