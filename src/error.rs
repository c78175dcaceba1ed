use thiserror::Error;
use crate::storage::StorageError;

/// Errors surfaced by record store operations.
///
/// Unknown record ids are not errors; operations report them as `false`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Format error: {0}")]
    FormatError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(#[from] StorageError),

    #[error("No record ids left to assign")]
    IdExhausted,

    #[error("Failed to encode records: {0}")]
    EncodeError(#[from] serde_json::Error),
}
