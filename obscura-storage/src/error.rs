//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in record storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record index {index} out of range (count {count})")]
    IndexOutOfRange { index: u64, count: u64 },

    /// The ledger accepted the record under an index that was already taken.
    /// The record is not rolled back.
    #[error("ledger assigned index {actual}, expected {expected}")]
    IndexConflict { expected: u64, actual: u64 },

    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),
}
