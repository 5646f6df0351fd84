//! Error types for the store layer.

use thiserror::Error;

/// Errors raised by license and usage-counter stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Serialization error while persisting or loading a document.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be interpreted (bad date, bad uuid, ...).
    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    /// A lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// An operation required an active license record and none exists.
    #[error("no active license record")]
    NoActiveRecord,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
