//! Error taxonomy for the store.
//!
//! `NotFound` and `Validation` are expected, recoverable outcomes that callers
//! branch on locally. `Storage` means the engine failed to open, read or
//! commit and is escalated to the application shell unmodified; nothing below
//! the shell can recover it. `Migration` is fatal at open time only.
//!
//! Blob absence is *not* an error: `get_blob` returns `Ok(None)`.

use redb::{CommitError, DatabaseError, StorageError, TableError, TransactionError};
use serde_json::Error as SerdeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection}/{id} not found")]
    NotFound {
        collection: &'static str,
        id: String,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] SerdeError),

    #[error("storage unavailable: {0}")]
    Storage(String),

    #[error("migration failed: {0}")]
    Migration(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn not_found(collection: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            collection,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        StoreError::Storage(format!("failed to open database: {err}"))
    }
}

impl From<TransactionError> for StoreError {
    fn from(err: TransactionError) -> Self {
        StoreError::Storage(format!("transaction error: {err}"))
    }
}

impl From<TableError> for StoreError {
    fn from(err: TableError) -> Self {
        StoreError::Storage(format!("table error: {err}"))
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        StoreError::Storage(format!("storage error: {err}"))
    }
}

impl From<CommitError> for StoreError {
    fn from(err: CommitError) -> Self {
        StoreError::Storage(format!("commit error: {err}"))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Storage(format!("io error: {err}"))
    }
}
