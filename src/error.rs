//! Error types shared by the storage and execution layers.

use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use thiserror::Error;

/// Errors that can occur while storing or executing.
#[derive(Error, Debug)]
pub enum DbError {
    /// The shape of two tuple streams does not line up.
    #[error("Schema mismatch: expected [{expected}], found [{found}]")]
    SchemaMismatch { expected: String, found: String },

    /// A page or tuple was handed to a table it does not belong to.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The target of an operation could not be resolved.
    #[error("Not found: {0}")]
    NotFound(String),

    /// `next()` was called on a drained stream.
    #[error("No more tuples in stream")]
    NoSuchElement,

    /// The iterator has not been opened (or was closed).
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// The page cache gave up on a lock wait; the transaction must end.
    #[error("Transaction {txn} aborted: {reason}")]
    TransactionAborted { txn: TransactionId, reason: String },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Page {0} has no empty slot")]
    PageFull(PageId),

    #[error("Buffer pool is full: every cached page is dirty")]
    BufferPoolFull,

    #[error("No such table: {0}")]
    NoSuchTable(String),

    #[error("Integer overflow: {0}")]
    Overflow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// True for the cancellation condition raised by the lock manager.
    pub fn is_abort(&self) -> bool {
        matches!(self, DbError::TransactionAborted { .. })
    }
}

/// Result type for storage and execution operations.
pub type DbResult<T> = Result<T, DbError>;
