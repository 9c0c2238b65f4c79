//! Transaction identity.
//!
//! Commit and abort are driven through the page cache
//! (`BufferPool::transaction_complete`); this module only names transactions.

pub mod id;

pub use id::{TransactionId, TransactionIdGenerator};
