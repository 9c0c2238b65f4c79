//! Concurrency control module.
//!
//! Transactions are isolated from each other by page-level strict two-phase
//! locking, with deadlock detection on the wait-for graph.

pub mod lock;

pub use lock::{LockManager, LockMode};
