//! Storage layer.
//!
//! - **PageManager**: positioned reads and writes of fixed-size pages
//! - **HeapPage**: slot bitmap plus fixed-width tuple records
//! - **BufferPool**: lock-aware page cache with LRU eviction of clean pages

pub mod buffer;
pub mod disk;
pub mod page;

pub use buffer::{BufferPool, PageHandle, Permission};
pub use disk::{PageManager, DEFAULT_PAGE_SIZE};
pub use page::{HeapPage, PageId};
