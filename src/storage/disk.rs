//! Raw positioned page I/O on a single backing file.

pub mod page_manager;

pub use page_manager::PageManager;

/// Page size used when the configuration does not say otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 4096;
