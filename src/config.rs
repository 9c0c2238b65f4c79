//! Runtime configuration.

use crate::error::{DbError, DbResult};
use crate::storage::disk::DEFAULT_PAGE_SIZE;
use std::time::Duration;

/// Default number of pages the buffer pool may cache.
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Size in bytes of every page in every heap file.
    pub page_size: usize,
    /// Maximum number of pages cached at once.
    pub buffer_pool_pages: usize,
    /// Upper bound on a single lock wait. `None` waits until granted or
    /// until a deadlock is detected.
    pub lock_timeout: Option<Duration>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_pages: DEFAULT_POOL_PAGES,
            lock_timeout: None,
        }
    }
}

impl DatabaseConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_buffer_pool_pages(mut self, pages: usize) -> Self {
        self.buffer_pool_pages = pages;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.page_size == 0 {
            return Err(DbError::InvalidArgument("page size must be non-zero".to_string()));
        }
        if self.buffer_pool_pages == 0 {
            return Err(DbError::InvalidArgument(
                "buffer pool must hold at least one page".to_string(),
            ));
        }
        Ok(())
    }
}
