use crate::storage::page::PageId;
use std::fmt::Debug;

pub trait Replacer: Send + Sync + Debug {
    /// Note that `page_id` was just used.
    fn record_access(&mut self, page_id: PageId);

    /// Select a page to evict among those `evictable` accepts, and stop
    /// tracking it. Returns None if no tracked page qualifies.
    fn evict(&mut self, evictable: &dyn Fn(PageId) -> bool) -> Option<PageId>;

    /// Stop tracking `page_id`.
    fn remove(&mut self, page_id: PageId);

    /// Number of tracked pages.
    fn size(&self) -> usize;
}
