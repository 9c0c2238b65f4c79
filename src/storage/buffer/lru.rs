use super::replacer::Replacer;
use crate::storage::page::PageId;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct LruReplacer {
    /// Least recently used at front
    lru_list: VecDeque<PageId>,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lru_list: VecDeque::with_capacity(capacity),
        }
    }
}

impl Replacer for LruReplacer {
    fn record_access(&mut self, page_id: PageId) {
        self.remove(page_id);
        self.lru_list.push_back(page_id);
    }

    fn evict(&mut self, evictable: &dyn Fn(PageId) -> bool) -> Option<PageId> {
        let idx = self.lru_list.iter().position(|&pid| evictable(pid))?;
        self.lru_list.remove(idx)
    }

    fn remove(&mut self, page_id: PageId) {
        if let Some(idx) = self.lru_list.iter().position(|&pid| pid == page_id) {
            self.lru_list.remove(idx);
        }
    }

    fn size(&self) -> usize {
        self.lru_list.len()
    }
}
