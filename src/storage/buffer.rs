//! Transaction-aware page cache.
//!
//! Every page access from the access and execution layers goes through
//! [`BufferPool::get_page`], which first takes the matching page lock from the
//! [`LockManager`] and then serves the page from memory, loading it from its
//! heap file on a miss. Dirty pages stay pinned in memory until their
//! transaction completes (NO-STEAL); only clean pages are eviction candidates.

pub mod lru;
pub mod replacer;

use crate::access::tuple::Tuple;
use crate::catalog::{Catalog, TableId};
use crate::concurrency::lock::{LockManager, LockMode};
use crate::config::DatabaseConfig;
use crate::error::{DbError, DbResult};
use crate::storage::page::{HeapPage, PageId};
use crate::transaction::TransactionId;
use dashmap::DashMap;
use log::{debug, trace, warn};
use lru::LruReplacer;
use parking_lot::{Mutex, RwLock};
use replacer::Replacer;
use std::sync::Arc;

/// Shared handle to a cached page.
pub type PageHandle = Arc<RwLock<HeapPage>>;

/// Access requested when fetching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    fn lock_mode(self) -> LockMode {
        match self {
            Permission::ReadOnly => LockMode::Shared,
            Permission::ReadWrite => LockMode::Exclusive,
        }
    }
}

#[derive(Debug)]
pub struct BufferPool {
    pages: DashMap<PageId, PageHandle>,
    /// Also serializes cache misses so a page is loaded at most once.
    replacer: Mutex<Box<dyn Replacer>>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    max_pages: usize,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, config: &DatabaseConfig) -> Self {
        Self::with_replacer(
            catalog,
            config,
            Box::new(LruReplacer::new(config.buffer_pool_pages)),
        )
    }

    pub fn with_replacer(
        catalog: Arc<Catalog>,
        config: &DatabaseConfig,
        replacer: Box<dyn Replacer>,
    ) -> Self {
        Self {
            pages: DashMap::with_capacity(config.buffer_pool_pages),
            replacer: Mutex::new(replacer),
            lock_manager: LockManager::new(config.lock_timeout),
            catalog,
            max_pages: config.buffer_pool_pages,
        }
    }

    /// Fetch `page_id` on behalf of `txn`, blocking until the page lock
    /// matching `perm` is granted. Fails with `TransactionAborted` if the
    /// wait is cancelled.
    pub fn get_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permission,
    ) -> DbResult<PageHandle> {
        self.lock_manager.acquire(txn, page_id, perm.lock_mode())?;

        let cached = self.pages.get(&page_id).map(|entry| Arc::clone(entry.value()));
        if let Some(handle) = cached {
            self.replacer.lock().record_access(page_id);
            return Ok(handle);
        }

        let mut replacer = self.replacer.lock();
        if let Some(entry) = self.pages.get(&page_id) {
            replacer.record_access(page_id);
            return Ok(Arc::clone(entry.value()));
        }

        while self.pages.len() >= self.max_pages {
            self.evict_page(&mut **replacer)?;
        }

        let file = self.catalog.heap_file(page_id.table_id)?;
        let page = file.read_page(page_id)?;
        let handle = Arc::new(RwLock::new(page));
        self.pages.insert(page_id, Arc::clone(&handle));
        replacer.record_access(page_id);

        trace!("Loaded page {} for {}", page_id, txn);
        Ok(handle)
    }

    /// Drop the least recently used clean page.
    fn evict_page(&self, replacer: &mut dyn Replacer) -> DbResult<()> {
        let is_clean = |pid: PageId| {
            self.pages.get(&pid).map_or(true, |entry| {
                entry
                    .value()
                    .try_read()
                    .is_some_and(|page| page.dirtied_by().is_none())
            })
        };

        let victim = replacer.evict(&is_clean).ok_or(DbError::BufferPoolFull)?;
        self.pages.remove(&victim);
        trace!("Evicted page {}", victim);
        Ok(())
    }

    /// Insert `tuple` into `table_id` on behalf of `txn`. The pages touched
    /// are marked dirty and kept cached until the transaction completes.
    pub fn insert_tuple(&self, txn: TransactionId, table_id: TableId, tuple: Tuple) -> DbResult<()> {
        let file = self.catalog.heap_file(table_id)?;
        let dirtied = file.insert_tuple(self, txn, tuple)?;
        self.keep_dirty(txn, dirtied);
        Ok(())
    }

    /// Delete `tuple` from the table its record id points into.
    pub fn delete_tuple(&self, txn: TransactionId, tuple: &Tuple) -> DbResult<()> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| DbError::NotFound("tuple has no record id".to_string()))?;
        let file = self.catalog.heap_file(record_id.page_id.table_id)?;
        let dirtied = file.delete_tuple(self, txn, tuple)?;
        self.keep_dirty(txn, dirtied);
        Ok(())
    }

    fn keep_dirty(&self, txn: TransactionId, pages: Vec<PageHandle>) {
        let mut replacer = self.replacer.lock();
        for handle in pages {
            let page_id = {
                let mut page = handle.write();
                page.mark_dirty(Some(txn));
                page.page_id()
            };
            // The handle may have been evicted while clean
            self.pages.insert(page_id, handle);
            replacer.record_access(page_id);
        }

        // Make room again; dirty pages stay even if that leaves the cache over
        // its limit until the transaction completes.
        while self.pages.len() > self.max_pages {
            if self.evict_page(&mut **replacer).is_err() {
                debug!(
                    "{} cached pages exceed the limit of {}",
                    self.pages.len(),
                    self.max_pages
                );
                break;
            }
        }
    }

    /// Write `page_id` back to disk if it is cached and dirty.
    pub fn flush_page(&self, page_id: PageId) -> DbResult<()> {
        let Some(handle) = self.pages.get(&page_id).map(|e| Arc::clone(e.value())) else {
            return Ok(());
        };

        let mut page = handle.write();
        if page.dirtied_by().is_some() {
            let file = self.catalog.heap_file(page_id.table_id)?;
            file.write_page(&page)?;
            page.mark_dirty(None);
            trace!("Flushed page {}", page_id);
        }
        Ok(())
    }

    /// Flush every page dirtied by `txn`.
    pub fn flush_pages(&self, txn: TransactionId) -> DbResult<()> {
        for page_id in self.dirty_pages_of(Some(txn)) {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Flush every dirty page regardless of owner.
    pub fn flush_all_pages(&self) -> DbResult<()> {
        for page_id in self.dirty_pages_of(None) {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Drop `page_id` from the cache without writing it.
    pub fn discard_page(&self, page_id: PageId) {
        self.pages.remove(&page_id);
        self.replacer.lock().remove(page_id);
    }

    /// Finish `txn`: on commit its dirty pages are written to disk, on abort
    /// they are discarded so the next reader sees the on-disk version. All of
    /// its page locks are released in both cases.
    ///
    /// If a flush fails, the pages not yet written are discarded before the
    /// locks go, and the error is returned.
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> DbResult<()> {
        let result = if commit { self.flush_pages(txn) } else { Ok(()) };

        if let Err(e) = &result {
            warn!("Commit of {} failed, discarding unwritten pages: {}", txn, e);
        }
        if !commit || result.is_err() {
            for page_id in self.dirty_pages_of(Some(txn)) {
                self.discard_page(page_id);
            }
        }

        self.lock_manager.release_all(txn);
        if result.is_ok() {
            debug!(
                "{} {}",
                txn,
                if commit { "committed" } else { "aborted" }
            );
        }
        result
    }

    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(txn, page_id)
    }

    /// Release every lock of `txn` without touching its pages.
    pub fn release_locks(&self, txn: TransactionId) {
        self.lock_manager.release_all(txn);
    }

    pub fn num_cached_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.pages.contains_key(&page_id)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Cached dirty pages, restricted to `owner` when given.
    fn dirty_pages_of(&self, owner: Option<TransactionId>) -> Vec<PageId> {
        let mut page_ids: Vec<PageId> = self
            .pages
            .iter()
            .filter(|entry| {
                let dirtied_by = entry.value().read().dirtied_by();
                match owner {
                    Some(txn) => dirtied_by == Some(txn),
                    None => dirtied_by.is_some(),
                }
            })
            .map(|entry| *entry.key())
            .collect();
        page_ids.sort();
        page_ids
    }
}
