//! Heap file: a table stored as an unordered sequence of fixed-size pages.
//!
//! Page `n` of the file lives at byte offset `n * page_size` and the file only
//! grows by appending whole pages. Apart from [`HeapFile::read_page`] and
//! [`HeapFile::write_page`], which the buffer pool uses to fill and flush its
//! cache, all page access goes through the [`BufferPool`].

use crate::access::scan::HeapFileScan;
use crate::access::schema::SchemaDescriptor;
use crate::access::tuple::Tuple;
use crate::catalog::TableId;
use crate::error::{DbError, DbResult};
use crate::storage::buffer::{BufferPool, PageHandle, Permission};
use crate::storage::disk::PageManager;
use crate::storage::page::{HeapPage, PageId};
use crate::transaction::TransactionId;
use log::debug;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub struct HeapFile {
    path: PathBuf,
    table_id: TableId,
    schema: Arc<SchemaDescriptor>,
    page_size: usize,
    disk: Mutex<PageManager>,
}

impl HeapFile {
    /// Open (or create) the heap file at `path`. Pages are `page_size`
    /// bytes and must fit at least one tuple of `schema`.
    pub fn open(path: &Path, schema: Arc<SchemaDescriptor>, page_size: usize) -> DbResult<Self> {
        if schema.num_fields() == 0 {
            return Err(DbError::InvalidArgument(
                "a table needs at least one field".to_string(),
            ));
        }
        if HeapPage::slots_per_page(page_size, schema.byte_size()) == 0 {
            return Err(DbError::InvalidArgument(format!(
                "page size {} cannot hold a {}-byte tuple",
                page_size,
                schema.byte_size()
            )));
        }

        let disk = PageManager::open(path, page_size)?;
        let path = path.canonicalize()?;
        let table_id = table_id_for(&path);

        Ok(Self {
            path,
            table_id,
            schema,
            page_size,
            disk: Mutex::new(disk),
        })
    }

    /// Derived from the canonical path, so reopening the same file yields
    /// the same id.
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn schema(&self) -> &Arc<SchemaDescriptor> {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode a page straight from disk. Called by the buffer pool
    /// on a cache miss.
    pub fn read_page(&self, page_id: PageId) -> DbResult<HeapPage> {
        self.check_owner(page_id)?;

        let mut buf = vec![0u8; self.page_size];
        self.disk.lock().read_page(page_id.page_no, &mut buf)?;
        HeapPage::new(page_id, Arc::clone(&self.schema), self.page_size, &buf)
    }

    /// Write `page` at its offset in the file.
    pub fn write_page(&self, page: &HeapPage) -> DbResult<()> {
        self.check_owner(page.page_id())?;

        let bytes = page.to_bytes()?;
        self.disk.lock().write_page(page.page_id().page_no, &bytes)
    }

    /// Number of whole pages in the file.
    pub fn num_pages(&self) -> DbResult<usize> {
        self.disk.lock().num_pages()
    }

    /// Append an empty page to the file and return its id.
    pub fn allocate_page(&self) -> DbResult<PageId> {
        let mut disk = self.disk.lock();
        let page_no = disk.num_pages()?;
        disk.write_page(page_no, &HeapPage::empty_page_data(self.page_size))?;

        debug!("Allocated page {} of table {}", page_no, self.table_id);
        Ok(PageId::new(self.table_id, page_no))
    }

    /// Insert `tuple` into the first page with a free slot, appending a page
    /// if every page is full. Returns the page that was modified.
    ///
    /// Pages are probed read-only and the chosen page is then re-fetched
    /// read-write. Two transactions can both find every page full and each
    /// append one; the page locks keep their inserts apart, so the result is
    /// only an extra partly empty page.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: Tuple,
    ) -> DbResult<Vec<PageHandle>> {
        self.schema.check(&tuple)?;

        let mut target = None;
        for page_no in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id, page_no);
            let handle = pool.get_page(txn, page_id, Permission::ReadOnly)?;
            if handle.read().has_empty_slot() {
                target = Some(page_id);
                break;
            }
        }

        let page_id = match target {
            Some(page_id) => page_id,
            None => self.allocate_page()?,
        };

        let handle = pool.get_page(txn, page_id, Permission::ReadWrite)?;
        handle.write().insert_tuple(tuple)?;
        Ok(vec![handle])
    }

    /// Remove `tuple` from the page its record id names. Returns the page
    /// that was modified.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> DbResult<Vec<PageHandle>> {
        let not_member = || DbError::NotFound("tuple not a member of this table".to_string());

        let record_id = tuple.record_id().ok_or_else(not_member)?;
        self.check_owner(record_id.page_id)?;
        if record_id.page_id.page_no >= self.num_pages()? {
            return Err(not_member());
        }

        let handle = pool.get_page(txn, record_id.page_id, Permission::ReadWrite)?;
        handle.write().delete_tuple(tuple)?;
        Ok(vec![handle])
    }

    /// Lazy scan over every tuple, fetching pages read-only through `pool`.
    pub fn scan(self: &Arc<Self>, pool: Arc<BufferPool>, txn: TransactionId) -> HeapFileScan {
        HeapFileScan::new(Arc::clone(self), pool, txn)
    }

    fn check_owner(&self, page_id: PageId) -> DbResult<()> {
        if page_id.table_id != self.table_id {
            return Err(DbError::InvalidArgument(format!(
                "page {} does not belong to table {}",
                page_id, self.table_id
            )));
        }
        Ok(())
    }
}

fn table_id_for(canonical_path: &Path) -> TableId {
    let mut hasher = DefaultHasher::new();
    canonical_path.hash(&mut hasher);
    let hash = hasher.finish();
    TableId((hash ^ (hash >> 32)) as u32)
}
