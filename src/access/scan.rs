//! Sequential scan over a heap file.

use crate::access::heap::HeapFile;
use crate::access::schema::SchemaDescriptor;
use crate::access::tuple::Tuple;
use crate::error::{DbError, DbResult};
use crate::executor::Executor;
use crate::storage::buffer::{BufferPool, Permission};
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug)]
enum ScanState {
    Unopened,
    /// `page_no` is the next page to fetch; `pending` holds the rest of
    /// the current page.
    Open {
        page_no: usize,
        pending: VecDeque<Tuple>,
    },
    Closed,
}

/// Iterates every tuple of a heap file page by page. Pages are fetched
/// lazily and read-only through the buffer pool, so the scan holds a shared
/// lock on each page it has visited until its transaction ends.
#[derive(Debug)]
pub struct HeapFileScan {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    txn: TransactionId,
    state: ScanState,
}

impl HeapFileScan {
    pub fn new(file: Arc<HeapFile>, pool: Arc<BufferPool>, txn: TransactionId) -> Self {
        Self {
            file,
            pool,
            txn,
            state: ScanState::Unopened,
        }
    }
}

impl Executor for HeapFileScan {
    fn open(&mut self) -> DbResult<()> {
        self.state = ScanState::Open {
            page_no: 0,
            pending: VecDeque::new(),
        };
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        let ScanState::Open { page_no, pending } = &mut self.state else {
            return Ok(false);
        };

        while pending.is_empty() {
            if *page_no >= self.file.num_pages()? {
                return Ok(false);
            }
            let page_id = PageId::new(self.file.table_id(), *page_no);
            let page = self.pool.get_page(self.txn, page_id, Permission::ReadOnly)?;
            pending.extend(page.read().tuples().cloned());
            *page_no += 1;
        }
        Ok(true)
    }

    fn next(&mut self) -> DbResult<Tuple> {
        if !self.has_next()? {
            return Err(DbError::NoSuchElement);
        }
        match &mut self.state {
            ScanState::Open { pending, .. } => pending.pop_front().ok_or(DbError::NoSuchElement),
            _ => Err(DbError::NoSuchElement),
        }
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.open()
    }

    fn close(&mut self) {
        self.state = ScanState::Closed;
    }

    fn output_schema(&self) -> &SchemaDescriptor {
        self.file.schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::{Field, FieldType};
    use crate::catalog::Catalog;
    use crate::config::DatabaseConfig;
    use crate::storage::page::HeapPage;
    use anyhow::Result;
    use tempfile::{tempdir, TempDir};

    const PAGE_SIZE: usize = 128;

    fn setup(rows: i32) -> Result<(TempDir, Arc<HeapFile>, Arc<BufferPool>)> {
        let dir = tempdir()?;
        let schema = Arc::new(SchemaDescriptor::from_types(&[FieldType::Int]));
        let file = Arc::new(HeapFile::open(&dir.path().join("t.dat"), schema, PAGE_SIZE)?);

        let catalog = Arc::new(Catalog::new());
        catalog.add_table(Arc::clone(&file), "t", None);
        let config = DatabaseConfig::default()
            .with_page_size(PAGE_SIZE)
            .with_buffer_pool_pages(8);
        let pool = Arc::new(BufferPool::new(catalog, &config));

        let loader = TransactionId::new(100);
        for i in 0..rows {
            pool.insert_tuple(loader, file.table_id(), Tuple::new(vec![Field::Int(i)]))?;
        }
        pool.transaction_complete(loader, true)?;
        Ok((dir, file, pool))
    }

    fn drain(scan: &mut HeapFileScan) -> Result<Vec<i32>> {
        let mut values = Vec::new();
        while scan.has_next()? {
            values.push(scan.next()?.field(0).and_then(Field::as_int).expect("int"));
        }
        Ok(values)
    }

    #[test]
    fn test_scans_every_page_in_order() -> Result<()> {
        let rows = 3 * HeapPage::slots_per_page(PAGE_SIZE, 4) as i32 + 2;
        let (_dir, file, pool) = setup(rows)?;
        assert_eq!(file.num_pages()?, 4);

        let mut scan = file.scan(pool, TransactionId::new(1));
        scan.open()?;
        assert_eq!(drain(&mut scan)?, (0..rows).collect::<Vec<_>>());
        assert!(matches!(scan.next(), Err(DbError::NoSuchElement)));
        Ok(())
    }

    #[test]
    fn test_empty_table() -> Result<()> {
        let (_dir, file, pool) = setup(0)?;
        let mut scan = file.scan(pool, TransactionId::new(1));
        scan.open()?;
        assert!(!scan.has_next()?);
        Ok(())
    }

    #[test]
    fn test_unopened_and_closed_report_nothing() -> Result<()> {
        let (_dir, file, pool) = setup(5)?;
        let mut scan = file.scan(pool, TransactionId::new(1));
        assert!(!scan.has_next()?);

        scan.open()?;
        assert!(scan.has_next()?);
        scan.next()?;
        scan.close();
        assert!(!scan.has_next()?);
        assert!(matches!(scan.next(), Err(DbError::NoSuchElement)));
        Ok(())
    }

    #[test]
    fn test_rewind_restarts() -> Result<()> {
        let (_dir, file, pool) = setup(20)?;
        let mut scan = file.scan(pool, TransactionId::new(1));
        scan.open()?;
        for _ in 0..7 {
            scan.next()?;
        }
        scan.rewind()?;
        assert_eq!(drain(&mut scan)?.len(), 20);
        Ok(())
    }

    #[test]
    fn test_skips_empty_pages() -> Result<()> {
        let (_dir, file, pool) = setup(0)?;
        file.allocate_page()?;
        file.allocate_page()?;
        let last = file.allocate_page()?;
        let mut page = file.read_page(last)?;
        page.insert_tuple(Tuple::new(vec![Field::Int(42)]))?;
        file.write_page(&page)?;

        let mut scan = file.scan(pool, TransactionId::new(1));
        scan.open()?;
        assert_eq!(drain(&mut scan)?, vec![42]);
        Ok(())
    }

    #[test]
    fn test_scan_takes_shared_locks() -> Result<()> {
        let (_dir, file, pool) = setup(3)?;
        let txn = TransactionId::new(1);
        let mut scan = file.scan(Arc::clone(&pool), txn);
        scan.open()?;
        drain(&mut scan)?;
        assert!(pool.holds_lock(txn, PageId::new(file.table_id(), 0)));
        Ok(())
    }
}
