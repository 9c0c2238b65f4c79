use crate::access::heap::HeapFile;
use crate::access::schema::SchemaDescriptor;
use crate::catalog::{Catalog, TableId};
use crate::config::DatabaseConfig;
use crate::error::DbResult;
use crate::executor::ExecutionContext;
use crate::storage::buffer::BufferPool;
use crate::transaction::{TransactionId, TransactionIdGenerator};
use log::debug;
use std::path::Path;
use std::sync::Arc;

/// High-level database interface that integrates all layers
#[derive(Debug)]
pub struct Database {
    config: DatabaseConfig,
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
    txn_ids: TransactionIdGenerator,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> DbResult<Self> {
        config.validate()?;

        let catalog = Arc::new(Catalog::new());
        let buffer_pool = Arc::new(BufferPool::new(Arc::clone(&catalog), &config));

        Ok(Self {
            config,
            catalog,
            buffer_pool,
            txn_ids: TransactionIdGenerator::new(),
        })
    }

    /// Open the heap file at `path` (creating it if missing) and register it
    /// as `name`.
    pub fn add_table(&self, path: &Path, schema: SchemaDescriptor, name: &str) -> DbResult<TableId> {
        self.add_table_with_key(path, schema, name, None)
    }

    pub fn add_table_with_key(
        &self,
        path: &Path,
        schema: SchemaDescriptor,
        name: &str,
        primary_key: Option<&str>,
    ) -> DbResult<TableId> {
        if let Some(key) = primary_key {
            schema.index_of(key)?;
        }
        let file = HeapFile::open(path, Arc::new(schema), self.config.page_size)?;
        Ok(self.catalog.add_table(Arc::new(file), name, primary_key))
    }

    pub fn begin(&self) -> TransactionId {
        let txn = self.txn_ids.next_id();
        debug!("{} started", txn);
        txn
    }

    /// Context for building operator trees that run on behalf of `txn`.
    pub fn context(&self, txn: TransactionId) -> ExecutionContext {
        ExecutionContext::new(txn, Arc::clone(&self.catalog), Arc::clone(&self.buffer_pool))
    }

    pub fn commit(&self, txn: TransactionId) -> DbResult<()> {
        self.buffer_pool.transaction_complete(txn, true)
    }

    pub fn abort(&self, txn: TransactionId) -> DbResult<()> {
        self.buffer_pool.transaction_complete(txn, false)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}
