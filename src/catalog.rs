//! In-memory registry of open tables.
//!
//! Maps a [`TableId`] to its backing [`HeapFile`], name and optional primary
//! key. Nothing here is persisted; a process registers its tables on startup.

use crate::access::heap::HeapFile;
use crate::access::schema::SchemaDescriptor;
use crate::error::{DbError, DbResult};
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Stable identity of a table, derived from its backing file's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct TableInfo {
    pub table_id: TableId,
    pub table_name: String,
    pub primary_key: Option<String>,
    pub file: Arc<HeapFile>,
}

#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<HashMap<TableId, TableInfo>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file` under `name`. A table already registered with the
    /// same name or the same id is replaced.
    pub fn add_table(
        &self,
        file: Arc<HeapFile>,
        name: &str,
        primary_key: Option<&str>,
    ) -> TableId {
        let table_id = file.table_id();
        let mut tables = self.tables.write();

        tables.retain(|id, info| *id == table_id || info.table_name != name);
        tables.insert(
            table_id,
            TableInfo {
                table_id,
                table_name: name.to_string(),
                primary_key: primary_key.map(str::to_string),
                file,
            },
        );

        debug!("Registered table '{}' as {}", name, table_id);
        table_id
    }

    pub fn table_id(&self, name: &str) -> DbResult<TableId> {
        self.tables
            .read()
            .values()
            .find(|info| info.table_name == name)
            .map(|info| info.table_id)
            .ok_or_else(|| DbError::NoSuchTable(name.to_string()))
    }

    pub fn table_info(&self, table_id: TableId) -> DbResult<TableInfo> {
        self.tables
            .read()
            .get(&table_id)
            .cloned()
            .ok_or_else(|| DbError::NoSuchTable(format!("id {}", table_id)))
    }

    pub fn schema(&self, table_id: TableId) -> DbResult<Arc<SchemaDescriptor>> {
        Ok(Arc::clone(self.table_info(table_id)?.file.schema()))
    }

    pub fn heap_file(&self, table_id: TableId) -> DbResult<Arc<HeapFile>> {
        Ok(self.table_info(table_id)?.file)
    }

    pub fn table_name(&self, table_id: TableId) -> DbResult<String> {
        Ok(self.table_info(table_id)?.table_name)
    }

    pub fn primary_key(&self, table_id: TableId) -> DbResult<Option<String>> {
        Ok(self.table_info(table_id)?.primary_key)
    }

    /// Ids of every registered table, in ascending order.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.tables.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn clear(&self) {
        self.tables.write().clear();
    }
}
