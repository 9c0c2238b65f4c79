//! Sequential scan executor implementation.

use crate::access::scan::HeapFileScan;
use crate::access::schema::{SchemaDescriptor, SchemaItem};
use crate::access::tuple::Tuple;
use crate::catalog::TableId;
use crate::error::DbResult;
use crate::executor::{ExecutionContext, Executor};

/// Leaf executor reading every tuple of one table.
///
/// Output field names are qualified as `alias.field` so that tables sharing
/// field names can be told apart once joined. A missing alias or field name
/// is rendered as `null`.
#[derive(Debug)]
pub struct SeqScanExecutor {
    context: ExecutionContext,
    table_id: TableId,
    table_alias: Option<String>,
    scan: HeapFileScan,
    output_schema: SchemaDescriptor,
}

impl SeqScanExecutor {
    pub fn new(
        context: ExecutionContext,
        table_id: TableId,
        table_alias: Option<&str>,
    ) -> DbResult<Self> {
        let (scan, output_schema) = Self::bind(&context, table_id, table_alias)?;
        Ok(Self {
            context,
            table_id,
            table_alias: table_alias.map(str::to_string),
            scan,
            output_schema,
        })
    }

    /// Scan aliased with the table's catalog name.
    pub fn with_table_name(context: ExecutionContext, table_id: TableId) -> DbResult<Self> {
        let name = context.catalog.table_name(table_id)?;
        Self::new(context, table_id, Some(&name))
    }

    /// Rebind to another table and alias. The scan must be opened again.
    pub fn reset(&mut self, table_id: TableId, table_alias: Option<&str>) -> DbResult<()> {
        let (scan, output_schema) = Self::bind(&self.context, table_id, table_alias)?;
        self.scan.close();
        self.scan = scan;
        self.output_schema = output_schema;
        self.table_id = table_id;
        self.table_alias = table_alias.map(str::to_string);
        Ok(())
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn table_name(&self) -> DbResult<String> {
        self.context.catalog.table_name(self.table_id)
    }

    pub fn alias(&self) -> Option<&str> {
        self.table_alias.as_deref()
    }

    fn bind(
        context: &ExecutionContext,
        table_id: TableId,
        table_alias: Option<&str>,
    ) -> DbResult<(HeapFileScan, SchemaDescriptor)> {
        let file = context.catalog.heap_file(table_id)?;
        let prefix = table_alias.unwrap_or("null");
        let output_schema = SchemaDescriptor::new(
            file.schema()
                .iter()
                .map(|item| {
                    let name = item.name.as_deref().unwrap_or("null");
                    SchemaItem::new(item.field_type, Some(format!("{}.{}", prefix, name)))
                })
                .collect(),
        );
        let scan = file.scan(context.buffer_pool.clone(), context.txn);
        Ok((scan, output_schema))
    }
}

impl Executor for SeqScanExecutor {
    fn open(&mut self) -> DbResult<()> {
        self.scan.open()
    }

    fn has_next(&mut self) -> DbResult<bool> {
        self.scan.has_next()
    }

    fn next(&mut self) -> DbResult<Tuple> {
        self.scan.next()
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.scan.rewind()
    }

    fn close(&mut self) {
        self.scan.close();
    }

    fn output_schema(&self) -> &SchemaDescriptor {
        &self.output_schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::{Field, FieldType};
    use crate::config::DatabaseConfig;
    use crate::database::Database;
    use crate::error::DbError;
    use crate::executor::collect_all;
    use anyhow::Result;
    use tempfile::tempdir;

    fn user(id: i32, name: &str) -> Tuple {
        Tuple::new(vec![Field::Int(id), Field::Str(name.to_string())])
    }

    fn names(schema: &SchemaDescriptor) -> Vec<String> {
        schema
            .iter()
            .map(|item| item.name.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_seq_scan_empty_table() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::new(DatabaseConfig::default())?;
        let schema = SchemaDescriptor::named(&[(FieldType::Int, "id"), (FieldType::Str, "name")]);
        let table = db.add_table(&dir.path().join("users.dat"), schema, "users")?;

        let mut scan = SeqScanExecutor::new(db.context(db.begin()), table, Some("u"))?;
        scan.open()?;
        assert!(!scan.has_next()?);
        Ok(())
    }

    #[test]
    fn test_seq_scan_with_data() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::new(DatabaseConfig::default())?;
        let schema = SchemaDescriptor::named(&[(FieldType::Int, "id"), (FieldType::Str, "name")]);
        let table = db.add_table(&dir.path().join("users.dat"), schema, "users")?;

        let txn = db.begin();
        for (id, name) in [(1, "Alice"), (2, "Bob"), (3, "Charlie")] {
            db.buffer_pool().insert_tuple(txn, table, user(id, name))?;
        }

        let mut scan = SeqScanExecutor::new(db.context(txn), table, Some("u"))?;
        let tuples = collect_all(&mut scan)?;
        assert_eq!(tuples.len(), 3);
        assert_eq!(tuples[1].fields(), user(2, "Bob").fields());
        assert!(tuples.iter().all(|t| t.record_id().is_some()));
        Ok(())
    }

    #[test]
    fn test_alias_qualifies_field_names() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::new(DatabaseConfig::default())?;
        let schema = SchemaDescriptor::named(&[(FieldType::Int, "id"), (FieldType::Str, "name")]);
        let table = db.add_table(&dir.path().join("users.dat"), schema, "users")?;
        let ctx = db.context(db.begin());

        let scan = SeqScanExecutor::new(ctx.clone(), table, Some("t"))?;
        assert_eq!(names(scan.output_schema()), vec!["t.id", "t.name"]);
        assert_eq!(scan.alias(), Some("t"));
        assert_eq!(scan.table_name()?, "users");

        let unaliased = SeqScanExecutor::new(ctx.clone(), table, None)?;
        assert_eq!(names(unaliased.output_schema()), vec!["null.id", "null.name"]);

        let by_name = SeqScanExecutor::with_table_name(ctx, table)?;
        assert_eq!(names(by_name.output_schema()), vec!["users.id", "users.name"]);
        Ok(())
    }

    #[test]
    fn test_unnamed_fields_render_null() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::new(DatabaseConfig::default())?;
        let schema = SchemaDescriptor::from_types(&[FieldType::Int]);
        let table = db.add_table(&dir.path().join("t.dat"), schema, "t")?;

        let scan = SeqScanExecutor::new(db.context(db.begin()), table, Some("a"))?;
        assert_eq!(names(scan.output_schema()), vec!["a.null"]);
        Ok(())
    }

    #[test]
    fn test_reset_rebinds() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::new(DatabaseConfig::default())?;
        let first = db.add_table(
            &dir.path().join("a.dat"),
            SchemaDescriptor::named(&[(FieldType::Int, "x")]),
            "a",
        )?;
        let second = db.add_table(
            &dir.path().join("b.dat"),
            SchemaDescriptor::named(&[(FieldType::Int, "y"), (FieldType::Int, "z")]),
            "b",
        )?;

        let txn = db.begin();
        db.buffer_pool()
            .insert_tuple(txn, second, Tuple::new(vec![Field::Int(1), Field::Int(2)]))?;

        let mut scan = SeqScanExecutor::new(db.context(txn), first, Some("p"))?;
        assert!(collect_all(&mut scan)?.is_empty());

        scan.reset(second, Some("q"))?;
        assert_eq!(scan.table_id(), second);
        assert_eq!(names(scan.output_schema()), vec!["q.y", "q.z"]);
        assert_eq!(collect_all(&mut scan)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_unknown_table() -> Result<()> {
        let db = Database::new(DatabaseConfig::default())?;
        let result = SeqScanExecutor::new(db.context(db.begin()), TableId(12345), None);
        assert!(matches!(result, Err(DbError::NoSuchTable(_))));
        Ok(())
    }
}
