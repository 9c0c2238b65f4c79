//! Insert executor implementation.

use crate::access::schema::SchemaDescriptor;
use crate::access::tuple::Tuple;
use crate::access::value::{Field, FieldType};
use crate::catalog::TableId;
use crate::error::{DbError, DbResult};
use crate::executor::{ExecutionContext, Executor, Lookahead, Operator};
use log::debug;

/// Inserts every tuple of its child into a table and reports how many were
/// inserted, as a single one-field tuple.
///
/// The insertion pass runs once per open/rewind cycle: after the count tuple
/// has been produced the stream is exhausted until `rewind()`.
pub struct InsertExecutor {
    context: ExecutionContext,
    child: Box<dyn Executor>,
    table_id: TableId,
    output_schema: SchemaDescriptor,
    inserted: bool,
    lookahead: Lookahead,
}

impl InsertExecutor {
    /// Fails with `SchemaMismatch` if the child's tuples do not have the
    /// table's shape.
    pub fn new(
        context: ExecutionContext,
        child: Box<dyn Executor>,
        table_id: TableId,
    ) -> DbResult<Self> {
        let table_schema = context.catalog.schema(table_id)?;
        if *table_schema != *child.output_schema() {
            return Err(DbError::SchemaMismatch {
                expected: table_schema.to_string(),
                found: child.output_schema().to_string(),
            });
        }

        Ok(Self {
            context,
            child,
            table_id,
            output_schema: SchemaDescriptor::named(&[(FieldType::Int, "count")]),
            inserted: false,
            lookahead: Lookahead::default(),
        })
    }
}

impl Operator for InsertExecutor {
    fn fetch_next(&mut self) -> DbResult<Option<Tuple>> {
        if self.inserted {
            return Ok(None);
        }
        self.inserted = true;

        let mut count: i32 = 0;
        while let Some(tuple) = self.child.next_tuple()? {
            self.context
                .buffer_pool
                .insert_tuple(self.context.txn, self.table_id, tuple)?;
            count = count
                .checked_add(1)
                .ok_or_else(|| DbError::Overflow("insert count".to_string()))?;
        }

        debug!(
            "{} inserted {} tuples into table {}",
            self.context.txn, count, self.table_id
        );
        Ok(Some(Tuple::new(vec![Field::Int(count)])))
    }

    fn lookahead(&mut self) -> &mut Lookahead {
        &mut self.lookahead
    }
}

impl Executor for InsertExecutor {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        self.inserted = false;
        self.lookahead.open();
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        self.buffered_has_next()
    }

    fn next(&mut self) -> DbResult<Tuple> {
        self.buffered_next()
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.child.rewind()?;
        self.inserted = false;
        self.lookahead.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.lookahead.close();
    }

    fn output_schema(&self) -> &SchemaDescriptor {
        &self.output_schema
    }
}
