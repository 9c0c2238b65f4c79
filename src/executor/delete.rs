//! Delete executor implementation.

use crate::access::schema::SchemaDescriptor;
use crate::access::tuple::Tuple;
use crate::access::value::{Field, FieldType};
use crate::error::{DbError, DbResult};
use crate::executor::{ExecutionContext, Executor, Lookahead, Operator};
use log::debug;

/// Deletes every tuple its child produces, using each tuple's record id to
/// locate it. Produces a single tuple holding the number of deleted rows.
pub struct DeleteExecutor {
    context: ExecutionContext,
    child: Box<dyn Executor>,
    output_schema: SchemaDescriptor,
    deleted: bool,
    lookahead: Lookahead,
}

impl DeleteExecutor {
    pub fn new(context: ExecutionContext, child: Box<dyn Executor>) -> Self {
        Self {
            context,
            child,
            output_schema: SchemaDescriptor::named(&[(FieldType::Int, "count")]),
            deleted: false,
            lookahead: Lookahead::default(),
        }
    }
}

impl Operator for DeleteExecutor {
    fn fetch_next(&mut self) -> DbResult<Option<Tuple>> {
        if self.deleted {
            return Ok(None);
        }
        self.deleted = true;

        let mut count: i32 = 0;
        while let Some(tuple) = self.child.next_tuple()? {
            self.context
                .buffer_pool
                .delete_tuple(self.context.txn, &tuple)?;
            count = count
                .checked_add(1)
                .ok_or_else(|| DbError::Overflow("delete count".to_string()))?;
        }

        debug!("{} deleted {} tuples", self.context.txn, count);
        Ok(Some(Tuple::new(vec![Field::Int(count)])))
    }

    fn lookahead(&mut self) -> &mut Lookahead {
        &mut self.lookahead
    }
}

impl Executor for DeleteExecutor {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        self.deleted = false;
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
        self.deleted = false;
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
