//! Executor layer for query execution.
//!
//! Every operator implements the pull-based [`Executor`] protocol: a parent's
//! `next()` synchronously drives its children's `next()` until a tuple is
//! produced or the stream ends. Operators are composed into trees and share
//! the transaction, catalog and buffer pool through an [`ExecutionContext`].

use crate::access::schema::SchemaDescriptor;
use crate::access::tuple::Tuple;
use crate::catalog::Catalog;
use crate::error::{DbError, DbResult};
use crate::storage::buffer::BufferPool;
use crate::transaction::TransactionId;
use std::sync::Arc;

pub mod aggregate;
pub mod delete;
pub mod insert;
pub mod seq_scan;
pub mod values;

pub use aggregate::{AggregateExecutor, AggregateOp, Aggregator};
pub use delete::DeleteExecutor;
pub use insert::InsertExecutor;
pub use seq_scan::SeqScanExecutor;
pub use values::ValuesExecutor;

/// Trait for all query executors
pub trait Executor: Send {
    /// Start (or restart) the stream. Must be called before `has_next()`.
    fn open(&mut self) -> DbResult<()>;

    /// Whether another tuple is available. May pull from children.
    fn has_next(&mut self) -> DbResult<bool>;

    /// Return the next tuple, or `NoSuchElement` if the stream is drained.
    fn next(&mut self) -> DbResult<Tuple>;

    /// Restart the stream from the beginning.
    fn rewind(&mut self) -> DbResult<()>;

    fn close(&mut self);

    fn output_schema(&self) -> &SchemaDescriptor;

    /// `next()` folded into an option: `None` marks the end of the stream.
    fn next_tuple(&mut self) -> DbResult<Option<Tuple>> {
        if self.has_next()? {
            self.next().map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Execution context containing shared resources
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub txn: TransactionId,
    pub catalog: Arc<Catalog>,
    pub buffer_pool: Arc<BufferPool>,
}

impl ExecutionContext {
    pub fn new(txn: TransactionId, catalog: Arc<Catalog>, buffer_pool: Arc<BufferPool>) -> Self {
        Self {
            txn,
            catalog,
            buffer_pool,
        }
    }
}

/// One-tuple read-ahead buffer for operators that produce results through
/// [`Operator::fetch_next`].
#[derive(Debug, Default)]
pub struct Lookahead {
    open: bool,
    next: Option<Tuple>,
}

impl Lookahead {
    pub fn open(&mut self) {
        self.open = true;
        self.next = None;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.next = None;
    }

    /// Forget a buffered tuple, keeping the open state.
    pub fn clear(&mut self) {
        self.next = None;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

/// Operators that compute one tuple at a time. Supplies `has_next`/`next`
/// on top of `fetch_next`, buffering a single tuple.
pub trait Operator {
    /// Produce the next result tuple, or `None` at the end of the stream.
    fn fetch_next(&mut self) -> DbResult<Option<Tuple>>;

    fn lookahead(&mut self) -> &mut Lookahead;

    fn buffered_has_next(&mut self) -> DbResult<bool> {
        if !self.lookahead().is_open() {
            return Err(DbError::IllegalState("operator not yet open".to_string()));
        }
        if self.lookahead().next.is_none() {
            let fetched = self.fetch_next()?;
            self.lookahead().next = fetched;
        }
        Ok(self.lookahead().next.is_some())
    }

    fn buffered_next(&mut self) -> DbResult<Tuple> {
        if !self.buffered_has_next()? {
            return Err(DbError::NoSuchElement);
        }
        self.lookahead().next.take().ok_or(DbError::NoSuchElement)
    }
}

/// Open `executor`, drain it and close it again.
pub fn collect_all(executor: &mut dyn Executor) -> DbResult<Vec<Tuple>> {
    executor.open()?;
    let mut tuples = Vec::new();
    let result = loop {
        match executor.next_tuple() {
            Ok(Some(tuple)) => tuples.push(tuple),
            Ok(None) => break Ok(tuples),
            Err(e) => break Err(e),
        }
    };
    executor.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::{Field, FieldType};
    use anyhow::Result;

    struct Countdown {
        remaining: i32,
        lookahead: Lookahead,
        schema: SchemaDescriptor,
    }

    impl Operator for Countdown {
        fn fetch_next(&mut self) -> DbResult<Option<Tuple>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(Tuple::new(vec![Field::Int(self.remaining)])))
        }

        fn lookahead(&mut self) -> &mut Lookahead {
            &mut self.lookahead
        }
    }

    impl Executor for Countdown {
        fn open(&mut self) -> DbResult<()> {
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
            self.lookahead.clear();
            Ok(())
        }

        fn close(&mut self) {
            self.lookahead.close();
        }

        fn output_schema(&self) -> &SchemaDescriptor {
            &self.schema
        }
    }

    fn countdown(n: i32) -> Countdown {
        Countdown {
            remaining: n,
            lookahead: Lookahead::default(),
            schema: SchemaDescriptor::from_types(&[FieldType::Int]),
        }
    }

    #[test]
    fn test_unopened_operator_is_illegal_state() {
        let mut op = countdown(3);
        assert!(matches!(op.has_next(), Err(DbError::IllegalState(_))));
        assert!(matches!(op.next(), Err(DbError::IllegalState(_))));
    }

    #[test]
    fn test_has_next_is_idempotent() -> Result<()> {
        let mut op = countdown(2);
        op.open()?;
        assert!(op.has_next()?);
        assert!(op.has_next()?);
        assert_eq!(op.next()?.fields(), &[Field::Int(1)]);
        assert_eq!(op.next()?.fields(), &[Field::Int(0)]);
        assert!(!op.has_next()?);
        assert!(matches!(op.next(), Err(DbError::NoSuchElement)));
        Ok(())
    }

    #[test]
    fn test_collect_all_closes() -> Result<()> {
        let mut op = countdown(4);
        let tuples = collect_all(&mut op)?;
        assert_eq!(tuples.len(), 4);
        assert!(!op.lookahead.is_open());
        Ok(())
    }
}
