//! Grouped aggregation.
//!
//! [`Aggregator`] keeps running per-group accumulators that tuples are merged
//! into one at a time; its iterator materializes one result row per group.
//! [`AggregateExecutor`] wraps it as an operator over a child stream.
//!
//! Supported functions are COUNT, SUM, AVG, MIN and MAX over integer fields;
//! string fields may only be counted. AVG keeps an exact running sum and a
//! count and divides (truncating) only when rows are materialized.

use crate::access::schema::{SchemaDescriptor, SchemaItem};
use crate::access::tuple::Tuple;
use crate::access::value::{Field, FieldType};
use crate::error::{DbError, DbResult};
use crate::executor::Executor;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Supported aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl AggregateOp {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Count => "COUNT",
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregateOp {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "min" => Ok(AggregateOp::Min),
            "max" => Ok(AggregateOp::Max),
            "sum" => Ok(AggregateOp::Sum),
            "avg" => Ok(AggregateOp::Avg),
            "count" => Ok(AggregateOp::Count),
            other => Err(DbError::InvalidArgument(format!(
                "unknown aggregate operator '{}'",
                other
            ))),
        }
    }
}

/// Group key; `None` is the single group of an ungrouped aggregate.
type GroupKey = Option<Field>;

#[derive(Debug, Default)]
struct GroupState {
    values: HashMap<GroupKey, i64>,
    /// Occurrences per group, kept for AVG only.
    counts: HashMap<GroupKey, i64>,
}

/// Running aggregate over a stream of tuples.
#[derive(Debug)]
pub struct Aggregator {
    group_by: Option<(usize, FieldType)>,
    agg_field: usize,
    op: AggregateOp,
    state: Arc<Mutex<GroupState>>,
}

impl Aggregator {
    /// `group_by` is the index and type of the grouping field, or `None` to
    /// aggregate every tuple into a single group.
    pub fn new(group_by: Option<(usize, FieldType)>, agg_field: usize, op: AggregateOp) -> Self {
        Self {
            group_by,
            agg_field,
            op,
            state: Arc::new(Mutex::new(GroupState::default())),
        }
    }

    pub fn op(&self) -> AggregateOp {
        self.op
    }

    /// Fold `tuple` into the accumulator of its group.
    pub fn merge_tuple_into_group(&self, tuple: &Tuple) -> DbResult<()> {
        let key = match self.group_by {
            Some((index, field_type)) => {
                let field = tuple.field(index).ok_or_else(|| {
                    DbError::InvalidArgument(format!("tuple has no group field {}", index))
                })?;
                if field.field_type() != field_type {
                    return Err(DbError::TypeMismatch(format!(
                        "group field is {} but {} was declared",
                        field.field_type(),
                        field_type
                    )));
                }
                Some(field.clone())
            }
            None => None,
        };

        let mut state = self.state.lock();
        match self.op {
            AggregateOp::Count => *state.values.entry(key).or_insert(0) += 1,
            AggregateOp::Min => {
                let value = self.aggregate_value(tuple)?;
                let current = state.values.entry(key).or_insert(value);
                *current = (*current).min(value);
            }
            AggregateOp::Max => {
                let value = self.aggregate_value(tuple)?;
                let current = state.values.entry(key).or_insert(value);
                *current = (*current).max(value);
            }
            AggregateOp::Sum => {
                let value = self.aggregate_value(tuple)?;
                *state.values.entry(key).or_insert(0) += value;
            }
            AggregateOp::Avg => {
                let value = self.aggregate_value(tuple)?;
                *state.values.entry(key.clone()).or_insert(0) += value;
                *state.counts.entry(key).or_insert(0) += 1;
            }
        }
        Ok(())
    }

    fn aggregate_value(&self, tuple: &Tuple) -> DbResult<i64> {
        tuple
            .field(self.agg_field)
            .ok_or_else(|| {
                DbError::InvalidArgument(format!("tuple has no aggregate field {}", self.agg_field))
            })?
            .as_int()
            .map(i64::from)
            .ok_or_else(|| DbError::TypeMismatch(format!("{} needs an integer field", self.op)))
    }

    /// Shape of the rows produced by [`Aggregator::iterator`]:
    /// `(group, aggregate)` when grouping, `(aggregate)` otherwise.
    pub fn result_schema(&self) -> SchemaDescriptor {
        match self.group_by {
            Some((_, group_type)) => SchemaDescriptor::from_types(&[group_type, FieldType::Int]),
            None => SchemaDescriptor::from_types(&[FieldType::Int]),
        }
    }

    /// Iterator over one row per group. Rows are computed when the iterator
    /// is opened; merges made afterwards show up only after it is reopened.
    pub fn iterator(&self) -> AggregateIterator {
        AggregateIterator {
            state: Arc::clone(&self.state),
            op: self.op,
            schema: self.result_schema(),
            cursor: AggregateCursor::Closed,
        }
    }
}

#[derive(Debug)]
enum AggregateCursor {
    Closed,
    Open { rows: Vec<Tuple>, position: usize },
}

/// Result stream of an [`Aggregator`]. Row order across groups is
/// unspecified.
#[derive(Debug)]
pub struct AggregateIterator {
    state: Arc<Mutex<GroupState>>,
    op: AggregateOp,
    schema: SchemaDescriptor,
    cursor: AggregateCursor,
}

impl AggregateIterator {
    fn materialize(&self) -> DbResult<Vec<Tuple>> {
        let state = self.state.lock();
        let mut rows = Vec::with_capacity(state.values.len());

        for (key, value) in &state.values {
            let aggregate = match self.op {
                AggregateOp::Avg => {
                    let count = state.counts.get(key).copied().unwrap_or(1);
                    value / count
                }
                _ => *value,
            };
            let aggregate = i32::try_from(aggregate).map_err(|_| {
                DbError::Overflow(format!("{} result {} does not fit in INT", self.op, aggregate))
            })?;

            let fields = match key {
                Some(group) => vec![group.clone(), Field::Int(aggregate)],
                None => vec![Field::Int(aggregate)],
            };
            rows.push(Tuple::new(fields));
        }
        Ok(rows)
    }

    fn not_open() -> DbError {
        DbError::IllegalState("aggregate iterator not open".to_string())
    }
}

impl Executor for AggregateIterator {
    fn open(&mut self) -> DbResult<()> {
        let rows = self.materialize()?;
        self.cursor = AggregateCursor::Open { rows, position: 0 };
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        match &self.cursor {
            AggregateCursor::Open { rows, position } => Ok(*position < rows.len()),
            AggregateCursor::Closed => Err(Self::not_open()),
        }
    }

    fn next(&mut self) -> DbResult<Tuple> {
        match &mut self.cursor {
            AggregateCursor::Open { rows, position } => {
                let row = rows.get(*position).cloned().ok_or(DbError::NoSuchElement)?;
                *position += 1;
                Ok(row)
            }
            AggregateCursor::Closed => Err(Self::not_open()),
        }
    }

    /// Replays the rows computed at open time.
    fn rewind(&mut self) -> DbResult<()> {
        match &mut self.cursor {
            AggregateCursor::Open { position, .. } => {
                *position = 0;
                Ok(())
            }
            AggregateCursor::Closed => Err(Self::not_open()),
        }
    }

    fn close(&mut self) {
        self.cursor = AggregateCursor::Closed;
    }

    fn output_schema(&self) -> &SchemaDescriptor {
        &self.schema
    }
}

/// Operator computing one aggregate, optionally grouped by one field.
///
/// Output fields are named after the child's: the group field keeps its
/// name and the aggregate is named `OP(field)`.
pub struct AggregateExecutor {
    child: Box<dyn Executor>,
    agg_field: usize,
    group_by: Option<usize>,
    op: AggregateOp,
    output_schema: SchemaDescriptor,
    results: Option<AggregateIterator>,
}

impl AggregateExecutor {
    pub fn new(
        child: Box<dyn Executor>,
        agg_field: usize,
        group_by: Option<usize>,
        op: AggregateOp,
    ) -> DbResult<Self> {
        let input = child.output_schema();
        let agg_type = input.field_type(agg_field)?;
        if agg_type == FieldType::Str && op != AggregateOp::Count {
            return Err(DbError::TypeMismatch(format!(
                "{} is not supported on STRING fields",
                op
            )));
        }

        let agg_name = format!("{}({})", op, input.field_name(agg_field)?.unwrap_or("null"));
        let mut items = Vec::with_capacity(2);
        if let Some(index) = group_by {
            let name = input.field_name(index)?.map(str::to_string);
            items.push(SchemaItem::new(input.field_type(index)?, name));
        }
        items.push(SchemaItem::new(FieldType::Int, Some(agg_name)));

        Ok(Self {
            child,
            agg_field,
            group_by,
            op,
            output_schema: SchemaDescriptor::new(items),
            results: None,
        })
    }

    pub fn op(&self) -> AggregateOp {
        self.op
    }

    pub fn group_field(&self) -> Option<usize> {
        self.group_by
    }

    pub fn group_field_name(&self) -> Option<&str> {
        self.group_by
            .and_then(|_| self.output_schema.field_name(0).ok().flatten())
    }

    pub fn aggregate_field(&self) -> usize {
        self.agg_field
    }

    fn results(&mut self) -> DbResult<&mut AggregateIterator> {
        self.results
            .as_mut()
            .ok_or_else(|| DbError::IllegalState("aggregate not yet open".to_string()))
    }
}

impl Executor for AggregateExecutor {
    fn open(&mut self) -> DbResult<()> {
        let group_by = match self.group_by {
            Some(index) => Some((index, self.child.output_schema().field_type(index)?)),
            None => None,
        };
        let aggregator = Aggregator::new(group_by, self.agg_field, self.op);

        self.child.open()?;
        let mut merged = 0usize;
        while let Some(tuple) = self.child.next_tuple()? {
            aggregator.merge_tuple_into_group(&tuple)?;
            merged += 1;
        }

        let mut results = aggregator.iterator();
        results.open()?;
        debug!("{} merged {} tuples", self.op, merged);
        self.results = Some(results);
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        self.results()?.has_next()
    }

    fn next(&mut self) -> DbResult<Tuple> {
        self.results()?.next()
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.results()?.rewind()
    }

    fn close(&mut self) {
        self.child.close();
        if let Some(results) = self.results.as_mut() {
            results.close();
        }
        self.results = None;
    }

    fn output_schema(&self) -> &SchemaDescriptor {
        &self.output_schema
    }
}
