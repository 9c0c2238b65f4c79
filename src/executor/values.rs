//! In-memory tuple source.

use crate::access::schema::SchemaDescriptor;
use crate::access::tuple::Tuple;
use crate::error::{DbError, DbResult};
use crate::executor::Executor;

/// Executor that yields a fixed list of tuples.
#[derive(Debug)]
pub struct ValuesExecutor {
    schema: SchemaDescriptor,
    tuples: Vec<Tuple>,
    /// `None` until opened and after close.
    position: Option<usize>,
}

impl ValuesExecutor {
    /// Every tuple must match `schema`.
    pub fn new(schema: SchemaDescriptor, tuples: Vec<Tuple>) -> DbResult<Self> {
        for tuple in &tuples {
            schema.check(tuple)?;
        }
        Ok(Self {
            schema,
            tuples,
            position: None,
        })
    }

    fn position(&self) -> DbResult<usize> {
        self.position
            .ok_or_else(|| DbError::IllegalState("values not yet open".to_string()))
    }
}

impl Executor for ValuesExecutor {
    fn open(&mut self) -> DbResult<()> {
        self.position = Some(0);
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        Ok(self.position()? < self.tuples.len())
    }

    fn next(&mut self) -> DbResult<Tuple> {
        let position = self.position()?;
        let tuple = self.tuples.get(position).cloned().ok_or(DbError::NoSuchElement)?;
        self.position = Some(position + 1);
        Ok(tuple)
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.position()?;
        self.position = Some(0);
        Ok(())
    }

    fn close(&mut self) {
        self.position = None;
    }

    fn output_schema(&self) -> &SchemaDescriptor {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::{Field, FieldType};
    use anyhow::Result;

    fn ints(values: &[i32]) -> Vec<Tuple> {
        values.iter().map(|v| Tuple::new(vec![Field::Int(*v)])).collect()
    }

    #[test]
    fn test_yields_in_order() -> Result<()> {
        let schema = SchemaDescriptor::from_types(&[FieldType::Int]);
        let mut values = ValuesExecutor::new(schema, ints(&[3, 1, 2]))?;
        values.open()?;

        let mut seen = Vec::new();
        while values.has_next()? {
            seen.push(values.next()?.field(0).and_then(Field::as_int));
        }
        assert_eq!(seen, vec![Some(3), Some(1), Some(2)]);
        assert!(matches!(values.next(), Err(DbError::NoSuchElement)));

        values.rewind()?;
        assert!(values.has_next()?);
        Ok(())
    }

    #[test]
    fn test_rejects_mismatched_tuple() {
        let schema = SchemaDescriptor::from_types(&[FieldType::Int, FieldType::Int]);
        let result = ValuesExecutor::new(schema, ints(&[1]));
        assert!(matches!(result, Err(DbError::TypeMismatch(_))));
    }

    #[test]
    fn test_requires_open() -> Result<()> {
        let schema = SchemaDescriptor::from_types(&[FieldType::Int]);
        let mut values = ValuesExecutor::new(schema, ints(&[1]))?;
        assert!(matches!(values.has_next(), Err(DbError::IllegalState(_))));

        values.open()?;
        values.close();
        assert!(matches!(values.next(), Err(DbError::IllegalState(_))));
        Ok(())
    }
}
