//! Schema descriptors: the ordered list of typed, optionally named fields
//! that every tuple stream and every table carries.

use crate::access::tuple::Tuple;
use crate::access::value::FieldType;
use crate::error::{DbError, DbResult};
use std::fmt;

/// One entry of a [`SchemaDescriptor`].
#[derive(Debug, Clone)]
pub struct SchemaItem {
    pub field_type: FieldType,
    pub name: Option<String>,
}

impl SchemaItem {
    pub fn new(field_type: FieldType, name: Option<String>) -> Self {
        Self { field_type, name }
    }
}

impl fmt::Display for SchemaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})",
            self.field_type,
            self.name.as_deref().unwrap_or("null")
        )
    }
}

/// Immutable description of a tuple's shape.
///
/// Equality is structural: two descriptors are equal when they have the same
/// number of fields and the same type at every position. Names take no part
/// in the comparison.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    items: Vec<SchemaItem>,
}

impl SchemaDescriptor {
    pub fn new(items: Vec<SchemaItem>) -> Self {
        Self { items }
    }

    /// Descriptor with anonymous fields.
    pub fn from_types(types: &[FieldType]) -> Self {
        Self::new(types.iter().map(|t| SchemaItem::new(*t, None)).collect())
    }

    /// Descriptor with every field named.
    pub fn named(fields: &[(FieldType, &str)]) -> Self {
        Self::new(
            fields
                .iter()
                .map(|(t, name)| SchemaItem::new(*t, Some(name.to_string())))
                .collect(),
        )
    }

    /// Concatenate `first` and `second`, keeping field order.
    pub fn merge(first: &SchemaDescriptor, second: &SchemaDescriptor) -> Self {
        let mut items = Vec::with_capacity(first.num_fields() + second.num_fields());
        items.extend(first.items.iter().cloned());
        items.extend(second.items.iter().cloned());
        Self { items }
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, index: usize) -> DbResult<FieldType> {
        self.item(index).map(|item| item.field_type)
    }

    pub fn field_name(&self, index: usize) -> DbResult<Option<&str>> {
        self.item(index).map(|item| item.name.as_deref())
    }

    /// Index of the first field called `name`.
    pub fn index_of(&self, name: &str) -> DbResult<usize> {
        self.items
            .iter()
            .position(|item| item.name.as_deref() == Some(name))
            .ok_or_else(|| DbError::NotFound(format!("No field named '{}'", name)))
    }

    /// Size in bytes of a tuple with this shape.
    pub fn byte_size(&self) -> usize {
        self.items.iter().map(|item| item.field_type.byte_len()).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SchemaItem> {
        self.items.iter()
    }

    pub fn types(&self) -> impl Iterator<Item = FieldType> + '_ {
        self.items.iter().map(|item| item.field_type)
    }

    /// Check that `tuple` has exactly this shape.
    pub fn check(&self, tuple: &Tuple) -> DbResult<()> {
        if tuple.fields().len() != self.num_fields() {
            return Err(DbError::TypeMismatch(format!(
                "tuple has {} fields but schema has {}",
                tuple.fields().len(),
                self.num_fields()
            )));
        }
        for (i, (field, expected)) in tuple.fields().iter().zip(self.types()).enumerate() {
            if field.field_type() != expected {
                return Err(DbError::TypeMismatch(format!(
                    "field {} is {} but schema expects {}",
                    i,
                    field.field_type(),
                    expected
                )));
            }
        }
        Ok(())
    }

    fn item(&self, index: usize) -> DbResult<&SchemaItem> {
        self.items.get(index).ok_or_else(|| {
            DbError::InvalidArgument(format!(
                "Field index {} out of range ({} fields)",
                index,
                self.items.len()
            ))
        })
    }
}

impl PartialEq for SchemaDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.num_fields() == other.num_fields() && self.types().eq(other.types())
    }
}

impl Eq for SchemaDescriptor {}

impl fmt::Display for SchemaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SchemaDescriptor {
    type Item = &'a SchemaItem;
    type IntoIter = std::slice::Iter<'a, SchemaItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
