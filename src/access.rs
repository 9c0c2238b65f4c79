//! Access layer for tuple-oriented operations.
//!
//! - **SchemaDescriptor**: the ordered, typed shape of a tuple
//! - **Tuple**: a row of fields, with a record id once stored
//! - **HeapFile**: a table stored as a sequence of fixed-size pages
//! - **HeapFileScan**: lazy page-by-page scan through the buffer pool

pub mod heap;
pub mod scan;
pub mod schema;
pub mod tuple;
pub mod value;

pub use heap::HeapFile;
pub use scan::HeapFileScan;
pub use schema::{SchemaDescriptor, SchemaItem};
pub use tuple::{RecordId, Tuple};
pub use value::{Field, FieldType};
