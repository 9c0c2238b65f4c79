use crate::error::{DbError, DbResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Maximum number of payload bytes stored for a string field.
pub const STRING_LEN: usize = 128;

/// Field types supported by the storage layer. Every type has a fixed width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Str,
}

impl FieldType {
    /// Number of bytes a field of this type occupies on a page.
    pub fn byte_len(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Str => 4 + STRING_LEN,
        }
    }

    /// Decode one field of this type from `reader`.
    pub fn parse_field<R: Read>(&self, reader: &mut R) -> DbResult<Field> {
        match self {
            FieldType::Int => Ok(Field::Int(reader.read_i32::<BigEndian>()?)),
            FieldType::Str => {
                let declared = reader.read_u32::<BigEndian>()? as usize;
                let mut buf = [0u8; STRING_LEN];
                reader.read_exact(&mut buf)?;
                let len = declared.min(STRING_LEN);
                Ok(Field::Str(String::from_utf8_lossy(&buf[..len]).into_owned()))
            }
        }
    }

    /// Parse a textual literal (as typed on the command line) into a field.
    pub fn parse_literal(&self, literal: &str) -> DbResult<Field> {
        match self {
            FieldType::Int => literal
                .trim()
                .parse::<i32>()
                .map(Field::Int)
                .map_err(|e| DbError::TypeMismatch(format!("'{}' is not an INT: {}", literal, e))),
            FieldType::Str => Ok(Field::Str(literal.to_string())),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "INT"),
            FieldType::Str => write!(f, "STRING"),
        }
    }
}

impl FromStr for FieldType {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(FieldType::Int),
            "str" | "string" | "text" => Ok(FieldType::Str),
            other => Err(DbError::InvalidArgument(format!(
                "Unknown field type: {}",
                other
            ))),
        }
    }
}

/// A single typed value inside a tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::Str(_) => FieldType::Str,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Field::Int(v) => Some(*v),
            Field::Str(_) => None,
        }
    }

    /// The value a page keeps for this field: strings are cut to
    /// `STRING_LEN` bytes, so a cached tuple matches its encoded form.
    pub fn into_stored(self) -> Field {
        match self {
            Field::Str(s) if s.len() > STRING_LEN => {
                Field::Str(truncate_to_boundary(&s, STRING_LEN).to_string())
            }
            other => other,
        }
    }

    /// Encode the field in its fixed-width page representation.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> DbResult<()> {
        match self {
            Field::Int(v) => writer.write_i32::<BigEndian>(*v)?,
            Field::Str(s) => {
                let bytes = truncate_to_boundary(s, STRING_LEN).as_bytes();
                writer.write_u32::<BigEndian>(bytes.len() as u32)?;
                writer.write_all(bytes)?;
                writer.write_all(&[0u8; STRING_LEN][..STRING_LEN - bytes.len()])?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}

fn truncate_to_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
