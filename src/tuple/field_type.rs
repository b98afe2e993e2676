use std::fmt;
use std::str::FromStr;

use crate::common::STRING_LEN;

/// The field types a table column can have.
/// Both are fixed width, so every tuple of a table has the same size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 32-bit signed integer: 4 bytes, little-endian
    Int,

    /// String: 4-byte length prefix + STRING_LEN bytes, zero-padded
    String,
}

impl FieldType {
    /// Returns the number of bytes a field of this type occupies on a page.
    pub fn len(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::String => 4 + STRING_LEN,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "INT"),
            FieldType::String => write!(f, "STRING"),
        }
    }
}

impl FromStr for FieldType {
    type Err = String;

    /// Parses the type names used by catalog schema files.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("int") {
            Ok(FieldType::Int)
        } else if s.eq_ignore_ascii_case("string") {
            Ok(FieldType::String)
        } else {
            Err(format!("unknown type {}", s))
        }
    }
}
