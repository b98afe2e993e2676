use std::cmp::Ordering;
use std::fmt;

use bytes::{Buf, BufMut};

use crate::common::STRING_LEN;

use super::FieldType;

/// A typed value stored in one column of a tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    /// Stored strings are cut to STRING_LEN bytes
    Str(String),
}

impl Field {
    /// Builds a string field, truncating to STRING_LEN bytes on a char boundary.
    pub fn string(s: impl Into<String>) -> Self {
        let mut s = s.into();
        if s.len() > STRING_LEN {
            let mut end = STRING_LEN;
            while !s.is_char_boundary(end) {
                end -= 1;
            }
            s.truncate(end);
        }
        Field::Str(s)
    }

    /// Returns the type of this field.
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::Str(_) => FieldType::String,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Field::Int(v) => Some(*v),
            Field::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Str(s) => Some(s),
            Field::Int(_) => None,
        }
    }

    /// Writes the fixed-width encoding of this field.
    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        match self {
            Field::Int(v) => buf.put_i32_le(*v),
            Field::Str(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_LEN);
                buf.put_u32_le(len as u32);
                buf.put_slice(&bytes[..len]);
                buf.put_bytes(0, STRING_LEN - len);
            }
        }
    }

    /// Reads a field of the given type, consuming exactly `field_type.len()` bytes.
    /// Returns None if the buffer is too short.
    pub fn deserialize<B: Buf>(buf: &mut B, field_type: FieldType) -> Option<Self> {
        if buf.remaining() < field_type.len() {
            return None;
        }
        match field_type {
            FieldType::Int => Some(Field::Int(buf.get_i32_le())),
            FieldType::String => {
                let len = (buf.get_u32_le() as usize).min(STRING_LEN);
                let mut raw = vec![0u8; STRING_LEN];
                buf.copy_to_slice(&mut raw);
                raw.truncate(len);
                Some(Field::Str(String::from_utf8_lossy(&raw).into_owned()))
            }
        }
    }
}

impl PartialOrd for Field {
    /// Fields of different types are incomparable.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Some(a.cmp(b)),
            (Field::Str(a), Field::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
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

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Field::Int(v)
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::string(s)
    }
}
