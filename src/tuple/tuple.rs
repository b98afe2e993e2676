use std::fmt;
use std::sync::Arc;

use crate::common::{QuarryError, RecordId, Result};

use super::{Field, TupleDesc};

/// Represents a single row of a table.
///
/// A tuple holds one [`Field`] per column of its [`TupleDesc`] and, once it
/// has been placed on a page, the [`RecordId`] of its slot.
///
/// ## Tuple Binary Format
///
/// ```text
/// +-----------+-----------+-----+-----------+
/// | Field 0   | Field 1   | ... | Field N-1 |
/// +-----------+-----------+-----+-----------+
/// ```
///
/// Every field is fixed width (see [`super::FieldType::len`]), so the encoded
/// tuple is always exactly `desc.byte_size()` bytes.
#[derive(Debug, Clone)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple, checking the fields against the descriptor.
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> Result<Self> {
        if fields.len() != desc.num_fields() {
            return Err(QuarryError::SchemaMismatch(format!(
                "expected {} fields, got {}",
                desc.num_fields(),
                fields.len()
            )));
        }
        for (i, field) in fields.iter().enumerate() {
            if desc.field_type(i) != Some(field.field_type()) {
                return Err(QuarryError::SchemaMismatch(format!(
                    "field {} is {}, schema says {:?}",
                    i,
                    field.field_type(),
                    desc.field_type(i)
                )));
            }
        }
        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }

    /// Decodes a tuple from its slot bytes.
    pub fn from_bytes(desc: Arc<TupleDesc>, data: &[u8]) -> Option<Self> {
        let mut buf = data;
        let mut fields = Vec::with_capacity(desc.num_fields());
        for item in desc.items() {
            fields.push(Field::deserialize(&mut buf, item.field_type)?);
        }
        Some(Self {
            desc,
            fields,
            record_id: None,
        })
    }

    /// Encodes the tuple into exactly `desc.byte_size()` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.desc.byte_size());
        for field in &self.fields {
            field.serialize(&mut bytes);
        }
        bytes
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Replaces the i-th field; the new value must have the column's type.
    pub fn set_field(&mut self, i: usize, field: Field) -> Result<()> {
        match self.desc.field_type(i) {
            Some(t) if t == field.field_type() => {
                self.fields[i] = field;
                Ok(())
            }
            expected => Err(QuarryError::SchemaMismatch(format!(
                "cannot store {} in field {} ({:?})",
                field.field_type(),
                i,
                expected
            ))),
        }
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }
}

/// Tuples compare by content; the record id is ignored.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.fields.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", parts.join("\t"))
    }
}
