use std::fmt;

use super::FieldType;

/// One column of a [`TupleDesc`]: its type and optional name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdItem {
    pub field_type: FieldType,
    pub name: Option<String>,
}

impl TdItem {
    pub fn new(field_type: FieldType, name: Option<String>) -> Self {
        Self { field_type, name }
    }
}

impl fmt::Display for TdItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}({})", self.field_type, name),
            None => write!(f, "{}", self.field_type),
        }
    }
}

/// Describes the schema of a tuple: an ordered list of typed, optionally named fields.
///
/// Every field type is fixed width, so the descriptor also fixes the byte size
/// of each tuple and, with it, the number of slots on a heap page.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    /// Creates a descriptor from parallel type and name lists.
    ///
    /// # Panics
    /// Panics if the lists differ in length.
    pub fn new(types: &[FieldType], names: &[&str]) -> Self {
        assert_eq!(
            types.len(),
            names.len(),
            "Type count must match name count"
        );
        let items = types
            .iter()
            .zip(names)
            .map(|(t, n)| TdItem::new(*t, Some(n.to_string())))
            .collect();
        Self { items }
    }

    /// Creates a descriptor with anonymous fields.
    pub fn unnamed(types: &[FieldType]) -> Self {
        Self {
            items: types.iter().map(|t| TdItem::new(*t, None)).collect(),
        }
    }

    pub fn from_items(items: Vec<TdItem>) -> Self {
        Self { items }
    }

    /// Returns the number of fields.
    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    /// Returns the name of the i-th field, if it has one.
    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.items.get(i).and_then(|item| item.name.as_deref())
    }

    /// Returns the type of the i-th field.
    pub fn field_type(&self, i: usize) -> Option<FieldType> {
        self.items.get(i).map(|item| item.field_type)
    }

    /// Returns the index of the first field with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.name.as_deref() == Some(name))
    }

    pub fn items(&self) -> impl Iterator<Item = &TdItem> {
        self.items.iter()
    }

    /// Returns the size in bytes of a tuple with this descriptor.
    pub fn byte_size(&self) -> usize {
        self.items.iter().map(|item| item.field_type.len()).sum()
    }

    /// Concatenates two descriptors, fields of `first` first.
    pub fn merge(first: &TupleDesc, second: &TupleDesc) -> TupleDesc {
        let mut items = first.items.clone();
        items.extend(second.items.iter().cloned());
        TupleDesc { items }
    }

    /// Returns a copy with every field name prefixed by `alias.`.
    /// Unnamed fields become `alias.null`.
    pub fn with_alias(&self, alias: &str) -> TupleDesc {
        let items = self
            .items
            .iter()
            .map(|item| {
                let name = item.name.as_deref().unwrap_or("null");
                TdItem::new(item.field_type, Some(format!("{}.{}", alias, name)))
            })
            .collect();
        TupleDesc { items }
    }
}

/// Two descriptors are equal when their field types match position by position;
/// names are ignored.
impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for TupleDesc {}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.items.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}
