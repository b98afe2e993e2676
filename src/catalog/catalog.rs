use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::common::{QuarryError, Result, TableId};
use crate::storage::HeapFile;
use crate::tuple::{FieldType, TupleDesc};

/// A table registered in the catalog
#[derive(Clone)]
pub struct TableEntry {
    pub file: Arc<HeapFile>,
    pub name: String,
    /// Name of the primary key field, empty when the table has none
    pub primary_key: String,
}

#[derive(Default)]
struct CatalogState {
    by_id: HashMap<TableId, TableEntry>,
    by_name: HashMap<String, TableId>,
}

/// Catalog keeps track of every table: its heap file, name and schema.
///
/// Tables are keyed by the id of their heap file. The storage core only ever
/// reads from it through [`Catalog::database_file`] and [`Catalog::tuple_desc`].
#[derive(Default)]
pub struct Catalog {
    state: RwLock<CatalogState>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table. A table with the same name, or the same file, is
    /// replaced, so the most recently added one wins. A different file whose
    /// path hashes to an id already in use is rejected.
    pub fn add_table(
        &self,
        file: Arc<HeapFile>,
        name: &str,
        primary_key: &str,
    ) -> Result<TableId> {
        let id = file.id();
        let mut state = self.state.write();

        if let Some(existing) = state.by_id.get(&id) {
            if existing.file.absolute_path() != file.absolute_path() {
                return Err(QuarryError::TableIdCollision {
                    id,
                    path: file.absolute_path().display().to_string(),
                    existing: existing.file.absolute_path().display().to_string(),
                });
            }
        }

        if let Some(old_id) = state.by_name.get(name).copied() {
            state.by_id.remove(&old_id);
        }
        if let Some(old) = state.by_id.remove(&id) {
            state.by_name.remove(&old.name);
        }

        state.by_name.insert(name.to_string(), id);
        state.by_id.insert(
            id,
            TableEntry {
                file,
                name: name.to_string(),
                primary_key: primary_key.to_string(),
            },
        );
        Ok(id)
    }

    /// Returns the id of the table called `name`.
    pub fn table_id(&self, name: &str) -> Result<TableId> {
        self.state
            .read()
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| QuarryError::TableNameNotFound(name.to_string()))
    }

    fn entry(&self, id: TableId) -> Result<TableEntry> {
        self.state
            .read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(QuarryError::TableNotFound(id))
    }

    /// Returns the heap file holding the table's contents.
    pub fn database_file(&self, id: TableId) -> Result<Arc<HeapFile>> {
        Ok(self.entry(id)?.file)
    }

    /// Returns the schema of the table.
    pub fn tuple_desc(&self, id: TableId) -> Result<Arc<TupleDesc>> {
        Ok(Arc::clone(self.entry(id)?.file.tuple_desc()))
    }

    pub fn primary_key(&self, id: TableId) -> Result<String> {
        Ok(self.entry(id)?.primary_key)
    }

    pub fn table_name(&self, id: TableId) -> Result<String> {
        Ok(self.entry(id)?.name)
    }

    /// Returns the ids of all registered tables, sorted.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.state.read().by_id.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Removes every table.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.by_id.clear();
        state.by_name.clear();
    }

    /// Loads table definitions from a schema file and registers them.
    ///
    /// Each non-blank line declares one table:
    ///
    /// ```text
    /// name (field type [pk], field type, ...)
    /// ```
    ///
    /// where `type` is `int` or `string` and `pk` marks the primary key. The
    /// table's data lives in `<name>.dat` next to the schema file.
    pub fn load_schema<P: AsRef<Path>>(&self, path: P, page_size: usize) -> Result<Vec<TableId>> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut ids = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let def = parse_table_line(line).map_err(|reason| QuarryError::SchemaParse {
                line: line_no + 1,
                reason,
            })?;

            let names: Vec<&str> = def.fields.iter().map(|(n, _)| n.as_str()).collect();
            let types: Vec<FieldType> = def.fields.iter().map(|(_, t)| *t).collect();
            let desc = TupleDesc::new(&types, &names);

            let file = HeapFile::open(base.join(format!("{}.dat", def.name)), desc, page_size)?;
            info!("added table {} with schema {}", def.name, file.tuple_desc());
            ids.push(self.add_table(Arc::new(file), &def.name, &def.primary_key)?);
        }
        Ok(ids)
    }
}

struct TableDef {
    name: String,
    fields: Vec<(String, FieldType)>,
    primary_key: String,
}

fn parse_table_line(line: &str) -> std::result::Result<TableDef, String> {
    let open = line.find('(').ok_or("missing '('")?;
    let close = line.rfind(')').ok_or("missing ')'")?;
    if close < open {
        return Err("')' before '('".to_string());
    }

    let name = line[..open].trim();
    if name.is_empty() {
        return Err("missing table name".to_string());
    }

    let mut fields = Vec::new();
    let mut primary_key = String::new();
    for column in line[open + 1..close].split(',') {
        let parts: Vec<&str> = column.split_whitespace().collect();
        match parts.as_slice() {
            [field, ty] => fields.push((field.to_string(), ty.parse()?)),
            [field, ty, annotation] => {
                if *annotation != "pk" {
                    return Err(format!("unknown annotation {}", annotation));
                }
                fields.push((field.to_string(), ty.parse()?));
                primary_key = field.to_string();
            }
            _ => return Err(format!("bad field definition {:?}", column.trim())),
        }
    }

    Ok(TableDef {
        name: name.to_string(),
        fields,
        primary_key,
    })
}
