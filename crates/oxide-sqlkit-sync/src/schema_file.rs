//! JSON schema descriptions.
//!
//! A schema file lists tables the same way `#[derive(Record)]` describes
//! them, for use without compiling the record types:
//!
//! ```json
//! {
//!   "tables": [
//!     {
//!       "name": "users",
//!       "columns": [
//!         { "name": "id", "kind": "u64", "tags": { "auto_increment": "true" } },
//!         { "name": "email", "kind": "string", "tags": { "width": "128" } },
//!         { "name": "age", "kind": "i32", "optional": true }
//!       ],
//!       "unique_indexes": [["email"]]
//!     }
//!   ]
//! }
//! ```
//!
//! Kinds are named after the Rust field type they stand for and tags use
//! the column tag vocabulary.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use oxide_sqlkit::{ColumnKind, ColumnSpec, ColumnType, TableSpec, TagMap, Tristate};
use serde::Deserialize;

use crate::error::{Result, SyncError};

/// A parsed schema file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaFile {
    #[serde(skip)]
    path: PathBuf,
    /// Declared tables.
    pub tables: Vec<TableDef>,
}

/// One table of a schema file.
#[derive(Debug, Clone, Deserialize)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Multi-column indexes.
    #[serde(default)]
    pub indexes: Vec<Vec<String>>,
    /// Multi-column unique indexes.
    #[serde(default)]
    pub unique_indexes: Vec<Vec<String>>,
    /// ClickHouse partition expression.
    #[serde(default)]
    pub partition_by: Option<String>,
    /// Refuse INSERT and UPDATE.
    #[serde(default)]
    pub read_only: bool,
}

/// One column of a table definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDef {
    /// Field name; the SQL name unless a `name`/`sql_name` tag overrides it.
    pub name: String,
    /// Rust type the column stands for, e.g. `i64`, `string`, `json`.
    pub kind: String,
    /// Whether the field is optional.
    #[serde(default)]
    pub optional: bool,
    /// Column tags.
    #[serde(default)]
    pub tags: TagMap,
}

/// Maps a kind name to the column kind of the matching field type.
#[must_use]
pub fn kind_by_name(name: &str) -> Option<ColumnKind> {
    let kind = match name.to_ascii_lowercase().as_str() {
        "i8" => <i8 as ColumnType>::KIND,
        "i16" => <i16 as ColumnType>::KIND,
        "i32" | "int" => <i32 as ColumnType>::KIND,
        "i64" | "bigint" => <i64 as ColumnType>::KIND,
        "u8" => <u8 as ColumnType>::KIND,
        "u16" => <u16 as ColumnType>::KIND,
        "u32" => <u32 as ColumnType>::KIND,
        "u64" => <u64 as ColumnType>::KIND,
        "f32" => <f32 as ColumnType>::KIND,
        "f64" | "float" => <f64 as ColumnType>::KIND,
        "bool" => <bool as ColumnType>::KIND,
        "tristate" => <Tristate as ColumnType>::KIND,
        "string" | "text" => <String as ColumnType>::KIND,
        "datetime" => <DateTime<Utc> as ColumnType>::KIND,
        "json" | "compound" => ColumnKind::Compound,
        _ => return None,
    };
    Some(kind)
}

impl SchemaFile {
    /// Reads and parses a schema file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut file: Self = serde_json::from_str(&text)?;
        file.path = path.to_path_buf();
        Ok(file)
    }

    /// Parses a schema description held in memory.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the table specs, in file order.
    pub fn table_specs(&self) -> Result<Vec<TableSpec>> {
        self.tables.iter().map(|t| self.table_spec(t)).collect()
    }

    fn table_spec(&self, def: &TableDef) -> Result<TableSpec> {
        let columns = def
            .columns
            .iter()
            .map(|c| {
                let kind = kind_by_name(&c.kind).ok_or_else(|| SyncError::UnknownKind {
                    path: self.path.clone(),
                    column: c.name.clone(),
                    kind: c.kind.clone(),
                })?;
                Ok(ColumnSpec::from_tags(c.name.as_str(), kind, &c.tags, c.optional)?)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut b = TableSpec::builder(def.name.as_str()).columns(columns);
        for cols in &def.indexes {
            let cols: Vec<&str> = cols.iter().map(String::as_str).collect();
            b = b.index(&cols);
        }
        for cols in &def.unique_indexes {
            let cols: Vec<&str> = cols.iter().map(String::as_str).collect();
            b = b.unique_index(&cols);
        }
        if let Some(p) = &def.partition_by {
            b = b.partition_by(p.as_str());
        }
        if def.read_only {
            b = b.read_only();
        }
        Ok(b.build()?)
    }
}
