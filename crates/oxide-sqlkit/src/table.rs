//! Table specifications and table instances.
//!
//! A [`TableSpec`] is the desired schema of one table: its ordered columns,
//! explicit indexes and a few table-level options. A [`Table`] binds a spec
//! to a query alias and a [`Database`]; several instances of the same spec
//! can take part in one query (self-joins), each under its own alias.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::column::ColumnSpec;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::query::Query;

/// A named, possibly multi-column, index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIndex {
    name: String,
    columns: Vec<String>,
    unique: bool,
}

impl TableIndex {
    /// Creates an index named `ix_<table>_<col>[_<col>...]`.
    #[must_use]
    pub fn new(table: &str, columns: Vec<String>, unique: bool) -> Self {
        let name = format!("ix_{table}_{}", columns.join("_"));
        Self {
            name,
            columns,
            unique,
        }
    }

    /// Creates an index with an explicit name, as read from a live database.
    #[must_use]
    pub fn with_name(name: impl Into<String>, columns: Vec<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            columns,
            unique,
        }
    }

    /// Index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Indexed columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether the index enforces uniqueness.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    /// Identity of the index: the lower-cased set of its columns.
    #[must_use]
    pub fn key(&self) -> BTreeSet<String> {
        self.columns.iter().map(|c| c.to_ascii_lowercase()).collect()
    }

    /// Whether the index covers exactly the given columns, in any order.
    #[must_use]
    pub fn is_identical(&self, columns: &[&str]) -> bool {
        let other: BTreeSet<String> = columns.iter().map(|c| c.to_ascii_lowercase()).collect();
        self.key() == other
    }
}

/// The desired schema of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    name: String,
    columns: Vec<ColumnSpec>,
    indexes: Vec<TableIndex>,
    partition_by: Option<String>,
    read_only: bool,
}

impl TableSpec {
    /// Starts building a table spec.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> TableSpecBuilder {
        TableSpecBuilder::new(name)
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Looks up a column by its SQL name or field name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.name() == name)
            .or_else(|| self.columns.iter().find(|c| c.field_name() == name))
    }

    /// Primary key columns in declaration order.
    #[must_use]
    pub fn primary_columns(&self) -> Vec<&ColumnSpec> {
        self.columns.iter().filter(|c| c.is_primary()).collect()
    }

    /// The auto-increment column, if any.
    #[must_use]
    pub fn auto_increment_column(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.is_auto_increment())
    }

    /// The auto-version column, if any.
    #[must_use]
    pub fn version_column(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.is_auto_version())
    }

    /// The creation timestamp column, if any.
    #[must_use]
    pub fn created_at_column(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.is_created_at())
    }

    /// The update timestamp column, if any.
    #[must_use]
    pub fn updated_at_column(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.is_updated_at())
    }

    /// Explicit indexes followed by the single-column indexes of columns
    /// flagged `index`.
    #[must_use]
    pub fn indexes(&self) -> Vec<TableIndex> {
        let mut out = self.indexes.clone();
        for col in self.columns.iter().filter(|c| c.is_index()) {
            let idx = TableIndex::new(&self.name, vec![col.name().to_string()], false);
            if !out.iter().any(|i| i.key() == idx.key()) {
                out.push(idx);
            }
        }
        out
    }

    /// Explicitly declared indexes only.
    #[must_use]
    pub fn explicit_indexes(&self) -> &[TableIndex] {
        &self.indexes
    }

    /// Partition expression for engines that partition tables.
    #[must_use]
    pub fn partition_by(&self) -> Option<&str> {
        self.partition_by.as_deref()
    }

    /// Whether inserts and updates are refused.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the spec with its columns replaced, keeping name and options.
    ///
    /// Used to carry introspected columns through the same diff and DDL
    /// paths as a declared schema.
    pub fn with_columns(&self, columns: Vec<ColumnSpec>) -> Result<Self> {
        let mut builder = Self::builder(self.name.clone());
        builder.columns = columns;
        builder.partition_by.clone_from(&self.partition_by);
        builder.read_only = self.read_only;
        builder.build()
    }
}

/// Fluent constructor for [`TableSpec`].
#[derive(Debug, Clone)]
pub struct TableSpecBuilder {
    name: String,
    columns: Vec<ColumnSpec>,
    indexes: Vec<(Vec<String>, bool)>,
    partition_by: Option<String>,
    read_only: bool,
}

impl TableSpecBuilder {
    /// Creates a builder for the named table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            partition_by: None,
            read_only: false,
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Appends several columns.
    #[must_use]
    pub fn columns(mut self, columns: impl IntoIterator<Item = ColumnSpec>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Declares a (multi-column) index.
    #[must_use]
    pub fn index(mut self, columns: &[&str]) -> Self {
        self.indexes
            .push((columns.iter().map(|c| (*c).to_string()).collect(), false));
        self
    }

    /// Declares a unique (multi-column) index.
    #[must_use]
    pub fn unique_index(mut self, columns: &[&str]) -> Self {
        self.indexes
            .push((columns.iter().map(|c| (*c).to_string()).collect(), true));
        self
    }

    /// Sets the partition expression.
    #[must_use]
    pub fn partition_by(mut self, expr: impl Into<String>) -> Self {
        self.partition_by = Some(expr.into());
        self
    }

    /// Marks the table read-only.
    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Validates and builds the spec.
    pub fn build(self) -> Result<TableSpec> {
        let table = self.name.as_str();
        if table.is_empty() {
            return Err(Error::invalid_table(table, "table name is empty"));
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name().to_ascii_lowercase()) {
                return Err(Error::invalid_table(
                    table,
                    format!("duplicate column {}", col.name()),
                ));
            }
        }

        let auto_incs: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| c.is_auto_increment())
            .map(ColumnSpec::name)
            .collect();
        if auto_incs.len() > 1 {
            return Err(Error::invalid_table(
                table,
                format!("multiple auto_increment columns: {}", auto_incs.join(", ")),
            ));
        }

        let mut indexes: Vec<TableIndex> = Vec::with_capacity(self.indexes.len());
        for (cols, unique) in self.indexes {
            if cols.is_empty() {
                return Err(Error::invalid_table(table, "index without columns"));
            }
            let mut resolved = Vec::with_capacity(cols.len());
            for c in &cols {
                let Some(spec) = self
                    .columns
                    .iter()
                    .find(|s| s.name() == c || s.field_name() == c)
                else {
                    return Err(Error::invalid_table(
                        table,
                        format!("index references unknown column {c}"),
                    ));
                };
                resolved.push(spec.name().to_string());
            }
            let idx = TableIndex::new(table, resolved, unique);
            if indexes.iter().any(|i| i.key() == idx.key()) {
                return Err(Error::invalid_table(
                    table,
                    format!("duplicate index {}", idx.name()),
                ));
            }
            indexes.push(idx);
        }

        Ok(TableSpec {
            name: self.name,
            columns: self.columns,
            indexes,
            partition_by: self.partition_by,
            read_only: self.read_only,
        })
    }
}

/// A table spec bound to a query alias.
#[derive(Debug, Clone)]
pub struct Table {
    spec: Arc<TableSpec>,
    alias: String,
    db: Database,
}

impl Table {
    /// Creates an instance with a freshly allocated alias.
    #[must_use]
    pub fn new(spec: Arc<TableSpec>, db: &Database) -> Self {
        Self {
            spec,
            alias: db.aliases().next_alias(),
            db: db.clone(),
        }
    }

    /// The underlying spec.
    #[must_use]
    pub fn spec(&self) -> &Arc<TableSpec> {
        &self.spec
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// Query alias of this instance.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The database this instance renders for.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// References a column of this instance.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Field> {
        self.spec
            .column(name)
            .map(|c| Field::column(self.alias.clone(), c.name()))
    }

    /// References every column of this instance.
    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        self.spec
            .columns()
            .iter()
            .map(|c| Field::column(self.alias.clone(), c.name()))
            .collect()
    }

    /// Starts a query over this instance.
    #[must_use]
    pub fn query(&self) -> Query {
        Query::new(self.clone().into(), self.db.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasAllocator;
    use crate::column::ColumnKind;
    use crate::dialect::MySqlDialect;

    fn col(name: &str) -> ColumnSpec {
        ColumnSpec::builder(name, ColumnKind::INT).build().unwrap()
    }

    #[test]
    fn test_index_naming_and_identity() {
        let idx = TableIndex::new("users", vec!["name".into(), "age".into()], false);
        assert_eq!(idx.name(), "ix_users_name_age");
        assert!(idx.is_identical(&["age", "NAME"]));
        assert!(!idx.is_identical(&["name"]));
    }

    #[test]
    fn test_build_rejects_duplicate_columns() {
        let err = TableSpec::builder("t")
            .column(col("a"))
            .column(col("A"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTable { .. }));
    }

    #[test]
    fn test_build_rejects_multiple_auto_increment() {
        let a = ColumnSpec::builder("a", ColumnKind::INT)
            .auto_increment()
            .build()
            .unwrap();
        let b = ColumnSpec::builder("b", ColumnKind::INT)
            .auto_increment()
            .build()
            .unwrap();
        let err = TableSpec::builder("t").column(a).column(b).build().unwrap_err();
        assert!(err.to_string().contains("multiple auto_increment"));
    }

    #[test]
    fn test_build_rejects_unknown_index_column() {
        let err = TableSpec::builder("t")
            .column(col("a"))
            .index(&["b"])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown column b"));
    }

    #[test]
    fn test_indexes_include_flagged_columns() {
        let flagged = ColumnSpec::builder("name", ColumnKind::TEXT)
            .index()
            .build()
            .unwrap();
        let spec = TableSpec::builder("users")
            .column(col("id"))
            .column(flagged)
            .index(&["id", "name"])
            .build()
            .unwrap();
        let names: Vec<String> = spec.indexes().iter().map(|i| i.name().to_string()).collect();
        assert_eq!(names, vec!["ix_users_id_name", "ix_users_name"]);
    }

    #[test]
    fn test_special_columns() {
        let id = ColumnSpec::builder("id", ColumnKind::BIGINT)
            .auto_increment()
            .build()
            .unwrap();
        let version = ColumnSpec::builder("version", ColumnKind::INT)
            .auto_version()
            .build()
            .unwrap();
        let updated = ColumnSpec::builder("updated_at", ColumnKind::DateTime)
            .updated_at()
            .build()
            .unwrap();
        let spec = TableSpec::builder("t")
            .columns([id, version, updated])
            .build()
            .unwrap();
        assert_eq!(spec.auto_increment_column().unwrap().name(), "id");
        assert_eq!(spec.primary_columns().len(), 1);
        assert_eq!(spec.version_column().unwrap().name(), "version");
        assert_eq!(spec.updated_at_column().unwrap().name(), "updated_at");
        assert!(spec.created_at_column().is_none());
    }

    #[test]
    fn test_instances_get_distinct_aliases() {
        let db = Database::new("test", Arc::new(MySqlDialect))
            .with_aliases(Arc::new(AliasAllocator::new()));
        let spec = Arc::new(TableSpec::builder("t").column(col("a")).build().unwrap());
        let t1 = Table::new(Arc::clone(&spec), &db);
        let t2 = Table::new(spec, &db);
        assert_eq!(t1.alias(), "t1");
        assert_eq!(t2.alias(), "t2");
        assert!(t1.field("missing").is_none());
        assert_eq!(t2.fields().len(), 1);
    }
}
