//! SQL dialect support.
//!
//! A [`Dialect`] translates the abstract column, table and query model into
//! one database product's DDL, DML and introspection surface. Dialects are
//! plain values injected through [`Database`](crate::Database); there is no
//! global registry.

mod clickhouse;
mod dameng;
mod mysql;
mod sqlite;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use clickhouse::{parse_create_table, ClickHouseDialect, CreateTableInfo};
pub use dameng::{decode_info6, AutoIncrementInfo, DamengDialect};
pub use mysql::{parse_constraints, parse_indexes, ForeignKey, MySqlDialect};
pub use sqlite::{parse_index_sql, SqliteDialect};

use tracing::debug;

use crate::column::{ColumnBuilder, ColumnSpec};
use crate::diff::TableChanges;
use crate::error::{Error, Result};
use crate::table::{TableIndex, TableSpec};

/// One row returned by an introspection query: lower-cased column name to
/// the value as text (`None` for SQL NULL).
pub type SchemaRow = BTreeMap<String, Option<String>>;

/// Trait for dialect-specific SQL generation.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character.
    fn identifier_quote(&self) -> char {
        '`'
    }

    /// Quotes an identifier.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        format!("{quote}{name}{quote}")
    }

    // ====================================================================
    // Query rendering
    // ====================================================================

    /// Whether every projected column gets an explicit `AS` label.
    fn always_alias_fields(&self) -> bool {
        false
    }

    /// Placeholder for a bound right-hand operand of a comparison.
    fn comparison_placeholder(&self) -> &'static str {
        "?"
    }

    /// Whether projected fields outside GROUP BY must be wrapped in `MAX`.
    fn wrap_ungrouped_fields(&self) -> bool {
        false
    }

    /// Whether each UNION member is wrapped as its own aliased subquery.
    fn wrap_union_members(&self) -> bool {
        false
    }

    /// Clause appended to `LIKE ?` so a backslash escapes wildcards.
    ///
    /// Empty where backslash is already the default escape character.
    fn like_escape_clause(&self) -> &'static str {
        ""
    }

    /// Renders a regular expression match.
    fn regexp(&self, left: &str, right: &str) -> String {
        format!("{left} REGEXP {right}")
    }

    /// Renders a string aggregation.
    fn group_concat(&self, expr: &str, separator: &str) -> String {
        format!(
            "GROUP_CONCAT({expr} SEPARATOR '{}')",
            separator.replace('\'', "''")
        )
    }

    /// Renders a dotted IPv4 to integer conversion.
    fn inet_aton(&self, expr: &str) -> String {
        format!("INET_ATON({expr})")
    }

    /// SQL expression for the current UTC time.
    fn now_function(&self) -> &'static str;

    // ====================================================================
    // DML
    // ====================================================================

    /// Leading part of an UPDATE statement, up to the first assignment.
    fn update_prefix(&self, table: &str) -> String {
        format!("UPDATE {} SET", self.quote_identifier(table))
    }

    /// Clause appended to an INSERT to turn it into an upsert.
    ///
    /// `assignments` are rendered `col = ?` fragments for the columns to
    /// overwrite on conflict.
    fn upsert_clause(&self, table: &TableSpec, assignments: &[String]) -> Result<String> {
        let _ = assignments;
        Err(Error::NotSupported(format!(
            "{} cannot upsert into {}",
            self.name(),
            table.name()
        )))
    }

    // ====================================================================
    // DDL
    // ====================================================================

    /// SQL type of a column.
    fn column_type(&self, col: &ColumnSpec) -> String;

    /// Full DDL fragment of a column, as used in CREATE and ALTER.
    fn column_definition(&self, col: &ColumnSpec) -> Result<String>;

    /// Whether indexes take part in schema diffing.
    fn supports_indexes(&self) -> bool {
        true
    }

    /// Renders the CREATE TABLE statement followed by any index statements
    /// the dialect cannot declare inline.
    fn create_table_sql(&self, table: &TableSpec) -> Result<Vec<String>>;

    /// Renders a CREATE INDEX statement.
    fn create_index_sql(&self, table: &str, index: &TableIndex) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.is_unique() { "UNIQUE " } else { "" },
            self.quote_identifier(index.name()),
            self.quote_identifier(table),
            quote_list(self, index.columns())
        )
    }

    /// Renders a DROP INDEX statement.
    fn drop_index_sql(&self, table: &str, index: &TableIndex) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(index.name()),
            self.quote_identifier(table)
        )
    }

    /// Translates a schema diff into the ordered statements that apply it.
    fn commit_table_changes_sql(
        &self,
        table: &TableSpec,
        changes: &TableChanges,
    ) -> Result<Vec<String>>;

    // ====================================================================
    // Introspection
    // ====================================================================

    /// Query listing the tables of the current database.
    fn tables_sql(&self) -> String {
        String::from("SHOW TABLES")
    }

    /// Queries whose results describe a table's columns.
    fn column_info_sql(&self, table: &str) -> Vec<String>;

    /// Parses the results of [`Dialect::column_info_sql`], one result set
    /// per query, into column specs.
    fn parse_column_specs(&self, table: &str, results: &[Vec<SchemaRow>]) -> Result<Vec<ColumnSpec>>;

    /// Queries whose results describe a table's indexes.
    fn index_info_sql(&self, table: &str) -> Vec<String> {
        let _ = table;
        Vec::new()
    }

    /// Parses the results of [`Dialect::index_info_sql`].
    fn parse_indexes(&self, table: &str, results: &[Vec<SchemaRow>]) -> Result<Vec<TableIndex>> {
        let _ = (table, results);
        Ok(Vec::new())
    }
}

/// Looks up a built-in dialect by name (`mysql`, `clickhouse`, `sqlite`,
/// `dameng`).
#[must_use]
pub fn dialect_by_name(name: &str) -> Option<Arc<dyn Dialect>> {
    match name.to_ascii_lowercase().as_str() {
        "mysql" => Some(Arc::new(MySqlDialect)),
        "clickhouse" => Some(Arc::new(ClickHouseDialect)),
        "sqlite" | "sqlite3" => Some(Arc::new(SqliteDialect)),
        "dameng" | "dm" => Some(Arc::new(DamengDialect)),
        _ => None,
    }
}

/// Quotes and comma-joins identifiers.
pub(crate) fn quote_list<D: Dialect + ?Sized, S: AsRef<str>>(d: &D, names: &[S]) -> String {
    names
        .iter()
        .map(|n| d.quote_identifier(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Text of a column in an introspection row.
pub(crate) fn row_text<'a>(row: &'a SchemaRow, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Option::as_deref)
}

/// Numeric column in an introspection row; absent or NULL reads as zero.
pub(crate) fn row_number(row: &SchemaRow, key: &str) -> Result<u64> {
    match row_text(row, key).map(str::trim) {
        None | Some("") => Ok(0),
        Some(s) => s.parse().map_err(|_| Error::parse("number", s)),
    }
}

/// Strips one layer of matching quotes from a reported default.
pub(crate) fn unquote(s: &str) -> &str {
    let s = s.trim();
    for q in ['\'', '"', '`'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Builds an introspected column.
///
/// A reported default the column cannot parse (a server-side expression such
/// as `CURRENT_TIMESTAMP`) is dropped; `NULL` means no default.
pub(crate) fn build_live_column(builder: ColumnBuilder, default: Option<&str>) -> Result<ColumnSpec> {
    let builder = builder.pointer(true);
    if let Some(d) = default.filter(|d| !d.eq_ignore_ascii_case("NULL")) {
        let column = builder.clone().default(d).build()?;
        if column.default_value().is_ok() {
            return Ok(column);
        }
        debug!(column = %column.name(), default = %d, "unparsable live default dropped");
    }
    builder.build()
}
