//! SQLite dialect.
//!
//! SQLite cannot alter a column in place. A change that updates or removes
//! columns rebuilds the table: the new schema is created under a temporary
//! name, the surviving data copied over, the live table dropped and the
//! temporary table renamed into place.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use super::{build_live_column, quote_list, row_number, row_text, unquote, Dialect, SchemaRow};
use crate::column::{ColumnBuilder, ColumnKind, ColumnSpec};
use crate::diff::TableChanges;
use crate::error::{Error, Result};
use crate::table::{TableIndex, TableSpec};

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn create_sql(&self, name: &str, columns: &[&ColumnSpec]) -> Result<String> {
        let mut lines = columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect::<Result<Vec<_>>>()?;
        if !columns.iter().any(|c| c.is_auto_increment()) {
            let primaries: Vec<&str> = columns
                .iter()
                .filter(|c| c.is_primary())
                .map(|c| c.name())
                .collect();
            if !primaries.is_empty() {
                lines.push(format!("PRIMARY KEY ({})", quote_list(self, &primaries)));
            }
        }
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.quote_identifier(name),
            lines.join(",\n")
        ))
    }

    fn rename_sql(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn always_alias_fields(&self) -> bool {
        true
    }

    fn like_escape_clause(&self) -> &'static str {
        " ESCAPE '\\'"
    }

    fn now_function(&self) -> &'static str {
        "datetime('now')"
    }

    fn upsert_clause(&self, table: &TableSpec, assignments: &[String]) -> Result<String> {
        let primaries: Vec<&str> = table.primary_columns().iter().map(|c| c.name()).collect();
        if primaries.is_empty() {
            return Err(Error::EmptyPrimaryKey);
        }
        Ok(format!(
            " ON CONFLICT ({}) DO UPDATE SET {}",
            quote_list(self, &primaries),
            assignments.join(", ")
        ))
    }

    fn column_type(&self, col: &ColumnSpec) -> String {
        match col.kind() {
            ColumnKind::Integer { .. } | ColumnKind::Boolean | ColumnKind::Tristate => "INTEGER",
            ColumnKind::Text { .. } | ColumnKind::Compound => "TEXT",
            ColumnKind::Float { .. } | ColumnKind::Decimal => "REAL",
            ColumnKind::DateTime => "DATETIME",
        }
        .to_string()
    }

    fn column_definition(&self, col: &ColumnSpec) -> Result<String> {
        let mut def = format!(
            "{} {}",
            self.quote_identifier(col.name()),
            self.column_type(col)
        );
        if col.is_auto_increment() {
            def.push_str(" PRIMARY KEY");
        }
        if !col.is_nullable() {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = col.default_sql()? {
            def.push_str(" DEFAULT ");
            def.push_str(&default);
        }
        if col.is_text() {
            def.push_str(" COLLATE NOCASE");
        }
        Ok(def)
    }

    fn create_table_sql(&self, table: &TableSpec) -> Result<Vec<String>> {
        let columns: Vec<&ColumnSpec> = table.columns().iter().collect();
        let mut sqls = vec![self.create_sql(table.name(), &columns)?];
        sqls.extend(
            table
                .indexes()
                .iter()
                .map(|idx| self.create_index_sql(table.name(), idx)),
        );
        Ok(sqls)
    }

    fn drop_index_sql(&self, _table: &str, index: &TableIndex) -> String {
        format!("DROP INDEX IF EXISTS {}", self.quote_identifier(index.name()))
    }

    fn commit_table_changes_sql(
        &self,
        table: &TableSpec,
        changes: &TableChanges,
    ) -> Result<Vec<String>> {
        let name = table.name();
        let mut sqls = Vec::new();
        for col in &changes.add_columns {
            sqls.push(format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.quote_identifier(name),
                self.column_definition(col)?
            ));
        }
        for idx in &changes.remove_indexes {
            sqls.push(self.drop_index_sql(name, idx));
        }

        if changes.remove_columns.is_empty() && changes.update_columns.is_empty() {
            for idx in &changes.add_indexes {
                sqls.push(self.create_index_sql(name, idx));
            }
            return Ok(sqls);
        }

        let mut columns: Vec<&ColumnSpec> = table.columns().iter().collect();
        columns.sort_by(|a, b| a.name().cmp(b.name()));
        let names: Vec<&str> = columns.iter().map(|c| c.name()).collect();
        let tmp = format!("{name}_tmp");
        sqls.push(String::from("PRAGMA encoding=\"UTF-8\""));
        sqls.push(self.create_sql(&tmp, &columns)?);
        sqls.push(format!(
            "INSERT INTO {} SELECT {} FROM {}",
            self.quote_identifier(&tmp),
            quote_list(self, &names),
            self.quote_identifier(name)
        ));
        sqls.push(format!("DROP TABLE {}", self.quote_identifier(name)));
        sqls.push(self.rename_sql(&tmp, name));
        // Dropping the live table took its indexes with it.
        for idx in table.indexes() {
            sqls.push(self.create_index_sql(name, &idx));
        }
        Ok(sqls)
    }

    fn tables_sql(&self) -> String {
        String::from("SELECT name FROM sqlite_master WHERE type='table'")
    }

    fn column_info_sql(&self, table: &str) -> Vec<String> {
        vec![
            format!("PRAGMA table_info({})", self.quote_identifier(table)),
            format!(
                "SELECT sql FROM sqlite_master WHERE type='table' AND name='{}'",
                table.replace('\'', "''")
            ),
        ]
    }

    fn parse_column_specs(&self, table: &str, results: &[Vec<SchemaRow>]) -> Result<Vec<ColumnSpec>> {
        let rows = results.first().filter(|rows| !rows.is_empty());
        let Some(rows) = rows else {
            return Err(Error::TableNotExists(table.to_string()));
        };
        let table_sql = results
            .get(1)
            .and_then(|rows| rows.first())
            .and_then(|row| row_text(row, "sql"))
            .unwrap_or_default();

        let mut specs = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row_text(row, "name")
                .ok_or_else(|| Error::parse("table_info row", format!("{row:?}")))?;
            let sql_type = row_text(row, "type").unwrap_or_default().to_ascii_uppercase();
            let Some(kind) = affinity(&sql_type) else {
                warn!(column = %name, sql_type = %sql_type, "unsupported live column type skipped");
                continue;
            };
            let mut b = ColumnBuilder::new(name, kind);
            b = if row_number(row, "notnull")? > 0 {
                b.not_null()
            } else {
                b.nullable()
            };
            if row_number(row, "pk")? > 0 {
                b = b.primary_key();
                if kind.is_integer() && is_rowid_alias(table_sql, name) {
                    b = b.auto_increment();
                }
            }
            let default = row_text(row, "dflt_value").map(unquote);
            specs.push(build_live_column(b, default)?);
        }
        Ok(specs)
    }

    fn index_info_sql(&self, table: &str) -> Vec<String> {
        vec![format!(
            "SELECT name, sql FROM sqlite_master WHERE type='index' AND tbl_name='{}'",
            table.replace('\'', "''")
        )]
    }

    fn parse_indexes(&self, _table: &str, results: &[Vec<SchemaRow>]) -> Result<Vec<TableIndex>> {
        results
            .first()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|row| row_text(row, "sql"))
            .map(parse_index_sql)
            .collect()
    }
}

/// Maps a declared SQLite type to a column kind by type affinity.
fn affinity(sql_type: &str) -> Option<ColumnKind> {
    if sql_type.contains("INT") {
        Some(ColumnKind::BIGINT)
    } else if sql_type.contains("CHAR") || sql_type.contains("CLOB") || sql_type.contains("TEXT") {
        Some(ColumnKind::TEXT)
    } else if sql_type.contains("REAL") || sql_type.contains("FLOA") || sql_type.contains("DOUB") {
        Some(ColumnKind::Float { double: true })
    } else if sql_type.contains("DATE") || sql_type.contains("TIME") {
        Some(ColumnKind::DateTime)
    } else {
        None
    }
}

/// Whether the table DDL declares `name` as `INTEGER PRIMARY KEY`, which
/// makes it an alias of the auto-assigned rowid.
fn is_rowid_alias(table_sql: &str, name: &str) -> bool {
    let pattern = format!(
        r#"(?i)[`"\[]?{}[`"\]]?\s+INTEGER\s+PRIMARY\s+KEY"#,
        regex::escape(name)
    );
    Regex::new(&pattern).is_ok_and(|re| re.is_match(table_sql))
}

fn index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?is)^\s*CREATE\s+(UNIQUE\s+)?INDEX\s+(?:IF\s+NOT\s+EXISTS\s+)?[`"\[]?([^`"\]\s(]+)[`"\]]?\s+ON\s+[`"\[]?[^`"\]\s(]+[`"\]]?\s*\((.*)\)\s*$"#,
        )
        .expect("valid index regex")
    })
}

/// Parses a `CREATE INDEX` statement as stored in `sqlite_master`.
pub fn parse_index_sql(sql: &str) -> Result<TableIndex> {
    let caps = index_re()
        .captures(sql)
        .ok_or_else(|| Error::parse("index sql", sql))?;
    let columns: Vec<String> = caps[3]
        .split(',')
        .filter_map(|c| c.split_whitespace().next())
        .map(|c| c.trim_matches(|ch| matches!(ch, '`' | '"' | '[' | ']')).to_string())
        .collect();
    if columns.is_empty() {
        return Err(Error::parse("index sql", sql));
    }
    Ok(TableIndex::with_name(caps[2].to_string(), columns, caps.get(1).is_some()))
}
