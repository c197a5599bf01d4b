//! MySQL dialect, the default backend.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use super::{build_live_column, quote_list, row_text, Dialect, SchemaRow};
use crate::column::{ColumnBuilder, ColumnKind, ColumnSpec, IntegerSize, TextSize};
use crate::diff::TableChanges;
use crate::error::{Error, Result};
use crate::table::{TableIndex, TableSpec};

/// MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// A foreign key declared in a `SHOW CREATE TABLE` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Referencing columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub ref_table: String,
    /// Referenced columns.
    pub ref_columns: Vec<String>,
}

const fn int_type(size: IntegerSize, unsigned: bool) -> (&'static str, u32) {
    match (size, unsigned) {
        (IntegerSize::Tiny, false) => ("TINYINT", 4),
        (IntegerSize::Tiny, true) => ("TINYINT", 3),
        (IntegerSize::Small, false) => ("SMALLINT", 6),
        (IntegerSize::Small, true) => ("SMALLINT", 5),
        (IntegerSize::Int, false) => ("INT", 11),
        (IntegerSize::Int, true) => ("INT", 10),
        (IntegerSize::Big, _) => ("BIGINT", 20),
    }
}

fn text_type(width: u32, size: TextSize) -> String {
    if width > 0 {
        return format!("VARCHAR({width})");
    }
    match size {
        TextSize::Normal => "TEXT",
        TextSize::Medium => "MEDIUMTEXT",
        TextSize::Long => "LONGTEXT",
    }
    .to_string()
}

fn is_ascii_charset(col: &ColumnSpec) -> bool {
    col.charset().is_some_and(|c| c.eq_ignore_ascii_case("ascii"))
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn comparison_placeholder(&self) -> &'static str {
        "( ? )"
    }

    fn now_function(&self) -> &'static str {
        "UTC_TIMESTAMP()"
    }

    fn upsert_clause(&self, _table: &TableSpec, assignments: &[String]) -> Result<String> {
        Ok(format!(" ON DUPLICATE KEY UPDATE {}", assignments.join(", ")))
    }

    fn column_type(&self, col: &ColumnSpec) -> String {
        match col.kind() {
            ColumnKind::Integer { size, unsigned } => {
                let (name, width) = int_type(size, unsigned);
                format!("{name}({width})")
            }
            ColumnKind::Boolean | ColumnKind::Tristate => String::from("TINYINT(1)"),
            ColumnKind::Text { size } => text_type(col.width(), size),
            ColumnKind::Compound => text_type(col.width(), TextSize::Normal),
            ColumnKind::Float { double } => String::from(if double { "DOUBLE" } else { "FLOAT" }),
            ColumnKind::Decimal => format!("DECIMAL({}, {})", col.width(), col.precision()),
            ColumnKind::DateTime => String::from("DATETIME"),
        }
    }

    fn column_definition(&self, col: &ColumnSpec) -> Result<String> {
        let mut def = format!(
            "{} {}",
            self.quote_identifier(col.name()),
            self.column_type(col)
        );
        if matches!(col.kind(), ColumnKind::Integer { unsigned: true, .. }) {
            def.push_str(" UNSIGNED");
        }
        if col.is_auto_increment() {
            def.push_str(" AUTO_INCREMENT");
        }
        if col.is_text() && is_ascii_charset(col) {
            def.push_str(" CHARACTER SET ascii");
        }
        if !col.is_nullable() {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = col.default_sql()? {
            if col.is_text() && col.width() == 0 {
                return Err(Error::invalid_column(
                    col.name(),
                    "BLOB/TEXT column can't have a default value",
                ));
            }
            def.push_str(" DEFAULT ");
            def.push_str(&default);
        }
        Ok(def)
    }

    fn create_table_sql(&self, table: &TableSpec) -> Result<Vec<String>> {
        let mut lines = table
            .columns()
            .iter()
            .map(|c| self.column_definition(c))
            .collect::<Result<Vec<_>>>()?;

        let primaries: Vec<&str> = table.primary_columns().iter().map(|c| c.name()).collect();
        if !primaries.is_empty() {
            lines.push(format!("PRIMARY KEY ({})", quote_list(self, &primaries)));
        }
        for idx in table.indexes() {
            lines.push(format!(
                "{}KEY {} ({})",
                if idx.is_unique() { "UNIQUE " } else { "" },
                self.quote_identifier(idx.name()),
                quote_list(self, idx.columns())
            ));
        }

        let auto_inc = table
            .auto_increment_column()
            .map(ColumnSpec::auto_increment_offset)
            .filter(|offset| *offset > 0)
            .map(|offset| format!(" AUTO_INCREMENT={offset}"))
            .unwrap_or_default();

        Ok(vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n) ENGINE=InnoDB DEFAULT CHARSET = utf8mb4 COLLATE = utf8mb4_unicode_ci{auto_inc}",
            self.quote_identifier(table.name()),
            lines.join(",\n")
        )])
    }

    fn commit_table_changes_sql(
        &self,
        table: &TableSpec,
        changes: &TableChanges,
    ) -> Result<Vec<String>> {
        let mut clauses = Vec::new();
        for idx in &changes.remove_indexes {
            clauses.push(format!("DROP INDEX {}", self.quote_identifier(idx.name())));
        }
        for col in &changes.remove_columns {
            clauses.push(format!("DROP COLUMN {}", self.quote_identifier(col.name())));
        }
        for update in &changes.update_columns {
            clauses.push(format!("MODIFY COLUMN {}", self.column_definition(&update.new)?));
        }
        for col in &changes.add_columns {
            clauses.push(format!("ADD COLUMN {}", self.column_definition(col)?));
        }
        for idx in &changes.add_indexes {
            clauses.push(format!(
                "ADD {}INDEX {} ({})",
                if idx.is_unique() { "UNIQUE " } else { "" },
                self.quote_identifier(idx.name()),
                quote_list(self, idx.columns())
            ));
        }
        if clauses.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![format!(
            "ALTER TABLE {} {};",
            self.quote_identifier(table.name()),
            clauses.join(", ")
        )])
    }

    fn column_info_sql(&self, table: &str) -> Vec<String> {
        vec![format!("SHOW FULL COLUMNS IN {}", self.quote_identifier(table))]
    }

    fn parse_column_specs(&self, table: &str, results: &[Vec<SchemaRow>]) -> Result<Vec<ColumnSpec>> {
        let Some(rows) = results.first() else {
            return Err(Error::TableNotExists(table.to_string()));
        };
        let mut specs = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(spec) = parse_column_row(row)? {
                specs.push(spec);
            }
        }
        Ok(specs)
    }

    fn index_info_sql(&self, table: &str) -> Vec<String> {
        vec![format!("SHOW CREATE TABLE {}", self.quote_identifier(table))]
    }

    fn parse_indexes(&self, table: &str, results: &[Vec<SchemaRow>]) -> Result<Vec<TableIndex>> {
        let ddl = results
            .first()
            .and_then(|rows| rows.first())
            .and_then(|row| row_text(row, "create table"))
            .ok_or_else(|| Error::TableNotExists(table.to_string()))?;
        Ok(parse_indexes(ddl))
    }
}

fn type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\w+)(?:\(([^)]*)\))?\s*(.*)$").expect("valid column type regex")
    })
}

fn parse_column_row(row: &SchemaRow) -> Result<Option<ColumnSpec>> {
    let name = row_text(row, "field").ok_or_else(|| Error::parse("column row", format!("{row:?}")))?;
    let sql_type = row_text(row, "type").unwrap_or_default().to_ascii_lowercase();
    let Some(caps) = type_re().captures(sql_type.trim()) else {
        return Err(Error::parse("column type", sql_type));
    };
    let base = caps.get(1).map_or("", |m| m.as_str());
    let args: Vec<u32> = caps
        .get(2)
        .map(|m| m.as_str().split(',').filter_map(|a| a.trim().parse().ok()).collect())
        .unwrap_or_default();
    let unsigned = caps.get(3).is_some_and(|m| m.as_str().contains("unsigned"));
    let nullable = row_text(row, "null").is_some_and(|n| n.eq_ignore_ascii_case("YES"));
    let width = args.first().copied().unwrap_or(0);

    let integer = |size| ColumnKind::Integer { size, unsigned };
    let kind = match base {
        "tinyint" if width == 1 => {
            if nullable {
                ColumnKind::Tristate
            } else {
                ColumnKind::Boolean
            }
        }
        "tinyint" => integer(IntegerSize::Tiny),
        "smallint" => integer(IntegerSize::Small),
        "int" | "integer" | "mediumint" => integer(IntegerSize::Int),
        "bigint" => integer(IntegerSize::Big),
        "varchar" | "char" | "tinytext" | "text" => ColumnKind::TEXT,
        "mediumtext" => ColumnKind::Text {
            size: TextSize::Medium,
        },
        "longtext" => ColumnKind::Text {
            size: TextSize::Long,
        },
        "float" => ColumnKind::Float { double: false },
        "double" | "real" => ColumnKind::Float { double: true },
        "decimal" | "numeric" => ColumnKind::Decimal,
        "datetime" | "timestamp" => ColumnKind::DateTime,
        other => {
            warn!(column = %name, sql_type = %other, "unsupported live column type skipped");
            return Ok(None);
        }
    };

    let mut b = ColumnBuilder::new(name, kind);
    b = if nullable { b.nullable() } else { b.not_null() };
    match kind {
        ColumnKind::Text { .. } if matches!(base, "varchar" | "char") => b = b.width(width),
        ColumnKind::Decimal => {
            b = b.width(width).precision(args.get(1).copied().unwrap_or(0));
        }
        _ => {}
    }
    if row_text(row, "collation").is_some_and(|c| c.starts_with("ascii")) {
        b = b.charset("ascii");
    }
    match row_text(row, "key") {
        Some("PRI") => b = b.primary_key(),
        Some("MUL") => b = b.index(),
        _ => {}
    }
    if row_text(row, "extra").is_some_and(|e| e.contains("auto_increment")) {
        b = b.auto_increment();
    }
    build_live_column(b, row_text(row, "default")).map(Some)
}

fn index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(UNIQUE\s+)?KEY\s+`([^`]+)`\s*\((.+)\)").expect("valid index regex")
    })
}

fn constraint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"CONSTRAINT\s+`([^`]+)`\s+FOREIGN\s+KEY\s*\(([^)]+)\)\s*REFERENCES\s+`([^`]+)`\s*\(([^)]+)\)",
        )
        .expect("valid constraint regex")
    })
}

fn column_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]+)`").expect("valid column name regex"))
}

fn column_names(list: &str) -> Vec<String> {
    column_name_re()
        .captures_iter(list)
        .map(|c| c[1].to_string())
        .collect()
}

/// Extracts the secondary indexes from a `SHOW CREATE TABLE` statement.
///
/// The primary key is not included and prefix lengths such as `(10)` are
/// dropped from column names.
#[must_use]
pub fn parse_indexes(ddl: &str) -> Vec<TableIndex> {
    index_re()
        .captures_iter(ddl)
        .map(|caps| {
            TableIndex::with_name(caps[2].to_string(), column_names(&caps[3]), caps.get(1).is_some())
        })
        .collect()
}

/// Extracts the foreign keys from a `SHOW CREATE TABLE` statement.
#[must_use]
pub fn parse_constraints(ddl: &str) -> Vec<ForeignKey> {
    constraint_re()
        .captures_iter(ddl)
        .map(|caps| ForeignKey {
            name: caps[1].to_string(),
            columns: column_names(&caps[2]),
            ref_table: caps[3].to_string(),
            ref_columns: column_names(&caps[4]),
        })
        .collect()
}
