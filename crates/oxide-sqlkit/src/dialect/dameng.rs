//! Dameng dialect.
//!
//! Dameng follows Oracle conventions: double-quoted identifiers, catalog
//! views instead of `SHOW` statements, and auto-increment columns declared
//! with `IDENTITY(offset, step)`. The identity parameters of a live column
//! are only exposed through the binary `SYSCOLUMNS.INFO6` field.

use std::collections::BTreeMap;

use tracing::warn;

use super::{build_live_column, quote_list, row_number, row_text, Dialect, SchemaRow};
use crate::column::{ColumnBuilder, ColumnKind, ColumnSpec, IntegerSize};
use crate::diff::TableChanges;
use crate::error::{Error, Result};
use crate::table::{TableIndex, TableSpec};

/// Dameng dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct DamengDialect;

impl DamengDialect {
    /// Creates a new Dameng dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Identity parameters decoded from `SYSCOLUMNS.INFO6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoIncrementInfo<'a> {
    /// Lower-cased column name.
    pub name: &'a str,
    /// First value.
    pub offset: u64,
    /// Increment.
    pub step: u64,
    /// Trailing word of the record, meaning unknown.
    pub dummy: u64,
}

/// Decodes the 24-byte INFO6 record: three little-endian `u64`s holding
/// offset, step and a trailing word.
pub fn decode_info6<'a>(name: &'a str, info6: &[u8]) -> Result<AutoIncrementInfo<'a>> {
    let word = |i: usize| -> Result<u64> {
        info6
            .get(i * 8..(i + 1) * 8)
            .and_then(|b| <[u8; 8]>::try_from(b).ok())
            .map(u64::from_le_bytes)
            .ok_or_else(|| Error::parse("info6", format!("{info6:02x?}")))
    };
    Ok(AutoIncrementInfo {
        name,
        offset: word(0)?,
        step: word(1)?,
        dummy: word(2)?,
    })
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    if s.len() % 2 != 0 || !s.is_ascii() {
        return Err(Error::parse("hex", s));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| Error::parse("hex", s)))
        .collect()
}

impl Dialect for DamengDialect {
    fn name(&self) -> &'static str {
        "dameng"
    }

    fn identifier_quote(&self) -> char {
        '"'
    }

    fn always_alias_fields(&self) -> bool {
        true
    }

    fn wrap_ungrouped_fields(&self) -> bool {
        true
    }

    fn wrap_union_members(&self) -> bool {
        true
    }

    fn group_concat(&self, expr: &str, _separator: &str) -> String {
        format!("WM_CONCAT({expr})")
    }

    fn inet_aton(&self, expr: &str) -> String {
        let dot = |n: u8| {
            if n == 1 {
                format!("INSTR({expr},'.')")
            } else {
                format!("INSTR({expr},'.',1,{n})")
            }
        };
        [
            format!("TO_NUMBER(SUBSTR({expr},1,{}-1))*POWER(256,3)", dot(1)),
            format!(
                "TO_NUMBER(SUBSTR({expr},{}+1,{}-{}-1))*POWER(256,2)",
                dot(1),
                dot(2),
                dot(1)
            ),
            format!(
                "TO_NUMBER(SUBSTR({expr},{}+1,{}-{}-1))*256",
                dot(2),
                dot(3),
                dot(2)
            ),
            format!("TO_NUMBER(SUBSTR({expr},{}+1))", dot(3)),
        ]
        .join("+")
    }

    fn like_escape_clause(&self) -> &'static str {
        " ESCAPE '\\'"
    }

    fn now_function(&self) -> &'static str {
        "SYSDATE"
    }

    fn column_type(&self, col: &ColumnSpec) -> String {
        match col.kind() {
            ColumnKind::Integer { size, .. } => match size {
                IntegerSize::Tiny => "TINYINT",
                IntegerSize::Small => "SMALLINT",
                IntegerSize::Int => "INT",
                IntegerSize::Big => "BIGINT",
            }
            .to_string(),
            ColumnKind::Boolean | ColumnKind::Tristate => String::from("TINYINT"),
            ColumnKind::Text { .. } | ColumnKind::Compound => {
                if col.width() > 0 {
                    format!("VARCHAR({})", col.width())
                } else {
                    String::from("TEXT")
                }
            }
            ColumnKind::Float { double } => String::from(if double { "DOUBLE" } else { "FLOAT" }),
            ColumnKind::Decimal => format!("DECIMAL({}, {})", col.width(), col.precision()),
            ColumnKind::DateTime => String::from("TIMESTAMP(0)"),
        }
    }

    fn column_definition(&self, col: &ColumnSpec) -> Result<String> {
        let mut def = format!(
            "{} {}",
            self.quote_identifier(col.name()),
            self.column_type(col)
        );
        if col.is_auto_increment() {
            def.push_str(&format!(
                " IDENTITY({}, {})",
                col.auto_increment_offset().max(1),
                col.auto_increment_step()
            ));
        }
        let default = match col.default_sql()? {
            Some(d) => Some(d),
            None if !col.is_nullable() && col.is_text() => Some(String::from("''")),
            None if !col.is_nullable() && col.kind() == ColumnKind::Boolean => {
                Some(String::from("0"))
            }
            None => None,
        };
        if let Some(d) = default {
            def.push_str(" DEFAULT ");
            def.push_str(&d);
        }
        if !col.is_nullable() {
            def.push_str(" NOT NULL");
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
            lines.push(format!(
                "NOT CLUSTER PRIMARY KEY ({})",
                quote_list(self, &primaries)
            ));
        }
        let mut sqls = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.quote_identifier(table.name()),
            lines.join(",\n")
        )];
        sqls.extend(
            table
                .indexes()
                .iter()
                .map(|idx| self.create_index_sql(table.name(), idx)),
        );
        Ok(sqls)
    }

    fn drop_index_sql(&self, _table: &str, index: &TableIndex) -> String {
        format!("DROP INDEX {}", self.quote_identifier(index.name()))
    }

    fn commit_table_changes_sql(
        &self,
        table: &TableSpec,
        changes: &TableChanges,
    ) -> Result<Vec<String>> {
        for col in &changes.remove_columns {
            warn!(table = %table.name(), column = %col.name(), "column removal skipped");
        }
        let mut clauses = Vec::new();
        for update in &changes.update_columns {
            clauses.push(format!("MODIFY COLUMN {}", self.column_definition(&update.new)?));
        }
        for col in &changes.add_columns {
            clauses.push(format!("ADD COLUMN {}", self.column_definition(col)?));
        }

        let mut sqls = Vec::new();
        for idx in &changes.remove_indexes {
            sqls.push(self.drop_index_sql(table.name(), idx));
        }
        if !clauses.is_empty() {
            sqls.push(format!(
                "ALTER TABLE {} {};",
                self.quote_identifier(table.name()),
                clauses.join(", ")
            ));
        }
        for idx in &changes.add_indexes {
            sqls.push(self.create_index_sql(table.name(), idx));
        }
        Ok(sqls)
    }

    fn tables_sql(&self) -> String {
        String::from("SELECT TABLE_NAME FROM USER_TABLES")
    }

    fn column_info_sql(&self, table: &str) -> Vec<String> {
        let table = table.replace('\'', "''");
        vec![
            format!("SELECT COLUMN_NAME, DATA_TYPE, NULLABLE, DATA_LENGTH, DATA_PRECISION, DATA_SCALE, CHARACTER_SET_NAME, DATA_DEFAULT FROM USER_TAB_COLUMNS WHERE Table_Name='{table}'"),
            format!("SELECT a.COLUMN_NAME, a.INDEX_NAME, b.CONSTRAINT_TYPE FROM USER_IND_COLUMNS a LEFT JOIN USER_CONSTRAINTS b ON a.INDEX_NAME=b.INDEX_NAME WHERE a.TABLE_NAME='{table}'"),
            format!("SELECT a.NAME, RAWTOHEX(a.INFO6) AS INFO6 from SYSCOLUMNS a, SYSOBJECTS c WHERE a.INFO2 & 0x01 = 0x01 AND a.ID=c.ID and c.NAME='{table}' AND c.SCHID=CURRENT_SCHID"),
        ]
    }

    fn parse_column_specs(&self, table: &str, results: &[Vec<SchemaRow>]) -> Result<Vec<ColumnSpec>> {
        let Some(rows) = results.first().filter(|rows| !rows.is_empty()) else {
            return Err(Error::TableNotExists(table.to_string()));
        };
        let primaries: Vec<&str> = results
            .get(1)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(|r| row_text(r, "constraint_type") == Some("P"))
            .filter_map(|r| row_text(r, "column_name"))
            .collect();
        let identity = match results.get(2).and_then(|rows| rows.first()) {
            Some(row) => {
                let name = row_text(row, "name").unwrap_or_default();
                let info = match row_text(row, "info6") {
                    Some(hex) => Some(decode_info6(name, &decode_hex(hex)?)?),
                    None => None,
                };
                Some((name, info))
            }
            None => None,
        };

        let mut specs = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row_text(row, "column_name")
                .ok_or_else(|| Error::parse("column row", format!("{row:?}")))?;
            let data_type = row_text(row, "data_type").unwrap_or_default().to_ascii_uppercase();
            let nullable = row_text(row, "nullable") == Some("Y");
            let is_identity = identity.is_some_and(|(n, _)| n.eq_ignore_ascii_case(name));

            let integer = |size| ColumnKind::Integer {
                size,
                unsigned: false,
            };
            let kind = match data_type.as_str() {
                "VARCHAR" | "VARCHAR2" | "CHAR" | "CHARACTER" | "TEXT" | "LONGVARCHAR" | "CLOB"
                | "BLOB" => ColumnKind::TEXT,
                "TINYINT" if nullable => ColumnKind::Tristate,
                "TINYINT" | "BIT" => ColumnKind::Boolean,
                "SMALLINT" => integer(IntegerSize::Small),
                "INT" | "INTEGER" => integer(IntegerSize::Int),
                "BIGINT" => integer(IntegerSize::Big),
                "REAL" | "FLOAT" => ColumnKind::Float { double: false },
                "DOUBLE" | "DOUBLE PRECISION" => ColumnKind::Float { double: true },
                "NUMERIC" | "NUMBER" | "DECIMAL" | "DEC" => ColumnKind::Decimal,
                "TIMESTAMP" | "DATETIME" => ColumnKind::DateTime,
                other => {
                    warn!(column = %name, sql_type = %other, "unsupported live column type skipped");
                    continue;
                }
            };

            let mut b = ColumnBuilder::new(name, kind);
            b = if nullable { b.nullable() } else { b.not_null() };
            match data_type.as_str() {
                "VARCHAR" | "VARCHAR2" | "CHAR" | "CHARACTER" => {
                    b = b.width(u32::try_from(row_number(row, "data_length")?).unwrap_or(u32::MAX));
                }
                _ if kind == ColumnKind::Decimal => {
                    let width = row_number(row, "data_precision")?;
                    let scale = row_number(row, "data_scale")?;
                    b = b
                        .width(u32::try_from(width).unwrap_or(u32::MAX))
                        .precision(u32::try_from(scale).unwrap_or(u32::MAX));
                }
                _ => {}
            }
            if primaries.iter().any(|p| p.eq_ignore_ascii_case(name)) {
                b = b.primary_key();
            }
            if is_identity && kind.is_integer() {
                b = b.auto_increment();
                if let Some((_, Some(info))) = identity {
                    b = b
                        .auto_increment_offset(info.offset)
                        .auto_increment_step(info.step);
                }
            }
            let default = row_text(row, "data_default").map(|d| d.trim_matches(|c| c == '\'' || c == '"'));
            specs.push(build_live_column(b, default)?);
        }
        Ok(specs)
    }

    fn index_info_sql(&self, table: &str) -> Vec<String> {
        vec![format!(
            "SELECT a.COLUMN_NAME, a.INDEX_NAME, b.CONSTRAINT_TYPE FROM USER_IND_COLUMNS a LEFT JOIN USER_CONSTRAINTS b ON a.INDEX_NAME=b.INDEX_NAME WHERE a.TABLE_NAME='{}'",
            table.replace('\'', "''")
        )]
    }

    fn parse_indexes(&self, _table: &str, results: &[Vec<SchemaRow>]) -> Result<Vec<TableIndex>> {
        let mut grouped: BTreeMap<&str, (Vec<String>, bool)> = BTreeMap::new();
        for row in results.first().map(Vec::as_slice).unwrap_or_default() {
            let constraint = row_text(row, "constraint_type");
            if constraint == Some("P") {
                continue;
            }
            let (Some(index), Some(column)) = (row_text(row, "index_name"), row_text(row, "column_name")) else {
                continue;
            };
            let entry = grouped
                .entry(index)
                .or_insert_with(|| (Vec::new(), constraint == Some("U")));
            entry.0.push(column.to_string());
        }
        Ok(grouped
            .into_iter()
            .map(|(name, (columns, unique))| TableIndex::with_name(name, columns, unique))
            .collect())
    }
}
