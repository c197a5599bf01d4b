//! ClickHouse dialect.
//!
//! ClickHouse exposes no information-schema view for a table's partition,
//! sorting key or TTL, so introspection parses the `SHOW CREATE TABLE`
//! statement. The parser covers the clause shapes MergeTree engines report
//! (`PARTITION BY`, `PRIMARY KEY`, `ORDER BY`, `TTL`) with balanced
//! parenthesis capture; exotic DDL may not be understood.

use tracing::warn;

use super::{build_live_column, quote_list, row_text, unquote, Dialect, SchemaRow};
use crate::column::{ColumnBuilder, ColumnKind, ColumnSpec, IntegerSize};
use crate::diff::TableChanges;
use crate::error::{Error, Result};
use crate::table::TableSpec;
use crate::ttl::{parse_ttl_expression, ColumnTtl, Ttl};

/// ClickHouse dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickHouseDialect;

impl ClickHouseDialect {
    /// Creates a new ClickHouse dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn ttl_clause(&self, column: &str, ttl: Ttl) -> String {
        format!("{} + {ttl}", self.quote_identifier(column))
    }
}

const fn decimal_class(width: u32) -> &'static str {
    match width {
        0..=9 => "Decimal32",
        10..=18 => "Decimal64",
        19..=38 => "Decimal128",
        _ => "Decimal256",
    }
}

fn first_ttl(columns: &[ColumnSpec]) -> Option<(&str, Ttl)> {
    columns
        .iter()
        .find_map(|c| c.ttl().map(|ttl| (c.name(), ttl)))
}

impl Dialect for ClickHouseDialect {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    fn always_alias_fields(&self) -> bool {
        true
    }

    fn wrap_ungrouped_fields(&self) -> bool {
        true
    }

    fn regexp(&self, left: &str, right: &str) -> String {
        format!("match({left}, {right})")
    }

    fn now_function(&self) -> &'static str {
        "now('UTC')"
    }

    fn update_prefix(&self, table: &str) -> String {
        format!("ALTER TABLE {} UPDATE", self.quote_identifier(table))
    }

    fn column_type(&self, col: &ColumnSpec) -> String {
        match col.kind() {
            ColumnKind::Integer { size, unsigned } => {
                let bits = match size {
                    IntegerSize::Tiny => 8,
                    IntegerSize::Small => 16,
                    IntegerSize::Int => 32,
                    IntegerSize::Big => 64,
                };
                format!("{}Int{bits}", if unsigned { "U" } else { "" })
            }
            ColumnKind::Boolean | ColumnKind::Tristate => String::from("UInt8"),
            ColumnKind::Text { .. } | ColumnKind::Compound => String::from("String"),
            ColumnKind::Float { double } => {
                String::from(if double { "Float64" } else { "Float32" })
            }
            ColumnKind::Decimal => format!(
                "{}({}, {})",
                decimal_class(col.width()),
                col.width(),
                col.precision()
            ),
            ColumnKind::DateTime => String::from("DateTime('UTC')"),
        }
    }

    fn column_definition(&self, col: &ColumnSpec) -> Result<String> {
        let ty = self.column_type(col);
        let mut def = if col.is_nullable() {
            format!("{} Nullable({ty})", self.quote_identifier(col.name()))
        } else {
            format!("{} {ty}", self.quote_identifier(col.name()))
        };
        if let Some(default) = col.default_sql()? {
            def.push_str(" DEFAULT ");
            def.push_str(&default);
        }
        Ok(def)
    }

    fn supports_indexes(&self) -> bool {
        false
    }

    fn create_table_sql(&self, table: &TableSpec) -> Result<Vec<String>> {
        let cols = table
            .columns()
            .iter()
            .map(|c| self.column_definition(c))
            .collect::<Result<Vec<_>>>()?;
        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n) ENGINE = MergeTree()",
            self.quote_identifier(table.name()),
            cols.join(",\n")
        );
        if let Some(partition) = table.partition_by() {
            sql.push_str(" PARTITION BY ");
            sql.push_str(partition);
        }
        let primaries: Vec<&str> = table.primary_columns().iter().map(|c| c.name()).collect();
        if primaries.is_empty() {
            sql.push_str(" ORDER BY tuple()");
        } else {
            sql.push_str(&format!(" ORDER BY ({})", quote_list(self, &primaries)));
        }
        if let Some((column, ttl)) = first_ttl(table.columns()) {
            sql.push_str(" TTL ");
            sql.push_str(&self.ttl_clause(column, ttl));
        }
        Ok(vec![sql])
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
            if update.old.is_primary() || update.new.is_primary() {
                warn!(
                    table = %table.name(),
                    column = %update.new.name(),
                    "key column modification skipped"
                );
                continue;
            }
            clauses.push(format!("MODIFY COLUMN {}", self.column_definition(&update.new)?));
        }
        for col in &changes.add_columns {
            clauses.push(format!("ADD COLUMN {}", self.column_definition(col)?));
        }

        let old_ttl = first_ttl(&changes.old_columns);
        let new_ttl = first_ttl(table.columns());
        if old_ttl != new_ttl {
            match new_ttl {
                Some((column, ttl)) => {
                    clauses.push(format!("MODIFY TTL {}", self.ttl_clause(column, ttl)));
                }
                None => clauses.push(String::from("REMOVE TTL")),
            }
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
        vec![format!("SHOW CREATE TABLE {}", self.quote_identifier(table))]
    }

    fn parse_column_specs(&self, table: &str, results: &[Vec<SchemaRow>]) -> Result<Vec<ColumnSpec>> {
        let ddl = results
            .first()
            .and_then(|rows| rows.first())
            .and_then(|row| row_text(row, "statement"))
            .ok_or_else(|| Error::TableNotExists(table.to_string()))?;
        let info = parse_create_table(ddl);
        if info.columns.is_empty() {
            return Err(Error::parse("create table statement", ddl));
        }
        let ttl = info.column_ttl()?;

        let mut specs = Vec::with_capacity(info.columns.len());
        for (name, sql_type, default) in &info.columns {
            let Some((kind, nullable, width, precision)) = parse_type(sql_type) else {
                warn!(column = %name, sql_type = %sql_type, "unsupported live column type skipped");
                continue;
            };
            let mut b = ColumnBuilder::new(name.clone(), kind);
            b = if nullable { b.nullable() } else { b.not_null() };
            if kind == ColumnKind::Decimal {
                b = b.width(width).precision(precision);
            }
            if info.primaries.iter().any(|p| p == name) {
                b = b.primary_key();
            }
            if let Some(t) = ttl.as_ref().filter(|t| &t.column == name) {
                b = b.ttl(t.ttl);
            }
            specs.push(build_live_column(b, default.as_deref())?);
        }
        Ok(specs)
    }
}

fn parse_type(sql_type: &str) -> Option<(ColumnKind, bool, u32, u32)> {
    let mut ty = sql_type.trim();
    let mut nullable = false;
    loop {
        if let Some(inner) = strip_call(ty, "Nullable") {
            nullable = true;
            ty = inner;
        } else if let Some(inner) = strip_call(ty, "LowCardinality") {
            ty = inner;
        } else {
            break;
        }
    }
    let integer = |size, unsigned| ColumnKind::Integer { size, unsigned };
    let kind = match ty {
        "Int8" => integer(IntegerSize::Tiny, false),
        "Int16" => integer(IntegerSize::Small, false),
        "Int32" => integer(IntegerSize::Int, false),
        "Int64" | "Int128" | "Int256" => integer(IntegerSize::Big, false),
        "UInt8" | "Bool" => {
            if nullable {
                ColumnKind::Tristate
            } else {
                ColumnKind::Boolean
            }
        }
        "UInt16" => integer(IntegerSize::Small, true),
        "UInt32" => integer(IntegerSize::Int, true),
        "UInt64" | "UInt128" | "UInt256" => integer(IntegerSize::Big, true),
        "String" => ColumnKind::TEXT,
        "Float32" => ColumnKind::Float { double: false },
        "Float64" => ColumnKind::Float { double: true },
        _ if ty.starts_with("FixedString(") => ColumnKind::TEXT,
        _ if ty.starts_with("DateTime") => ColumnKind::DateTime,
        _ if ty.starts_with("Decimal") => {
            let args = ty
                .find('(')
                .and_then(|open| ty.strip_suffix(')').map(|t| &t[open + 1..]))?;
            let nums: Vec<u32> = args
                .split(',')
                .filter_map(|a| a.trim().parse().ok())
                .collect();
            let (width, precision) = match nums.as_slice() {
                [w, p] => (*w, *p),
                _ => return None,
            };
            return Some((ColumnKind::Decimal, nullable, width, precision));
        }
        _ => return None,
    };
    Some((kind, nullable, 0, 0))
}

fn strip_call<'a>(s: &'a str, func: &str) -> Option<&'a str> {
    s.strip_prefix(func)?
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}

/// What a ClickHouse `CREATE TABLE` statement declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateTableInfo {
    /// Columns as `(name, type, default literal)`.
    pub columns: Vec<(String, String, Option<String>)>,
    /// Primary key columns. Falls back to the sorting key when absent.
    pub primaries: Vec<String>,
    /// Sorting key columns.
    pub order_by: Vec<String>,
    /// Partition expression.
    pub partition: Option<String>,
    /// TTL expression, unparsed.
    pub ttl: Option<String>,
}

impl CreateTableInfo {
    /// Parses the TTL expression, if any.
    pub fn column_ttl(&self) -> Result<Option<ColumnTtl>> {
        self.ttl.as_deref().map(parse_ttl_expression).transpose()
    }
}

const CLAUSES: [&str; 7] = [
    "ENGINE",
    "PARTITION BY",
    "PRIMARY KEY",
    "ORDER BY",
    "SAMPLE BY",
    "TTL",
    "SETTINGS",
];

/// Index of the parenthesis closing the one at `open`, skipping quoted text.
fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = None;
    for (i, c) in s.char_indices().skip_while(|(i, _)| *i < open) {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '`' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on commas outside parentheses and quotes.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '`' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Splits the engine part of the statement into `(clause, body)` pairs.
fn split_clauses(rest: &str) -> Vec<(&'static str, String)> {
    let text = rest.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut marks: Vec<(usize, &'static str)> = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut prev = ' ';
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            prev = c;
            continue;
        }
        match c {
            '\'' | '`' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 && prev == ' ' => {
                let tail = &text[i..];
                if let Some(kw) = CLAUSES.iter().copied().find(|kw| {
                    tail.starts_with(kw)
                        && matches!(tail[kw.len()..].chars().next(), None | Some(' ' | '('))
                }) {
                    marks.push((i, kw));
                }
            }
            _ => {}
        }
        prev = c;
    }
    marks
        .iter()
        .enumerate()
        .map(|(k, (start, kw))| {
            let end = marks.get(k + 1).map_or(text.len(), |m| m.0);
            (*kw, text[start + kw.len()..end].trim().to_string())
        })
        .collect()
}

fn key_columns(body: &str) -> Vec<String> {
    let inner = body
        .strip_prefix("tuple(")
        .or_else(|| body.strip_prefix('('))
        .and_then(|b| b.strip_suffix(')'))
        .unwrap_or(body);
    split_top_level(inner)
        .into_iter()
        .map(|c| c.trim_matches('`').to_string())
        .collect()
}

fn parse_column(item: &str) -> Option<(String, String, Option<String>)> {
    let item = item.trim();
    let (name, rest) = if let Some(quoted) = item.strip_prefix('`') {
        let end = quoted.find('`')?;
        (&quoted[..end], quoted[end + 1..].trim_start())
    } else {
        let end = item.find(char::is_whitespace)?;
        (&item[..end], item[end..].trim_start())
    };
    if matches!(
        name.to_ascii_uppercase().as_str(),
        "INDEX" | "CONSTRAINT" | "PROJECTION"
    ) && !item.starts_with('`')
    {
        return None;
    }

    // The type runs to the first space outside parentheses.
    let mut depth = 0usize;
    let mut end = rest.len();
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ' ' if depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    let sql_type = rest[..end].to_string();
    let default = rest[end..]
        .trim()
        .strip_prefix("DEFAULT ")
        .map(|expr| {
            let expr = expr.trim();
            let literal = expr
                .strip_prefix("CAST(")
                .and_then(|e| split_top_level(e).first().copied())
                .unwrap_or(expr);
            if let Some(quoted) = literal.strip_prefix('\'') {
                quoted.split('\'').next().unwrap_or_default().to_string()
            } else {
                unquote(literal.split(' ').next().unwrap_or_default()).to_string()
            }
        });
    Some((name.to_string(), sql_type, default))
}

/// Parses a `SHOW CREATE TABLE` statement.
#[must_use]
pub fn parse_create_table(ddl: &str) -> CreateTableInfo {
    let mut info = CreateTableInfo::default();
    let rest = match ddl.find('(').and_then(|open| Some((open, matching_paren(ddl, open)?))) {
        Some((open, close)) => {
            info.columns = split_top_level(&ddl[open + 1..close])
                .into_iter()
                .filter_map(parse_column)
                .collect();
            &ddl[close + 1..]
        }
        None => ddl,
    };
    for (clause, body) in split_clauses(rest) {
        match clause {
            "PARTITION BY" => info.partition = Some(body),
            "PRIMARY KEY" => info.primaries = key_columns(&body),
            "ORDER BY" => info.order_by = key_columns(&body),
            "TTL" => info.ttl = Some(body),
            _ => {}
        }
    }
    if info.primaries.is_empty() {
        info.primaries.clone_from(&info.order_by);
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::TextSize;
    use crate::ttl::{parse_ttl, TtlUnit};

    fn col(name: &str, kind: ColumnKind) -> ColumnBuilder {
        ColumnSpec::builder(name, kind)
    }

    #[test]
    fn test_column_definitions() {
        let d = ClickHouseDialect::new();
        let cases = [
            (col("field", ColumnKind::Tristate).build().unwrap(), "`field` Nullable(UInt8)"),
            (col("field", ColumnKind::Boolean).build().unwrap(), "`field` Nullable(UInt8)"),
            (
                col("field", ColumnKind::Boolean).not_null().build().unwrap(),
                "`field` UInt8",
            ),
            (
                col(
                    "field",
                    ColumnKind::Integer {
                        size: IntegerSize::Tiny,
                        unsigned: false,
                    },
                )
                .build()
                .unwrap(),
                "`field` Nullable(Int8)",
            ),
            (
                col(
                    "field",
                    ColumnKind::Integer {
                        size: IntegerSize::Int,
                        unsigned: true,
                    },
                )
                .build()
                .unwrap(),
                "`field` Nullable(UInt32)",
            ),
            (
                col("field", ColumnKind::Float { double: true }).build().unwrap(),
                "`field` Nullable(Float64)",
            ),
            (
                col("field", ColumnKind::Decimal).width(9).precision(8).build().unwrap(),
                "`field` Nullable(Decimal32(9, 8))",
            ),
            (
                col("field", ColumnKind::Decimal).width(18).precision(8).build().unwrap(),
                "`field` Nullable(Decimal64(18, 8))",
            ),
            (
                col("field", ColumnKind::Decimal).width(38).precision(8).build().unwrap(),
                "`field` Nullable(Decimal128(38, 8))",
            ),
            (
                col("field", ColumnKind::Decimal).width(76).precision(8).build().unwrap(),
                "`field` Nullable(Decimal256(76, 8))",
            ),
            (
                col("field", ColumnKind::TEXT).width(16).not_null().build().unwrap(),
                "`field` String",
            ),
            (
                col("field", ColumnKind::TEXT).width(16).default("new!").build().unwrap(),
                "`field` Nullable(String) DEFAULT 'new!'",
            ),
            (
                col("field", ColumnKind::DateTime)
                    .ttl(parse_ttl("3m").unwrap())
                    .build()
                    .unwrap(),
                "`field` Nullable(DateTime('UTC'))",
            ),
            (
                col("field", ColumnKind::DateTime).not_null().build().unwrap(),
                "`field` DateTime('UTC')",
            ),
            (col("field", ColumnKind::Compound).build().unwrap(), "`field` Nullable(String)"),
        ];
        for (c, want) in cases {
            assert_eq!(d.column_definition(&c).unwrap(), want);
        }
    }

    fn sync_specs() -> [TableSpec; 3] {
        let id = || {
            col(
                "id",
                ColumnKind::Integer {
                    size: IntegerSize::Big,
                    unsigned: true,
                },
            )
            .auto_increment()
            .build()
            .unwrap()
        };
        let name = |w| col("name", ColumnKind::TEXT).width(w).charset("utf8").build().unwrap();
        let age = |unsigned| {
            col(
                "age",
                ColumnKind::Integer {
                    size: IntegerSize::Int,
                    unsigned,
                },
            )
            .nullable()
            .default("12")
            .build()
            .unwrap()
        };
        let gender = || {
            col("gender", ColumnKind::TEXT)
                .width(8)
                .not_null()
                .default("male")
                .build()
                .unwrap()
        };
        let created_at = |ttl: Option<&str>| {
            let mut b = col("created_at", ColumnKind::DateTime).created_at();
            if let Some(t) = ttl {
                b = b.ttl(parse_ttl(t).unwrap());
            }
            b.build().unwrap()
        };
        let is_male = col("is_male", ColumnKind::Boolean)
            .pointer(true)
            .not_null()
            .default("true")
            .build()
            .unwrap();

        [
            TableSpec::builder("table1")
                .columns([id(), name(64), age(false), is_male, created_at(Some("3m"))])
                .build()
                .unwrap(),
            TableSpec::builder("table1")
                .columns([id(), name(128), age(true), gender(), created_at(Some("6m"))])
                .build()
                .unwrap(),
            TableSpec::builder("table1")
                .columns([id(), name(128), age(true), gender(), created_at(None)])
                .build()
                .unwrap(),
        ]
    }

    #[test]
    fn test_sync() {
        let d = ClickHouseDialect::new();
        let [ts1, ts2, ts3] = sync_specs();
        let cases = [
            (
                &ts1,
                &ts2,
                "ALTER TABLE `table1` MODIFY COLUMN `age` Nullable(UInt32) DEFAULT 12, ADD COLUMN `gender` String DEFAULT 'male', MODIFY TTL `created_at` + INTERVAL 6 MONTH;",
            ),
            (&ts2, &ts3, "ALTER TABLE `table1` REMOVE TTL;"),
        ];
        for (old, new, want) in cases {
            let changes = TableChanges::compute(&d, new, old.columns().to_vec(), &[]).unwrap();
            let sqls = d.commit_table_changes_sql(new, &changes).unwrap();
            assert_eq!(sqls, vec![want.to_string()]);
        }
    }

    #[test]
    fn test_create_table() {
        let spec = TableSpec::builder("events")
            .column(col("id", ColumnKind::BIGINT).primary_key().build().unwrap())
            .column(
                col("created_at", ColumnKind::DateTime)
                    .not_null()
                    .ttl(parse_ttl("1d").unwrap())
                    .build()
                    .unwrap(),
            )
            .partition_by("toYYYYMM(created_at)")
            .build()
            .unwrap();
        assert_eq!(
            ClickHouseDialect.create_table_sql(&spec).unwrap(),
            vec![String::from(
                "CREATE TABLE IF NOT EXISTS `events` (\n`id` Int64,\n`created_at` DateTime('UTC')\n) ENGINE = MergeTree() PARTITION BY toYYYYMM(created_at) ORDER BY (`id`) TTL `created_at` + INTERVAL 1 DAY"
            )]
        );
    }

    #[test]
    fn test_parse_create_table() {
        let cases = [
            (
                "CREATE TABLE test.testtable (`id` String) ENGINE = MergeTree PARTITION BY toYYYYMM(created_at) PRIMARY KEY (id, name) ORDER BY (id, name) SETTINGS index_granularity = 8192",
                vec!["id", "name"],
                "toYYYYMM(created_at)",
                None,
            ),
            (
                "CREATE TABLE test.testtable (`id` String) ENGINE = MergeTree PARTITION BY toYYYYMM(created_at) PRIMARY KEY id ORDER BY id SETTINGS index_granularity = 8192",
                vec!["id"],
                "toYYYYMM(created_at)",
                None,
            ),
            (
                "CREATE TABLE yunionmeter.payment_bills_tbl
			(created_at DateTime,
		)
			ENGINE = MergeTree
			PARTITION BY toInt32(day / 100)
			PRIMARY KEY day
			ORDER BY day
			TTL created_at + INTERVAL 3 MONTH
			SETTINGS index_granularity = 8192",
                vec!["day"],
                "toInt32(day / 100)",
                Some(("created_at", 3)),
            ),
            (
                "CREATE TABLE yunionlogger.action_tbl (`id` Int64, `obj_type` String, `notes` Nullable(String), `project_domain_id` Nullable(String) DEFAULT CAST('default', 'Nullable(String)'), `ops_time` DateTime, `success` Nullable(UInt8)) ENGINE = MergeTree PARTITION BY toInt64(id / 100000000000) PRIMARY KEY id ORDER BY id TTL ops_time + toIntervalMonth(6) SETTINGS index_granularity = 8192",
                vec!["id"],
                "toInt64(id / 100000000000)",
                Some(("ops_time", 6)),
            ),
        ];
        for (ddl, keys, partition, ttl) in cases {
            let info = parse_create_table(ddl);
            let mut primaries = info.primaries.clone();
            primaries.sort();
            let mut order_by = info.order_by.clone();
            order_by.sort();
            assert_eq!(primaries, keys, "{ddl}");
            assert_eq!(order_by, keys, "{ddl}");
            assert_eq!(info.partition.as_deref(), Some(partition), "{ddl}");
            let got = info.column_ttl().unwrap();
            match ttl {
                Some((column, months)) => {
                    let got = got.unwrap();
                    assert_eq!(got.column, column);
                    assert_eq!(
                        got.ttl,
                        Ttl {
                            count: months,
                            unit: TtlUnit::Month
                        }
                    );
                }
                None => assert!(got.is_none()),
            }
        }
    }

    #[test]
    fn test_parse_column_list() {
        let info = parse_create_table(
            "CREATE TABLE db.t (`id` Int64, `notes` Nullable(String), `domain` Nullable(String) DEFAULT CAST('default', 'Nullable(String)'), `price` Nullable(Decimal(9, 2)), `age` UInt32 DEFAULT 12) ENGINE = MergeTree ORDER BY id",
        );
        assert_eq!(info.columns.len(), 5);
        assert_eq!(info.columns[2].1, "Nullable(String)");
        assert_eq!(info.columns[2].2.as_deref(), Some("default"));
        assert_eq!(info.columns[3].1, "Nullable(Decimal(9, 2))");
        assert_eq!(info.columns[4].2.as_deref(), Some("12"));
        assert_eq!(info.primaries, vec!["id"]);
    }

    #[test]
    fn test_parse_column_specs() {
        let mut row = SchemaRow::new();
        row.insert(
            String::from("statement"),
            Some(String::from(
                "CREATE TABLE db.t (`id` UInt64, `name` Nullable(String) DEFAULT CAST('anon', 'Nullable(String)'), `score` Nullable(Decimal(18, 4)), `created_at` DateTime('UTC'), `ip` IPv4) ENGINE = MergeTree ORDER BY id TTL created_at + INTERVAL 3 MONTH",
            )),
        );
        let d = ClickHouseDialect;
        let specs = d.parse_column_specs("t", &[vec![row]]).unwrap();
        let defs: Vec<String> = specs.iter().map(|c| d.column_definition(c).unwrap()).collect();
        assert_eq!(
            defs,
            vec![
                "`id` UInt64",
                "`name` Nullable(String) DEFAULT 'anon'",
                "`score` Nullable(Decimal64(18, 4))",
                "`created_at` DateTime('UTC')",
            ]
        );
        assert!(specs[0].is_primary());
        assert_eq!(specs[1].kind(), ColumnKind::Text { size: TextSize::Normal });
        assert_eq!(specs[3].ttl(), Some(parse_ttl("3m").unwrap()));

        let mut row = SchemaRow::new();
        row.insert(String::from("statement"), Some(String::from("CREATE VIEW db.v AS SELECT 1")));
        assert!(matches!(
            d.parse_column_specs("v", &[vec![row]]),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_update_prefix_and_regexp() {
        let d = ClickHouseDialect;
        assert_eq!(d.update_prefix("t"), "ALTER TABLE `t` UPDATE");
        assert_eq!(d.regexp("`x`", "?"), "match(`x`, ?)");
        assert!(!d.supports_indexes());
    }
}
