//! INSERT statement preparation.

use chrono::Utc;
use tracing::debug;

use crate::column::ColumnSpec;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::query::RawQuery;
use crate::record::Record;
use crate::table::TableSpec;
use crate::value::SqlValue;

/// What to do when the row already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMode {
    /// Plain INSERT; a duplicate key is an error.
    #[default]
    Insert,
    /// Overwrite the non-key columns of the existing row.
    Upsert,
}

pub(crate) fn value_of(values: &[(&str, SqlValue)], column: &ColumnSpec) -> SqlValue {
    values
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(column.name()))
        .map_or(SqlValue::Null, |(_, v)| v.clone())
}

pub(crate) fn is_unset_time(value: &SqlValue) -> bool {
    match value {
        SqlValue::Null => true,
        SqlValue::DateTime(t) => t.timestamp() <= 0,
        _ => false,
    }
}

/// Prepares the INSERT for `record`, running its `before_insert` hook first.
pub fn insert_sql<R: Record>(db: &Database, record: &mut R, mode: InsertMode) -> Result<RawQuery> {
    let spec = R::table_spec()?;
    record.before_insert();
    insert_values_sql(db, &spec, &record.values()?, mode)
}

/// Prepares an INSERT from column values.
///
/// A zero auto-increment value is left to the database. Unset
/// `created_at`/`updated_at` columns are stamped with the current time and
/// NULL values fall back to the column default.
pub fn insert_values_sql(
    db: &Database,
    spec: &TableSpec,
    values: &[(&str, SqlValue)],
    mode: InsertMode,
) -> Result<RawQuery> {
    if spec.is_read_only() {
        return Err(Error::ReadOnly(spec.name().to_string()));
    }
    let d = db.dialect();
    let now = Utc::now();

    let mut names = Vec::new();
    let mut vars = Vec::new();
    let mut updates = Vec::new();
    let mut update_vars = Vec::new();
    for col in spec.columns() {
        let raw = value_of(values, col);
        if col.is_auto_increment() && (raw.is_null() || raw.is_zero()) {
            continue;
        }
        let value = if (col.is_created_at() || col.is_updated_at()) && is_unset_time(&raw) {
            SqlValue::DateTime(now)
        } else if col.is_auto_version() && raw.is_null() {
            SqlValue::Int(0)
        } else if raw.is_null() {
            col.default_value()?.unwrap_or(SqlValue::Null)
        } else {
            col.convert_from_value(raw)?
        };
        let quoted = d.quote_identifier(col.name());
        if !col.is_primary() && !col.is_created_at() {
            updates.push(format!("{quoted} = ?"));
            update_vars.push(value.clone());
        }
        names.push(quoted);
        vars.push(value);
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        d.quote_identifier(spec.name()),
        names.join(", "),
        vec!["?"; names.len()].join(", ")
    );
    if mode == InsertMode::Upsert && !updates.is_empty() {
        sql.push_str(&d.upsert_clause(spec, &updates)?);
        vars.extend(update_vars);
    }
    let query = RawQuery::new(sql, vars)?;
    debug!(table = %spec.name(), sql = %query.debug_string(), "insert prepared");
    Ok(query)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::column::ColumnKind;
    use crate::dialect::{ClickHouseDialect, MySqlDialect, SqliteDialect};

    fn mysql() -> Database {
        Database::new("test", Arc::new(MySqlDialect))
    }

    #[test]
    fn test_auto_increment_only() {
        let spec = TableSpec::builder("vv")
            .column(
                ColumnSpec::builder("row_id", ColumnKind::INT)
                    .auto_increment()
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let q = insert_values_sql(&mysql(), &spec, &[("row_id", SqlValue::Int(0))], InsertMode::Insert)
            .unwrap();
        assert_eq!(q.sql(), "INSERT INTO `vv` () VALUES ()");
        assert!(q.variables().is_empty());
    }

    fn keyed() -> TableSpec {
        TableSpec::builder("vv")
            .column(
                ColumnSpec::builder("row_id", ColumnKind::INT)
                    .primary_key()
                    .build()
                    .unwrap(),
            )
            .column(
                ColumnSpec::builder("name", ColumnKind::TEXT)
                    .width(24)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_upsert() {
        let values = [("row_id", SqlValue::Int(1)), ("name", SqlValue::Text("a".into()))];
        let q = insert_values_sql(&mysql(), &keyed(), &values, InsertMode::Upsert).unwrap();
        assert_eq!(
            q.sql(),
            "INSERT INTO `vv` (`row_id`, `name`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `name` = ?"
        );
        assert_eq!(q.variables().len(), 3);

        let sqlite = Database::new("test", Arc::new(SqliteDialect));
        let q = insert_values_sql(&sqlite, &keyed(), &values, InsertMode::Upsert).unwrap();
        assert_eq!(
            q.sql(),
            "INSERT INTO `vv` (`row_id`, `name`) VALUES (?, ?) ON CONFLICT (`row_id`) DO UPDATE SET `name` = ?"
        );

        let ch = Database::new("test", Arc::new(ClickHouseDialect));
        assert!(matches!(
            insert_values_sql(&ch, &keyed(), &values, InsertMode::Upsert),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn test_defaults_and_stamps() {
        let spec = TableSpec::builder("t")
            .column(
                ColumnSpec::builder("status", ColumnKind::TEXT)
                    .width(8)
                    .default("new")
                    .build()
                    .unwrap(),
            )
            .column(
                ColumnSpec::builder("created_at", ColumnKind::DateTime)
                    .created_at()
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let q = insert_values_sql(&mysql(), &spec, &[], InsertMode::Insert).unwrap();
        assert_eq!(q.variables()[0], SqlValue::Text("new".into()));
        assert!(matches!(q.variables()[1], SqlValue::DateTime(_)));
    }

    #[test]
    fn test_read_only() {
        let spec = TableSpec::builder("v")
            .column(ColumnSpec::builder("a", ColumnKind::INT).build().unwrap())
            .read_only()
            .build()
            .unwrap();
        assert!(matches!(
            insert_values_sql(&mysql(), &spec, &[], InsertMode::Insert),
            Err(Error::ReadOnly(t)) if t == "v"
        ));
    }
}
