//! UPDATE statement preparation.
//!
//! An update is a two step affair: [`prepare_update`] snapshots the record
//! as fetched, the caller mutates it, and [`UpdateSession::save_update_sql`]
//! renders a SET clause for the columns that actually changed. Changes are
//! detected with the database's [`Tolerance`](crate::Tolerance) so float
//! rounding and sub-second timestamp noise do not count.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::column::ColumnSpec;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::insert::value_of;
use crate::query::RawQuery;
use crate::record::Record;
use crate::table::TableSpec;
use crate::value::SqlValue;

/// One changed column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnChange {
    /// Column name.
    pub column: String,
    /// Value before the update.
    pub old: SqlValue,
    /// Value written.
    pub new: SqlValue,
}

/// A prepared UPDATE with the changes it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSql {
    /// Statement and bound values.
    pub query: RawQuery,
    /// Changed columns in SET order.
    pub changes: Vec<ColumnChange>,
    /// Primary key values the WHERE clause matches.
    pub primary_keys: Vec<(String, SqlValue)>,
}

/// Direction of an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOp {
    /// `c = c + delta`
    Add,
    /// `c = c - delta`
    Sub,
}

impl IncrementOp {
    const fn operator(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
        }
    }
}

/// Snapshot of a record taken before it is modified.
#[derive(Debug, Clone)]
pub struct UpdateSession {
    spec: Arc<TableSpec>,
    baseline: Vec<(String, SqlValue)>,
}

/// Starts an update of `record`.
pub fn prepare_update<R: Record>(record: &R) -> Result<UpdateSession> {
    let spec = R::table_spec()?;
    if spec.is_read_only() {
        return Err(Error::ReadOnly(spec.name().to_string()));
    }
    let values = record.values()?;
    let baseline = spec
        .columns()
        .iter()
        .map(|c| Ok((c.name().to_string(), c.convert_from_value(value_of(&values, c))?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(UpdateSession { spec, baseline })
}

fn is_managed(col: &ColumnSpec) -> bool {
    col.is_auto_increment() || col.is_auto_version() || col.is_created_at() || col.is_updated_at()
}

struct SetClause<'a> {
    db: &'a Database,
    spec: &'a TableSpec,
    assignments: Vec<String>,
    vars: Vec<SqlValue>,
}

impl<'a> SetClause<'a> {
    const fn new(db: &'a Database, spec: &'a TableSpec) -> Self {
        Self {
            db,
            spec,
            assignments: Vec::new(),
            vars: Vec::new(),
        }
    }

    fn set(&mut self, col: &ColumnSpec, value: SqlValue) {
        let q = self.db.dialect().quote_identifier(col.name());
        self.assignments.push(format!("{q} = ?"));
        self.vars.push(value);
    }

    fn raw(&mut self, col: &ColumnSpec, expr: &str) {
        let q = self.db.dialect().quote_identifier(col.name());
        self.assignments.push(format!("{q} = {expr}"));
    }

    /// Version bump and `updated_at` restamp. `now` replaces the bound
    /// timestamp with a SQL expression.
    fn stamp(&mut self, now: Option<&str>) {
        let spec = self.spec;
        if let Some(col) = spec.version_column() {
            let q = self.db.dialect().quote_identifier(col.name());
            self.raw(col, &format!("{q} + 1"));
        }
        if let Some(col) = spec.updated_at_column() {
            match now {
                Some(expr) => self.raw(col, expr),
                None => self.set(col, SqlValue::DateTime(Utc::now())),
            }
        }
    }

    fn finish(self, keys: &[(String, SqlValue)]) -> Result<RawQuery> {
        if keys.is_empty() {
            return Err(Error::EmptyPrimaryKey);
        }
        let Self {
            db,
            spec,
            assignments,
            mut vars,
        } = self;
        let d = db.dialect();
        let conds: Vec<String> = keys
            .iter()
            .map(|(name, _)| format!("{} = ?", d.quote_identifier(name)))
            .collect();
        vars.extend(keys.iter().map(|(_, v)| v.clone()));
        let sql = format!(
            "{} {} WHERE {}",
            d.update_prefix(spec.name()),
            assignments.join(", "),
            conds.join(" AND ")
        );
        let query = RawQuery::new(sql, vars)?;
        debug!(table = %spec.name(), sql = %query.debug_string(), "update prepared");
        Ok(query)
    }
}

fn primary_keys(spec: &TableSpec, values: &[(&str, SqlValue)]) -> Result<Vec<(String, SqlValue)>> {
    spec.primary_columns()
        .into_iter()
        .map(|c| Ok((c.name().to_string(), c.convert_from_value(value_of(values, c))?)))
        .collect()
}

impl UpdateSession {
    /// The table being updated.
    #[must_use]
    pub fn spec(&self) -> &Arc<TableSpec> {
        &self.spec
    }

    /// Renders the UPDATE for the columns of `record` that differ from the
    /// snapshot. The WHERE clause matches the snapshot's primary key, so a
    /// key column may itself be updated.
    pub fn save_update_sql<R: Record>(&self, db: &Database, record: &mut R) -> Result<UpdateSql> {
        record.before_update();
        let values = record.values()?;
        let tolerance = db.tolerance();

        let mut set = SetClause::new(db, &self.spec);
        let mut changes = Vec::new();
        for (col, (_, old)) in self.spec.columns().iter().zip(&self.baseline) {
            if is_managed(col) {
                continue;
            }
            let new = col.convert_from_value(value_of(&values, col))?;
            if old.gross_eq(&new, tolerance) {
                continue;
            }
            set.set(col, new.clone());
            changes.push(ColumnChange {
                column: col.name().to_string(),
                old: old.clone(),
                new,
            });
        }
        if changes.is_empty() {
            return Err(Error::NoDataToUpdate);
        }
        set.stamp(None);

        let primary_keys: Vec<(String, SqlValue)> = self
            .spec
            .columns()
            .iter()
            .zip(&self.baseline)
            .filter(|(c, _)| c.is_primary())
            .map(|(_, kv)| kv.clone())
            .collect();
        let query = set.finish(&primary_keys)?;
        Ok(UpdateSql {
            query,
            changes,
            primary_keys,
        })
    }
}

/// Renders an UPDATE of the given columns of `record`, in the order given.
pub fn update_fields_sql<R: Record>(
    db: &Database,
    record: &R,
    fields: &[(&str, SqlValue)],
) -> Result<RawQuery> {
    let spec = R::table_spec()?;
    update_values_sql(db, &spec, &record.values()?, fields)
}

/// Renders an UPDATE of `fields` for the row whose primary key is taken from
/// `values`.
pub fn update_values_sql(
    db: &Database,
    spec: &TableSpec,
    values: &[(&str, SqlValue)],
    fields: &[(&str, SqlValue)],
) -> Result<RawQuery> {
    if spec.is_read_only() {
        return Err(Error::ReadOnly(spec.name().to_string()));
    }
    if fields.is_empty() {
        return Err(Error::NoDataToUpdate);
    }
    let mut set = SetClause::new(db, spec);
    for (name, value) in fields {
        let col = spec
            .column(name)
            .ok_or_else(|| Error::invalid_column(*name, format!("no such column in {}", spec.name())))?;
        set.set(col, col.convert_from_value(value.clone())?);
    }
    set.stamp(None);
    set.finish(&primary_keys(spec, values)?)
}

/// Renders `c = c + ?` (or `-`) for every numeric column with a non-zero
/// value in `delta`, keyed on the primary key of `target` (or of `delta`
/// when no target is given).
pub fn increment_sql<R: Record>(
    db: &Database,
    delta: &R,
    target: Option<&R>,
    op: IncrementOp,
) -> Result<RawQuery> {
    let spec = R::table_spec()?;
    if spec.is_read_only() {
        return Err(Error::ReadOnly(spec.name().to_string()));
    }
    let deltas = delta.values()?;
    let mut set = SetClause::new(db, &spec);
    for col in spec.columns() {
        if !col.is_numeric() || col.is_primary() || is_managed(col) {
            continue;
        }
        let value = col.convert_from_value(value_of(&deltas, col))?;
        if value.is_null() || value.is_zero() {
            continue;
        }
        let q = db.dialect().quote_identifier(col.name());
        set.assignments.push(format!("{q} = {q} {} ?", op.operator()));
        set.vars.push(value);
    }
    if set.vars.is_empty() {
        return Err(Error::NoDataToUpdate);
    }
    set.stamp(Some(db.dialect().now_function()));
    let keys = match target {
        Some(t) => primary_keys(&spec, &t.values()?)?,
        None => primary_keys(&spec, &deltas)?,
    };
    set.finish(&keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnKind, IntegerSize};
    use crate::dialect::{ClickHouseDialect, MySqlDialect};
    use crate::record::RecordHooks;

    #[derive(Debug, Clone, Default)]
    struct Row {
        id: i64,
        name: String,
        age: i32,
        score: f64,
    }

    impl Record for Row {
        fn table_spec() -> Result<Arc<TableSpec>> {
            let int = |n: &str| ColumnSpec::builder(n, ColumnKind::INT);
            Ok(Arc::new(
                TableSpec::builder("testtable")
                    .column(int("id").primary_key().build()?)
                    .column(ColumnSpec::builder("name", ColumnKind::TEXT).width(16).build()?)
                    .column(int("age").nullable().build()?)
                    .column(
                        ColumnSpec::builder("score", ColumnKind::Float { double: true })
                            .build()?,
                    )
                    .column(
                        ColumnSpec::builder("created_at", ColumnKind::DateTime)
                            .created_at()
                            .build()?,
                    )
                    .column(
                        ColumnSpec::builder("updated_at", ColumnKind::DateTime)
                            .updated_at()
                            .build()?,
                    )
                    .column(
                        ColumnSpec::builder(
                            "version",
                            ColumnKind::Integer {
                                size: IntegerSize::Big,
                                unsigned: false,
                            },
                        )
                        .auto_version()
                        .build()?,
                    )
                    .build()?,
            ))
        }

        fn values(&self) -> Result<Vec<(&'static str, SqlValue)>> {
            Ok(vec![
                ("id", SqlValue::Int(self.id)),
                ("name", SqlValue::Text(self.name.clone())),
                ("age", SqlValue::Int(i64::from(self.age))),
                ("score", SqlValue::Float(self.score)),
            ])
        }

        fn before_update(&mut self) {
            RecordHooks::before_update(self);
        }
    }

    impl RecordHooks for Row {
        fn before_update(&mut self) {
            if self.name.len() > 16 {
                self.name = format!("{}..", &self.name[..14]);
            }
        }
    }

    fn row() -> Row {
        Row {
            id: 12345,
            name: "john".into(),
            age: 20,
            score: 1.5,
        }
    }

    #[test]
    fn test_update_changed_columns() {
        let db = Database::new("test", Arc::new(MySqlDialect));
        let mut dt = row();
        let session = prepare_update(&dt).unwrap();
        dt.name = "johny".into();
        let result = session.save_update_sql(&db, &mut dt).unwrap();
        assert_eq!(
            result.query.sql(),
            "UPDATE `testtable` SET `name` = ?, `version` = `version` + 1, `updated_at` = ? WHERE `id` = ?"
        );
        assert_eq!(result.query.variables().len(), 3);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].old, SqlValue::Text("john".into()));
        assert_eq!(result.primary_keys, vec![("id".to_string(), SqlValue::Int(12345))]);
    }

    #[test]
    fn test_update_clickhouse_prefix() {
        let db = Database::new("test", Arc::new(ClickHouseDialect));
        let mut dt = row();
        let session = prepare_update(&dt).unwrap();
        dt.name = "johny".into();
        let result = session.save_update_sql(&db, &mut dt).unwrap();
        assert_eq!(
            result.query.sql(),
            "ALTER TABLE `testtable` UPDATE `name` = ?, `version` = `version` + 1, `updated_at` = ? WHERE `id` = ?"
        );
    }

    #[test]
    fn test_update_hook_and_noise() {
        let db = Database::new("test", Arc::new(MySqlDialect));
        let mut dt = row();
        let session = prepare_update(&dt).unwrap();
        dt.score += 1e-9;
        assert!(matches!(
            session.save_update_sql(&db, &mut dt),
            Err(Error::NoDataToUpdate)
        ));

        dt.name = "a very long name indeed".into();
        let result = session.save_update_sql(&db, &mut dt).unwrap();
        assert_eq!(dt.name, "a very long na..");
        assert_eq!(result.changes[0].new, SqlValue::Text("a very long na..".into()));
    }

    #[test]
    fn test_update_fields() {
        let db = Database::new("test", Arc::new(MySqlDialect));
        let dt = Row {
            id: 123_456,
            ..Row::default()
        };
        let q = update_fields_sql(
            &db,
            &dt,
            &[
                ("name", SqlValue::Text("John".into())),
                ("age", SqlValue::Int(23)),
            ],
        )
        .unwrap();
        assert_eq!(
            q.sql(),
            "UPDATE `testtable` SET `name` = ?, `age` = ?, `version` = `version` + 1, `updated_at` = ? WHERE `id` = ?"
        );
        assert_eq!(q.variables().len(), 5);
        assert!(matches!(
            update_fields_sql(&db, &dt, &[("nope", SqlValue::Int(1))]),
            Err(Error::InvalidColumn { .. })
        ));
    }

    #[test]
    fn test_increment() {
        let db = Database::new("test", Arc::new(MySqlDialect));
        let dt = Row {
            id: 12345,
            age: 2,
            ..Row::default()
        };
        for (op, sign) in [(IncrementOp::Add, "+"), (IncrementOp::Sub, "-")] {
            let q = increment_sql(&db, &dt, None, op).unwrap();
            assert_eq!(
                q.sql(),
                format!(
                    "UPDATE `testtable` SET `age` = `age` {sign} ?, `version` = `version` + 1, `updated_at` = UTC_TIMESTAMP() WHERE `id` = ?"
                )
            );
            assert_eq!(q.variables(), &[SqlValue::Int(2), SqlValue::Int(12345)]);
        }
        let zero = Row::default();
        assert!(matches!(
            increment_sql(&db, &zero, Some(&dt), IncrementOp::Add),
            Err(Error::NoDataToUpdate)
        ));
    }
}
