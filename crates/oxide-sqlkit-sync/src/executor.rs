//! Sync executor.
//!
//! Introspects SQLite tables through the dialect's catalog queries, diffs
//! them against their specs and applies the resulting statements.

use oxide_sqlkit::{
    ColumnSpec, Database, RawQuery, SchemaRow, SqlValue, TableChanges, TableIndex, TableSpec,
};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::error::{Result, SyncError};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Brings SQLite tables in line with their specs.
pub struct SqliteSync {
    pool: SqlitePool,
    db: Database,
    dry_run: bool,
}

impl SqliteSync {
    /// Creates a new sync executor.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            db: Database::sqlite("main"),
            dry_run: false,
        }
    }

    /// Enables dry-run mode (statements are returned but not executed).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the database context statements are built for.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    /// Runs a query and returns its rows keyed by lower-cased column name.
    pub async fn fetch_rows(&self, query: &RawQuery) -> Result<Vec<SchemaRow>> {
        debug!(sql = %query.debug_string(), "Fetching rows");
        let rows = bind_values(sqlx::query(query.sql()), query.variables())?
            .fetch_all(&self.pool)
            .await
            .map_err(translate)?;
        rows.iter().map(schema_row).collect()
    }

    /// Executes a statement with its variables and returns the affected row
    /// count.
    pub async fn execute(&self, query: &RawQuery) -> Result<u64> {
        debug!(sql = %query.debug_string(), "Executing statement");
        let done = bind_values(sqlx::query(query.sql()), query.variables())?
            .execute(&self.pool)
            .await
            .map_err(translate)?;
        Ok(done.rows_affected())
    }

    /// Lists the tables of the database.
    pub async fn table_names(&self) -> Result<Vec<String>> {
        let sql = RawQuery::new(self.db.dialect().tables_sql(), Vec::new())?;
        Ok(self
            .fetch_rows(&sql)
            .await?
            .into_iter()
            .filter_map(|mut row| row.remove("name").flatten())
            .collect())
    }

    async fn fetch_all(&self, sqls: Vec<String>) -> Result<Vec<Vec<SchemaRow>>> {
        let mut results = Vec::with_capacity(sqls.len());
        for sql in sqls {
            results.push(self.fetch_rows(&RawQuery::new(sql, Vec::new())?).await?);
        }
        Ok(results)
    }

    /// Introspects the live columns of `table`.
    pub async fn live_columns(&self, table: &str) -> Result<Vec<ColumnSpec>> {
        let d = self.db.dialect();
        let results = self.fetch_all(d.column_info_sql(table)).await?;
        Ok(d.parse_column_specs(table, &results)?)
    }

    /// Introspects the live indexes of `table`.
    pub async fn live_indexes(&self, table: &str) -> Result<Vec<TableIndex>> {
        let d = self.db.dialect();
        let results = self.fetch_all(d.index_info_sql(table)).await?;
        Ok(d.parse_indexes(table, &results)?)
    }

    /// Computes the statements that bring `spec`'s table up to date.
    pub async fn plan_table(&self, spec: &TableSpec) -> Result<Vec<String>> {
        let d = self.db.dialect();
        let exists = self
            .table_names()
            .await?
            .iter()
            .any(|t| t.eq_ignore_ascii_case(spec.name()));
        if !exists {
            return Ok(d.create_table_sql(spec)?);
        }
        let columns = self.live_columns(spec.name()).await?;
        let indexes = self.live_indexes(spec.name()).await?;
        let changes = TableChanges::compute(d, spec, columns, &indexes)?;
        if changes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(d.commit_table_changes_sql(spec, &changes)?)
    }

    /// Syncs one table and returns the statements applied, or the ones that
    /// would be in dry-run mode.
    pub async fn sync_table(&self, spec: &TableSpec) -> Result<Vec<String>> {
        let sqls = self.plan_table(spec).await?;
        if sqls.is_empty() {
            info!(table = %spec.name(), "Table is up to date");
            return Ok(sqls);
        }
        if self.dry_run {
            return Ok(sqls);
        }

        let mut tx = self.pool.begin().await?;
        for sql in &sqls {
            info!(table = %spec.name(), sql = %sql, "Executing statement");
            sqlx::query(sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(sqls)
    }

    /// Syncs tables in order, returning every statement.
    pub async fn sync_all(&self, specs: &[TableSpec]) -> Result<Vec<String>> {
        let mut all = Vec::new();
        for spec in specs {
            all.extend(self.sync_table(spec).await?);
        }
        Ok(all)
    }
}

/// Maps recognised driver errors (missing table, unique violation) onto the
/// library's typed errors.
fn translate(err: sqlx::Error) -> SyncError {
    if let sqlx::Error::Database(db) = &err {
        if let Some(typed) = oxide_sqlkit::Error::from_driver(None, db.message()) {
            return typed.into();
        }
    }
    err.into()
}

fn bind_values<'q>(mut query: SqliteQuery<'q>, vars: &[SqlValue]) -> Result<SqliteQuery<'q>> {
    for var in vars {
        query = match var {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::UInt(u) => {
                query.bind(i64::try_from(*u).map_err(|_| SyncError::ValueOutOfRange(*u))?)
            }
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Blob(b) => query.bind(b.clone()),
            SqlValue::DateTime(t) => query.bind(*t),
        };
    }
    Ok(query)
}

fn schema_row(row: &SqliteRow) -> Result<SchemaRow> {
    let mut out = SchemaRow::new();
    for column in row.columns() {
        out.insert(column.name().to_lowercase(), cell_text(row, column.ordinal())?);
    }
    Ok(out)
}

/// Renders a cell as text by its storage class.
fn cell_text(row: &SqliteRow, idx: usize) -> Result<Option<String>> {
    let storage = {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(None);
        }
        raw.type_info().name().to_string()
    };
    let text = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(idx)?.to_string(),
        "REAL" => row.try_get::<f64, _>(idx)?.to_string(),
        "BLOB" => String::from_utf8_lossy(&row.try_get::<Vec<u8>, _>(idx)?).into_owned(),
        _ => row.try_get::<String, _>(idx)?,
    };
    Ok(Some(text))
}
