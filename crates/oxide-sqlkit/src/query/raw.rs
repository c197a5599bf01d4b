//! Caller-written SQL.

use crate::error::{Error, Result};
use crate::value::{sql_debug, SqlValue};

/// A SQL string with its bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery {
    sql: String,
    vars: Vec<SqlValue>,
}

impl RawQuery {
    /// Wraps a statement; blank SQL is rejected.
    pub fn new(sql: impl Into<String>, vars: Vec<SqlValue>) -> Result<Self> {
        let sql = sql.into();
        if sql.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        Ok(Self { sql, vars })
    }

    /// The statement.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound values.
    #[must_use]
    pub fn variables(&self) -> &[SqlValue] {
        &self.vars
    }

    /// The statement with its values inlined, for logging.
    #[must_use]
    pub fn debug_string(&self) -> String {
        sql_debug(&self.sql, &self.vars)
    }
}
