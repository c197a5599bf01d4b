//! Error types for schema construction, statement building and
//! introspection.

/// MySQL error number for "table doesn't exist".
pub const MYSQL_TABLE_NOT_EXISTS: u16 = 0x47a;
/// MySQL error number for "duplicate entry".
pub const MYSQL_DUPLICATE_ENTRY: u16 = 1062;

/// Errors returned by the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An update was requested but no column changed.
    #[error("no data to update")]
    NoDataToUpdate,

    /// A unique constraint rejected the statement.
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    /// A query or raw statement has nothing to execute.
    #[error("empty query")]
    EmptyQuery,

    /// A primary key column has neither a value nor a default.
    #[error("empty primary key")]
    EmptyPrimaryKey,

    /// A statement affected or returned an unexpected number of rows.
    #[error("unexpected row count: expected {expected}, got {actual}")]
    UnexpectedRowCount {
        /// Rows expected.
        expected: u64,
        /// Rows seen.
        actual: u64,
    },

    /// The table is flagged read-only.
    #[error("table '{0}' is read only")]
    ReadOnly(String),

    /// The dialect cannot express the requested operation.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The table does not exist in the live database.
    #[error("table '{0}' does not exist")]
    TableNotExists(String),

    /// A column definition violates a construction rule.
    #[error("invalid column '{column}': {reason}")]
    InvalidColumn {
        /// Column name.
        column: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A table definition violates a construction rule.
    #[error("invalid table '{table}': {reason}")]
    InvalidTable {
        /// Table name.
        table: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A query was composed in a way that cannot be rendered.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Introspection output could not be parsed.
    #[error("failed to parse {what}: {input}")]
    Parse {
        /// The construct being parsed.
        what: &'static str,
        /// The offending input.
        input: String,
    },

    /// JSON conversion of a compound value failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Creates an [`Error::InvalidColumn`].
    pub fn invalid_column(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidColumn {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::InvalidTable`].
    pub fn invalid_table(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTable {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::Parse`].
    pub fn parse(what: &'static str, input: impl Into<String>) -> Self {
        Self::Parse {
            what,
            input: input.into(),
        }
    }

    /// Translates a driver error into a typed error when it is one of the
    /// recognised cases.
    ///
    /// `code` is the numeric server error (MySQL) if the driver exposes one.
    /// Returns `None` when the error should be passed through unchanged.
    #[must_use]
    pub fn from_driver(code: Option<u16>, message: &str) -> Option<Self> {
        match code {
            Some(MYSQL_TABLE_NOT_EXISTS) => {
                return Some(Self::TableNotExists(message.to_string()));
            }
            Some(MYSQL_DUPLICATE_ENTRY) => {
                return Some(Self::DuplicateEntry(message.to_string()));
            }
            _ => {}
        }
        if let Some(rest) = message.strip_prefix("no such table: ") {
            return Some(Self::TableNotExists(rest.trim().to_string()));
        }
        if message.contains("UNIQUE constraint failed") {
            return Some(Self::DuplicateEntry(message.to_string()));
        }
        None
    }
}

/// Result type for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_mysql_codes() {
        assert!(matches!(
            Error::from_driver(Some(1146), "Table 'db.t' doesn't exist"),
            Some(Error::TableNotExists(_))
        ));
        assert!(matches!(
            Error::from_driver(Some(1062), "Duplicate entry '1' for key 'PRIMARY'"),
            Some(Error::DuplicateEntry(_))
        ));
        assert!(Error::from_driver(Some(1205), "Lock wait timeout").is_none());
    }

    #[test]
    fn test_translate_sqlite_messages() {
        match Error::from_driver(None, "no such table: users") {
            Some(Error::TableNotExists(t)) => assert_eq!(t, "users"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            Error::from_driver(None, "UNIQUE constraint failed: users.id"),
            Some(Error::DuplicateEntry(_))
        ));
        assert!(Error::from_driver(None, "disk I/O error").is_none());
    }

    #[test]
    fn test_error_display() {
        let err = Error::invalid_column("flag", "decimal requires a width");
        assert_eq!(
            err.to_string(),
            "invalid column 'flag': decimal requires a width"
        );
    }
}
