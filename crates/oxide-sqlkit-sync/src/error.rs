//! Error types for the sync tool.

use std::path::PathBuf;

/// Errors that can occur while syncing a schema.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Database error while introspecting or applying statements.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error reading a schema file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed schema file.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Spec, diff or SQL construction error.
    #[error(transparent)]
    Sql(#[from] oxide_sqlkit::Error),

    /// A schema file column names a kind with no mapping.
    #[error("Unknown kind '{kind}' for column '{column}' in {path}")]
    UnknownKind {
        /// Schema file.
        path: PathBuf,
        /// Column name.
        column: String,
        /// The kind as written.
        kind: String,
    },

    /// An unsigned value does not fit SQLite's signed 64-bit integer.
    #[error("Value {0} does not fit a SQLite integer")]
    ValueOutOfRange(u64),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
