//! Schema sync for SQLite.
//!
//! `oxide-sqlkit-sync` applies oxide-sqlkit table specs to a live SQLite
//! database:
//! - Missing tables are created with their indexes
//! - Existing tables are introspected, diffed and altered, or rebuilt when
//!   a column changes or disappears
//! - Dry runs return the statements without executing them
//!
//! Specs come from `#[derive(Record)]` types or from a JSON schema file
//! (see [`schema_file`]).

pub mod error;
pub mod executor;
pub mod schema_file;

pub use error::{Result, SyncError};
pub use executor::SqliteSync;
pub use schema_file::{ColumnDef, SchemaFile, TableDef};
