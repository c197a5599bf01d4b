//! # oxide-sqlkit
//!
//! Record mapping, SQL query construction and schema diffing for MySQL,
//! ClickHouse, SQLite and Dameng.
//!
//! This crate provides:
//! - Column and table specifications built explicitly or derived from a
//!   struct with `#[derive(Record)]`
//! - A condition tree and SELECT builder with per-instance table aliases,
//!   subqueries, joins and unions
//! - INSERT, upsert and change-tracking UPDATE preparation
//! - Schema diffing and the per-dialect ALTER or rebuild sequences that
//!   bring a live table in line with its spec
//! - Parsers for each dialect's introspection output
//!
//! Every statement is rendered with positional `?` placeholders; values are
//! returned alongside the SQL in placeholder order and never inlined.
//!
//! ## Dialects
//!
//! A [`Dialect`] is injected through a [`Database`], which also carries the
//! [`AliasAllocator`] used to name table instances and the [`Tolerance`]
//! used to decide whether a value changed.

pub mod alias;
pub mod column;
pub mod condition;
pub mod database;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod field;
pub mod insert;
pub mod query;
pub mod record;
pub mod table;
pub mod ttl;
pub mod update;
pub mod value;

pub use alias::AliasAllocator;
pub use column::{ColumnBuilder, ColumnKind, ColumnSpec, IntegerSize, TagMap, TextSize};
pub use condition::{CompareOp, Condition, Operand};
pub use database::{Database, Databases, DEFAULT_DB};
pub use dialect::{
    dialect_by_name, ClickHouseDialect, DamengDialect, Dialect, MySqlDialect, SchemaRow,
    SqliteDialect,
};
pub use diff::{diff_cols, diff_indexes, ColumnUpdate, TableChanges};
pub use error::{Error, Result};
pub use field::{Case, Field};
pub use insert::{insert_sql, insert_values_sql, InsertMode};
pub use oxide_sqlkit_derive::Record;
pub use query::{JoinType, Order, Query, RawQuery, Source, SubQuery, Union};
pub use record::{compound_value, ColumnType, Record, RecordHooks};
pub use table::{Table, TableIndex, TableSpec, TableSpecBuilder};
pub use ttl::{ColumnTtl, Ttl, TtlUnit};
pub use update::{
    increment_sql, prepare_update, update_fields_sql, update_values_sql, ColumnChange,
    IncrementOp, UpdateSession, UpdateSql,
};
pub use value::{sql_debug, SqlValue, Tolerance, ToSqlValue, Tristate};
