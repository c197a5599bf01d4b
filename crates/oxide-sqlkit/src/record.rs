//! Records: Rust values mapped onto table rows.
//!
//! [`Record`] is usually derived. The derive maps each field type to a
//! [`ColumnKind`] through [`ColumnType`], turns the `#[sqlkit(...)]`
//! attributes into a tag map and builds the columns with
//! [`ColumnSpec::from_tags`](crate::ColumnSpec::from_tags).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::column::{ColumnKind, IntegerSize, TextSize};
use crate::error::Result;
use crate::table::TableSpec;
use crate::value::{SqlValue, Tristate};

/// A value that can be stored as a table row.
pub trait Record {
    /// The table this record maps to.
    fn table_spec() -> Result<Arc<TableSpec>>
    where
        Self: Sized;

    /// Current field values keyed by SQL column name.
    fn values(&self) -> Result<Vec<(&'static str, SqlValue)>>;

    /// Called before an INSERT statement is prepared.
    fn before_insert(&mut self) {}

    /// Called before an UPDATE statement is prepared.
    fn before_update(&mut self) {}
}

/// Insert and update hooks for derived records declared with
/// `#[sqlkit(hooks)]`.
pub trait RecordHooks {
    /// See [`Record::before_insert`].
    fn before_insert(&mut self) {}

    /// See [`Record::before_update`].
    fn before_update(&mut self) {}
}

/// Maps a Rust field type to a column kind.
pub trait ColumnType {
    /// Column kind for this type.
    const KIND: ColumnKind;
    /// Whether the field is optional.
    const IS_POINTER: bool = false;
}

macro_rules! column_type {
    ($($t:ty => $kind:expr),* $(,)?) => {
        $(impl ColumnType for $t {
            const KIND: ColumnKind = $kind;
        })*
    };
}

const fn int(size: IntegerSize, unsigned: bool) -> ColumnKind {
    ColumnKind::Integer { size, unsigned }
}

column_type! {
    i8 => int(IntegerSize::Tiny, false),
    i16 => int(IntegerSize::Small, false),
    i32 => int(IntegerSize::Int, false),
    i64 => int(IntegerSize::Big, false),
    u8 => int(IntegerSize::Tiny, true),
    u16 => int(IntegerSize::Small, true),
    u32 => int(IntegerSize::Int, true),
    u64 => int(IntegerSize::Big, true),
    f32 => ColumnKind::Float { double: false },
    f64 => ColumnKind::Float { double: true },
    bool => ColumnKind::Boolean,
    Tristate => ColumnKind::Tristate,
    String => ColumnKind::Text { size: TextSize::Normal },
    DateTime<Utc> => ColumnKind::DateTime,
    serde_json::Value => ColumnKind::Compound,
}

impl<T: ColumnType> ColumnType for Option<T> {
    const KIND: ColumnKind = T::KIND;
    const IS_POINTER: bool = true;
}

/// Serializes a compound field to its stored JSON text; `null` binds as
/// NULL.
pub fn compound_value<T: Serialize + ?Sized>(value: &T) -> Result<SqlValue> {
    let json = serde_json::to_string(value)?;
    Ok(if json == "null" {
        SqlValue::Null
    } else {
        SqlValue::Text(json)
    })
}
