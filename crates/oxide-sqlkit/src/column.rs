//! Column specifications.
//!
//! A [`ColumnSpec`] is an immutable descriptor of one table column: its
//! semantic [`ColumnKind`], nullability, key flags, default and the
//! width/precision/TTL extensions that the dialects render into DDL.
//! Specs are built either through [`ColumnBuilder`] or from a tag map with
//! [`ColumnSpec::from_tags`], which is what `#[derive(Record)]` emits.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::ttl::{parse_ttl, Ttl};
use crate::value::SqlValue;

/// Parsed field tags, keyed by tag name.
pub type TagMap = BTreeMap<String, String>;

/// Recognised tag names.
pub mod tag {
    /// Text width or decimal precision digits.
    pub const WIDTH: &str = "width";
    /// `medium` or `long` for unbounded text.
    pub const TEXT_LENGTH: &str = "text_length";
    /// Character set (`ascii`, `utf8`).
    pub const CHARSET: &str = "charset";
    /// Explicit nullability.
    pub const NULLABLE: &str = "nullable";
    /// Part of the primary key.
    pub const PRIMARY: &str = "primary";
    /// Single column index.
    pub const INDEX: &str = "index";
    /// Default value.
    pub const DEFAULT: &str = "default";
    /// Digits after the decimal point.
    pub const PRECISION: &str = "precision";
    /// Auto-increment column.
    pub const AUTO_INCREMENT: &str = "auto_increment";
    /// Auto-increment start value.
    pub const AUTO_INCREMENT_OFFSET: &str = "auto_increment_offset";
    /// Incremented on every update.
    pub const AUTO_VERSION: &str = "auto_version";
    /// Stamped on insert.
    pub const CREATED_AT: &str = "created_at";
    /// Stamped on insert and update.
    pub const UPDATED_AT: &str = "updated_at";
    /// Column rename.
    pub const NAME: &str = "name";
    /// Column rename, takes precedence over `name`.
    pub const SQL_NAME: &str = "sql_name";
    /// ClickHouse row retention, e.g. `3m`.
    pub const CLICKHOUSE_TTL: &str = "clickhouse_ttl";
}

/// Storage size of an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerSize {
    /// 8 bits.
    Tiny,
    /// 16 bits.
    Small,
    /// 32 bits.
    Int,
    /// 64 bits.
    Big,
}

/// Storage class of an unbounded text column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextSize {
    /// TEXT.
    #[default]
    Normal,
    /// MEDIUMTEXT.
    Medium,
    /// LONGTEXT.
    Long,
}

/// The closed set of column kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Signed or unsigned integer.
    Integer {
        /// Storage size.
        size: IntegerSize,
        /// Unsigned flag.
        unsigned: bool,
    },
    /// String. A zero width selects an unbounded type.
    Text {
        /// Storage class when unbounded.
        size: TextSize,
    },
    /// Binary floating point.
    Float {
        /// 64-bit if set.
        double: bool,
    },
    /// Fixed point, requires a width.
    Decimal,
    /// Two-valued boolean stored as 0/1.
    Boolean,
    /// Three-valued boolean stored as 0/1/NULL.
    Tristate,
    /// UTC timestamp.
    DateTime,
    /// Serialized JSON value stored as text.
    Compound,
}

impl ColumnKind {
    /// Shorthand for a signed 32-bit integer.
    pub const INT: Self = Self::Integer {
        size: IntegerSize::Int,
        unsigned: false,
    };
    /// Shorthand for a signed 64-bit integer.
    pub const BIGINT: Self = Self::Integer {
        size: IntegerSize::Big,
        unsigned: false,
    };
    /// Shorthand for a normal text column.
    pub const TEXT: Self = Self::Text {
        size: TextSize::Normal,
    };

    /// Returns `true` for integer kinds.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Integer { .. })
    }

    /// Returns `true` for kinds whose values can be added to.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer { .. } | Self::Float { .. } | Self::Decimal)
    }
}

/// Immutable column descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    field_name: String,
    db_name: Option<String>,
    kind: ColumnKind,
    is_pointer: bool,
    nullable: bool,
    primary: bool,
    index: bool,
    default: Option<String>,
    width: u32,
    precision: u32,
    charset: Option<String>,
    auto_increment: bool,
    auto_increment_offset: u64,
    auto_increment_step: u64,
    auto_version: bool,
    created_at: bool,
    updated_at: bool,
    ttl: Option<Ttl>,
}

impl ColumnSpec {
    /// Starts building a column of the given kind.
    #[must_use]
    pub fn builder(name: impl Into<String>, kind: ColumnKind) -> ColumnBuilder {
        ColumnBuilder::new(name, kind)
    }

    /// Builds a column from parsed field tags.
    ///
    /// Unknown tags are ignored. A float field carrying a `width` tag
    /// becomes a decimal column.
    pub fn from_tags(
        field: impl Into<String>,
        kind: ColumnKind,
        tags: &TagMap,
        is_pointer: bool,
    ) -> Result<Self> {
        let field = field.into();
        let kind = match kind {
            ColumnKind::Float { .. } if tags.contains_key(tag::WIDTH) => ColumnKind::Decimal,
            other => other,
        };
        let mut b = ColumnBuilder::new(field.clone(), kind).pointer(is_pointer);

        let flag = |key: &str| -> Result<Option<bool>> {
            tags.get(key).map(|v| parse_flag(&field, key, v)).transpose()
        };
        let number = |key: &str| -> Result<Option<u64>> {
            tags.get(key)
                .map(|v| {
                    v.trim().parse::<u64>().map_err(|_| {
                        Error::invalid_column(&field, format!("tag {key} is not a number: {v}"))
                    })
                })
                .transpose()
        };

        if let Some(name) = tags.get(tag::SQL_NAME).or_else(|| tags.get(tag::NAME)) {
            b = b.db_name(name.clone());
        }
        if let Some(v) = number(tag::WIDTH)? {
            b = b.width(u32::try_from(v).unwrap_or(u32::MAX));
        }
        if let Some(v) = number(tag::PRECISION)? {
            b = b.precision(u32::try_from(v).unwrap_or(u32::MAX));
        }
        if let ColumnKind::Text { .. } = kind {
            match tags.get(tag::TEXT_LENGTH).map(|s| s.to_ascii_lowercase()) {
                Some(s) if s == "medium" => b = b.text_size(TextSize::Medium),
                Some(s) if s == "long" => b = b.text_size(TextSize::Long),
                _ => {}
            }
        }
        if let Some(charset) = tags.get(tag::CHARSET) {
            b = b.charset(charset.clone());
        }
        if let Some(nullable) = flag(tag::NULLABLE)? {
            b = if nullable { b.nullable() } else { b.not_null() };
        }
        if flag(tag::PRIMARY)? == Some(true) {
            b = b.primary_key();
        }
        if flag(tag::INDEX)? == Some(true) {
            b = b.index();
        }
        if let Some(default) = tags.get(tag::DEFAULT) {
            b = b.default(default.clone());
        }
        if flag(tag::AUTO_INCREMENT)? == Some(true) {
            b = b.auto_increment();
        }
        if let Some(offset) = number(tag::AUTO_INCREMENT_OFFSET)? {
            b = b.auto_increment_offset(offset);
        }
        if flag(tag::AUTO_VERSION)? == Some(true) {
            b = b.auto_version();
        }
        if flag(tag::CREATED_AT)? == Some(true) {
            b = b.created_at();
        }
        if flag(tag::UPDATED_AT)? == Some(true) {
            b = b.updated_at();
        }
        if let Some(ttl) = tags.get(tag::CLICKHOUSE_TTL) {
            b = b.ttl(parse_ttl(ttl)?);
        }
        b.build()
    }

    /// Column name as used in SQL.
    #[must_use]
    pub fn name(&self) -> &str {
        self.db_name.as_deref().unwrap_or(&self.field_name)
    }

    /// Name of the record field the column maps to.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Column kind.
    #[must_use]
    pub const fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Whether the record field is optional.
    #[must_use]
    pub const fn is_pointer(&self) -> bool {
        self.is_pointer
    }

    /// Whether the column accepts NULL.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Whether the column is part of the primary key.
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        self.primary
    }

    /// Whether the column carries its own single-column index.
    #[must_use]
    pub const fn is_index(&self) -> bool {
        self.index
    }

    pub(crate) const fn with_index(mut self, index: bool) -> Self {
        self.index = index;
        self
    }

    /// Raw default value.
    #[must_use]
    pub fn default(&self) -> Option<&str> {
        self.default.as_deref().filter(|d| !d.is_empty())
    }

    /// Text width or decimal digits; zero when unset.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Decimal digits after the point.
    #[must_use]
    pub const fn precision(&self) -> u32 {
        self.precision
    }

    /// Character set, if set.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Whether the column is auto-increment.
    #[must_use]
    pub const fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    /// Auto-increment start value; zero when unset.
    #[must_use]
    pub const fn auto_increment_offset(&self) -> u64 {
        self.auto_increment_offset
    }

    /// Auto-increment step.
    #[must_use]
    pub const fn auto_increment_step(&self) -> u64 {
        self.auto_increment_step
    }

    /// Whether the column is bumped on every update.
    #[must_use]
    pub const fn is_auto_version(&self) -> bool {
        self.auto_version
    }

    /// Whether the column is stamped on insert.
    #[must_use]
    pub const fn is_created_at(&self) -> bool {
        self.created_at
    }

    /// Whether the column is stamped on insert and update.
    #[must_use]
    pub const fn is_updated_at(&self) -> bool {
        self.updated_at
    }

    /// Row retention interval.
    #[must_use]
    pub const fn ttl(&self) -> Option<Ttl> {
        self.ttl
    }

    /// Whether values are stored as text.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self.kind, ColumnKind::Text { .. } | ColumnKind::Compound)
    }

    /// Whether the column can be incremented.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        self.kind.is_numeric()
    }

    /// Coerces a string into the value the driver expects for this column.
    pub fn convert_from_string(&self, s: &str) -> Result<SqlValue> {
        match self.kind {
            ColumnKind::Integer { unsigned, .. } => {
                let t = s.trim();
                if unsigned {
                    t.parse::<u64>()
                        .map(SqlValue::UInt)
                        .map_err(|_| Error::parse("integer", s))
                } else {
                    t.parse::<i64>()
                        .map(SqlValue::Int)
                        .map_err(|_| Error::parse("integer", s))
                }
            }
            ColumnKind::Boolean => Ok(SqlValue::Int(i64::from(is_truthy(s)))),
            ColumnKind::Tristate => Ok(if is_truthy(s) {
                SqlValue::Int(1)
            } else if is_falsy(s) {
                SqlValue::Int(0)
            } else {
                SqlValue::Null
            }),
            ColumnKind::Float { .. } | ColumnKind::Decimal => s
                .trim()
                .parse::<f64>()
                .map(SqlValue::Float)
                .map_err(|_| Error::parse("float", s)),
            ColumnKind::Text { .. } => Ok(SqlValue::Text(s.to_string())),
            ColumnKind::DateTime => parse_datetime(s).map(SqlValue::DateTime),
            ColumnKind::Compound => {
                if s.is_empty() {
                    Ok(SqlValue::Text(String::from("null")))
                } else if serde_json::from_str::<serde_json::Value>(s).is_ok() {
                    Ok(SqlValue::Text(s.to_string()))
                } else {
                    Ok(SqlValue::Text(serde_json::Value::from(s).to_string()))
                }
            }
        }
    }

    /// Coerces a bound value into the form the driver expects for this
    /// column.
    pub fn convert_from_value(&self, value: SqlValue) -> Result<SqlValue> {
        if value.is_null() {
            return Ok(value);
        }
        match (self.kind, value) {
            (ColumnKind::Boolean | ColumnKind::Tristate, SqlValue::Bool(b)) => {
                Ok(SqlValue::Int(i64::from(b)))
            }
            (ColumnKind::Boolean, SqlValue::Int(n)) => Ok(SqlValue::Int(i64::from(n != 0))),
            (ColumnKind::Boolean, SqlValue::UInt(n)) => Ok(SqlValue::Int(i64::from(n != 0))),
            (kind, SqlValue::Text(s)) if !matches!(kind, ColumnKind::Text { .. }) => {
                self.convert_from_string(&s)
            }
            (_, v) => Ok(v),
        }
    }

    /// Serializes a compound value to its stored JSON text.
    pub fn convert_serializable<T: Serialize + ?Sized>(&self, value: &T) -> Result<SqlValue> {
        Ok(SqlValue::Text(serde_json::to_string(value)?))
    }

    /// Default value coerced for this column, if any.
    pub fn default_value(&self) -> Result<Option<SqlValue>> {
        self.default()
            .map(|d| self.convert_from_string(d))
            .transpose()
    }

    /// Default rendered for DDL: text-like values single-quoted, others raw.
    pub fn default_sql(&self) -> Result<Option<String>> {
        let Some(value) = self.default_value()? else {
            return Ok(None);
        };
        let rendered = match value {
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            other => other.to_sql_inline(),
        };
        Ok(Some(rendered))
    }
}

/// Fluent constructor for [`ColumnSpec`].
#[derive(Debug, Clone)]
pub struct ColumnBuilder {
    field_name: String,
    db_name: Option<String>,
    kind: ColumnKind,
    is_pointer: bool,
    nullable: Option<bool>,
    primary: bool,
    index: bool,
    default: Option<String>,
    width: u32,
    precision: u32,
    charset: Option<String>,
    auto_increment: bool,
    auto_increment_offset: u64,
    auto_increment_step: u64,
    auto_version: bool,
    created_at: bool,
    updated_at: bool,
    ttl: Option<Ttl>,
}

impl ColumnBuilder {
    /// Creates a new column builder with name and kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            field_name: name.into(),
            db_name: None,
            kind,
            is_pointer: false,
            nullable: None,
            primary: false,
            index: false,
            default: None,
            width: 0,
            precision: 0,
            charset: None,
            auto_increment: false,
            auto_increment_offset: 0,
            auto_increment_step: 1,
            auto_version: false,
            created_at: false,
            updated_at: false,
            ttl: None,
        }
    }

    /// Overrides the SQL column name.
    #[must_use]
    pub fn db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = Some(name.into());
        self
    }

    /// Marks the record field as optional.
    #[must_use]
    pub const fn pointer(mut self, is_pointer: bool) -> Self {
        self.is_pointer = is_pointer;
        self
    }

    /// Marks the column as NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = Some(false);
        self
    }

    /// Marks the column as nullable (default).
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = Some(true);
        self
    }

    /// Adds the column to the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Gives the column its own index.
    #[must_use]
    pub const fn index(mut self) -> Self {
        self.index = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the width.
    #[must_use]
    pub const fn width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    /// Sets the decimal precision.
    #[must_use]
    pub const fn precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    /// Sets the text storage class.
    #[must_use]
    pub const fn text_size(mut self, size: TextSize) -> Self {
        if let ColumnKind::Text { .. } = self.kind {
            self.kind = ColumnKind::Text { size };
        }
        self
    }

    /// Sets the character set.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Marks the column auto-increment; implies primary key.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Sets the auto-increment start value.
    #[must_use]
    pub const fn auto_increment_offset(mut self, offset: u64) -> Self {
        self.auto_increment_offset = offset;
        self
    }

    /// Sets the auto-increment step.
    #[must_use]
    pub const fn auto_increment_step(mut self, step: u64) -> Self {
        self.auto_increment_step = step;
        self
    }

    /// Marks the column as the row version.
    #[must_use]
    pub const fn auto_version(mut self) -> Self {
        self.auto_version = true;
        self
    }

    /// Marks the column as the creation timestamp.
    #[must_use]
    pub const fn created_at(mut self) -> Self {
        self.created_at = true;
        self
    }

    /// Marks the column as the modification timestamp.
    #[must_use]
    pub const fn updated_at(mut self) -> Self {
        self.updated_at = true;
        self
    }

    /// Sets the row retention interval.
    #[must_use]
    pub const fn ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Validates and builds the column.
    pub fn build(self) -> Result<ColumnSpec> {
        let name = self.db_name.as_deref().unwrap_or(&self.field_name);
        let fail = |reason: &str| Err(Error::invalid_column(name, reason));

        if self.kind == ColumnKind::Boolean && !self.is_pointer {
            if let Some(d) = self.default.as_deref() {
                if is_truthy(d) {
                    return fail("non-pointer boolean column must not default to true");
                }
            }
        }
        if self.kind == ColumnKind::Decimal && self.width == 0 {
            return fail("decimal column requires a width");
        }
        if self.auto_increment && !self.kind.is_integer() {
            return fail("auto_increment requires an integer column");
        }
        if self.auto_version && !self.kind.is_integer() {
            return fail("auto_version requires an integer column");
        }
        if (self.created_at || self.updated_at || self.ttl.is_some())
            && self.kind != ColumnKind::DateTime
        {
            return fail("created_at, updated_at and ttl require a datetime column");
        }

        let primary = self.primary || self.auto_increment;
        let nullable = if primary {
            false
        } else if self.kind == ColumnKind::Tristate {
            true
        } else {
            self.nullable.unwrap_or(true)
        };
        Ok(ColumnSpec {
            field_name: self.field_name,
            db_name: self.db_name,
            kind: self.kind,
            is_pointer: self.is_pointer,
            nullable,
            primary,
            index: self.index,
            default: self.default,
            width: self.width,
            precision: self.precision,
            charset: self.charset,
            auto_increment: self.auto_increment,
            auto_increment_offset: self.auto_increment_offset,
            auto_increment_step: self.auto_increment_step,
            auto_version: self.auto_version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            ttl: self.ttl,
        })
    }
}

fn parse_flag(field: &str, key: &str, value: &str) -> Result<bool> {
    if value.is_empty() || is_truthy(value) {
        Ok(true)
    } else if is_falsy(value) {
        Ok(false)
    } else {
        Err(Error::invalid_column(
            field,
            format!("tag {key} is not a boolean: {value}"),
        ))
    }
}

fn is_truthy(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn is_falsy(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

/// Parses the timestamp formats databases report.
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    let t = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(Error::parse("datetime", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ttl::TtlUnit;

    fn tags(pairs: &[(&str, &str)]) -> TagMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_nullable() {
        let col = ColumnSpec::from_tags("test", ColumnKind::TEXT, &TagMap::new(), false).unwrap();
        assert_eq!(col.name(), "test");
        assert!(col.is_nullable());
        assert!(!col.is_primary());
        assert!(!col.is_index());
    }

    #[test]
    fn test_primary_not_null() {
        let col = ColumnSpec::from_tags(
            "test",
            ColumnKind::TEXT,
            &tags(&[("primary", "true"), ("index", "true")]),
            false,
        )
        .unwrap();
        assert!(col.is_primary());
        assert!(col.is_index());
        assert!(!col.is_nullable());
    }

    #[test]
    fn test_sql_name_overrides_name() {
        let col = ColumnSpec::from_tags(
            "test",
            ColumnKind::TEXT,
            &tags(&[("name", "test_"), ("sql_name", "test2_")]),
            false,
        )
        .unwrap();
        assert_eq!(col.name(), "test2_");
        assert_eq!(col.field_name(), "test");

        let col =
            ColumnSpec::from_tags("test", ColumnKind::TEXT, &tags(&[("name", "test_")]), false)
                .unwrap();
        assert_eq!(col.name(), "test_");
    }

    #[test]
    fn test_auto_increment_implies_primary() {
        let col = ColumnSpec::builder("id", ColumnKind::BIGINT)
            .auto_increment()
            .build()
            .unwrap();
        assert!(col.is_primary());
        assert!(!col.is_nullable());
    }

    #[test]
    fn test_tristate_always_nullable() {
        let col = ColumnSpec::builder("flag", ColumnKind::Tristate)
            .not_null()
            .build()
            .unwrap();
        assert!(col.is_nullable());
    }

    #[test]
    fn test_non_pointer_bool_true_default_rejected() {
        let err = ColumnSpec::from_tags(
            "bad_column",
            ColumnKind::Boolean,
            &tags(&[("default", "1")]),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidColumn { .. }));

        assert!(ColumnSpec::from_tags(
            "bad_column",
            ColumnKind::Boolean,
            &tags(&[("default", "true")]),
            false,
        )
        .is_err());
    }

    #[test]
    fn test_pointer_bool_true_default_allowed() {
        let col = ColumnSpec::from_tags(
            "is_male",
            ColumnKind::Boolean,
            &tags(&[("nullable", "false"), ("default", "true")]),
            true,
        )
        .unwrap();
        assert_eq!(col.default_sql().unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_decimal_requires_width() {
        assert!(ColumnSpec::builder("amount", ColumnKind::Decimal)
            .build()
            .is_err());
        let col = ColumnSpec::from_tags(
            "amount",
            ColumnKind::Float { double: true },
            &tags(&[("width", "18"), ("precision", "8")]),
            false,
        )
        .unwrap();
        assert_eq!(col.kind(), ColumnKind::Decimal);
        assert_eq!(col.width(), 18);
        assert_eq!(col.precision(), 8);
    }

    #[test]
    fn test_auto_increment_requires_integer() {
        assert!(ColumnSpec::builder("id", ColumnKind::TEXT)
            .auto_increment()
            .build()
            .is_err());
    }

    #[test]
    fn test_ttl_tag() {
        let col = ColumnSpec::from_tags(
            "created_at",
            ColumnKind::DateTime,
            &tags(&[("created_at", "true"), ("clickhouse_ttl", "3m")]),
            false,
        )
        .unwrap();
        assert!(col.is_created_at());
        assert_eq!(
            col.ttl(),
            Some(Ttl {
                count: 3,
                unit: TtlUnit::Month
            })
        );
    }

    #[test]
    fn test_text_length_tag() {
        let col = ColumnSpec::from_tags(
            "body",
            ColumnKind::TEXT,
            &tags(&[("text_length", "medium")]),
            false,
        )
        .unwrap();
        assert_eq!(
            col.kind(),
            ColumnKind::Text {
                size: TextSize::Medium
            }
        );
    }

    #[test]
    fn test_bad_tag_values() {
        assert!(
            ColumnSpec::from_tags("x", ColumnKind::TEXT, &tags(&[("width", "wide")]), false)
                .is_err()
        );
        assert!(
            ColumnSpec::from_tags("x", ColumnKind::TEXT, &tags(&[("primary", "maybe")]), false)
                .is_err()
        );
    }

    #[test]
    fn test_unknown_tags_ignored() {
        let col = ColumnSpec::from_tags(
            "x",
            ColumnKind::TEXT,
            &tags(&[("list", "user"), ("get", "user")]),
            false,
        )
        .unwrap();
        assert_eq!(col.name(), "x");
    }

    #[test]
    fn test_compound_convert_from_string() {
        let col = ColumnSpec::builder("meta", ColumnKind::Compound)
            .build()
            .unwrap();
        assert_eq!(
            col.convert_from_string(r#"{"name":"John"}"#).unwrap(),
            SqlValue::Text(r#"{"name":"John"}"#.into())
        );
        assert_eq!(
            col.convert_from_string("test").unwrap(),
            SqlValue::Text(r#""test""#.into())
        );
        assert_eq!(
            col.convert_from_string("").unwrap(),
            SqlValue::Text("null".into())
        );
    }

    #[test]
    fn test_compound_convert_serializable() {
        #[derive(Serialize)]
        struct Owner {
            name: String,
        }
        let col = ColumnSpec::builder("meta", ColumnKind::Compound)
            .build()
            .unwrap();
        let v = col
            .convert_serializable(&Owner {
                name: "abc".into(),
            })
            .unwrap();
        assert_eq!(v, SqlValue::Text(r#"{"name":"abc"}"#.into()));
    }

    #[test]
    fn test_bool_and_tristate_conversion() {
        let b = ColumnSpec::builder("b", ColumnKind::Boolean).build().unwrap();
        assert_eq!(b.convert_from_string("true").unwrap(), SqlValue::Int(1));
        assert_eq!(b.convert_from_string("false").unwrap(), SqlValue::Int(0));
        assert_eq!(b.convert_from_value(SqlValue::Bool(true)).unwrap(), SqlValue::Int(1));

        let t = ColumnSpec::builder("t", ColumnKind::Tristate).build().unwrap();
        assert_eq!(t.convert_from_string("true").unwrap(), SqlValue::Int(1));
        assert_eq!(t.convert_from_string("false").unwrap(), SqlValue::Int(0));
        assert_eq!(t.convert_from_string("none").unwrap(), SqlValue::Null);
    }

    #[test]
    fn test_numeric_conversion() {
        let i = ColumnSpec::builder(
            "i",
            ColumnKind::Integer {
                size: IntegerSize::Tiny,
                unsigned: false,
            },
        )
        .build()
        .unwrap();
        assert_eq!(i.convert_from_string("23").unwrap(), SqlValue::Int(23));
        assert!(i.convert_from_string("abc").is_err());

        let f = ColumnSpec::builder("f", ColumnKind::Float { double: false })
            .build()
            .unwrap();
        assert_eq!(f.convert_from_string("0.01").unwrap(), SqlValue::Float(0.01));
    }

    #[test]
    fn test_default_sql_quoting() {
        let t = ColumnSpec::builder("t", ColumnKind::TEXT)
            .width(8)
            .default("it's")
            .build()
            .unwrap();
        assert_eq!(t.default_sql().unwrap().as_deref(), Some("'it''s'"));
        let n = ColumnSpec::builder("n", ColumnKind::INT)
            .default("12")
            .build()
            .unwrap();
        assert_eq!(n.default_sql().unwrap().as_deref(), Some("12"));
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime("2021-11-01 12:00:00").is_ok());
        assert!(parse_datetime("2021-11-01T12:00:00Z").is_ok());
        assert!(parse_datetime("yesterday").is_err());
    }
}
