//! SQL values and parameter handling.
//!
//! Values are always bound positionally; [`SqlValue::to_sql_inline`] and
//! [`sql_debug`] exist for DDL defaults and log output only.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// A SQL value that can be used as a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// Unsigned integer value.
    UInt(u64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
    /// Timestamp value, always UTC.
    DateTime(DateTime<Utc>),
}

impl SqlValue {
    /// Returns `true` for [`SqlValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for a numeric zero, which auto-increment columns treat
    /// as "not supplied".
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Int(n) => *n == 0,
            Self::UInt(n) => *n == 0,
            Self::Float(f) => *f == 0.0,
            _ => false,
        }
    }

    /// Returns the SQL representation for inline use (escaped).
    ///
    /// **Warning**: Prefer using parameterized queries instead.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Self::Int(n) => format!("{n}"),
            Self::UInt(n) => format!("{n}"),
            Self::Float(f) => format!("{f}"),
            Self::Text(s) => {
                // Escape single quotes by doubling them
                let escaped = s.replace('\'', "''");
                format!("'{escaped}'")
            }
            Self::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
            Self::DateTime(t) => format!("'{}'", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        #[allow(clippy::cast_precision_loss)]
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(n) => Some(*n as f64),
            Self::UInt(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Compares two values allowing for float rounding and sub-second
    /// timestamp noise.
    #[must_use]
    pub fn gross_eq(&self, other: &Self, tolerance: &Tolerance) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::DateTime(a), Self::DateTime(b)) => {
                let delta = if a > b { *a - *b } else { *b - *a };
                delta < tolerance.timestamp
            }
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => tolerance.float_eq(a, b),
                _ => self == other,
            },
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{}", u8::from(*b)),
            Self::Int(n) => write!(f, "{n}"),
            Self::UInt(n) => write!(f, "{n}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Blob(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Self::DateTime(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Thresholds for "close enough" comparison when detecting changed columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Maximum relative difference between two floats considered equal.
    pub float_relative: f64,
    /// Timestamps closer than this are considered equal.
    pub timestamp: Duration,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            float_relative: 1e-6,
            timestamp: Duration::seconds(1),
        }
    }
}

impl Tolerance {
    /// Returns `true` if `a` and `b` differ by less than the relative
    /// threshold.
    #[must_use]
    pub fn float_eq(&self, a: f64, b: f64) -> bool {
        if a == b {
            return true;
        }
        let scale = a.abs().max(b.abs());
        (a - b).abs() / scale < self.float_relative
    }
}

/// A three-valued boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tristate {
    /// True.
    True,
    /// False.
    False,
    /// Unset.
    #[default]
    None,
}

impl Tristate {
    /// Returns the boolean value, if set.
    #[must_use]
    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::False => Some(false),
            Self::None => None,
        }
    }
}

impl From<Option<bool>> for Tristate {
    fn from(v: Option<bool>) -> Self {
        match v {
            Some(true) => Self::True,
            Some(false) => Self::False,
            None => Self::None,
        }
    }
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for &SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self.clone()
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

macro_rules! impl_signed {
    ($($t:ty),*) => {
        $(impl ToSqlValue for $t {
            fn to_sql_value(self) -> SqlValue {
                SqlValue::Int(i64::from(self))
            }
        })*
    };
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {
        $(impl ToSqlValue for $t {
            fn to_sql_value(self) -> SqlValue {
                SqlValue::UInt(u64::from(self))
            }
        })*
    };
}

impl_signed!(i8, i16, i32, i64);
impl_unsigned!(u8, u16, u32, u64);

impl ToSqlValue for usize {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::UInt(self as u64)
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::DateTime(self)
    }
}

impl ToSqlValue for Tristate {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Self::True => SqlValue::Int(1),
            Self::False => SqlValue::Int(0),
            Self::None => SqlValue::Null,
        }
    }
}

impl ToSqlValue for serde_json::Value {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.to_string())
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

impl<T: ToSqlValue + Clone> ToSqlValue for &Option<T> {
    fn to_sql_value(self) -> SqlValue {
        self.clone().to_sql_value()
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

/// Substitutes each `?` placeholder with its bound value for log output.
///
/// Strings and timestamps are single-quoted with embedded quotes escaped as
/// `\'`. Placeholders without a matching value are left untouched.
#[must_use]
pub fn sql_debug(sql: &str, vars: &[SqlValue]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut vars = vars.iter();
    for ch in sql.chars() {
        if ch != '?' {
            out.push(ch);
            continue;
        }
        match vars.next() {
            Some(v @ (SqlValue::Text(_) | SqlValue::DateTime(_) | SqlValue::Blob(_))) => {
                out.push('\'');
                out.push_str(&v.to_string().replace('\'', "\\'"));
                out.push('\'');
            }
            Some(v) => out.push_str(&v.to_string()),
            None => out.push('?'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_sql_value_inline_null() {
        assert_eq!(SqlValue::Null.to_sql_inline(), "NULL");
    }

    #[test]
    fn test_sql_value_inline_text_escaping() {
        assert_eq!(
            SqlValue::Text(String::from("it's")).to_sql_inline(),
            "'it''s'"
        );
    }

    #[test]
    fn test_sql_value_inline_blob() {
        assert_eq!(SqlValue::Blob(vec![0xDE, 0xAD]).to_sql_inline(), "X'DEAD'");
    }

    #[test]
    fn test_tristate_values() {
        assert_eq!(Tristate::True.to_sql_value(), SqlValue::Int(1));
        assert_eq!(Tristate::False.to_sql_value(), SqlValue::Int(0));
        assert_eq!(Tristate::None.to_sql_value(), SqlValue::Null);
        assert_eq!(Tristate::from(Some(false)), Tristate::False);
    }

    #[test]
    fn test_gross_eq_float() {
        let tol = Tolerance::default();
        assert!(SqlValue::Float(1.0).gross_eq(&SqlValue::Float(1.000_000_1), &tol));
        assert!(!SqlValue::Float(1.0).gross_eq(&SqlValue::Float(1.001), &tol));
        assert!(SqlValue::Float(0.0).gross_eq(&SqlValue::Int(0), &tol));
        assert!(SqlValue::Int(3).gross_eq(&SqlValue::UInt(3), &tol));
    }

    #[test]
    fn test_gross_eq_timestamp() {
        let tol = Tolerance::default();
        let a = Utc.with_ymd_and_hms(2021, 11, 1, 12, 0, 0).unwrap();
        let b = a + Duration::milliseconds(400);
        let c = a + Duration::seconds(2);
        assert!(SqlValue::DateTime(a).gross_eq(&SqlValue::DateTime(b), &tol));
        assert!(!SqlValue::DateTime(a).gross_eq(&SqlValue::DateTime(c), &tol));
    }

    #[test]
    fn test_gross_eq_custom_tolerance() {
        let tol = Tolerance {
            float_relative: 0.01,
            timestamp: Duration::seconds(60),
        };
        assert!(SqlValue::Float(100.0).gross_eq(&SqlValue::Float(100.5), &tol));
    }

    #[test]
    fn test_gross_eq_null_and_text() {
        let tol = Tolerance::default();
        assert!(SqlValue::Null.gross_eq(&SqlValue::Null, &tol));
        assert!(!SqlValue::Null.gross_eq(&SqlValue::Int(0), &tol));
        assert!(!SqlValue::Text("a".into()).gross_eq(&SqlValue::Text("b".into()), &tol));
    }

    #[test]
    fn test_sql_debug() {
        let tm = Utc.with_ymd_and_hms(2021, 11, 1, 12, 0, 0).unwrap();
        let vars = vec![
            SqlValue::Text("name".into()),
            SqlValue::Int(123),
            SqlValue::DateTime(tm),
        ];
        assert_eq!(
            sql_debug("SET a = ?, b = ?, c = ?", &vars),
            "SET a = 'name', b = 123, c = '2021-11-01 12:00:00'"
        );
    }

    #[test]
    fn test_sql_debug_escapes_quotes() {
        let vars = vec![SqlValue::Text("it's".into())];
        assert_eq!(sql_debug("a = ? AND b = ?", &vars), "a = 'it\\'s' AND b = ?");
    }
}
