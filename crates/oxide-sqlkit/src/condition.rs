//! WHERE and HAVING conditions.
//!
//! Conditions form a tree that renders to a SQL fragment with `?`
//! placeholders. [`Condition::where_clause`] and [`Condition::variables`]
//! walk the tree in the same order, so the placeholders and the bound values
//! always line up.

use chrono::{DateTime, Utc};

use crate::dialect::Dialect;
use crate::field::Field;
use crate::query::SubQuery;
use crate::value::{SqlValue, ToSqlValue, Tristate};

/// Right-hand side of a comparison.
#[derive(Debug, Clone)]
pub enum Operand {
    /// Another field, rendered inline.
    Field(Field),
    /// A bound value.
    Value(SqlValue),
    /// A scalar subquery.
    Query(SubQuery),
}

impl Operand {
    fn render(&self, d: &dyn Dialect, placeholder: &str) -> String {
        match self {
            Self::Field(f) => f.reference(d),
            Self::Value(_) => placeholder.to_string(),
            Self::Query(q) => q.expression(),
        }
    }

    fn variables(&self) -> Vec<SqlValue> {
        match self {
            Self::Field(f) => f.variables(),
            Self::Value(v) => vec![v.clone()],
            Self::Query(q) => q.variables(),
        }
    }
}

macro_rules! operand_from_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Operand {
            fn from(value: $t) -> Self {
                Self::Value(value.to_sql_value())
            }
        })*
    };
}

operand_from_value!(
    bool, i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64, String, &str, &String,
    SqlValue, DateTime<Utc>, Tristate
);

impl From<Field> for Operand {
    fn from(field: Field) -> Self {
        Self::Field(field)
    }
}

impl From<SubQuery> for Operand {
    fn from(query: SubQuery) -> Self {
        Self::Query(query)
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
}

impl CompareOp {
    /// SQL operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Lt => "<",
            Self::LtEq => "<=",
        }
    }
}

/// Members of an IN condition.
#[derive(Debug, Clone)]
pub enum InSet {
    /// Bound values.
    Values(Vec<SqlValue>),
    /// A subquery.
    Query(SubQuery),
}

/// A boolean SQL condition.
#[derive(Debug, Clone)]
pub enum Condition {
    /// All children hold.
    And(Vec<Condition>),
    /// Any child holds.
    Or(Vec<Condition>),
    /// Negation.
    Not(Box<Condition>),
    /// Binary comparison.
    Compare {
        /// Left operand.
        left: Field,
        /// Operator.
        op: CompareOp,
        /// Right operand.
        right: Operand,
    },
    /// `LIKE ?`
    Like {
        /// Matched field.
        field: Field,
        /// Pattern, bound.
        pattern: String,
    },
    /// Regular expression match.
    Regexp {
        /// Matched field.
        field: Field,
        /// Pattern, bound.
        pattern: String,
    },
    /// `BETWEEN low AND high`
    Between {
        /// Tested expression.
        field: Field,
        /// Lower bound.
        low: Operand,
        /// Upper bound.
        high: Operand,
    },
    /// `IN (...)` or `NOT IN (...)`
    In {
        /// Tested field.
        field: Field,
        /// Candidate set.
        set: InSet,
        /// Renders `NOT IN`.
        negated: bool,
    },
    /// `IS NULL` or `IS NOT NULL`
    IsNull {
        /// Tested field.
        field: Field,
        /// Renders `IS NOT NULL`.
        negated: bool,
    },
    /// Empty or NULL string.
    IsEmpty(Field),
    /// Non-NULL, non-empty string.
    IsNotEmpty(Field),
    /// NULL or empty string, spelled out.
    IsNullOrEmpty(Field),
    /// Boolean column is set.
    IsTrue(Field),
    /// Boolean column is clear.
    IsFalse(Field),
    /// Constant `1` or `0`.
    Const(bool),
    /// Caller-provided SQL.
    Raw {
        /// SQL fragment.
        sql: String,
        /// Values for its placeholders.
        vars: Vec<SqlValue>,
    },
}

fn wrap_children(d: &dyn Dialect, children: &[Condition], op: &str, empty: &str) -> String {
    match children {
        [] => empty.to_string(),
        [only] => only.where_clause(d),
        _ => children
            .iter()
            .map(|c| format!("({})", c.where_clause(d)))
            .collect::<Vec<_>>()
            .join(&format!(" {op} ")),
    }
}

impl Condition {
    /// Negates the condition. `IN` and `IS NULL` flip in place.
    #[must_use]
    pub fn not(self) -> Self {
        match self {
            Self::In {
                field,
                set,
                negated,
            } => Self::In {
                field,
                set,
                negated: !negated,
            },
            Self::IsNull { field, negated } => Self::IsNull {
                field,
                negated: !negated,
            },
            Self::Const(b) => Self::Const(!b),
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Combines with another condition under AND.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut children) => {
                children.push(other);
                Self::And(children)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Combines with another condition under OR.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut children) => {
                children.push(other);
                Self::Or(children)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Renders the condition.
    #[must_use]
    pub fn where_clause(&self, d: &dyn Dialect) -> String {
        match self {
            Self::And(children) => wrap_children(d, children, "AND", "1"),
            Self::Or(children) => wrap_children(d, children, "OR", "0"),
            Self::Not(inner) => format!("NOT ({})", inner.where_clause(d)),
            Self::Compare { left, op, right } => format!(
                "{} {} {}",
                left.reference(d),
                op.as_str(),
                right.render(d, d.comparison_placeholder())
            ),
            Self::Like { field, .. } => {
                format!("{} LIKE ?{}", field.reference(d), d.like_escape_clause())
            }
            Self::Regexp { field, .. } => d.regexp(&field.reference(d), "?"),
            Self::Between { field, low, high } => format!(
                "{} BETWEEN {} AND {}",
                field.reference(d),
                low.render(d, "?"),
                high.render(d, "?")
            ),
            Self::In {
                field,
                set,
                negated,
            } => {
                let f = field.reference(d);
                match set {
                    InSet::Values(values) => match values.len() {
                        0 => String::from(if *negated { "1" } else { "0" }),
                        1 => format!(
                            "{f} {} {}",
                            if *negated { "<>" } else { "=" },
                            d.comparison_placeholder()
                        ),
                        n => format!(
                            "{f} {}IN ({})",
                            if *negated { "NOT " } else { "" },
                            vec!["?"; n].join(", ")
                        ),
                    },
                    InSet::Query(q) => format!(
                        "{f} {}IN {}",
                        if *negated { "NOT " } else { "" },
                        q.expression()
                    ),
                }
            }
            Self::IsNull { field, negated } => format!(
                "{} IS {}NULL",
                field.reference(d),
                if *negated { "NOT " } else { "" }
            ),
            Self::IsEmpty(field) => {
                let f = field.reference(d);
                format!("LENGTH({f}) = 0 OR LENGTH({f}) IS NULL")
            }
            Self::IsNotEmpty(field) => {
                let f = field.reference(d);
                format!("{f} IS NOT NULL AND LENGTH({f}) > 0")
            }
            Self::IsNullOrEmpty(field) => {
                let f = field.reference(d);
                format!("{f} IS NULL OR LENGTH({f}) = 0 OR LENGTH({f}) IS NULL")
            }
            Self::IsTrue(field) => format!("{} = 1", field.reference(d)),
            Self::IsFalse(field) => format!("{} = 0", field.reference(d)),
            Self::Const(b) => String::from(if *b { "1" } else { "0" }),
            Self::Raw { sql, .. } => sql.clone(),
        }
    }

    /// Bound values, in placeholder order.
    #[must_use]
    pub fn variables(&self) -> Vec<SqlValue> {
        match self {
            Self::And(children) | Self::Or(children) => {
                children.iter().flat_map(Self::variables).collect()
            }
            Self::Not(inner) => inner.variables(),
            Self::Compare { left, right, .. } => {
                let mut vars = left.variables();
                vars.extend(right.variables());
                vars
            }
            Self::Like { field, pattern } | Self::Regexp { field, pattern } => {
                let mut vars = field.variables();
                vars.push(SqlValue::Text(pattern.clone()));
                vars
            }
            Self::Between { field, low, high } => {
                let mut vars = field.variables();
                vars.extend(low.variables());
                vars.extend(high.variables());
                vars
            }
            Self::In { field, set, .. } => {
                let mut vars = field.variables();
                match set {
                    InSet::Values(values) => vars.extend(values.iter().cloned()),
                    InSet::Query(q) => vars.extend(q.variables()),
                }
                vars
            }
            Self::IsNull { field, .. }
            | Self::IsEmpty(field)
            | Self::IsNotEmpty(field)
            | Self::IsNullOrEmpty(field)
            | Self::IsTrue(field)
            | Self::IsFalse(field) => field.variables(),
            Self::Const(_) => Vec::new(),
            Self::Raw { vars, .. } => vars.clone(),
        }
    }
}

/// Escapes `LIKE` wildcards in a literal fragment.
#[must_use]
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// Constructors
// ============================================================================

/// All of the conditions.
#[must_use]
pub fn and(conds: Vec<Condition>) -> Condition {
    Condition::And(conds)
}

/// Any of the conditions.
#[must_use]
pub fn or(conds: Vec<Condition>) -> Condition {
    Condition::Or(conds)
}

/// Negation.
#[must_use]
pub fn not(cond: Condition) -> Condition {
    cond.not()
}

fn compare(left: Field, op: CompareOp, right: impl Into<Operand>) -> Condition {
    Condition::Compare {
        left,
        op,
        right: right.into(),
    }
}

/// `field = right`
#[must_use]
pub fn equals(field: Field, right: impl Into<Operand>) -> Condition {
    compare(field, CompareOp::Eq, right)
}

/// `field <> right`
#[must_use]
pub fn not_equals(field: Field, right: impl Into<Operand>) -> Condition {
    compare(field, CompareOp::NotEq, right)
}

/// `field > right`
#[must_use]
pub fn gt(field: Field, right: impl Into<Operand>) -> Condition {
    compare(field, CompareOp::Gt, right)
}

/// `field >= right`
#[must_use]
pub fn ge(field: Field, right: impl Into<Operand>) -> Condition {
    compare(field, CompareOp::GtEq, right)
}

/// `field < right`
#[must_use]
pub fn lt(field: Field, right: impl Into<Operand>) -> Condition {
    compare(field, CompareOp::Lt, right)
}

/// `field <= right`
#[must_use]
pub fn le(field: Field, right: impl Into<Operand>) -> Condition {
    compare(field, CompareOp::LtEq, right)
}

/// `field LIKE pattern`, with the pattern bound as given.
#[must_use]
pub fn like(field: Field, pattern: &str) -> Condition {
    Condition::Like {
        field,
        pattern: pattern.to_string(),
    }
}

/// Substring match with wildcards in `s` escaped.
#[must_use]
pub fn contains(field: Field, s: &str) -> Condition {
    like(field, &format!("%{}%", escape_like(s)))
}

/// Prefix match with wildcards in `s` escaped.
#[must_use]
pub fn startswith(field: Field, s: &str) -> Condition {
    like(field, &format!("{}%", escape_like(s)))
}

/// Suffix match with wildcards in `s` escaped.
#[must_use]
pub fn endswith(field: Field, s: &str) -> Condition {
    like(field, &format!("%{}", escape_like(s)))
}

/// Regular expression match.
#[must_use]
pub fn regexp(field: Field, pattern: &str) -> Condition {
    Condition::Regexp {
        field,
        pattern: pattern.to_string(),
    }
}

/// `field IN (values)`; an empty list never matches.
#[must_use]
pub fn in_list<T: ToSqlValue>(field: Field, values: impl IntoIterator<Item = T>) -> Condition {
    Condition::In {
        field,
        set: InSet::Values(values.into_iter().map(ToSqlValue::to_sql_value).collect()),
        negated: false,
    }
}

/// `field NOT IN (values)`; an empty list always matches.
#[must_use]
pub fn not_in_list<T: ToSqlValue>(field: Field, values: impl IntoIterator<Item = T>) -> Condition {
    in_list(field, values).not()
}

/// `field IN (subquery)`
#[must_use]
pub fn in_query(field: Field, query: SubQuery) -> Condition {
    Condition::In {
        field,
        set: InSet::Query(query),
        negated: false,
    }
}

/// `field NOT IN (subquery)`
#[must_use]
pub fn not_in_query(field: Field, query: SubQuery) -> Condition {
    in_query(field, query).not()
}

/// `field BETWEEN low AND high`
#[must_use]
pub fn between(field: Field, low: impl Into<Operand>, high: impl Into<Operand>) -> Condition {
    Condition::Between {
        field,
        low: low.into(),
        high: high.into(),
    }
}

/// `NOT (field BETWEEN low AND high)`
#[must_use]
pub fn not_between(field: Field, low: impl Into<Operand>, high: impl Into<Operand>) -> Condition {
    between(field, low, high).not()
}

/// `field IS NULL`
#[must_use]
pub fn is_null(field: Field) -> Condition {
    Condition::IsNull {
        field,
        negated: false,
    }
}

/// `field IS NOT NULL`
#[must_use]
pub fn is_not_null(field: Field) -> Condition {
    Condition::IsNull {
        field,
        negated: true,
    }
}

/// Empty or NULL string.
#[must_use]
pub const fn is_empty(field: Field) -> Condition {
    Condition::IsEmpty(field)
}

/// Non-NULL, non-empty string.
#[must_use]
pub const fn is_not_empty(field: Field) -> Condition {
    Condition::IsNotEmpty(field)
}

/// NULL or empty string.
#[must_use]
pub const fn is_null_or_empty(field: Field) -> Condition {
    Condition::IsNullOrEmpty(field)
}

/// `field = 1`
#[must_use]
pub const fn is_true(field: Field) -> Condition {
    Condition::IsTrue(field)
}

/// `field = 0`
#[must_use]
pub const fn is_false(field: Field) -> Condition {
    Condition::IsFalse(field)
}

/// Caller-written SQL with its own placeholders.
#[must_use]
pub fn raw(sql: &str, vars: Vec<SqlValue>) -> Condition {
    Condition::Raw {
        sql: sql.to_string(),
        vars,
    }
}
