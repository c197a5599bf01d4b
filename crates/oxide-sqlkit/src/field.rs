//! Projected fields and SQL function expressions.
//!
//! A [`Field`] is anything that can appear in a SELECT list or as an operand
//! of a condition: a column of a table instance or subquery, a function call
//! over other fields, or a constant.

use crate::condition::Condition;
use crate::dialect::Dialect;
use crate::value::{SqlValue, ToSqlValue};

/// A select-list item or condition operand.
#[derive(Debug, Clone)]
pub enum Field {
    /// A column of a table instance, subquery or union.
    Column {
        /// Alias of the source the column belongs to.
        source: String,
        /// Column name within the source.
        name: String,
        /// Output label, when it differs from the name.
        label: Option<String>,
    },
    /// A function call.
    Function(Box<FunctionField>),
    /// An inline constant.
    Const {
        /// The constant.
        value: SqlValue,
        /// Output label.
        label: Option<String>,
    },
}

impl Field {
    /// Creates a column reference.
    #[must_use]
    pub fn column(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Column {
            source: source.into(),
            name: name.into(),
            label: None,
        }
    }

    /// Creates an inline constant.
    #[must_use]
    pub fn constant(value: impl ToSqlValue) -> Self {
        Self::Const {
            value: value.to_sql_value(),
            label: None,
        }
    }

    /// Sets the output label.
    #[must_use]
    pub fn label(self, label: impl Into<String>) -> Self {
        let label = label.into();
        if label.is_empty() {
            return self;
        }
        match self {
            Self::Column { source, name, .. } => {
                let label = (label != name).then_some(label);
                Self::Column {
                    source,
                    name,
                    label,
                }
            }
            Self::Function(mut f) => {
                f.label = label;
                Self::Function(f)
            }
            Self::Const { value, .. } => Self::Const {
                value,
                label: Some(label),
            },
        }
    }

    /// Name under which the field is visible to an enclosing query.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Column { name, label, .. } => label.clone().unwrap_or_else(|| name.clone()),
            Self::Function(f) => f.label.clone(),
            Self::Const { value, label } => label.clone().unwrap_or_else(|| value.to_sql_inline()),
        }
    }

    /// Whether the field aggregates rows.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Function(f) if f.func.is_aggregate())
    }

    /// Whether the field is a constant.
    #[must_use]
    pub const fn is_const(&self) -> bool {
        matches!(self, Self::Const { .. })
    }

    /// The bare expression, without any label.
    #[must_use]
    pub fn expression(&self, d: &dyn Dialect) -> String {
        match self {
            Self::Column { source, name, .. } => {
                format!("{}.{}", d.quote_identifier(source), d.quote_identifier(name))
            }
            Self::Function(f) => f.func.expression(d),
            Self::Const { value, .. } => value.to_sql_inline(),
        }
    }

    /// How the field is referred to from WHERE, GROUP BY and ORDER BY.
    #[must_use]
    pub fn reference(&self, d: &dyn Dialect) -> String {
        match self {
            Self::Column { .. } => self.expression(d),
            Self::Function(f) if !f.label.is_empty() => d.quote_identifier(&f.label),
            Self::Const {
                label: Some(label), ..
            } => d.quote_identifier(label),
            _ => self.expression(d),
        }
    }

    /// The field as a select-list item, optionally wrapped in `MAX`.
    #[must_use]
    pub fn select_clause(&self, d: &dyn Dialect, wrap_max: bool) -> String {
        let mut expr = self.expression(d);
        if wrap_max {
            expr = format!("MAX({expr})");
        }
        let label = match self {
            Self::Column { name, label, .. } => {
                if label.is_some() || wrap_max || d.always_alias_fields() {
                    Some(label.clone().unwrap_or_else(|| name.clone()))
                } else {
                    None
                }
            }
            Self::Function(f) => (!f.label.is_empty()).then(|| f.label.clone()),
            Self::Const { label, .. } => label.clone(),
        };
        match label {
            Some(label) => format!("{expr} AS {}", d.quote_identifier(&label)),
            None => expr,
        }
    }

    /// Values bound by placeholders inside the field, in order.
    #[must_use]
    pub fn variables(&self) -> Vec<SqlValue> {
        match self {
            Self::Function(f) => f.func.variables(),
            _ => Vec::new(),
        }
    }
}

/// A labelled function call.
#[derive(Debug, Clone)]
pub struct FunctionField {
    func: Function,
    label: String,
}

impl FunctionField {
    /// The function.
    #[must_use]
    pub const fn function(&self) -> &Function {
        &self.func
    }

    /// Output label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl ArithOp {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

/// `CASE WHEN ... THEN ... ELSE ... END`.
#[derive(Debug, Clone, Default)]
pub struct Case {
    branches: Vec<(Condition, Field)>,
    otherwise: Option<Field>,
}

impl Case {
    /// Creates an empty CASE expression.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `WHEN cond THEN value` branch.
    #[must_use]
    pub fn when(mut self, cond: Condition, then: Field) -> Self {
        self.branches.push((cond, then));
        self
    }

    /// Sets the ELSE value.
    #[must_use]
    pub fn otherwise(mut self, value: Field) -> Self {
        self.otherwise = Some(value);
        self
    }

    fn expression(&self, d: &dyn Dialect) -> String {
        let mut sql = String::from("CASE");
        for (cond, then) in &self.branches {
            sql.push_str(" WHEN ");
            sql.push_str(&cond.where_clause(d));
            sql.push_str(" THEN ");
            sql.push_str(&then.reference(d));
        }
        if let Some(otherwise) = &self.otherwise {
            sql.push_str(" ELSE ");
            sql.push_str(&otherwise.reference(d));
        }
        sql.push_str(" END");
        sql
    }

    fn variables(&self) -> Vec<SqlValue> {
        let mut vars = Vec::new();
        for (cond, then) in &self.branches {
            vars.extend(cond.variables());
            vars.extend(then.variables());
        }
        if let Some(otherwise) = &self.otherwise {
            vars.extend(otherwise.variables());
        }
        vars
    }
}

/// SQL functions usable as fields.
#[derive(Debug, Clone)]
pub enum Function {
    /// `COUNT(*)`
    CountAll,
    /// `COUNT(field)`
    Count(Field),
    /// `MAX(field)`
    Max(Field),
    /// `MIN(field)`
    Min(Field),
    /// `SUM(field)`
    Sum(Field),
    /// `DISTINCT(field)`
    Distinct(Field),
    /// String aggregation with a separator.
    GroupConcat {
        /// Aggregated field.
        field: Field,
        /// Separator between values.
        separator: String,
    },
    /// `REPLACE(field, 'from', 'to')`
    Replace {
        /// Source field.
        field: Field,
        /// Substring to replace.
        from: String,
        /// Replacement.
        to: String,
    },
    /// `SUBSTR(field, start, len)`
    Substr {
        /// Source field.
        field: Field,
        /// Start position.
        start: i64,
        /// Length.
        len: i64,
    },
    /// `CONCAT(a,b,...)`
    Concat(Vec<Field>),
    /// `CAST(field AS type)`
    Cast {
        /// Source field.
        field: Field,
        /// Target SQL type.
        type_name: String,
    },
    /// `LOWER(field)`
    Lower(Field),
    /// `UPPER(field)`
    Upper(Field),
    /// Dotted IPv4 to integer.
    InetAton(Field),
    /// `DATEDIFF('unit',start,end)`
    DateDiff {
        /// Unit name such as `year` or `day`.
        unit: String,
        /// Start of the interval.
        start: Field,
        /// End of the interval.
        end: Field,
    },
    /// Arithmetic over two or more fields.
    Arith {
        /// Operator.
        op: ArithOp,
        /// Operands.
        fields: Vec<Field>,
    },
    /// A CASE expression.
    Case(Case),
}

impl Function {
    /// Whether the function aggregates rows.
    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Self::CountAll
                | Self::Count(_)
                | Self::Max(_)
                | Self::Min(_)
                | Self::Sum(_)
                | Self::Distinct(_)
                | Self::GroupConcat { .. }
        )
    }

    /// Renders the call.
    #[must_use]
    pub fn expression(&self, d: &dyn Dialect) -> String {
        match self {
            Self::CountAll => String::from("COUNT(*)"),
            Self::Count(f) => format!("COUNT({})", f.reference(d)),
            Self::Max(f) => format!("MAX({})", f.reference(d)),
            Self::Min(f) => format!("MIN({})", f.reference(d)),
            Self::Sum(f) => format!("SUM({})", f.reference(d)),
            Self::Distinct(f) => format!("DISTINCT({})", f.reference(d)),
            Self::GroupConcat { field, separator } => d.group_concat(&field.reference(d), separator),
            Self::Replace { field, from, to } => format!(
                "REPLACE({}, {}, {})",
                field.reference(d),
                SqlValue::Text(from.clone()).to_sql_inline(),
                SqlValue::Text(to.clone()).to_sql_inline()
            ),
            Self::Substr { field, start, len } => {
                format!("SUBSTR({}, {start}, {len})", field.reference(d))
            }
            Self::Concat(fields) => format!(
                "CONCAT({})",
                fields
                    .iter()
                    .map(|f| f.reference(d))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            Self::Cast { field, type_name } => {
                format!("CAST({} AS {type_name})", field.reference(d))
            }
            Self::Lower(f) => format!("LOWER({})", f.reference(d)),
            Self::Upper(f) => format!("UPPER({})", f.reference(d)),
            Self::InetAton(f) => d.inet_aton(&f.reference(d)),
            Self::DateDiff { unit, start, end } => format!(
                "DATEDIFF('{unit}',{},{})",
                start.reference(d),
                end.reference(d)
            ),
            Self::Arith { op, fields } => fields
                .iter()
                .map(|f| f.reference(d))
                .collect::<Vec<_>>()
                .join(&format!(" {} ", op.as_str())),
            Self::Case(case) => case.expression(d),
        }
    }

    /// Values bound inside the call, in order.
    #[must_use]
    pub fn variables(&self) -> Vec<SqlValue> {
        match self {
            Self::CountAll => Vec::new(),
            Self::Count(f)
            | Self::Max(f)
            | Self::Min(f)
            | Self::Sum(f)
            | Self::Distinct(f)
            | Self::Lower(f)
            | Self::Upper(f)
            | Self::InetAton(f)
            | Self::GroupConcat { field: f, .. }
            | Self::Replace { field: f, .. }
            | Self::Substr { field: f, .. }
            | Self::Cast { field: f, .. } => f.variables(),
            Self::Concat(fields) | Self::Arith { fields, .. } => {
                fields.iter().flat_map(Field::variables).collect()
            }
            Self::DateDiff { start, end, .. } => {
                let mut vars = start.variables();
                vars.extend(end.variables());
                vars
            }
            Self::Case(case) => case.variables(),
        }
    }

    /// Wraps the function into a labelled field.
    #[must_use]
    pub fn into_field(self, label: impl Into<String>) -> Field {
        Field::Function(Box::new(FunctionField {
            func: self,
            label: label.into(),
        }))
    }
}

// ============================================================================
// Constructors
// ============================================================================

/// `COUNT(*) AS label`
#[must_use]
pub fn count(label: &str) -> Field {
    Function::CountAll.into_field(label)
}

/// `COUNT(field) AS label`
#[must_use]
pub fn count_field(label: &str, field: Field) -> Field {
    Function::Count(field).into_field(label)
}

/// `MAX(field) AS label`
#[must_use]
pub fn max(label: &str, field: Field) -> Field {
    Function::Max(field).into_field(label)
}

/// `MIN(field) AS label`
#[must_use]
pub fn min(label: &str, field: Field) -> Field {
    Function::Min(field).into_field(label)
}

/// `SUM(field) AS label`
#[must_use]
pub fn sum(label: &str, field: Field) -> Field {
    Function::Sum(field).into_field(label)
}

/// `DISTINCT(field) AS label`
#[must_use]
pub fn distinct(label: &str, field: Field) -> Field {
    Function::Distinct(field).into_field(label)
}

/// String aggregation joined by `,`.
#[must_use]
pub fn group_concat(label: &str, field: Field) -> Field {
    group_concat_sep(label, ",", field)
}

/// String aggregation with a custom separator.
#[must_use]
pub fn group_concat_sep(label: &str, separator: &str, field: Field) -> Field {
    Function::GroupConcat {
        field,
        separator: separator.to_string(),
    }
    .into_field(label)
}

/// `REPLACE(field, 'from', 'to') AS label`
#[must_use]
pub fn replace(label: &str, field: Field, from: &str, to: &str) -> Field {
    Function::Replace {
        field,
        from: from.to_string(),
        to: to.to_string(),
    }
    .into_field(label)
}

/// `SUBSTR(field, start, len) AS label`
#[must_use]
pub fn substr(label: &str, field: Field, start: i64, len: i64) -> Field {
    Function::Substr { field, start, len }.into_field(label)
}

/// `CONCAT(a,b,...) AS label`
#[must_use]
pub fn concat(label: &str, fields: Vec<Field>) -> Field {
    Function::Concat(fields).into_field(label)
}

/// `CAST(field AS type_name) AS label`
#[must_use]
pub fn cast(field: Field, type_name: &str, label: &str) -> Field {
    Function::Cast {
        field,
        type_name: type_name.to_string(),
    }
    .into_field(label)
}

/// `LOWER(field) AS label`
#[must_use]
pub fn lower(label: &str, field: Field) -> Field {
    Function::Lower(field).into_field(label)
}

/// `UPPER(field) AS label`
#[must_use]
pub fn upper(label: &str, field: Field) -> Field {
    Function::Upper(field).into_field(label)
}

/// Converts a dotted IPv4 address to an integer. Unlabelled; use
/// [`Field::label`] to name it.
#[must_use]
pub fn inet_aton(field: Field) -> Field {
    Function::InetAton(field).into_field("")
}

/// `DATEDIFF('unit',start,end)`, unlabelled.
#[must_use]
pub fn datediff(unit: &str, start: Field, end: Field) -> Field {
    Function::DateDiff {
        unit: unit.to_string(),
        start,
        end,
    }
    .into_field("")
}

fn arith(op: ArithOp, label: &str, fields: Vec<Field>) -> Field {
    Function::Arith { op, fields }.into_field(label)
}

/// `a + b + ...`
#[must_use]
pub fn add(label: &str, fields: Vec<Field>) -> Field {
    arith(ArithOp::Add, label, fields)
}

/// `a - b - ...`
#[must_use]
pub fn sub(label: &str, fields: Vec<Field>) -> Field {
    arith(ArithOp::Sub, label, fields)
}

/// `a * b * ...`
#[must_use]
pub fn mul(label: &str, fields: Vec<Field>) -> Field {
    arith(ArithOp::Mul, label, fields)
}

/// `a / b / ...`
#[must_use]
pub fn div(label: &str, fields: Vec<Field>) -> Field {
    arith(ArithOp::Div, label, fields)
}

/// A CASE expression as a field.
#[must_use]
pub fn case(case: Case, label: &str) -> Field {
    Function::Case(case).into_field(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{equals, is_true};
    use crate::dialect::{DamengDialect, MySqlDialect};

    fn col(name: &str) -> Field {
        Field::column("t1", name)
    }

    #[test]
    fn test_column_labels() {
        let d = MySqlDialect;
        assert_eq!(col("name").select_clause(&d, false), "`t1`.`name`");
        assert_eq!(col("name").label("name").select_clause(&d, false), "`t1`.`name`");
        let f = col("name").label("n");
        assert_eq!(f.name(), "n");
        assert_eq!(f.select_clause(&d, false), "`t1`.`name` AS `n`");
        assert_eq!(f.reference(&d), "`t1`.`name`");
        assert_eq!(
            col("name").select_clause(&DamengDialect, false),
            "\"t1\".\"name\" AS \"name\""
        );
        assert_eq!(
            col("name").select_clause(&DamengDialect, true),
            "MAX(\"t1\".\"name\") AS \"name\""
        );
    }

    #[test]
    fn test_aggregates() {
        let d = MySqlDialect;
        let total = sum("total", col("col1"));
        assert!(total.is_aggregate());
        assert_eq!(total.select_clause(&d, false), "SUM(`t1`.`col1`) AS `total`");
        assert_eq!(total.reference(&d), "`total`");
        assert_eq!(count("count").select_clause(&d, false), "COUNT(*) AS `count`");
        assert_eq!(
            count_field("namecnt", col("name")).select_clause(&d, false),
            "COUNT(`t1`.`name`) AS `namecnt`"
        );
    }

    #[test]
    fn test_group_concat_per_dialect() {
        assert_eq!(
            group_concat("names", col("name")).select_clause(&MySqlDialect, false),
            "GROUP_CONCAT(`t1`.`name` SEPARATOR ',') AS `names`"
        );
        assert_eq!(
            group_concat_sep("names", ":", col("name")).select_clause(&MySqlDialect, false),
            "GROUP_CONCAT(`t1`.`name` SEPARATOR ':') AS `names`"
        );
        assert_eq!(
            group_concat("names", col("name")).select_clause(&DamengDialect, false),
            "WM_CONCAT(\"t1\".\"name\") AS \"names\""
        );
    }

    #[test]
    fn test_string_functions() {
        let d = MySqlDialect;
        assert_eq!(
            replace("new_name", col("name"), "abc", "123").expression(&d),
            "REPLACE(`t1`.`name`, 'abc', '123')"
        );
        assert_eq!(
            substr("name2", col("name"), 0, 2).expression(&d),
            "SUBSTR(`t1`.`name`, 0, 2)"
        );
        assert_eq!(
            concat("name_age", vec![col("name"), cast(col("age"), "VARCHAR", "")])
                .select_clause(&d, false),
            "CONCAT(`t1`.`name`,CAST(`t1`.`age` AS VARCHAR)) AS `name_age`"
        );
        assert_eq!(
            datediff("year", col("start_time"), col("end_time")).expression(&d),
            "DATEDIFF('year',`t1`.`start_time`,`t1`.`end_time`)"
        );
        assert_eq!(upper("u", col("name")).expression(&d), "UPPER(`t1`.`name`)");
    }

    #[test]
    fn test_const_field() {
        let d = MySqlDialect;
        let f = Field::constant("MALE").label("Gender");
        assert!(f.is_const());
        assert_eq!(f.select_clause(&d, false), "'MALE' AS `Gender`");
        assert_eq!(
            Field::constant(123_456)
                .label("gateway")
                .select_clause(&DamengDialect, false),
            "123456 AS \"gateway\""
        );
    }

    #[test]
    fn test_case_expression() {
        let d = MySqlDialect;
        let gender = case(
            Case::new()
                .when(is_true(col("is_male")), Field::constant("MALE"))
                .otherwise(Field::constant("FEMALE")),
            "Gender",
        );
        assert_eq!(
            gender.select_clause(&d, false),
            "CASE WHEN `t1`.`is_male` = 1 THEN 'MALE' ELSE 'FEMALE' END AS `Gender`"
        );
        assert!(gender.variables().is_empty());

        let amount = case(
            Case::new()
                .when(
                    equals(col("brand"), "AWS"),
                    mul("", vec![col("amount"), Field::constant(6)]),
                )
                .otherwise(col("amount")),
            "amount",
        );
        assert_eq!(
            amount.select_clause(&d, false),
            "CASE WHEN `t1`.`brand` = ( ? ) THEN `t1`.`amount` * 6 ELSE `t1`.`amount` END AS `amount`"
        );
        assert_eq!(amount.variables(), vec![SqlValue::Text("AWS".into())]);
    }

    #[test]
    fn test_inet_aton_dameng() {
        let f = inet_aton(col("col0")).label("ipaddr");
        assert_eq!(
            f.select_clause(&MySqlDialect, false),
            "INET_ATON(`t1`.`col0`) AS `ipaddr`"
        );
        let want = concat!(
            "TO_NUMBER(SUBSTR(\"t1\".\"col0\",1,INSTR(\"t1\".\"col0\",'.')-1))*POWER(256,3)+",
            "TO_NUMBER(SUBSTR(\"t1\".\"col0\",INSTR(\"t1\".\"col0\",'.')+1,INSTR(\"t1\".\"col0\",'.',1,2)-INSTR(\"t1\".\"col0\",'.')-1))*POWER(256,2)+",
            "TO_NUMBER(SUBSTR(\"t1\".\"col0\",INSTR(\"t1\".\"col0\",'.',1,2)+1,INSTR(\"t1\".\"col0\",'.',1,3)-INSTR(\"t1\".\"col0\",'.',1,2)-1))*256+",
            "TO_NUMBER(SUBSTR(\"t1\".\"col0\",INSTR(\"t1\".\"col0\",'.',1,3)+1))"
        );
        assert_eq!(f.expression(&DamengDialect), want);
    }
}
