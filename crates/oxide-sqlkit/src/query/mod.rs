//! SELECT query construction.
//!
//! A [`Query`] is built by chaining consuming methods over a [`Source`] and
//! rendered with [`Query::build`]. Fields of subqueries are resolved lazily:
//! a subquery only projects the inner fields the enclosing query actually
//! references.

mod raw;
mod subquery;
mod union;

pub use raw::RawQuery;
pub use subquery::SubQuery;
pub use union::Union;

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::condition::{self, Condition, Operand};
use crate::database::Database;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::field::{self, Field};
use crate::table::Table;
use crate::value::{sql_debug, SqlValue, ToSqlValue};

/// What a query selects from.
#[derive(Debug, Clone)]
pub enum Source {
    /// A table instance.
    Table(Table),
    /// A nested query.
    SubQuery(SubQuery),
    /// A union of queries.
    Union(Union),
}

impl From<Table> for Source {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

impl From<SubQuery> for Source {
    fn from(query: SubQuery) -> Self {
        Self::SubQuery(query)
    }
}

impl From<Union> for Source {
    fn from(union: Union) -> Self {
        Self::Union(union)
    }
}

impl Source {
    /// Alias the source is known by.
    #[must_use]
    pub fn alias(&self) -> &str {
        match self {
            Self::Table(t) => t.alias(),
            Self::SubQuery(q) => q.alias(),
            Self::Union(u) => u.alias(),
        }
    }

    /// Resolves a field by name, registering it with a subquery.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Field> {
        match self {
            Self::Table(t) => t.field(name),
            Self::SubQuery(q) => q.field(name),
            Self::Union(u) => u.field(name),
        }
    }

    /// Every field the source exposes.
    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        match self {
            Self::Table(t) => t.fields(),
            Self::SubQuery(q) => q.fields(),
            Self::Union(u) => u.fields(),
        }
    }

    fn expression(&self, d: &dyn Dialect) -> String {
        match self {
            Self::Table(t) => d.quote_identifier(t.name()),
            Self::SubQuery(q) => q.expression(),
            Self::Union(u) => u.expression(),
        }
    }

    fn variables(&self) -> Vec<SqlValue> {
        match self {
            Self::Table(_) => Vec::new(),
            Self::SubQuery(q) => q.variables(),
            Self::Union(u) => u.variables(),
        }
    }
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// `JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
}

impl JoinType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Inner => "JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinType,
    source: Source,
    on: Condition,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl Order {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Name to field resolutions, filled on first lookup.
#[derive(Debug)]
struct FieldCache(Mutex<BTreeMap<String, Field>>);

impl FieldCache {
    const fn new() -> Self {
        Self(Mutex::new(BTreeMap::new()))
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Field>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear(&mut self) {
        self.0.get_mut().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Clone for FieldCache {
    fn clone(&self) -> Self {
        Self(Mutex::new(self.lock().clone()))
    }
}

/// A SELECT statement under construction.
#[derive(Debug, Clone)]
pub struct Query {
    db: Database,
    fields: Vec<Field>,
    distinct: bool,
    from: Source,
    joins: Vec<Join>,
    condition: Option<Condition>,
    group_by: Vec<Field>,
    order_by: Vec<(Field, Order)>,
    having: Option<Condition>,
    limit: usize,
    offset: usize,
    snapshot: Option<String>,
    cache: FieldCache,
}

fn conjoin(existing: Option<Condition>, cond: Condition) -> Condition {
    match existing {
        Some(prev) => prev.and(cond),
        None => cond,
    }
}

impl Query {
    /// Creates a query over a source.
    #[must_use]
    pub const fn new(from: Source, db: Database) -> Self {
        Self {
            db,
            fields: Vec::new(),
            distinct: false,
            from,
            joins: Vec::new(),
            condition: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            having: None,
            limit: 0,
            offset: 0,
            snapshot: None,
            cache: FieldCache::new(),
        }
    }

    /// The database the query renders for.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    /// The source the query selects from.
    #[must_use]
    pub const fn source(&self) -> &Source {
        &self.from
    }

    fn dialect(&self) -> &dyn Dialect {
        self.db.dialect()
    }

    // ========================================================================
    // Projection
    // ========================================================================

    /// Adds fields to the projection. Without explicit fields every field of
    /// the source is selected.
    #[must_use]
    pub fn select(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self.cache.clear();
        self
    }

    /// Adds source fields to the projection by name. Unknown names are
    /// skipped.
    #[must_use]
    pub fn select_names(mut self, names: &[&str]) -> Self {
        for name in names {
            match self.from.field(name) {
                Some(f) => self.fields.push(f),
                None => debug!(field = %name, "select of unknown field ignored"),
            }
        }
        self.cache.clear();
        self
    }

    /// Sets DISTINCT.
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ========================================================================
    // Joins
    // ========================================================================

    fn add_join(mut self, kind: JoinType, source: impl Into<Source>, on: Condition) -> Self {
        self.joins.push(Join {
            kind,
            source: source.into(),
            on,
        });
        self.cache.clear();
        self
    }

    /// Adds an inner JOIN.
    #[must_use]
    pub fn join(self, source: impl Into<Source>, on: Condition) -> Self {
        self.add_join(JoinType::Inner, source, on)
    }

    /// Adds a LEFT JOIN.
    #[must_use]
    pub fn left_join(self, source: impl Into<Source>, on: Condition) -> Self {
        self.add_join(JoinType::Left, source, on)
    }

    /// Adds a RIGHT JOIN.
    #[must_use]
    pub fn right_join(self, source: impl Into<Source>, on: Condition) -> Self {
        self.add_join(JoinType::Right, source, on)
    }

    // ========================================================================
    // Filtering
    // ========================================================================

    /// ANDs a condition into WHERE, or into HAVING once the query is grouped.
    #[must_use]
    pub fn filter(mut self, cond: Condition) -> Self {
        if self.group_by.is_empty() {
            self.condition = Some(conjoin(self.condition.take(), cond));
        } else {
            self.having = Some(conjoin(self.having.take(), cond));
        }
        self
    }

    /// ANDs a condition into HAVING.
    #[must_use]
    pub fn having(mut self, cond: Condition) -> Self {
        self.having = Some(conjoin(self.having.take(), cond));
        self
    }

    fn filter_by(self, name: &str, build: impl FnOnce(Field) -> Condition) -> Self {
        match self.field(name) {
            Some(f) => self.filter(build(f)),
            None => {
                debug!(field = %name, "filter on unknown field dropped");
                self
            }
        }
    }

    /// `name = value`
    #[must_use]
    pub fn equals(self, name: &str, value: impl Into<Operand>) -> Self {
        self.filter_by(name, |f| condition::equals(f, value))
    }

    /// `name <> value`
    #[must_use]
    pub fn not_equals(self, name: &str, value: impl Into<Operand>) -> Self {
        self.filter_by(name, |f| condition::not_equals(f, value))
    }

    /// `name > value`
    #[must_use]
    pub fn gt(self, name: &str, value: impl Into<Operand>) -> Self {
        self.filter_by(name, |f| condition::gt(f, value))
    }

    /// `name >= value`
    #[must_use]
    pub fn ge(self, name: &str, value: impl Into<Operand>) -> Self {
        self.filter_by(name, |f| condition::ge(f, value))
    }

    /// `name < value`
    #[must_use]
    pub fn lt(self, name: &str, value: impl Into<Operand>) -> Self {
        self.filter_by(name, |f| condition::lt(f, value))
    }

    /// `name <= value`
    #[must_use]
    pub fn le(self, name: &str, value: impl Into<Operand>) -> Self {
        self.filter_by(name, |f| condition::le(f, value))
    }

    /// `name LIKE pattern`
    #[must_use]
    pub fn like(self, name: &str, pattern: &str) -> Self {
        self.filter_by(name, |f| condition::like(f, pattern))
    }

    /// `NOT (name LIKE pattern)`
    #[must_use]
    pub fn not_like(self, name: &str, pattern: &str) -> Self {
        self.filter_by(name, |f| condition::like(f, pattern).not())
    }

    /// Substring match.
    #[must_use]
    pub fn contains(self, name: &str, s: &str) -> Self {
        self.filter_by(name, |f| condition::contains(f, s))
    }

    /// Prefix match.
    #[must_use]
    pub fn startswith(self, name: &str, s: &str) -> Self {
        self.filter_by(name, |f| condition::startswith(f, s))
    }

    /// Suffix match.
    #[must_use]
    pub fn endswith(self, name: &str, s: &str) -> Self {
        self.filter_by(name, |f| condition::endswith(f, s))
    }

    /// Regular expression match.
    #[must_use]
    pub fn regexp(self, name: &str, pattern: &str) -> Self {
        self.filter_by(name, |f| condition::regexp(f, pattern))
    }

    /// `name IN (values)`
    #[must_use]
    pub fn in_list<T: ToSqlValue>(self, name: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.filter_by(name, |f| condition::in_list(f, values))
    }

    /// `name NOT IN (values)`
    #[must_use]
    pub fn not_in_list<T: ToSqlValue>(
        self,
        name: &str,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        self.filter_by(name, |f| condition::not_in_list(f, values))
    }

    /// `name IN (subquery)`
    #[must_use]
    pub fn in_query(self, name: &str, query: SubQuery) -> Self {
        self.filter_by(name, |f| condition::in_query(f, query))
    }

    /// `name BETWEEN low AND high`
    #[must_use]
    pub fn between(self, name: &str, low: impl Into<Operand>, high: impl Into<Operand>) -> Self {
        self.filter_by(name, |f| condition::between(f, low, high))
    }

    /// `NOT (name BETWEEN low AND high)`
    #[must_use]
    pub fn not_between(
        self,
        name: &str,
        low: impl Into<Operand>,
        high: impl Into<Operand>,
    ) -> Self {
        self.filter_by(name, |f| condition::not_between(f, low, high))
    }

    /// `name IS NULL`
    #[must_use]
    pub fn is_null(self, name: &str) -> Self {
        self.filter_by(name, condition::is_null)
    }

    /// `name IS NOT NULL`
    #[must_use]
    pub fn is_not_null(self, name: &str) -> Self {
        self.filter_by(name, condition::is_not_null)
    }

    /// Empty or NULL string.
    #[must_use]
    pub fn is_empty(self, name: &str) -> Self {
        self.filter_by(name, condition::is_empty)
    }

    /// Non-NULL, non-empty string.
    #[must_use]
    pub fn is_not_empty(self, name: &str) -> Self {
        self.filter_by(name, condition::is_not_empty)
    }

    /// NULL or empty string.
    #[must_use]
    pub fn is_null_or_empty(self, name: &str) -> Self {
        self.filter_by(name, condition::is_null_or_empty)
    }

    /// `name = 1`
    #[must_use]
    pub fn is_true(self, name: &str) -> Self {
        self.filter_by(name, condition::is_true)
    }

    /// `name = 0`
    #[must_use]
    pub fn is_false(self, name: &str) -> Self {
        self.filter_by(name, condition::is_false)
    }

    // ========================================================================
    // Grouping, ordering, paging
    // ========================================================================

    /// Adds GROUP BY fields.
    #[must_use]
    pub fn group_by(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.group_by.extend(fields);
        self
    }

    /// Adds GROUP BY fields by name.
    #[must_use]
    pub fn group_by_names(mut self, names: &[&str]) -> Self {
        for name in names {
            match self.field(name) {
                Some(f) => self.group_by.push(f),
                None => debug!(field = %name, "group by unknown field ignored"),
            }
        }
        self
    }

    fn order_by_name(mut self, name: &str, order: Order) -> Self {
        match self.field(name) {
            Some(f) => self.order_by.push((f, order)),
            None => debug!(field = %name, "order by unknown field ignored"),
        }
        self
    }

    /// ORDER BY a field name, ascending.
    #[must_use]
    pub fn asc(self, name: &str) -> Self {
        self.order_by_name(name, Order::Asc)
    }

    /// ORDER BY a field name, descending.
    #[must_use]
    pub fn desc(self, name: &str) -> Self {
        self.order_by_name(name, Order::Desc)
    }

    /// ORDER BY a field, ascending.
    #[must_use]
    pub fn asc_field(mut self, field: Field) -> Self {
        self.order_by.push((field, Order::Asc));
        self
    }

    /// ORDER BY a field, descending.
    #[must_use]
    pub fn desc_field(mut self, field: Field) -> Self {
        self.order_by.push((field, Order::Desc));
        self
    }

    /// Sets LIMIT; zero means no limit.
    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = n;
        self
    }

    /// Sets OFFSET; zero means none.
    #[must_use]
    pub const fn offset(mut self, n: usize) -> Self {
        self.offset = n;
        self
    }

    // ========================================================================
    // Field resolution
    // ========================================================================

    /// Resolves a name against the projection, then the source, then the
    /// joined sources. Resolutions are cached until the projection or the
    /// joins change.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Field> {
        if let Some(f) = self.cache.lock().get(name) {
            return Some(f.clone());
        }
        let found = self
            .fields
            .iter()
            .find(|f| f.name() == name)
            .cloned()
            .or_else(|| self.from.field(name))
            .or_else(|| self.joins.iter().find_map(|j| j.source.field(name)))?;
        self.cache.lock().insert(name.to_string(), found.clone());
        Some(found)
    }

    /// The fields the query projects.
    #[must_use]
    pub fn query_fields(&self) -> Vec<Field> {
        self.select_fields(&[])
    }

    fn select_fields(&self, restrict: &[Field]) -> Vec<Field> {
        if !restrict.is_empty() {
            return restrict.to_vec();
        }
        if !self.fields.is_empty() {
            return self.fields.clone();
        }
        self.from
            .fields()
            .iter()
            .filter_map(|f| self.from.field(&f.name()))
            .collect()
    }

    // ========================================================================
    // Composition
    // ========================================================================

    /// Wraps the query as a source for another query.
    #[must_use]
    pub fn sub_query(self) -> SubQuery {
        SubQuery::new(self)
    }

    /// A query counting the rows this query returns, ignoring LIMIT and
    /// OFFSET.
    #[must_use]
    pub fn count_query(&self) -> Self {
        let inner = self.clone().limit(0).offset(0);
        let db = self.db.clone();
        Self::new(Source::SubQuery(inner.sub_query()), db).select([field::count("count")])
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Renders the statement.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.render(&[])
    }

    /// Bound values, in placeholder order.
    #[must_use]
    pub fn variables(&self) -> Vec<SqlValue> {
        self.render_variables(&[])
    }

    /// Renders the statement and its bound values.
    #[must_use]
    pub fn build(&self) -> (String, Vec<SqlValue>) {
        let sql = self.to_sql();
        debug!(sql = %sql, "query built");
        (sql, self.variables())
    }

    /// Records the current rendering so later changes can be detected.
    #[must_use]
    pub fn snapshot(mut self) -> Self {
        self.snapshot = Some(self.debug_string());
        self
    }

    /// Whether the query renders differently than at [`Query::snapshot`].
    pub fn is_altered(&self) -> Result<bool> {
        match &self.snapshot {
            Some(snap) => Ok(*snap != self.debug_string()),
            None => Err(Error::InvalidQuery(String::from("no snapshot taken"))),
        }
    }

    /// The statement with its values inlined, for logging.
    #[must_use]
    pub fn debug_string(&self) -> String {
        sql_debug(&self.to_sql(), &self.variables())
    }

    fn wraps_in_max(&self, d: &dyn Dialect, f: &Field, grouped: &[String]) -> bool {
        d.wrap_ungrouped_fields()
            && !self.group_by.is_empty()
            && !f.is_aggregate()
            && !f.is_const()
            && !grouped.contains(&f.expression(d))
    }

    pub(crate) fn render(&self, restrict: &[Field]) -> String {
        let d = self.dialect();
        let grouped: Vec<String> = self.group_by.iter().map(|f| f.expression(d)).collect();

        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        let fields: Vec<String> = self
            .select_fields(restrict)
            .iter()
            .map(|f| f.select_clause(d, self.wraps_in_max(d, f, &grouped)))
            .collect();
        sql.push_str(&fields.join(", "));

        sql.push_str(" FROM ");
        sql.push_str(&self.from.expression(d));
        sql.push_str(" AS ");
        sql.push_str(&d.quote_identifier(self.from.alias()));

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join.kind.as_str());
            sql.push(' ');
            sql.push_str(&join.source.expression(d));
            sql.push_str(" AS ");
            sql.push_str(&d.quote_identifier(join.source.alias()));
            sql.push_str(" ON ");
            sql.push_str(&join.on.where_clause(d));
        }

        if let Some(cond) = &self.condition {
            sql.push_str(" WHERE ");
            sql.push_str(&cond.where_clause(d));
        }

        if !grouped.is_empty() {
            let refs: Vec<String> = self.group_by.iter().map(|f| f.reference(d)).collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&refs.join(", "));
        }

        if let Some(cond) = &self.having {
            sql.push_str(" HAVING ");
            sql.push_str(&cond.where_clause(d));
        }

        if !self.order_by.is_empty() {
            let orders: Vec<String> = self
                .order_by
                .iter()
                .map(|(f, o)| format!("{} {}", f.reference(d), o.as_str()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }

        if self.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", self.limit));
        }
        if self.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", self.offset));
        }

        sql
    }

    pub(crate) fn render_variables(&self, restrict: &[Field]) -> Vec<SqlValue> {
        let mut vars: Vec<SqlValue> = self
            .select_fields(restrict)
            .iter()
            .flat_map(Field::variables)
            .collect();
        vars.extend(self.from.variables());
        for join in &self.joins {
            vars.extend(join.source.variables());
            vars.extend(join.on.variables());
        }
        if let Some(cond) = &self.condition {
            vars.extend(cond.variables());
        }
        if let Some(cond) = &self.having {
            vars.extend(cond.variables());
        }
        vars
    }
}
