//! UNION of queries.

use super::{Order, Query, Source};
use crate::database::Database;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::value::SqlValue;

/// Several queries with identical projections combined by UNION.
#[derive(Debug, Clone)]
pub struct Union {
    queries: Vec<Query>,
    all: bool,
    alias: String,
    order_by: Vec<(String, Order)>,
    limit: usize,
    offset: usize,
    db: Database,
}

impl Union {
    /// Combines queries; every member must project the same field names in
    /// the same order.
    pub fn new(queries: Vec<Query>) -> Result<Self> {
        let Some(first) = queries.first() else {
            return Err(Error::EmptyQuery);
        };
        let db = first.database().clone();
        let names: Vec<String> = first.query_fields().iter().map(Field::name).collect();
        for (i, q) in queries.iter().enumerate().skip(1) {
            let other: Vec<String> = q.query_fields().iter().map(Field::name).collect();
            if other != names {
                return Err(Error::InvalidQuery(format!(
                    "union member {i} selects [{}], expected [{}]",
                    other.join(", "),
                    names.join(", ")
                )));
            }
        }
        let alias = db.aliases().next_alias();
        let queries = if db.dialect().wrap_union_members() {
            queries.into_iter().map(|q| q.sub_query().query()).collect()
        } else {
            queries
        };
        Ok(Self {
            queries,
            all: false,
            alias,
            order_by: Vec::new(),
            limit: 0,
            offset: 0,
            db,
        })
    }

    /// Keeps duplicate rows (`UNION ALL`).
    #[must_use]
    pub const fn all(mut self) -> Self {
        self.all = true;
        self
    }

    /// Orders the combined rows by a projected field.
    #[must_use]
    pub fn asc(mut self, name: &str) -> Self {
        self.order_by.push((name.to_string(), Order::Asc));
        self
    }

    /// Orders the combined rows by a projected field, descending.
    #[must_use]
    pub fn desc(mut self, name: &str) -> Self {
        self.order_by.push((name.to_string(), Order::Desc));
        self
    }

    /// Sets LIMIT on the combined rows.
    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = n;
        self
    }

    /// Sets OFFSET on the combined rows.
    #[must_use]
    pub const fn offset(mut self, n: usize) -> Self {
        self.offset = n;
        self
    }

    /// Alias of the union as a source.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// References a projected field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Field> {
        self.queries.first().and_then(|q| {
            q.query_fields()
                .iter()
                .any(|f| f.name() == name)
                .then(|| Field::column(self.alias.clone(), name))
        })
    }

    /// References every projected field.
    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        self.queries
            .first()
            .map(|q| {
                q.query_fields()
                    .iter()
                    .map(|f| Field::column(self.alias.clone(), f.name()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Renders `(q1 UNION q2 ...)`.
    #[must_use]
    pub fn expression(&self) -> String {
        let d = self.db.dialect();
        let sep = if self.all { " UNION ALL " } else { " UNION " };
        let mut sql = self
            .queries
            .iter()
            .map(Query::to_sql)
            .collect::<Vec<_>>()
            .join(sep);
        if !self.order_by.is_empty() {
            let orders: Vec<String> = self
                .order_by
                .iter()
                .map(|(name, o)| format!("{} {}", d.quote_identifier(name), o.as_str()))
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
        format!("({sql})")
    }

    /// Bound values of every member, in order.
    #[must_use]
    pub fn variables(&self) -> Vec<SqlValue> {
        self.queries.iter().flat_map(Query::variables).collect()
    }

    /// Starts a query selecting from the union.
    #[must_use]
    pub fn query(&self) -> Query {
        Query::new(Source::Union(self.clone()), self.db.clone())
    }
}
