//! Queries used as sources of other queries.

use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;

use super::{Query, Source};
use crate::field::Field;
use crate::value::SqlValue;

#[derive(Debug)]
struct SubQueryState {
    query: Query,
    alias: String,
    referenced: Mutex<IndexMap<String, Field>>,
}

/// A query wrapped as a source, with its own alias.
///
/// Referenced inner fields are projected in the order they were first
/// resolved.
///
/// Clones share the set of referenced fields, so a subquery joined into an
/// outer query and later projected from still renders every inner field
/// that any clone resolved.
#[derive(Debug, Clone)]
pub struct SubQuery {
    state: Arc<SubQueryState>,
}

impl SubQuery {
    pub(crate) fn new(query: Query) -> Self {
        let alias = query.database().aliases().next_alias();
        Self {
            state: Arc::new(SubQueryState {
                query,
                alias,
                referenced: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// Alias of the subquery.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.state.alias
    }

    /// The wrapped query.
    #[must_use]
    pub fn inner(&self) -> &Query {
        &self.state.query
    }

    /// Resolves an inner field by name and marks it as projected.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Field> {
        let inner = self.state.query.field(name)?;
        let inner_name = inner.name();
        self.state
            .referenced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(inner_name.clone())
            .or_insert(inner);
        Some(Field::column(self.state.alias.clone(), inner_name))
    }

    /// Every field the inner query projects, without marking any.
    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        self.state
            .query
            .query_fields()
            .iter()
            .map(|f| Field::column(self.state.alias.clone(), f.name()))
            .collect()
    }

    fn referenced(&self) -> Vec<Field> {
        self.state
            .referenced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Renders `(SELECT ...)`, projecting only referenced fields when any
    /// were resolved.
    #[must_use]
    pub fn expression(&self) -> String {
        format!("({})", self.state.query.render(&self.referenced()))
    }

    /// Bound values of the inner query.
    #[must_use]
    pub fn variables(&self) -> Vec<SqlValue> {
        self.state.query.render_variables(&self.referenced())
    }

    /// Starts a query selecting from this subquery.
    #[must_use]
    pub fn query(&self) -> Query {
        Query::new(
            Source::SubQuery(self.clone()),
            self.state.query.database().clone(),
        )
    }
}
