//! Logical databases.
//!
//! A [`Database`] is the context every table instance and query is built
//! against: it names the dialect to render for, the alias allocator to draw
//! `tN` aliases from and the tolerance used when detecting changed values.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::alias::AliasAllocator;
use crate::dialect::{ClickHouseDialect, DamengDialect, Dialect, MySqlDialect, SqliteDialect};
use crate::table::{Table, TableSpec};
use crate::value::Tolerance;

/// Name of the database used when none is given.
pub const DEFAULT_DB: &str = "default";

/// A named logical database bound to a dialect.
#[derive(Clone)]
pub struct Database {
    name: String,
    dialect: Arc<dyn Dialect>,
    aliases: Arc<AliasAllocator>,
    tolerance: Tolerance,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("dialect", &self.dialect.name())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates a database using the process-wide alias allocator.
    pub fn new(name: impl Into<String>, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            name: name.into(),
            dialect,
            aliases: AliasAllocator::global(),
            tolerance: Tolerance::default(),
        }
    }

    /// MySQL database.
    pub fn mysql(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(MySqlDialect::new()))
    }

    /// ClickHouse database.
    pub fn clickhouse(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(ClickHouseDialect::new()))
    }

    /// SQLite database.
    pub fn sqlite(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(SqliteDialect::new()))
    }

    /// Dameng database.
    pub fn dameng(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(DamengDialect::new()))
    }

    /// Replaces the alias allocator.
    #[must_use]
    pub fn with_aliases(mut self, aliases: Arc<AliasAllocator>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Replaces the change-detection tolerance.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Logical name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dialect statements are rendered for.
    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Alias allocator shared by every instance built from this database.
    #[must_use]
    pub fn aliases(&self) -> &AliasAllocator {
        &self.aliases
    }

    /// Change-detection tolerance.
    #[must_use]
    pub const fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    /// Binds a spec to a fresh alias.
    #[must_use]
    pub fn table(&self, spec: &Arc<TableSpec>) -> Table {
        Table::new(Arc::clone(spec), self)
    }
}

/// Named databases, looked up by logical name.
#[derive(Debug, Clone, Default)]
pub struct Databases {
    by_name: HashMap<String, Database>,
}

impl Databases {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a database under its own name.
    pub fn register(&mut self, db: Database) -> Option<Database> {
        self.by_name.insert(db.name().to_string(), db)
    }

    /// Looks up a database by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Database> {
        self.by_name.get(name)
    }

    /// The database registered as [`DEFAULT_DB`].
    #[must_use]
    pub fn default_db(&self) -> Option<&Database> {
        self.get(DEFAULT_DB)
    }
}
