//! Schema diffing between a live table and its declared spec.

use std::collections::{BTreeSet, HashMap};

use crate::column::ColumnSpec;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::table::{TableIndex, TableSpec};

/// A column whose definition changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnUpdate {
    /// Live definition.
    pub old: ColumnSpec,
    /// Declared definition.
    pub new: ColumnSpec,
}

/// Columns to remove, update and add, in that order.
pub type ColumnDiff = (Vec<ColumnSpec>, Vec<ColumnUpdate>, Vec<ColumnSpec>);

fn column_signature(d: &dyn Dialect, col: &ColumnSpec) -> Result<String> {
    let mut sig = d.column_definition(col)?;
    if d.supports_indexes() && col.is_index() {
        sig.push_str(" INDEX");
    }
    Ok(sig)
}

/// Compares live and declared columns by case-insensitive name.
///
/// Removed columns follow the live order; updated and added columns follow
/// the declared order.
pub fn diff_cols(d: &dyn Dialect, old: &[ColumnSpec], new: &[ColumnSpec]) -> Result<ColumnDiff> {
    let old_by_name: HashMap<String, &ColumnSpec> = old
        .iter()
        .map(|c| (c.name().to_lowercase(), c))
        .collect();
    let new_names: BTreeSet<String> = new.iter().map(|c| c.name().to_lowercase()).collect();

    let remove: Vec<ColumnSpec> = old
        .iter()
        .filter(|c| !new_names.contains(&c.name().to_lowercase()))
        .cloned()
        .collect();

    let mut update = Vec::new();
    let mut add = Vec::new();
    for col in new {
        match old_by_name.get(&col.name().to_lowercase()) {
            Some(prev) => {
                if column_signature(d, prev)? != column_signature(d, col)? {
                    update.push(ColumnUpdate {
                        old: (*prev).clone(),
                        new: col.clone(),
                    });
                }
            }
            None => add.push(col.clone()),
        }
    }
    Ok((remove, update, add))
}

/// Compares indexes by their column sets. A uniqueness change counts as a
/// removal plus an addition. Returns `(remove, add)`.
#[must_use]
pub fn diff_indexes(old: &[TableIndex], new: &[TableIndex]) -> (Vec<TableIndex>, Vec<TableIndex>) {
    let same = |a: &TableIndex, b: &TableIndex| a.key() == b.key() && a.is_unique() == b.is_unique();
    let remove = old
        .iter()
        .filter(|o| !new.iter().any(|n| same(o, n)))
        .cloned()
        .collect();
    let add = new
        .iter()
        .filter(|n| !old.iter().any(|o| same(o, n)))
        .cloned()
        .collect();
    (remove, add)
}

/// Everything needed to bring a live table in line with its spec.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableChanges {
    /// Columns present only in the live table.
    pub remove_columns: Vec<ColumnSpec>,
    /// Columns whose definition differs.
    pub update_columns: Vec<ColumnUpdate>,
    /// Columns present only in the spec.
    pub add_columns: Vec<ColumnSpec>,
    /// The full live column list.
    pub old_columns: Vec<ColumnSpec>,
    /// Indexes to create.
    pub add_indexes: Vec<TableIndex>,
    /// Indexes to drop.
    pub remove_indexes: Vec<TableIndex>,
}

impl TableChanges {
    /// Diffs the live columns and indexes against `spec`.
    pub fn compute(
        d: &dyn Dialect,
        spec: &TableSpec,
        old_columns: Vec<ColumnSpec>,
        old_indexes: &[TableIndex],
    ) -> Result<Self> {
        // A live single-column index cannot tell a column-level index from a
        // table-level one; the index diff covers its existence either way.
        let old_columns: Vec<ColumnSpec> = old_columns
            .into_iter()
            .map(|c| {
                let covered = old_indexes.iter().any(|i| {
                    !i.is_unique()
                        && i.columns().len() == 1
                        && i.columns()[0].eq_ignore_ascii_case(c.name())
                });
                if !covered {
                    return c;
                }
                let wanted = spec
                    .columns()
                    .iter()
                    .any(|s| s.is_index() && s.name().eq_ignore_ascii_case(c.name()));
                c.with_index(wanted)
            })
            .collect();
        let (remove_columns, update_columns, add_columns) =
            diff_cols(d, &old_columns, spec.columns())?;
        let (remove_indexes, add_indexes) = if d.supports_indexes() {
            diff_indexes(old_indexes, &spec.indexes())
        } else {
            (Vec::new(), Vec::new())
        };
        Ok(Self {
            remove_columns,
            update_columns,
            add_columns,
            old_columns,
            add_indexes,
            remove_indexes,
        })
    }

    /// Whether no column or index changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remove_columns.is_empty()
            && self.update_columns.is_empty()
            && self.add_columns.is_empty()
            && self.add_indexes.is_empty()
            && self.remove_indexes.is_empty()
    }
}
