//! Platform policies deciding which table definition changes can be
//! applied in place.
//!
//! The sequencer asks the predicate once per table, passing the table as
//! it stands just before its column and primary key changes together with
//! those changes. A rejection is not an error: the sequencer falls back to
//! recreating the table.

use std::fmt;

use crate::change::Change;
use crate::model::{names_equal, Column, DefaultValue, JdbcType, Table};

/// Decides whether a group of column and primary key changes on one table
/// can be applied without recreating the table.
pub trait TableDefinitionChangesPredicate: fmt::Debug + Send + Sync {
    /// Returns true when every change in `changes` can be applied in place
    /// to `table`. Every change in the slice belongs to `table`.
    fn are_supported(&self, table: &Table, changes: &[Change]) -> bool;
}

/// Conservative policy: columns may be appended or dropped and the primary
/// key replaced; any modification of an existing column recreates the
/// table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTableDefinitionChangesPredicate;

impl DefaultTableDefinitionChangesPredicate {
    /// Creates the default predicate.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TableDefinitionChangesPredicate for DefaultTableDefinitionChangesPredicate {
    fn are_supported(&self, _table: &Table, changes: &[Change]) -> bool {
        changes.iter().all(|change| match change {
            Change::RemoveColumn { .. } | Change::PrimaryKeyChange { .. } => true,
            Change::AddColumn { column, .. } => {
                is_appended(change, changes)
                    && (!column.required
                        || column.default_value.is_some()
                        || column.auto_increment)
            }
            _ => false,
        })
    }
}

/// SQLite can only append simple columns and drop columns that no key or
/// index depends on.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteTableDefinitionChangesPredicate;

impl SqliteTableDefinitionChangesPredicate {
    /// Creates the SQLite predicate.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TableDefinitionChangesPredicate for SqliteTableDefinitionChangesPredicate {
    fn are_supported(&self, table: &Table, changes: &[Change]) -> bool {
        changes.iter().all(|change| match change {
            Change::AddColumn { column, .. } => {
                // ADD COLUMN rejects non-constant defaults and NOT NULL
                // without a default.
                is_appended(change, changes)
                    && !column.primary_key
                    && !column.auto_increment
                    && (!column.required || column.default_value.is_some())
                    && !matches!(
                        column.parsed_default(),
                        Some(DefaultValue::Expression(_))
                    )
            }
            Change::RemoveColumn { column, .. } => {
                // Case is irrelevant here: SQLite identifiers are
                // case-insensitive.
                let Some(existing) = table.find_column(column, false) else {
                    return false;
                };
                !existing.primary_key
                    && !table.indexes.iter().any(|i| i.covers(column, false))
                    && !table
                        .foreign_keys
                        .iter()
                        .any(|fk| fk.uses_local_column(column, false))
            }
            _ => false,
        })
    }
}

/// PostgreSQL alters most column properties in place. Narrowing a column
/// and adding or toggling auto-increment still recreate the table.
#[derive(Debug, Clone, Copy)]
pub struct PostgresTableDefinitionChangesPredicate {
    /// Largest size a sized column may be widened to in place.
    pub max_in_place_size: u32,
}

impl PostgresTableDefinitionChangesPredicate {
    /// Creates the predicate with the VARCHAR length limit as bound.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_in_place_size: 10_485_760,
        }
    }

    /// Sets the largest size reachable in place.
    #[must_use]
    pub const fn max_in_place_size(mut self, size: u32) -> Self {
        self.max_in_place_size = size;
        self
    }

    fn size_change_supported(
        &self,
        old: &Column,
        new_size: Option<u32>,
        new_scale: Option<u32>,
    ) -> bool {
        match (old.size, new_size) {
            (_, None) => true,
            (Some(old_size), Some(size)) if size < old_size => false,
            (_, Some(size)) if size > self.max_in_place_size => false,
            _ => new_scale.unwrap_or(0) >= old.scale.unwrap_or(0),
        }
    }

    fn definition_change_supported(&self, old: &Column, new: &Column) -> bool {
        if old.auto_increment != new.auto_increment {
            return false;
        }
        if new.required && !old.required && new.default_value.is_none() {
            return false;
        }
        if old.type_code != new.type_code && !widens(old.type_code, new.type_code) {
            return false;
        }
        self.size_change_supported(old, new.size, new.scale)
    }
}

impl Default for PostgresTableDefinitionChangesPredicate {
    fn default() -> Self {
        Self::new()
    }
}

impl TableDefinitionChangesPredicate for PostgresTableDefinitionChangesPredicate {
    fn are_supported(&self, table: &Table, changes: &[Change]) -> bool {
        // Postgres folds unquoted identifiers, so lookups here ignore case.
        changes.iter().all(|change| match change {
            Change::AddColumn { column, .. } => {
                is_appended(change, changes)
                    && !column.auto_increment
                    && (!column.required || column.default_value.is_some())
            }
            Change::RemoveColumn { .. }
            | Change::ColumnDefaultValueChange { .. }
            | Change::PrimaryKeyChange { .. } => true,
            Change::ColumnSizeChange {
                column,
                new_size,
                new_scale,
                ..
            } => table
                .find_column(column, false)
                .is_some_and(|old| self.size_change_supported(old, *new_size, *new_scale)),
            Change::ColumnDefinitionChange {
                column,
                new_definition,
                ..
            } => table
                .find_column(column, false)
                .is_some_and(|old| self.definition_change_supported(old, new_definition)),
            _ => false,
        })
    }
}

/// Whether converting `from` into `to` keeps every value: both types
/// belong to the same family and `to` is at least as wide.
pub(crate) fn widens(from: JdbcType, to: JdbcType) -> bool {
    let same_family = (from.is_numeric() && to.is_numeric())
        || (from.is_text() && to.is_text())
        || (from.is_binary() && to.is_binary())
        || (from.is_boolean() && to.is_boolean())
        || (is_temporal(from) && is_temporal(to) && to == JdbcType::Timestamp);
    same_family && to.width_rank() >= from.width_rank()
}

fn is_temporal(t: JdbcType) -> bool {
    matches!(t, JdbcType::Date | JdbcType::Time | JdbcType::Timestamp)
}

/// Whether an `AddColumn` ends up after every existing column: its chain
/// of following columns only passes through columns added by the same
/// group.
fn is_appended(change: &Change, group: &[Change]) -> bool {
    let Change::AddColumn { next_column, .. } = change else {
        return false;
    };
    let mut next = next_column.as_deref();
    // Bounded by the group size so a malformed chain cannot loop.
    for _ in 0..=group.len() {
        let Some(name) = next else {
            return true;
        };
        next = match group.iter().find_map(|c| match c {
            Change::AddColumn {
                column,
                next_column,
                ..
            } if names_equal(&column.name, name, true) => Some(next_column.as_deref()),
            _ => None,
        }) {
            Some(following) => following,
            None => return false,
        };
    }
    false
}
