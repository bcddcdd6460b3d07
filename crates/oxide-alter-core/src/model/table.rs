//! Table definitions.

use serde::{Deserialize, Serialize};

use super::column::Column;
use super::foreign_key::ForeignKey;
use super::index::Index;
use super::names_equal;

/// A table: ordered columns plus its foreign keys and indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Column definitions, in order.
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Foreign keys owned by this table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKey>,
    /// Indexes on this table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn find_column(&self, name: &str, case_sensitive: bool) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| names_equal(&c.name, name, case_sensitive))
    }

    /// Gets a mutable column by name.
    #[must_use]
    pub fn find_column_mut(&mut self, name: &str, case_sensitive: bool) -> Option<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| names_equal(&c.name, name, case_sensitive))
    }

    /// Position of a column.
    #[must_use]
    pub fn column_position(&self, name: &str, case_sensitive: bool) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| names_equal(&c.name, name, case_sensitive))
    }

    /// Columns flagged as primary key, in table order.
    #[must_use]
    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    /// Names of the primary key columns, in table order.
    #[must_use]
    pub fn primary_key_names(&self) -> Vec<String> {
        self.primary_key_columns()
            .into_iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Whether the table has a primary key.
    #[must_use]
    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.primary_key)
    }

    /// Finds the index that denotes the same index as `index`.
    #[must_use]
    pub fn find_index(&self, index: &Index, case_sensitive: bool) -> Option<&Index> {
        self.indexes
            .iter()
            .find(|i| i.matches(index, case_sensitive))
    }

    /// Finds a foreign key structurally equal to `foreign_key`.
    #[must_use]
    pub fn find_foreign_key(
        &self,
        foreign_key: &ForeignKey,
        case_sensitive: bool,
    ) -> Option<&ForeignKey> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.same_structure(foreign_key, case_sensitive))
    }

    /// Returns a copy without indexes and foreign keys.
    #[must_use]
    pub fn without_constraints(&self) -> Self {
        Self {
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            ..self.clone()
        }
    }

    /// Structural equality under the case rule. Column order, index order
    /// and foreign key order are not significant; names of foreign keys are
    /// ignored as for [`ForeignKey::same_structure`].
    #[must_use]
    pub fn is_equivalent(&self, other: &Self, case_sensitive: bool) -> bool {
        if !names_equal(&self.name, &other.name, case_sensitive)
            || self.columns.len() != other.columns.len()
            || self.indexes.len() != other.indexes.len()
            || self.foreign_keys.len() != other.foreign_keys.len()
        {
            return false;
        }

        let columns_match = self.columns.iter().all(|column| {
            other
                .find_column(&column.name, case_sensitive)
                .is_some_and(|o| same_column(column, o))
        });
        let indexes_match = self.indexes.iter().all(|index| {
            other
                .find_index(index, case_sensitive)
                .is_some_and(|o| o.same_definition(index, case_sensitive))
        });
        let foreign_keys_match = self.foreign_keys.iter().all(|fk| {
            let mine = self
                .foreign_keys
                .iter()
                .filter(|f| f.same_structure(fk, case_sensitive))
                .count();
            let theirs = other
                .foreign_keys
                .iter()
                .filter(|f| f.same_structure(fk, case_sensitive))
                .count();
            mine == theirs
        });

        columns_match && indexes_match && foreign_keys_match
    }
}

fn same_column(a: &Column, b: &Column) -> bool {
    a.type_code == b.type_code
        && a.size == b.size
        && a.scale == b.scale
        && a.required == b.required
        && a.primary_key == b.primary_key
        && a.auto_increment == b.auto_increment
        && a.parsed_default() == b.parsed_default()
}
