//! The database model: an ordered set of tables.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::foreign_key::ForeignKey;
use super::table::Table;
use super::{fold, names_equal};
use crate::error::{AlterError, Result};

/// The complete schema of a database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Database {
    /// Model name (catalog or schema the model was read from).
    #[serde(default)]
    pub name: String,
    /// All tables, in declaration order.
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl Database {
    /// Creates an empty model.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
        }
    }

    /// Adds a table to the model.
    #[must_use]
    pub fn table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Gets a table by name.
    #[must_use]
    pub fn find_table(&self, name: &str, case_sensitive: bool) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| names_equal(&t.name, name, case_sensitive))
    }

    /// Gets a mutable table by name.
    #[must_use]
    pub fn find_table_mut(&mut self, name: &str, case_sensitive: bool) -> Option<&mut Table> {
        self.tables
            .iter_mut()
            .find(|t| names_equal(&t.name, name, case_sensitive))
    }

    /// Gets a table by name or fails with [`AlterError::TableNotFound`].
    pub fn require_table(&self, name: &str, case_sensitive: bool) -> Result<&Table> {
        self.find_table(name, case_sensitive)
            .ok_or_else(|| AlterError::TableNotFound(name.to_string()))
    }

    /// Mutable variant of [`Database::require_table`].
    pub fn require_table_mut(&mut self, name: &str, case_sensitive: bool) -> Result<&mut Table> {
        self.find_table_mut(name, case_sensitive)
            .ok_or_else(|| AlterError::TableNotFound(name.to_string()))
    }

    /// Appends a table, failing if the name is taken.
    pub fn add_table(&mut self, table: Table, case_sensitive: bool) -> Result<()> {
        if self.find_table(&table.name, case_sensitive).is_some() {
            return Err(AlterError::TableExists(table.name));
        }
        self.tables.push(table);
        Ok(())
    }

    /// Removes and returns a table.
    pub fn remove_table(&mut self, name: &str, case_sensitive: bool) -> Result<Table> {
        let idx = self
            .tables
            .iter()
            .position(|t| names_equal(&t.name, name, case_sensitive))
            .ok_or_else(|| AlterError::TableNotFound(name.to_string()))?;
        Ok(self.tables.remove(idx))
    }

    /// Returns table names.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    /// Foreign keys of *other* tables that point at `table`, as
    /// `(owning table, foreign key)` pairs in model order.
    #[must_use]
    pub fn foreign_keys_referencing(
        &self,
        table: &str,
        case_sensitive: bool,
    ) -> Vec<(String, ForeignKey)> {
        self.tables
            .iter()
            .filter(|t| !names_equal(&t.name, table, case_sensitive))
            .flat_map(|t| {
                t.foreign_keys
                    .iter()
                    .filter(|fk| fk.references_table(table, case_sensitive))
                    .map(|fk| (t.name.clone(), fk.clone()))
            })
            .collect()
    }

    /// Checks the model for structural errors: duplicate table or column
    /// names under the case rule, index and primary key columns missing
    /// from their table, and foreign keys that cannot be resolved.
    pub fn validate(&self, case_sensitive: bool) -> Result<()> {
        let mut errors = Vec::new();
        let mut table_names = HashSet::new();

        for table in &self.tables {
            if !table_names.insert(fold(&table.name, case_sensitive)) {
                errors.push(AlterError::DuplicateTable(table.name.clone()));
            }

            let mut column_names = HashSet::new();
            for column in &table.columns {
                if !column_names.insert(fold(&column.name, case_sensitive)) {
                    errors.push(AlterError::DuplicateColumn {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
            }

            for index in &table.indexes {
                for column in &index.columns {
                    if table.find_column(&column.name, case_sensitive).is_none() {
                        errors.push(AlterError::UnknownColumn {
                            table: table.name.clone(),
                            context: format!("Index '{}'", index.effective_name(&table.name)),
                            column: column.name.clone(),
                        });
                    }
                }
            }

            for fk in &table.foreign_keys {
                errors.extend(self.check_foreign_key(table, fk, case_sensitive));
            }
        }

        match AlterError::from_list(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn check_foreign_key(
        &self,
        table: &Table,
        fk: &ForeignKey,
        case_sensitive: bool,
    ) -> Vec<AlterError> {
        let name = fk.constraint_name(&table.name);
        let mut errors = Vec::new();

        for reference in &fk.references {
            if table
                .find_column(&reference.local_column, case_sensitive)
                .is_none()
            {
                errors.push(AlterError::UnknownColumn {
                    table: table.name.clone(),
                    context: format!("Foreign key '{}'", name),
                    column: reference.local_column.clone(),
                });
            }
        }

        let Some(foreign) = self.find_table(&fk.foreign_table, case_sensitive) else {
            errors.push(AlterError::UnresolvedForeignTable {
                table: table.name.clone(),
                foreign_key: name,
                foreign_table: fk.foreign_table.clone(),
            });
            return errors;
        };

        for reference in &fk.references {
            if foreign
                .find_column(&reference.foreign_column, case_sensitive)
                .is_none()
            {
                errors.push(AlterError::UnresolvedForeignColumn {
                    table: table.name.clone(),
                    foreign_key: name.clone(),
                    foreign_table: foreign.name.clone(),
                    column: reference.foreign_column.clone(),
                });
            }
        }
        errors
    }

    /// Structural equality under the case rule; table order is not
    /// significant. See [`Table::is_equivalent`].
    #[must_use]
    pub fn is_equivalent(&self, other: &Self, case_sensitive: bool) -> bool {
        self.tables.len() == other.tables.len()
            && self.tables.iter().all(|table| {
                other
                    .find_table(&table.name, case_sensitive)
                    .is_some_and(|o| table.is_equivalent(o, case_sensitive))
            })
    }
}
