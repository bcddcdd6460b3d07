//! Structural changes.
//!
//! A [`Change`] describes one difference between two models. Changes are
//! plain values produced by the comparator and consumed by the sequencer
//! and emitters; [`Change::apply`] replays one on a [`Database`].

use std::fmt;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{AlterError, Result};
use crate::model::{Column, Database, ForeignKey, Index, Table};

/// Discriminant of a [`Change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    AddTable,
    RemoveTable,
    RemoveTables,
    AddColumn,
    RemoveColumn,
    ColumnDefaultValueChange,
    ColumnSizeChange,
    ColumnAutoIncrementChange,
    ColumnDefinitionChange,
    PrimaryKeyChange,
    AddForeignKey,
    RemoveForeignKey,
    AddIndex,
    RemoveIndex,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A single structural change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Change {
    /// Create a table with its columns, primary key and indexes.
    AddTable {
        /// Full table definition.
        table: Table,
    },

    /// Drop a table.
    RemoveTable {
        /// Table name.
        table: String,
    },

    /// Drop every table whose name matches a pattern.
    RemoveTables {
        /// Regular expression matched against the whole table name.
        pattern: String,
    },

    /// Add a column.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: Column,
        /// Column the new one follows, `None` when it comes first.
        previous_column: Option<String>,
        /// Column the new one precedes, `None` when it comes last.
        next_column: Option<String>,
    },

    /// Drop a column.
    RemoveColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Change only the default value of a column.
    ColumnDefaultValueChange {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// New raw default.
        new_default: Option<String>,
    },

    /// Change only the size (or precision and scale) of a column.
    ColumnSizeChange {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// New size or precision.
        new_size: Option<u32>,
        /// New scale.
        new_scale: Option<u32>,
    },

    /// Change only the auto-increment flag of a column.
    ColumnAutoIncrementChange {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// New flag value.
        auto_increment: bool,
    },

    /// Change several aspects (or the type) of a column.
    ColumnDefinitionChange {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Complete new definition. Its name and primary key flag are
        /// ignored when applied.
        new_definition: Column,
    },

    /// Replace the primary key as a whole.
    PrimaryKeyChange {
        /// Table name.
        table: String,
        /// Primary key columns before the change (empty if none).
        old_columns: Vec<String>,
        /// Primary key columns after the change (empty to drop it).
        new_columns: Vec<String>,
    },

    /// Add a foreign key.
    AddForeignKey {
        /// Owning table.
        table: String,
        /// Foreign key definition.
        foreign_key: ForeignKey,
    },

    /// Drop a foreign key.
    RemoveForeignKey {
        /// Owning table.
        table: String,
        /// Foreign key being dropped.
        foreign_key: ForeignKey,
    },

    /// Create an index.
    AddIndex {
        /// Table name.
        table: String,
        /// Index definition.
        index: Index,
    },

    /// Drop an index.
    RemoveIndex {
        /// Table name.
        table: String,
        /// Index being dropped.
        index: Index,
    },
}

impl Change {
    /// Returns the discriminant.
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::AddTable { .. } => ChangeKind::AddTable,
            Self::RemoveTable { .. } => ChangeKind::RemoveTable,
            Self::RemoveTables { .. } => ChangeKind::RemoveTables,
            Self::AddColumn { .. } => ChangeKind::AddColumn,
            Self::RemoveColumn { .. } => ChangeKind::RemoveColumn,
            Self::ColumnDefaultValueChange { .. } => ChangeKind::ColumnDefaultValueChange,
            Self::ColumnSizeChange { .. } => ChangeKind::ColumnSizeChange,
            Self::ColumnAutoIncrementChange { .. } => ChangeKind::ColumnAutoIncrementChange,
            Self::ColumnDefinitionChange { .. } => ChangeKind::ColumnDefinitionChange,
            Self::PrimaryKeyChange { .. } => ChangeKind::PrimaryKeyChange,
            Self::AddForeignKey { .. } => ChangeKind::AddForeignKey,
            Self::RemoveForeignKey { .. } => ChangeKind::RemoveForeignKey,
            Self::AddIndex { .. } => ChangeKind::AddIndex,
            Self::RemoveIndex { .. } => ChangeKind::RemoveIndex,
        }
    }

    /// Returns the owning table, `None` for [`Change::RemoveTables`].
    #[must_use]
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Self::AddTable { table } => Some(&table.name),
            Self::RemoveTables { .. } => None,
            Self::RemoveTable { table }
            | Self::AddColumn { table, .. }
            | Self::RemoveColumn { table, .. }
            | Self::ColumnDefaultValueChange { table, .. }
            | Self::ColumnSizeChange { table, .. }
            | Self::ColumnAutoIncrementChange { table, .. }
            | Self::ColumnDefinitionChange { table, .. }
            | Self::PrimaryKeyChange { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::RemoveForeignKey { table, .. }
            | Self::AddIndex { table, .. }
            | Self::RemoveIndex { table, .. } => Some(table),
        }
    }

    /// Whether this is a column- or primary-key-level change, i.e. one the
    /// platform predicate decides on.
    #[must_use]
    pub const fn is_table_definition_change(&self) -> bool {
        matches!(
            self.kind(),
            ChangeKind::AddColumn
                | ChangeKind::RemoveColumn
                | ChangeKind::ColumnDefaultValueChange
                | ChangeKind::ColumnSizeChange
                | ChangeKind::ColumnAutoIncrementChange
                | ChangeKind::ColumnDefinitionChange
                | ChangeKind::PrimaryKeyChange
        )
    }

    /// Whether this change adds an index or a foreign key.
    #[must_use]
    pub const fn is_constraint_addition(&self) -> bool {
        matches!(
            self.kind(),
            ChangeKind::AddIndex | ChangeKind::AddForeignKey
        )
    }

    /// Returns a human-readable description of this change.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::AddTable { table } => format!("Add table '{}'", table.name),
            Self::RemoveTable { table } => format!("Remove table '{}'", table),
            Self::RemoveTables { pattern } => format!("Remove tables matching '{}'", pattern),
            Self::AddColumn { table, column, .. } => {
                format!("Add column '{}' to table '{}'", column.name, table)
            }
            Self::RemoveColumn { table, column } => {
                format!("Remove column '{}' from table '{}'", column, table)
            }
            Self::ColumnDefaultValueChange {
                table,
                column,
                new_default,
            } => format!(
                "Change default of '{}.{}' to {}",
                table,
                column,
                new_default.as_deref().unwrap_or("none")
            ),
            Self::ColumnSizeChange {
                table,
                column,
                new_size,
                new_scale,
            } => match (new_size, new_scale) {
                (Some(size), Some(scale)) => {
                    format!("Change size of '{}.{}' to ({},{})", table, column, size, scale)
                }
                (Some(size), None) => {
                    format!("Change size of '{}.{}' to ({})", table, column, size)
                }
                _ => format!("Clear size of '{}.{}'", table, column),
            },
            Self::ColumnAutoIncrementChange {
                table,
                column,
                auto_increment,
            } => {
                let verb = if *auto_increment { "Enable" } else { "Disable" };
                format!("{} auto-increment on '{}.{}'", verb, table, column)
            }
            Self::ColumnDefinitionChange {
                table,
                column,
                new_definition,
            } => format!(
                "Change definition of '{}.{}' to {}",
                table,
                column,
                new_definition.type_description()
            ),
            Self::PrimaryKeyChange {
                table,
                old_columns,
                new_columns,
            } => format!(
                "Change primary key of '{}' from ({}) to ({})",
                table,
                old_columns.join(", "),
                new_columns.join(", ")
            ),
            Self::AddForeignKey { table, foreign_key } => format!(
                "Add foreign key '{}' to table '{}'",
                foreign_key.constraint_name(table),
                table
            ),
            Self::RemoveForeignKey { table, foreign_key } => format!(
                "Remove foreign key '{}' from table '{}'",
                foreign_key.constraint_name(table),
                table
            ),
            Self::AddIndex { table, index } => format!(
                "Add index '{}' to table '{}'",
                index.effective_name(table),
                table
            ),
            Self::RemoveIndex { table, index } => format!(
                "Remove index '{}' from table '{}'",
                index.effective_name(table),
                table
            ),
        }
    }

    /// Applies this change to `model` in place.
    ///
    /// Fails with a structural error when the change does not fit the
    /// model (missing table or column, name already taken, foreign key
    /// target absent, ...). The model is left untouched on failure.
    pub fn apply(&self, model: &mut Database, case_sensitive: bool) -> Result<()> {
        match self {
            Self::AddTable { table } => model.add_table(table.clone(), case_sensitive),

            Self::RemoveTable { table } => model.remove_table(table, case_sensitive).map(drop),

            Self::RemoveTables { pattern } => {
                remove_tables_matching(model, pattern, case_sensitive)
            }

            Self::AddColumn {
                table,
                column,
                previous_column,
                next_column,
            } => {
                let t = model.require_table_mut(table, case_sensitive)?;
                if t.find_column(&column.name, case_sensitive).is_some() {
                    return Err(AlterError::ColumnExists {
                        table: table.clone(),
                        column: column.name.clone(),
                    });
                }
                let after_previous = previous_column
                    .as_deref()
                    .and_then(|p| t.column_position(p, case_sensitive))
                    .map(|p| p + 1);
                let before_next = next_column
                    .as_deref()
                    .and_then(|n| t.column_position(n, case_sensitive));
                let position = after_previous.or(before_next).unwrap_or(
                    if previous_column.is_none() && next_column.is_some() {
                        0
                    } else {
                        t.columns.len()
                    },
                );
                t.columns.insert(position, column.clone());
                Ok(())
            }

            Self::RemoveColumn { table, column } => {
                let t = model.require_table_mut(table, case_sensitive)?;
                let pos = t
                    .column_position(column, case_sensitive)
                    .ok_or_else(|| column_not_found(table, column))?;
                t.columns.remove(pos);
                Ok(())
            }

            Self::ColumnDefaultValueChange {
                table,
                column,
                new_default,
            } => {
                let col = require_column(model, table, column, case_sensitive)?;
                col.default_value = new_default.clone();
                Ok(())
            }

            Self::ColumnSizeChange {
                table,
                column,
                new_size,
                new_scale,
            } => {
                let col = require_column(model, table, column, case_sensitive)?;
                col.size = *new_size;
                col.scale = *new_scale;
                Ok(())
            }

            Self::ColumnAutoIncrementChange {
                table,
                column,
                auto_increment,
            } => {
                let col = require_column(model, table, column, case_sensitive)?;
                col.auto_increment = *auto_increment;
                Ok(())
            }

            Self::ColumnDefinitionChange {
                table,
                column,
                new_definition,
            } => {
                let col = require_column(model, table, column, case_sensitive)?;
                col.type_code = new_definition.type_code;
                col.size = new_definition.size;
                col.scale = new_definition.scale;
                col.required = new_definition.required;
                col.auto_increment = new_definition.auto_increment;
                col.default_value = new_definition.default_value.clone();
                col.description = new_definition.description.clone();
                Ok(())
            }

            Self::PrimaryKeyChange {
                table,
                old_columns,
                new_columns,
            } => {
                let t = model.require_table_mut(table, case_sensitive)?;
                for name in old_columns.iter().chain(new_columns) {
                    if t.find_column(name, case_sensitive).is_none() {
                        return Err(AlterError::PrimaryKeyColumnMissing {
                            table: table.clone(),
                            column: name.clone(),
                        });
                    }
                }
                for col in &mut t.columns {
                    col.primary_key = new_columns
                        .iter()
                        .any(|n| crate::model::names_equal(n, &col.name, case_sensitive));
                }
                Ok(())
            }

            Self::AddForeignKey { table, foreign_key } => {
                let name = foreign_key.constraint_name(table);
                let foreign = model
                    .find_table(&foreign_key.foreign_table, case_sensitive)
                    .ok_or_else(|| AlterError::UnresolvedForeignTable {
                        table: table.clone(),
                        foreign_key: name.clone(),
                        foreign_table: foreign_key.foreign_table.clone(),
                    })?;
                for reference in &foreign_key.references {
                    if foreign
                        .find_column(&reference.foreign_column, case_sensitive)
                        .is_none()
                    {
                        return Err(AlterError::UnresolvedForeignColumn {
                            table: table.clone(),
                            foreign_key: name,
                            foreign_table: foreign.name.clone(),
                            column: reference.foreign_column.clone(),
                        });
                    }
                }
                let t = model.require_table_mut(table, case_sensitive)?;
                for reference in &foreign_key.references {
                    if t.find_column(&reference.local_column, case_sensitive).is_none() {
                        return Err(AlterError::UnknownColumn {
                            table: table.clone(),
                            context: format!("Foreign key '{}'", name),
                            column: reference.local_column.clone(),
                        });
                    }
                }
                t.foreign_keys.push(foreign_key.clone());
                Ok(())
            }

            Self::RemoveForeignKey { table, foreign_key } => {
                let t = model.require_table_mut(table, case_sensitive)?;
                let pos = t
                    .foreign_keys
                    .iter()
                    .position(|fk| fk.same_structure(foreign_key, case_sensitive))
                    .ok_or_else(|| AlterError::ForeignKeyNotFound {
                        table: table.clone(),
                        foreign_key: foreign_key.constraint_name(table),
                    })?;
                t.foreign_keys.remove(pos);
                Ok(())
            }

            Self::AddIndex { table, index } => {
                let t = model.require_table_mut(table, case_sensitive)?;
                for column in &index.columns {
                    if t.find_column(&column.name, case_sensitive).is_none() {
                        return Err(AlterError::UnknownColumn {
                            table: table.clone(),
                            context: format!("Index '{}'", index.effective_name(table)),
                            column: column.name.clone(),
                        });
                    }
                }
                t.indexes.push(index.clone());
                Ok(())
            }

            Self::RemoveIndex { table, index } => {
                let t = model.require_table_mut(table, case_sensitive)?;
                let pos = t
                    .indexes
                    .iter()
                    .position(|i| i.matches(index, case_sensitive))
                    .ok_or_else(|| AlterError::IndexNotFound {
                        table: table.clone(),
                        index: index.effective_name(table),
                    })?;
                t.indexes.remove(pos);
                Ok(())
            }
        }
    }
}

/// Applies changes in order, stopping at the first failure.
pub fn apply_all(changes: &[Change], model: &mut Database, case_sensitive: bool) -> Result<()> {
    for change in changes {
        change.apply(model, case_sensitive)?;
    }
    Ok(())
}

/// Compiles a table name pattern, anchored at both ends.
pub(crate) fn table_pattern(pattern: &str, case_sensitive: bool) -> Result<regex::Regex> {
    RegexBuilder::new(&format!("^(?:{})$", pattern))
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| AlterError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

fn remove_tables_matching(model: &mut Database, pattern: &str, case_sensitive: bool) -> Result<()> {
    let regex = table_pattern(pattern, case_sensitive)?;
    let (removed, kept): (Vec<Table>, Vec<Table>) = std::mem::take(&mut model.tables)
        .into_iter()
        .partition(|t| regex.is_match(&t.name));
    model.tables = kept;

    for table in &mut model.tables {
        table.foreign_keys.retain(|fk| {
            !removed
                .iter()
                .any(|r| fk.references_table(&r.name, case_sensitive))
        });
    }
    Ok(())
}

fn require_column<'a>(
    model: &'a mut Database,
    table: &str,
    column: &str,
    case_sensitive: bool,
) -> Result<&'a mut Column> {
    model
        .require_table_mut(table, case_sensitive)?
        .find_column_mut(column, case_sensitive)
        .ok_or_else(|| column_not_found(table, column))
}

fn column_not_found(table: &str, column: &str) -> AlterError {
    AlterError::ColumnNotFound {
        table: table.to_string(),
        column: column.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JdbcType;

    fn model() -> Database {
        Database::new("blog")
            .table(
                Table::new("users")
                    .column(Column::new("id", JdbcType::BigInt).primary_key())
                    .column(Column::new("name", JdbcType::VarChar).size(100)),
            )
            .table(
                Table::new("posts")
                    .column(Column::new("id", JdbcType::BigInt).primary_key())
                    .column(Column::new("author_id", JdbcType::BigInt))
                    .foreign_key(ForeignKey::new("users").reference("author_id", "id")),
            )
            .table(Table::new("audit_log").column(Column::new("id", JdbcType::BigInt)))
    }

    #[test]
    fn test_add_column_positions() {
        let mut db = model();
        Change::AddColumn {
            table: "users".into(),
            column: Column::new("email", JdbcType::VarChar),
            previous_column: Some("id".into()),
            next_column: Some("name".into()),
        }
        .apply(&mut db, true)
        .unwrap();
        Change::AddColumn {
            table: "users".into(),
            column: Column::new("first", JdbcType::Integer),
            previous_column: None,
            next_column: Some("id".into()),
        }
        .apply(&mut db, true)
        .unwrap();

        let names: Vec<&str> = db.tables[0].columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "id", "email", "name"]);
    }

    #[test]
    fn test_add_existing_column_fails() {
        let mut db = model();
        let result = Change::AddColumn {
            table: "users".into(),
            column: Column::new("NAME", JdbcType::VarChar),
            previous_column: None,
            next_column: None,
        }
        .apply(&mut db, false);
        assert!(matches!(result, Err(AlterError::ColumnExists { .. })));
    }

    #[test]
    fn test_primary_key_change() {
        let mut db = model();
        Change::PrimaryKeyChange {
            table: "users".into(),
            old_columns: vec!["id".into()],
            new_columns: vec!["name".into()],
        }
        .apply(&mut db, true)
        .unwrap();
        assert_eq!(db.tables[0].primary_key_names(), vec!["name"]);

        let result = Change::PrimaryKeyChange {
            table: "users".into(),
            old_columns: vec!["name".into()],
            new_columns: vec!["missing".into()],
        }
        .apply(&mut db, true);
        assert!(matches!(
            result,
            Err(AlterError::PrimaryKeyColumnMissing { .. })
        ));
    }

    #[test]
    fn test_add_foreign_key_requires_target() {
        let mut db = model();
        let result = Change::AddForeignKey {
            table: "posts".into(),
            foreign_key: ForeignKey::new("authors").reference("author_id", "id"),
        }
        .apply(&mut db, true);
        assert!(matches!(
            result,
            Err(AlterError::UnresolvedForeignTable { .. })
        ));
    }

    #[test]
    fn test_remove_foreign_key_by_structure() {
        let mut db = model();
        Change::RemoveForeignKey {
            table: "posts".into(),
            foreign_key: ForeignKey::new("users")
                .named("whatever")
                .reference("author_id", "id"),
        }
        .apply(&mut db, true)
        .unwrap();
        assert!(db.tables[1].foreign_keys.is_empty());
    }

    #[test]
    fn test_remove_missing_index_fails() {
        let mut db = model();
        let result = Change::RemoveIndex {
            table: "users".into(),
            index: Index::new("idx_name", ["name"]),
        }
        .apply(&mut db, true);
        assert!(matches!(result, Err(AlterError::IndexNotFound { .. })));
    }

    #[test]
    fn test_remove_tables_strips_dangling_foreign_keys() {
        let mut db = model();
        Change::RemoveTables {
            pattern: "USERS|audit_.*".into(),
        }
        .apply(&mut db, false)
        .unwrap();

        let names: Vec<&str> = db.table_names().collect();
        assert_eq!(names, vec!["posts"]);
        assert!(db.tables[0].foreign_keys.is_empty());
        assert!(db.validate(false).is_ok());
    }

    #[test]
    fn test_remove_tables_pattern_is_anchored() {
        let mut db = model();
        Change::RemoveTables {
            pattern: "user".into(),
        }
        .apply(&mut db, true)
        .unwrap();
        assert_eq!(db.tables.len(), 3);
    }

    #[test]
    fn test_invalid_pattern() {
        let mut db = model();
        let result = Change::RemoveTables {
            pattern: "(".into(),
        }
        .apply(&mut db, true);
        assert!(matches!(result, Err(AlterError::InvalidPattern { .. })));
    }

    #[test]
    fn test_kind_and_description() {
        let change = Change::RemoveColumn {
            table: "users".into(),
            column: "name".into(),
        };
        assert_eq!(change.kind(), ChangeKind::RemoveColumn);
        assert!(change.is_table_definition_change());
        assert_eq!(change.table_name(), Some("users"));
        assert_eq!(change.description(), "Remove column 'name' from table 'users'");
    }
}
