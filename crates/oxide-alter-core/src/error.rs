//! Error types for schema comparison and alteration.

use crate::change::ChangeKind;

/// Errors raised while validating models, computing changes or applying
/// them to a model.
///
/// Every variant except [`AlterError::UnsupportedChange`] is a structural
/// error: the models (or a change) are inconsistent and no plan is
/// produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlterError {
    /// Two tables share a name under the active case rule.
    #[error("Duplicate table '{0}'")]
    DuplicateTable(String),

    /// Two columns of a table share a name under the active case rule.
    #[error("Duplicate column '{column}' in table '{table}'")]
    DuplicateColumn {
        /// Owning table.
        table: String,
        /// Offending column name.
        column: String,
    },

    /// A foreign key points at a table that exists in neither model.
    #[error("Foreign key '{foreign_key}' of table '{table}' references unknown table '{foreign_table}'")]
    UnresolvedForeignTable {
        /// Table owning the foreign key.
        table: String,
        /// Constraint name (synthesized if absent).
        foreign_key: String,
        /// The table that could not be resolved.
        foreign_table: String,
    },

    /// A foreign key references a column absent from the foreign table.
    #[error("Foreign key '{foreign_key}' of table '{table}' references unknown column '{foreign_table}.{column}'")]
    UnresolvedForeignColumn {
        /// Table owning the foreign key.
        table: String,
        /// Constraint name (synthesized if absent).
        foreign_key: String,
        /// Referenced table.
        foreign_table: String,
        /// Missing column.
        column: String,
    },

    /// An index, primary key or local reference names a column the table
    /// does not have.
    #[error("{context} of table '{table}' references unknown column '{column}'")]
    UnknownColumn {
        /// Table being checked.
        table: String,
        /// What referenced the column (index name, foreign key name...).
        context: String,
        /// Missing column.
        column: String,
    },

    /// A change targets a table that does not exist.
    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    /// A change adds a table that already exists.
    #[error("Table '{0}' already exists")]
    TableExists(String),

    /// A change targets a column that does not exist.
    #[error("Column '{column}' does not exist in table '{table}'")]
    ColumnNotFound {
        /// Owning table.
        table: String,
        /// Missing column.
        column: String,
    },

    /// A change adds a column that already exists.
    #[error("Column '{column}' already exists in table '{table}'")]
    ColumnExists {
        /// Owning table.
        table: String,
        /// Existing column.
        column: String,
    },

    /// A primary key change references a column absent from the table.
    #[error("Primary key of table '{table}' references missing column '{column}'")]
    PrimaryKeyColumnMissing {
        /// Owning table.
        table: String,
        /// Missing column.
        column: String,
    },

    /// A change removes an index the table does not have.
    #[error("Index '{index}' does not exist in table '{table}'")]
    IndexNotFound {
        /// Owning table.
        table: String,
        /// Index name (synthesized if absent).
        index: String,
    },

    /// A change removes a foreign key the table does not have.
    #[error("Foreign key '{foreign_key}' does not exist in table '{table}'")]
    ForeignKeyNotFound {
        /// Owning table.
        table: String,
        /// Constraint name (synthesized if absent).
        foreign_key: String,
    },

    /// A table name pattern is not a valid regular expression.
    #[error("Invalid table name pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The pattern as given.
        pattern: String,
        /// Compiler message.
        message: String,
    },

    /// The platform can neither apply a change group in place nor
    /// recreate the table.
    #[error("Change category {category} unsupported on platform '{platform}' (table '{table}')")]
    UnsupportedChange {
        /// Kind of the first rejected change.
        category: ChangeKind,
        /// Table being altered.
        table: String,
        /// Platform name.
        platform: String,
    },

    /// No platform is registered under the requested name.
    #[error("Unknown platform '{0}'")]
    UnknownPlatform(String),

    /// Multiple structural errors found while validating a model.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<AlterError>),
}

impl AlterError {
    /// Returns true for errors that describe inconsistent models or
    /// changes, as opposed to platform limitations.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Self::UnsupportedChange { .. } | Self::UnknownPlatform(_)
        )
    }

    /// Collapses a list of errors into a single one.
    ///
    /// Returns `None` for an empty list.
    #[must_use]
    pub fn from_list(mut errors: Vec<AlterError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }
}

/// Result type for the alteration core.
pub type Result<T> = std::result::Result<T, AlterError>;
