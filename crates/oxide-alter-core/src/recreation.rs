//! Table recreation.
//!
//! When a platform cannot apply a table's changes in place, the table is
//! rebuilt: a temporary table with the new definition is created, the
//! surviving data copied over (converting column types where needed), the
//! old table dropped and the temporary one renamed. Indexes and foreign
//! keys of the new definition are created last.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::change::Change;
use crate::error::{AlterError, Result};
use crate::model::{Column, Database, ForeignKey, Index, JdbcType, Table};
use crate::platform::PlatformInfo;
use crate::predicate::widens;

/// A problem the alteration may cause to existing data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AlterationWarning {
    /// Copying the column converts to a narrower type and may truncate or
    /// reject values.
    LossyConversion {
        /// Table being recreated.
        table: String,
        /// Column being converted.
        column: String,
        /// Old type, e.g. `VARCHAR(50)`.
        from: String,
        /// New type.
        to: String,
    },
    /// A new NOT NULL column has no default, so existing rows get no
    /// valid value.
    MissingValue {
        /// Table being recreated.
        table: String,
        /// Column lacking a value.
        column: String,
    },
}

impl fmt::Display for AlterationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LossyConversion {
                table,
                column,
                from,
                to,
            } => write!(
                f,
                "Converting '{}.{}' from {} to {} may lose data",
                table, column, from, to
            ),
            Self::MissingValue { table, column } => write!(
                f,
                "Required column '{}.{}' has no default; existing rows have no value",
                table, column
            ),
        }
    }
}

/// Type conversion applied while copying a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    /// Old type.
    pub from_type: JdbcType,
    /// Old size or precision.
    pub from_size: Option<u32>,
    /// Old scale.
    pub from_scale: Option<u32>,
    /// New type.
    pub to_type: JdbcType,
    /// New size or precision.
    pub to_size: Option<u32>,
    /// New scale.
    pub to_scale: Option<u32>,
    /// Whether values may not survive the conversion.
    pub lossy: bool,
}

impl Conversion {
    fn between(old: &Column, new: &Column, info: &PlatformInfo) -> Option<Self> {
        let from_type = info.target_type(old.type_code);
        let to_type = info.target_type(new.type_code);
        let from_size = info.effective_size(old);
        let to_size = info.effective_size(new);
        let sized = to_type.has_size() || to_type.has_precision_and_scale();

        if from_type == to_type && (!sized || (from_size == to_size && old.scale == new.scale)) {
            return None;
        }

        let narrower = |from: Option<u32>, to: Option<u32>| match (from, to) {
            (Some(from), Some(to)) => to < from,
            (None, Some(_)) => true,
            _ => false,
        };
        let lossy = if from_type == to_type {
            narrower(from_size, to_size) || narrower(old.scale, new.scale)
        } else {
            !widens(from_type, to_type)
                || (sized && narrower(from_size, to_size))
                || (to_type.has_precision_and_scale() && narrower(old.scale, new.scale))
        };

        Some(Self {
            from_type: old.type_code,
            from_size: old.size,
            from_scale: old.scale,
            to_type: new.type_code,
            to_size: new.size,
            to_scale: new.scale,
            lossy,
        })
    }

    /// The column definition values are converted to, named `name`.
    #[must_use]
    pub fn target_column(&self, name: &str) -> Column {
        Column {
            size: self.to_size,
            scale: self.to_scale,
            ..Column::new(name, self.to_type)
        }
    }
}

/// Where the value of a column of the new table comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CopySource {
    /// The same-named column of the old table.
    Column {
        /// Old column name.
        name: String,
        /// Conversion, when type, size or scale differ.
        conversion: Option<Conversion>,
    },
    /// The column default of the new definition.
    Default {
        /// Raw default value.
        value: String,
    },
    /// NULL.
    Null,
}

/// Value source of one column of the new table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCopy {
    /// Column of the new table.
    pub column: String,
    /// Value source.
    pub source: CopySource,
}

/// One step of a recreation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step")]
pub enum RecreationStep {
    /// Create the temporary table.
    CreateTemporaryTable {
        /// Temporary table name.
        name: String,
        /// Definition, named `name`.
        definition: Table,
    },
    /// Copy rows from the old table into the temporary one.
    CopyData {
        /// Old table.
        from: String,
        /// Temporary table.
        to: String,
        /// Value sources, in the column order of the new table.
        columns: Vec<ColumnCopy>,
    },
    /// Drop the old table.
    DropTable {
        /// Table name.
        name: String,
    },
    /// Rename the temporary table to the final name.
    RenameTable {
        /// Temporary name.
        from: String,
        /// Final name.
        to: String,
    },
    /// Create an index of the new definition.
    AddIndex {
        /// Table name.
        table: String,
        /// Index definition.
        index: Index,
    },
    /// Create a foreign key of the new definition.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Foreign key definition.
        foreign_key: ForeignKey,
    },
}

impl RecreationStep {
    /// Applies this step to a model.
    pub fn apply(&self, model: &mut Database, case_sensitive: bool) -> Result<()> {
        match self {
            Self::CreateTemporaryTable { definition, .. } => {
                model.add_table(definition.clone(), case_sensitive)
            }
            Self::CopyData { .. } => Ok(()),
            Self::DropTable { name } => model.remove_table(name, case_sensitive).map(drop),
            Self::RenameTable { from, to } => {
                if model.find_table(to, case_sensitive).is_some() {
                    return Err(AlterError::TableExists(to.clone()));
                }
                model.require_table_mut(from, case_sensitive)?.name = to.clone();
                Ok(())
            }
            Self::AddIndex { table, index } => Change::AddIndex {
                table: table.clone(),
                index: index.clone(),
            }
            .apply(model, case_sensitive),
            Self::AddForeignKey { table, foreign_key } => Change::AddForeignKey {
                table: table.clone(),
                foreign_key: foreign_key.clone(),
            }
            .apply(model, case_sensitive),
        }
    }
}

/// Rebuild of one table from its old to its new definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecreation {
    /// Definition being replaced.
    pub old: Table,
    /// Definition after the recreation.
    pub new: Table,
    /// Name of the temporary table.
    pub temporary_name: String,
    /// Value source of every copied column of the new table.
    pub copies: Vec<ColumnCopy>,
    /// Whether foreign keys are declared with the temporary table instead
    /// of added afterwards.
    pub inline_foreign_keys: bool,
    /// Data warnings raised while planning the copy.
    pub warnings: Vec<AlterationWarning>,
}

impl TableRecreation {
    /// Plans the recreation of `old` as `new` within `model`, which is used
    /// to pick a free temporary name.
    #[must_use]
    pub fn new(
        old: &Table,
        new: &Table,
        info: &PlatformInfo,
        model: &Database,
        case_sensitive: bool,
    ) -> Self {
        let mut temporary_name = format!("{}_tmp", new.name);
        while model.find_table(&temporary_name, case_sensitive).is_some() {
            temporary_name.push('_');
        }

        let mut copies = Vec::new();
        let mut warnings = Vec::new();
        for column in &new.columns {
            let source = match old.find_column(&column.name, case_sensitive) {
                Some(existing) => {
                    let conversion = Conversion::between(existing, column, info);
                    if let Some(conversion) = conversion.as_ref().filter(|c| c.lossy) {
                        warn!(
                            table = %new.name,
                            column = %column.name,
                            from = %existing.type_description(),
                            to = %column.type_description(),
                            "Lossy conversion while recreating table"
                        );
                        warnings.push(AlterationWarning::LossyConversion {
                            table: new.name.clone(),
                            column: column.name.clone(),
                            from: existing.type_description(),
                            to: conversion.target_column(&column.name).type_description(),
                        });
                    }
                    CopySource::Column {
                        name: existing.name.clone(),
                        conversion,
                    }
                }
                None if column.auto_increment => continue,
                None => match &column.default_value {
                    Some(value) => CopySource::Default {
                        value: value.clone(),
                    },
                    None => {
                        if info.is_required(column) {
                            warn!(
                                table = %new.name,
                                column = %column.name,
                                "Required column without default while recreating table"
                            );
                            warnings.push(AlterationWarning::MissingValue {
                                table: new.name.clone(),
                                column: column.name.clone(),
                            });
                        }
                        CopySource::Null
                    }
                },
            };
            copies.push(ColumnCopy {
                column: column.name.clone(),
                source,
            });
        }

        Self {
            old: old.clone(),
            new: new.clone(),
            temporary_name,
            copies,
            inline_foreign_keys: !info.supports_foreign_key_alteration,
            warnings,
        }
    }

    /// Name of the recreated table.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.new.name
    }

    /// Data warnings of this recreation.
    #[must_use]
    pub fn warnings(&self) -> &[AlterationWarning] {
        &self.warnings
    }

    /// The ordered steps of this recreation.
    #[must_use]
    pub fn steps(&self) -> Vec<RecreationStep> {
        let mut definition = self.new.without_constraints();
        definition.name = self.temporary_name.clone();
        if self.inline_foreign_keys {
            definition.foreign_keys = self.new.foreign_keys.clone();
        }

        let mut steps = vec![
            RecreationStep::CreateTemporaryTable {
                name: self.temporary_name.clone(),
                definition,
            },
            RecreationStep::CopyData {
                from: self.old.name.clone(),
                to: self.temporary_name.clone(),
                columns: self.copies.clone(),
            },
            RecreationStep::DropTable {
                name: self.old.name.clone(),
            },
            RecreationStep::RenameTable {
                from: self.temporary_name.clone(),
                to: self.new.name.clone(),
            },
        ];
        steps.extend(self.new.indexes.iter().map(|index| RecreationStep::AddIndex {
            table: self.new.name.clone(),
            index: index.clone(),
        }));
        if !self.inline_foreign_keys {
            steps.extend(
                self.new
                    .foreign_keys
                    .iter()
                    .map(|foreign_key| RecreationStep::AddForeignKey {
                        table: self.new.name.clone(),
                        foreign_key: foreign_key.clone(),
                    }),
            );
        }
        steps
    }

    /// Applies every step to a model.
    pub fn apply(&self, model: &mut Database, case_sensitive: bool) -> Result<()> {
        for step in self.steps() {
            step.apply(model, case_sensitive)?;
        }
        Ok(())
    }
}
