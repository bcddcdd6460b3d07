//! Rendering of alteration plans to SQL.
//!
//! A [`PlatformEmitter`] knows how one database spells each change and
//! each recreation step. Statements that are the same everywhere have
//! ANSI defaults; the rest are left to the dialect. The provided
//! [`PlatformEmitter::emit_plan`] replays the plan on a copy of the
//! source model so every method sees the table it alters.

use tracing::debug;

use crate::change::{table_pattern, Change};
use crate::error::{AlterError, Result};
use crate::model::{Column, Database, ForeignKey, Index, JdbcType, Table};
use crate::recreation::{ColumnCopy, Conversion, CopySource, RecreationStep};
use crate::sequencer::{AlterationPlan, PlanStep};

/// Trait for database-specific SQL generation.
pub trait PlatformEmitter: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the SQL type for a type code with its size and scale.
    fn type_name(&self, type_code: JdbcType, size: Option<u32>, scale: Option<u32>) -> String;

    /// Generates the column definition used in `CREATE TABLE` and
    /// `ADD COLUMN`.
    fn column_definition(&self, column: &Column) -> String;

    /// Generates `CREATE TABLE`, including the table's foreign keys.
    fn create_table(&self, table: &Table) -> String;

    /// Generates SQL adding `column` to `table`, between `previous` and
    /// `next` when the dialect can place it.
    fn add_column(
        &self,
        table: &Table,
        column: &Column,
        previous: Option<&str>,
        next: Option<&str>,
    ) -> Vec<String>;

    /// Generates SQL dropping a column.
    fn remove_column(&self, table: &Table, column: &str) -> Vec<String>;

    /// Generates SQL setting the default of `column` to its current value.
    fn change_column_default(&self, table: &Table, column: &Column) -> Vec<String>;

    /// Generates SQL resizing `column` to its current size and scale.
    fn change_column_size(&self, table: &Table, column: &Column) -> Vec<String>;

    /// Generates SQL switching auto-increment on `column`.
    fn change_column_auto_increment(&self, table: &Table, column: &Column) -> Vec<String>;

    /// Generates SQL turning `old` into `new`.
    fn change_column_definition(&self, table: &Table, old: &Column, new: &Column) -> Vec<String>;

    /// Generates SQL replacing the primary key of `table`.
    fn change_primary_key(&self, table: &Table, old: &[String], new: &[String]) -> Vec<String>;

    /// Generates SQL adding a foreign key to an existing table.
    fn add_foreign_key(&self, table: &str, foreign_key: &ForeignKey) -> Vec<String>;

    /// Generates SQL dropping a foreign key.
    fn remove_foreign_key(&self, table: &str, foreign_key: &ForeignKey) -> Vec<String>;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Generates SQL dropping a table.
    fn drop_table(&self, name: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(name))
    }

    /// Generates SQL renaming a table.
    fn rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    /// Generates SQL creating an index.
    fn add_index(&self, table: &str, index: &Index) -> Vec<String> {
        let columns: Vec<String> = index
            .columns
            .iter()
            .map(|c| self.quote_identifier(&c.name))
            .collect();
        vec![format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.is_unique() { "UNIQUE " } else { "" },
            self.quote_identifier(&index.effective_name(table)),
            self.quote_identifier(table),
            columns.join(", ")
        )]
    }

    /// Generates SQL dropping an index.
    fn remove_index(&self, table: &str, index: &Index) -> Vec<String> {
        vec![format!(
            "DROP INDEX {}",
            self.quote_identifier(&index.effective_name(table))
        )]
    }

    /// Wraps `expression` in the conversion to the new column type.
    fn cast(&self, expression: String, conversion: &Conversion) -> String {
        format!(
            "CAST({} AS {})",
            expression,
            self.type_name(conversion.to_type, conversion.to_size, conversion.to_scale)
        )
    }

    /// Generates the `INSERT ... SELECT` copying rows into the temporary
    /// table.
    fn copy_data(&self, from: &str, to: &str, columns: &[ColumnCopy]) -> Vec<String> {
        if columns.is_empty() {
            return Vec::new();
        }
        let targets: Vec<String> = columns
            .iter()
            .map(|c| self.quote_identifier(&c.column))
            .collect();
        let values: Vec<String> = columns
            .iter()
            .map(|c| match &c.source {
                CopySource::Column { name, conversion } => {
                    let column = self.quote_identifier(name);
                    match conversion {
                        Some(conversion) => self.cast(column, conversion),
                        None => column,
                    }
                }
                CopySource::Default { value } => value.clone(),
                CopySource::Null => "NULL".to_string(),
            })
            .collect();
        vec![format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            self.quote_identifier(to),
            targets.join(", "),
            values.join(", "),
            self.quote_identifier(from)
        )]
    }

    /// Generates SQL for one recreation step.
    fn emit_recreation_step(&self, step: &RecreationStep) -> Vec<String> {
        match step {
            RecreationStep::CreateTemporaryTable { definition, .. } => {
                vec![self.create_table(definition)]
            }
            RecreationStep::CopyData { from, to, columns } => self.copy_data(from, to, columns),
            RecreationStep::DropTable { name } => vec![self.drop_table(name)],
            RecreationStep::RenameTable { from, to } => vec![self.rename_table(from, to)],
            RecreationStep::AddIndex { table, index } => self.add_index(table, index),
            RecreationStep::AddForeignKey { table, foreign_key } => {
                self.add_foreign_key(table, foreign_key)
            }
        }
    }

    /// Generates SQL for one change. `before` and `after` are the model
    /// states around the change.
    fn emit_change(
        &self,
        change: &Change,
        before: &Database,
        after: &Database,
        case_sensitive: bool,
    ) -> Result<Vec<String>> {
        let cs = case_sensitive;
        let sql = match change {
            Change::AddTable { table } => {
                let mut sql = vec![self.create_table(table)];
                for index in &table.indexes {
                    sql.extend(self.add_index(&table.name, index));
                }
                sql
            }
            Change::RemoveTable { table } => vec![self.drop_table(table)],
            Change::RemoveTables { pattern } => {
                let regex = table_pattern(pattern, cs)?;
                before
                    .table_names()
                    .filter(|name| regex.is_match(name))
                    .map(|name| self.drop_table(name))
                    .collect()
            }
            Change::AddColumn {
                table,
                column,
                previous_column,
                next_column,
            } => self.add_column(
                before.require_table(table, cs)?,
                column,
                previous_column.as_deref(),
                next_column.as_deref(),
            ),
            Change::RemoveColumn { table, column } => {
                self.remove_column(before.require_table(table, cs)?, column)
            }
            Change::ColumnDefaultValueChange { table, column, .. } => {
                let (table, column) = altered_column(after, table, column, cs)?;
                self.change_column_default(table, column)
            }
            Change::ColumnSizeChange { table, column, .. } => {
                let (table, column) = altered_column(after, table, column, cs)?;
                self.change_column_size(table, column)
            }
            Change::ColumnAutoIncrementChange { table, column, .. } => {
                let (table, column) = altered_column(after, table, column, cs)?;
                self.change_column_auto_increment(table, column)
            }
            Change::ColumnDefinitionChange { table, column, .. } => {
                let (_, old) = altered_column(before, table, column, cs)?;
                let (table, new) = altered_column(after, table, column, cs)?;
                self.change_column_definition(table, old, new)
            }
            Change::PrimaryKeyChange {
                table,
                old_columns,
                new_columns,
            } => self.change_primary_key(after.require_table(table, cs)?, old_columns, new_columns),
            Change::AddForeignKey { table, foreign_key } => {
                self.add_foreign_key(table, foreign_key)
            }
            Change::RemoveForeignKey { table, foreign_key } => {
                self.remove_foreign_key(table, foreign_key)
            }
            Change::AddIndex { table, index } => self.add_index(table, index),
            Change::RemoveIndex { table, index } => self.remove_index(table, index),
        };
        Ok(sql)
    }

    /// Generates SQL for one plan step.
    fn emit_step(
        &self,
        step: &PlanStep,
        before: &Database,
        after: &Database,
        case_sensitive: bool,
    ) -> Result<Vec<String>> {
        match step {
            PlanStep::Change(change) => self.emit_change(change, before, after, case_sensitive),
            PlanStep::Recreate(recreation) => Ok(recreation
                .steps()
                .iter()
                .flat_map(|s| self.emit_recreation_step(s))
                .collect()),
        }
    }

    /// Generates the statements of a whole plan executed against
    /// `source`.
    fn emit_plan(
        &self,
        plan: &AlterationPlan,
        source: &Database,
        case_sensitive: bool,
    ) -> Result<Vec<String>> {
        let mut working = source.clone();
        let mut statements = Vec::new();
        for step in &plan.steps {
            let before = working.clone();
            step.apply(&mut working, case_sensitive)?;
            let sql = self.emit_step(step, &before, &working, case_sensitive)?;
            debug!(
                dialect = self.name(),
                step = %step.description(),
                statements = sql.len(),
                "Rendered plan step"
            );
            statements.extend(sql);
        }
        Ok(statements)
    }
}

fn altered_column<'m>(
    model: &'m Database,
    table: &str,
    column: &str,
    case_sensitive: bool,
) -> Result<(&'m Table, &'m Column)> {
    let table = model.require_table(table, case_sensitive)?;
    let column = table
        .find_column(column, case_sensitive)
        .ok_or_else(|| AlterError::ColumnNotFound {
            table: table.name.clone(),
            column: column.to_string(),
        })?;
    Ok((table, column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::sequencer::plan;

    /// Plain ANSI rendering, enough to exercise the dispatch.
    struct AnsiEmitter;

    impl PlatformEmitter for AnsiEmitter {
        fn name(&self) -> &'static str {
            "ansi"
        }

        fn type_name(&self, type_code: JdbcType, size: Option<u32>, scale: Option<u32>) -> String {
            match (size, scale) {
                (Some(size), Some(scale)) => format!("{}({},{})", type_code.name(), size, scale),
                (Some(size), None) => format!("{}({})", type_code.name(), size),
                _ => type_code.name().to_string(),
            }
        }

        fn column_definition(&self, column: &Column) -> String {
            let mut sql = format!(
                "{} {}",
                self.quote_identifier(&column.name),
                self.type_name(column.type_code, column.size, column.scale)
            );
            if column.required {
                sql.push_str(" NOT NULL");
            }
            sql
        }

        fn create_table(&self, table: &Table) -> String {
            let columns: Vec<String> =
                table.columns.iter().map(|c| self.column_definition(c)).collect();
            format!(
                "CREATE TABLE {} ({})",
                self.quote_identifier(&table.name),
                columns.join(", ")
            )
        }

        fn add_column(
            &self,
            table: &Table,
            column: &Column,
            _previous: Option<&str>,
            _next: Option<&str>,
        ) -> Vec<String> {
            vec![format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.quote_identifier(&table.name),
                self.column_definition(column)
            )]
        }

        fn remove_column(&self, table: &Table, column: &str) -> Vec<String> {
            vec![format!("ALTER TABLE {} DROP COLUMN {}", table.name, column)]
        }

        fn change_column_default(&self, table: &Table, column: &Column) -> Vec<String> {
            vec![format!("DEFAULT {}.{}", table.name, column.name)]
        }

        fn change_column_size(&self, table: &Table, column: &Column) -> Vec<String> {
            vec![format!(
                "RESIZE {}.{} {}",
                table.name,
                column.name,
                self.type_name(column.type_code, column.size, column.scale)
            )]
        }

        fn change_column_auto_increment(&self, table: &Table, column: &Column) -> Vec<String> {
            vec![format!("IDENTITY {}.{}", table.name, column.name)]
        }

        fn change_column_definition(
            &self,
            table: &Table,
            old: &Column,
            new: &Column,
        ) -> Vec<String> {
            vec![format!(
                "REDEFINE {}.{} {} -> {}",
                table.name,
                old.name,
                old.type_description(),
                new.type_description()
            )]
        }

        fn change_primary_key(
            &self,
            table: &Table,
            _old: &[String],
            new: &[String],
        ) -> Vec<String> {
            vec![format!("PRIMARY KEY {} ({})", table.name, new.join(", "))]
        }

        fn add_foreign_key(&self, table: &str, foreign_key: &ForeignKey) -> Vec<String> {
            vec![format!("ADD FK {}", foreign_key.constraint_name(table))]
        }

        fn remove_foreign_key(&self, table: &str, foreign_key: &ForeignKey) -> Vec<String> {
            vec![format!("DROP FK {}", foreign_key.constraint_name(table))]
        }
    }

    fn items(code_size: u32) -> Table {
        Table::new("items")
            .column(Column::new("id", JdbcType::Integer).primary_key())
            .column(Column::new("code", JdbcType::VarChar).size(code_size))
    }

    #[test]
    fn renders_recreation_with_cast() {
        let source = Database::new("shop").table(items(10));
        let target = Database::new("shop").table(items(50));
        let plan = plan(&source, &target, &Platform::generic(), true).unwrap();

        let sql = AnsiEmitter.emit_plan(&plan, &source, true).unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE \"items_tmp\" (\"id\" INTEGER NOT NULL, \"code\" VARCHAR(50))",
                "INSERT INTO \"items_tmp\" (\"id\", \"code\") SELECT \"id\", CAST(\"code\" AS VARCHAR(50)) FROM \"items\"",
                "DROP TABLE \"items\"",
                "ALTER TABLE \"items_tmp\" RENAME TO \"items\"",
            ]
        );
    }

    #[test]
    fn renders_changes_against_current_state() {
        let source = Database::new("shop").table(items(10));
        let target = Database::new("shop").table(
            items(10)
                .column(Column::new("note", JdbcType::VarChar).size(20))
                .index(Index::unique("uq_items_code", ["code"])),
        );
        let plan = plan(&source, &target, &Platform::generic(), true).unwrap();

        let sql = AnsiEmitter.emit_plan(&plan, &source, true).unwrap();
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"items\" ADD COLUMN \"note\" VARCHAR(20)",
                "CREATE UNIQUE INDEX \"uq_items_code\" ON \"items\" (\"code\")",
            ]
        );
    }

    #[test]
    fn added_table_creates_its_indexes() {
        let source = Database::new("shop");
        let target = Database::new("shop").table(
            items(10)
                .index(Index::new("idx_items_code", ["code"]))
                .index(Index::unique("uq_items_id_code", ["id", "code"])),
        );
        let plan = plan(&source, &target, &Platform::generic(), true).unwrap();

        let sql = AnsiEmitter.emit_plan(&plan, &source, true).unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE \"items\" (\"id\" INTEGER NOT NULL, \"code\" VARCHAR(10))",
                "CREATE INDEX \"idx_items_code\" ON \"items\" (\"code\")",
                "CREATE UNIQUE INDEX \"uq_items_id_code\" ON \"items\" (\"id\", \"code\")",
            ]
        );
    }

    #[test]
    fn remove_tables_drops_every_match() {
        let source = Database::new("shop")
            .table(Table::new("tmp_a").column(Column::new("id", JdbcType::Integer)))
            .table(Table::new("tmp_b").column(Column::new("id", JdbcType::Integer)))
            .table(items(10));
        let change = Change::RemoveTables {
            pattern: "tmp_.*".into(),
        };
        let mut after = source.clone();
        change.apply(&mut after, true).unwrap();

        let sql = AnsiEmitter.emit_change(&change, &source, &after, true).unwrap();
        assert_eq!(sql, vec!["DROP TABLE \"tmp_a\"", "DROP TABLE \"tmp_b\""]);
    }

    #[test]
    fn quote_identifier_escapes_quotes() {
        assert_eq!(AnsiEmitter.quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
