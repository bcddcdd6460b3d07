//! SQLite dialect.
//!
//! SQLite can add and drop columns but alter nothing else in place, and
//! foreign keys exist only as part of `CREATE TABLE`. The sequencer
//! recreates tables for everything else; statements for changes SQLite
//! cannot express come out as comments.

use oxide_alter_core::emitter::PlatformEmitter;
use oxide_alter_core::model::{Column, DefaultValue, ForeignKey, JdbcType, Table};

use super::{foreign_key_clause, primary_key_columns};

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn default_clause(column: &Column) -> Option<String> {
        column.parsed_default().map(|value| match value {
            DefaultValue::Expression(expr) if !is_current_keyword(&expr) => {
                format!("DEFAULT ({})", expr)
            }
            other => format!("DEFAULT {}", other.to_sql()),
        })
    }

    fn unsupported(&self, what: &str, table: &str) -> Vec<String> {
        vec![format!(
            "-- SQLite does not support {} on {}. Table recreation required.",
            what,
            self.quote_identifier(table)
        )]
    }
}

fn is_current_keyword(expr: &str) -> bool {
    matches!(
        expr.to_ascii_uppercase().as_str(),
        "CURRENT_TIMESTAMP" | "CURRENT_DATE" | "CURRENT_TIME"
    )
}

/// The single auto-increment primary key column, which SQLite can only
/// declare inline as `INTEGER PRIMARY KEY AUTOINCREMENT`.
fn rowid_alias(table: &Table) -> Option<&Column> {
    match table.primary_key_columns().as_slice() {
        [column] if column.auto_increment => Some(*column),
        _ => None,
    }
}

impl PlatformEmitter for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    // Declared types are kept verbatim so introspection reads back the
    // same type code; SQLite derives the storage affinity from the name.
    fn type_name(&self, type_code: JdbcType, size: Option<u32>, scale: Option<u32>) -> String {
        match (size, scale) {
            (Some(size), Some(scale)) if type_code.has_precision_and_scale() => {
                format!("{}({},{})", type_code.name(), size, scale)
            }
            (Some(size), _) if type_code.has_size() || type_code.has_precision_and_scale() => {
                format!("{}({})", type_code.name(), size)
            }
            _ => match type_code {
                JdbcType::LongVarChar => "TEXT".to_string(),
                JdbcType::Other => "BLOB".to_string(),
                _ => type_code.name().to_string(),
            },
        }
    }

    fn column_definition(&self, column: &Column) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_name(column.type_code, column.size, column.scale),
        ];

        if column.required {
            parts.push("NOT NULL".to_string());
        }

        if let Some(default) = Self::default_clause(column) {
            parts.push(default);
        }

        parts.join(" ")
    }

    fn create_table(&self, table: &Table) -> String {
        let alias = rowid_alias(table).map(|c| c.name.as_str());
        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                if Some(column.name.as_str()) == alias {
                    format!(
                        "{} INTEGER PRIMARY KEY AUTOINCREMENT",
                        self.quote_identifier(&column.name)
                    )
                } else {
                    self.column_definition(column)
                }
            })
            .collect();

        let primary_key = table.primary_key_columns();
        if alias.is_none() && !primary_key.is_empty() {
            definitions.push(format!(
                "PRIMARY KEY ({})",
                primary_key_columns(self, &primary_key)
            ));
        }
        definitions.extend(
            table
                .foreign_keys
                .iter()
                .map(|fk| foreign_key_clause(self, &table.name, fk)),
        );

        format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(&table.name),
            definitions.join(",\n  ")
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

    // SQLite 3.35.0+
    fn remove_column(&self, table: &Table, column: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(&table.name),
            self.quote_identifier(column)
        )]
    }

    fn change_column_default(&self, table: &Table, column: &Column) -> Vec<String> {
        self.unsupported(&format!("changing the default of {}", column.name), &table.name)
    }

    fn change_column_size(&self, table: &Table, column: &Column) -> Vec<String> {
        self.unsupported(&format!("resizing {}", column.name), &table.name)
    }

    fn change_column_auto_increment(&self, table: &Table, column: &Column) -> Vec<String> {
        self.unsupported(
            &format!("changing auto-increment of {}", column.name),
            &table.name,
        )
    }

    fn change_column_definition(&self, table: &Table, old: &Column, _new: &Column) -> Vec<String> {
        self.unsupported(&format!("ALTER COLUMN {}", old.name), &table.name)
    }

    fn change_primary_key(&self, table: &Table, _old: &[String], _new: &[String]) -> Vec<String> {
        self.unsupported("changing the primary key", &table.name)
    }

    fn add_foreign_key(&self, table: &str, foreign_key: &ForeignKey) -> Vec<String> {
        self.unsupported(
            &format!("adding foreign key {}", foreign_key.constraint_name(table)),
            table,
        )
    }

    fn remove_foreign_key(&self, table: &str, foreign_key: &ForeignKey) -> Vec<String> {
        self.unsupported(
            &format!("dropping foreign key {}", foreign_key.constraint_name(table)),
            table,
        )
    }
}
