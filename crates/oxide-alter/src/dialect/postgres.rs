//! PostgreSQL dialect.

use oxide_alter_core::emitter::PlatformEmitter;
use oxide_alter_core::model::{Column, DefaultValue, ForeignKey, JdbcType, Table};

use super::{foreign_key_clause, primary_key_columns};

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn default_sql(column: &Column) -> Option<String> {
        column.parsed_default().map(|value| match value {
            DefaultValue::Bool(b) => if b { "TRUE" } else { "FALSE" }.to_string(),
            other => other.to_sql(),
        })
    }

    fn column_type(&self, column: &Column) -> String {
        if column.auto_increment {
            return match column.type_code {
                JdbcType::BigInt => "BIGSERIAL",
                JdbcType::TinyInt | JdbcType::SmallInt => "SMALLSERIAL",
                _ => "SERIAL",
            }
            .to_string();
        }
        self.type_name(column.type_code, column.size, column.scale)
    }

    fn alter_column(&self, table: &str, column: &str, action: &str) -> String {
        format!(
            "ALTER TABLE {} ALTER COLUMN {} {}",
            self.quote_identifier(table),
            self.quote_identifier(column),
            action
        )
    }

    fn set_default(&self, table: &str, column: &Column) -> String {
        match Self::default_sql(column) {
            Some(value) => {
                self.alter_column(table, &column.name, &format!("SET DEFAULT {}", value))
            }
            None => self.alter_column(table, &column.name, "DROP DEFAULT"),
        }
    }
}

impl PlatformEmitter for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn type_name(&self, type_code: JdbcType, size: Option<u32>, scale: Option<u32>) -> String {
        match type_code {
            JdbcType::Bit | JdbcType::Boolean => "BOOLEAN".to_string(),
            JdbcType::TinyInt | JdbcType::SmallInt => "SMALLINT".to_string(),
            JdbcType::Integer => "INTEGER".to_string(),
            JdbcType::BigInt => "BIGINT".to_string(),
            JdbcType::Real => "REAL".to_string(),
            JdbcType::Float | JdbcType::Double => "DOUBLE PRECISION".to_string(),
            JdbcType::Numeric | JdbcType::Decimal => match (size, scale) {
                (Some(p), Some(s)) => format!("NUMERIC({},{})", p, s),
                (Some(p), None) => format!("NUMERIC({})", p),
                _ => "NUMERIC".to_string(),
            },
            JdbcType::Char => format!("CHAR({})", size.unwrap_or(1)),
            JdbcType::VarChar => match size {
                Some(n) => format!("VARCHAR({})", n),
                None => "VARCHAR".to_string(),
            },
            JdbcType::LongVarChar | JdbcType::Clob | JdbcType::Other => "TEXT".to_string(),
            JdbcType::Binary | JdbcType::VarBinary | JdbcType::LongVarBinary | JdbcType::Blob => {
                "BYTEA".to_string()
            }
            JdbcType::Date => "DATE".to_string(),
            JdbcType::Time => "TIME".to_string(),
            JdbcType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    fn column_definition(&self, column: &Column) -> String {
        let mut parts = vec![self.quote_identifier(&column.name), self.column_type(column)];
        if column.required && !column.auto_increment {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = Self::default_sql(column) {
            parts.push(format!("DEFAULT {}", default));
        }
        parts.join(" ")
    }

    fn create_table(&self, table: &Table) -> String {
        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        let primary_key = table.primary_key_columns();
        if !primary_key.is_empty() {
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

    // Columns are always appended; PostgreSQL has no positional ADD COLUMN.
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
        vec![format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(&table.name),
            self.quote_identifier(column)
        )]
    }

    fn change_column_default(&self, table: &Table, column: &Column) -> Vec<String> {
        vec![self.set_default(&table.name, column)]
    }

    fn change_column_size(&self, table: &Table, column: &Column) -> Vec<String> {
        vec![self.alter_column(
            &table.name,
            &column.name,
            &format!(
                "TYPE {}",
                self.type_name(column.type_code, column.size, column.scale)
            ),
        )]
    }

    fn change_column_auto_increment(&self, table: &Table, column: &Column) -> Vec<String> {
        let action = if column.auto_increment {
            "ADD GENERATED BY DEFAULT AS IDENTITY"
        } else {
            "DROP IDENTITY IF EXISTS"
        };
        vec![self.alter_column(&table.name, &column.name, action)]
    }

    fn change_column_definition(&self, table: &Table, old: &Column, new: &Column) -> Vec<String> {
        let mut sql = Vec::new();
        let old_type = self.type_name(old.type_code, old.size, old.scale);
        let new_type = self.type_name(new.type_code, new.size, new.scale);
        if old_type != new_type {
            sql.push(self.alter_column(
                &table.name,
                &new.name,
                &format!(
                    "TYPE {} USING {}::{}",
                    new_type,
                    self.quote_identifier(&new.name),
                    new_type
                ),
            ));
        }
        if old.required != new.required {
            let action = if new.required { "SET NOT NULL" } else { "DROP NOT NULL" };
            sql.push(self.alter_column(&table.name, &new.name, action));
        }
        if old.parsed_default() != new.parsed_default() {
            sql.push(self.set_default(&table.name, new));
        }
        if old.auto_increment != new.auto_increment {
            sql.extend(self.change_column_auto_increment(table, new));
        }
        sql
    }

    fn change_primary_key(&self, table: &Table, old: &[String], new: &[String]) -> Vec<String> {
        let mut sql = Vec::new();
        if !old.is_empty() {
            sql.push(format!(
                "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}",
                self.quote_identifier(&table.name),
                self.quote_identifier(&format!("{}_pkey", table.name))
            ));
        }
        if !new.is_empty() {
            let columns: Vec<String> = new.iter().map(|c| self.quote_identifier(c)).collect();
            sql.push(format!(
                "ALTER TABLE {} ADD PRIMARY KEY ({})",
                self.quote_identifier(&table.name),
                columns.join(", ")
            ));
        }
        sql
    }

    fn add_foreign_key(&self, table: &str, foreign_key: &ForeignKey) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            foreign_key_clause(self, table, foreign_key)
        )]
    }

    fn remove_foreign_key(&self, table: &str, foreign_key: &ForeignKey) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(table),
            self.quote_identifier(&foreign_key.constraint_name(table))
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_alter_core::model::Database;
    use oxide_alter_core::platform::Platform;
    use oxide_alter_core::sequencer::plan;

    fn dialect() -> PostgresDialect {
        PostgresDialect::new()
    }

    #[test]
    fn test_create_table() {
        let table = Table::new("users")
            .column(Column::new("id", JdbcType::BigInt).primary_key().auto_increment())
            .column(Column::new("active", JdbcType::Boolean).required().default_value("1"));
        let sql = dialect().create_table(&table);
        assert!(sql.contains("\"id\" BIGSERIAL"));
        assert!(sql.contains("\"active\" BOOLEAN NOT NULL DEFAULT TRUE"));
        assert!(sql.contains("PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn test_widening_in_place() {
        let table = |size| {
            Table::new("t")
                .column(Column::new("id", JdbcType::Integer).primary_key())
                .column(Column::new("name", JdbcType::VarChar).size(size))
        };
        let source = Database::new("app").table(table(10));
        let target = Database::new("app").table(table(50));
        let plan = plan(&source, &target, &Platform::postgresql(), true).unwrap();
        let sql = dialect().emit_plan(&plan, &source, true).unwrap();
        assert_eq!(
            sql,
            vec!["ALTER TABLE \"t\" ALTER COLUMN \"name\" TYPE VARCHAR(50)"]
        );
    }

    #[test]
    fn test_dropping_key_column_keeps_a_primary_key() {
        let source = Database::new("app").table(
            Table::new("t")
                .column(Column::new("a", JdbcType::Integer).primary_key())
                .column(Column::new("b", JdbcType::Integer).primary_key()),
        );
        let target = Database::new("app").table(
            Table::new("t").column(Column::new("b", JdbcType::Integer).primary_key()),
        );
        let plan = plan(&source, &target, &Platform::postgresql(), true).unwrap();
        let sql = dialect().emit_plan(&plan, &source, true).unwrap();
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"t\" DROP CONSTRAINT IF EXISTS \"t_pkey\"",
                "ALTER TABLE \"t\" ADD PRIMARY KEY (\"b\")",
                "ALTER TABLE \"t\" DROP COLUMN \"a\"",
            ]
        );
    }

    #[test]
    fn test_change_column_definition() {
        let table = Table::new("t");
        let old = Column::new("qty", JdbcType::SmallInt);
        let new = Column::new("qty", JdbcType::Integer)
            .required()
            .default_value("0");
        let sql = dialect().change_column_definition(&table, &old, &new);
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"t\" ALTER COLUMN \"qty\" TYPE INTEGER USING \"qty\"::INTEGER",
                "ALTER TABLE \"t\" ALTER COLUMN \"qty\" SET NOT NULL",
                "ALTER TABLE \"t\" ALTER COLUMN \"qty\" SET DEFAULT 0",
            ]
        );
    }

    #[test]
    fn test_primary_key_change() {
        let sql = dialect().change_primary_key(&Table::new("t"), &["b".into()], &["a".into()]);
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"t\" DROP CONSTRAINT IF EXISTS \"t_pkey\"",
                "ALTER TABLE \"t\" ADD PRIMARY KEY (\"a\")",
            ]
        );
    }

    #[test]
    fn test_foreign_keys() {
        let fk = ForeignKey::new("users").named("fk_author").reference("author_id", "id");
        assert_eq!(
            dialect().remove_foreign_key("posts", &fk),
            vec!["ALTER TABLE \"posts\" DROP CONSTRAINT \"fk_author\""]
        );
        assert_eq!(
            dialect().add_foreign_key("posts", &fk),
            vec![
                "ALTER TABLE \"posts\" ADD CONSTRAINT \"fk_author\" \
                 FOREIGN KEY (\"author_id\") REFERENCES \"users\" (\"id\")"
            ]
        );
    }
}
