//! SQLite schema introspection.
//!
//! Reads `sqlite_master` and the table pragmas of one attached database
//! into a [`Database`] model. Declared column types are parsed back into
//! type codes, sizes and scales; SQLite keeps the declaration text
//! verbatim, so a schema written by [`SqliteDialect`] reads back
//! unchanged.
//!
//! [`SqliteDialect`]: crate::dialect::SqliteDialect

use std::str::FromStr;
use std::sync::LazyLock;

use oxide_alter_core::model::{
    Column, Database, ForeignKey, ForeignKeyAction, Index, IndexColumn, IndexKind, JdbcType,
    Reference, Table,
};
use regex::Regex;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::{debug, info};

use crate::error::{AlterToolError, Result};

static DECLARED_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z ]*?)\s*(?:\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?\s*$")
        .unwrap_or_else(|e| unreachable!("invalid declared type pattern: {e}"))
});

static AUTOINCREMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bAUTOINCREMENT\b")
        .unwrap_or_else(|e| unreachable!("invalid autoincrement pattern: {e}"))
});

/// Parses a declared SQLite column type into a type code, size and scale.
///
/// Names that are not JDBC type names fall back to SQLite's affinity
/// rules.
#[must_use]
pub fn parse_declared_type(declared: &str) -> (JdbcType, Option<u32>, Option<u32>) {
    let Some(captures) = DECLARED_TYPE.captures(declared) else {
        return (affinity(declared), None, None);
    };
    let name = captures.get(1).map_or("", |m| m.as_str());
    let number = |i: usize| captures.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let type_code = JdbcType::from_str(name).unwrap_or_else(|_| affinity(name));
    if type_code.has_size() || type_code.has_precision_and_scale() {
        (type_code, number(2), number(3))
    } else {
        (type_code, None, None)
    }
}

fn affinity(declared: &str) -> JdbcType {
    let upper = declared.to_ascii_uppercase();
    if upper.contains("INT") {
        JdbcType::Integer
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        JdbcType::LongVarChar
    } else if upper.is_empty() || upper.contains("BLOB") {
        JdbcType::Blob
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        JdbcType::Double
    } else {
        JdbcType::Numeric
    }
}

/// Strips the parentheses SQLite keeps around expression defaults.
fn clean_default(raw: String) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) if balanced(inner) => inner.trim().to_string(),
        _ => trimmed.to_string(),
    }
}

fn balanced(s: &str) -> bool {
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

/// Reads the schema of the attached database `schema` (default `main`)
/// into a model named `catalog`.
pub async fn read_model(
    pool: &SqlitePool,
    catalog: &str,
    schema: Option<&str>,
) -> Result<Database> {
    let schema = schema.unwrap_or("main");
    let master = format!(
        "SELECT name, sql FROM \"{}\".sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        schema.replace('"', "\"\"")
    );
    let rows = sqlx::query(&master).fetch_all(pool).await?;

    let mut model = Database::new(catalog);
    for row in rows {
        let name: String = row.try_get("name")?;
        let sql: Option<String> = row.try_get("sql")?;
        let autoincrement = sql.as_deref().is_some_and(|s| AUTOINCREMENT.is_match(s));
        let table = read_table(pool, schema, &name, autoincrement).await?;
        debug!(
            table = %table.name,
            columns = table.columns.len(),
            indexes = table.indexes.len(),
            foreign_keys = table.foreign_keys.len(),
            "Read table"
        );
        model.tables.push(table);
    }

    resolve_implicit_references(&mut model)?;
    model
        .validate(false)
        .map_err(|e| AlterToolError::Introspection(e.to_string()))?;
    info!(catalog = %catalog, schema = %schema, tables = model.tables.len(), "Read schema");
    Ok(model)
}

async fn read_table(
    pool: &SqlitePool,
    schema: &str,
    name: &str,
    autoincrement: bool,
) -> Result<Table> {
    let mut table = Table::new(name);

    let columns = sqlx::query(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1, ?2) ORDER BY cid",
    )
    .bind(name)
    .bind(schema)
    .fetch_all(pool)
    .await?;
    let key_columns = columns
        .iter()
        .filter(|row| row.try_get::<i64, _>("pk").is_ok_and(|pk| pk > 0))
        .count();
    for row in &columns {
        let column_name: String = row.try_get("name")?;
        let declared: String = row.try_get("type")?;
        let not_null: bool = row.try_get("notnull")?;
        let default: Option<String> = row.try_get("dflt_value")?;
        let pk: i64 = row.try_get("pk")?;

        let (type_code, size, scale) = parse_declared_type(&declared);
        let mut column = Column::new(column_name, type_code);
        column.size = size;
        column.scale = scale;
        column.required = not_null || pk > 0;
        column.primary_key = pk > 0;
        column.auto_increment =
            autoincrement && pk > 0 && key_columns == 1 && type_code == JdbcType::Integer;
        column.default_value = default.map(clean_default);
        table.columns.push(column);
    }

    let indexes = sqlx::query(
        "SELECT name, \"unique\", origin FROM pragma_index_list(?1, ?2)",
    )
    .bind(name)
    .bind(schema)
    .fetch_all(pool)
    .await?;
    for row in indexes {
        let index_name: String = row.try_get("name")?;
        let unique: bool = row.try_get("unique")?;
        let origin: String = row.try_get("origin")?;
        if origin == "pk" {
            continue;
        }
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_index_info(?1, ?2) ORDER BY seqno")
                .bind(&index_name)
                .bind(schema)
                .fetch_all(pool)
                .await?;
        table.indexes.push(Index {
            // Indexes backing UNIQUE constraints carry generated names.
            name: (origin != "u").then_some(index_name),
            kind: if unique {
                IndexKind::Unique
            } else {
                IndexKind::NonUnique
            },
            columns: columns.into_iter().map(IndexColumn::new).collect(),
        });
    }

    let references = sqlx::query(
        "SELECT id, \"table\", \"from\", \"to\", on_update, on_delete \
         FROM pragma_foreign_key_list(?1, ?2) ORDER BY id, seq",
    )
    .bind(name)
    .bind(schema)
    .fetch_all(pool)
    .await?;
    let mut current: Option<(i64, ForeignKey)> = None;
    for row in references {
        let id: i64 = row.try_get("id")?;
        let foreign_table: String = row.try_get("table")?;
        let from: String = row.try_get("from")?;
        // NULL when the key targets the primary key implicitly.
        let to: Option<String> = row.try_get("to")?;
        let on_update: String = row.try_get("on_update")?;
        let on_delete: String = row.try_get("on_delete")?;

        if current.as_ref().is_none_or(|(current_id, _)| *current_id != id) {
            if let Some((_, fk)) = current.take() {
                table.foreign_keys.push(fk);
            }
            let fk = ForeignKey::new(foreign_table)
                .on_update(ForeignKeyAction::from_sql(&on_update))
                .on_delete(ForeignKeyAction::from_sql(&on_delete));
            current = Some((id, fk));
        }
        if let Some((_, fk)) = current.as_mut() {
            fk.references.push(Reference::new(from, to.unwrap_or_default()));
        }
    }
    if let Some((_, fk)) = current {
        table.foreign_keys.push(fk);
    }
    // pragma_foreign_key_list lists keys in reverse declaration order.
    table.foreign_keys.reverse();

    Ok(table)
}

/// Fills in foreign columns left implicit (`REFERENCES t` without a
/// column list) with the referenced table's primary key.
fn resolve_implicit_references(model: &mut Database) -> Result<()> {
    let keys: Vec<(String, Vec<String>)> = model
        .tables
        .iter()
        .map(|t| (t.name.clone(), t.primary_key_names()))
        .collect();
    for table in &mut model.tables {
        for fk in &mut table.foreign_keys {
            if fk.references.iter().all(|r| !r.foreign_column.is_empty()) {
                continue;
            }
            let key = keys
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&fk.foreign_table))
                .map(|(_, key)| key)
                .ok_or_else(|| {
                    AlterToolError::Introspection(format!(
                        "foreign key of '{}' references unknown table '{}'",
                        table.name, fk.foreign_table
                    ))
                })?;
            for (reference, column) in fk.references.iter_mut().zip(key) {
                if reference.foreign_column.is_empty() {
                    reference.foreign_column = column.clone();
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_declared_type() {
        assert_eq!(
            parse_declared_type("VARCHAR(50)"),
            (JdbcType::VarChar, Some(50), None)
        );
        assert_eq!(
            parse_declared_type("decimal(10, 2)"),
            (JdbcType::Decimal, Some(10), Some(2))
        );
        assert_eq!(parse_declared_type("INTEGER"), (JdbcType::Integer, None, None));
        assert_eq!(parse_declared_type("INT(11)"), (JdbcType::Integer, None, None));
        assert_eq!(parse_declared_type("TEXT"), (JdbcType::LongVarChar, None, None));
        assert_eq!(
            parse_declared_type("DOUBLE PRECISION"),
            (JdbcType::Double, None, None)
        );
        assert_eq!(
            parse_declared_type("NVARCHAR(20)"),
            (JdbcType::LongVarChar, None, None)
        );
        assert_eq!(parse_declared_type(""), (JdbcType::Blob, None, None));
        assert_eq!(parse_declared_type("MONEY"), (JdbcType::Numeric, None, None));
    }

    #[test]
    fn test_clean_default() {
        assert_eq!(clean_default("(date('now'))".into()), "date('now')");
        assert_eq!(clean_default("'x'".into()), "'x'");
        assert_eq!(clean_default("(1) + (2)".into()), "(1) + (2)");
    }
}
