//! SQL dialects.
//!
//! Each dialect implements [`PlatformEmitter`] for one database and is
//! paired with the platform of the same name in the registry.

mod postgres;
mod sqlite;

pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use chrono::Utc;
use oxide_alter_core::emitter::PlatformEmitter;
use oxide_alter_core::model::{Column, ForeignKey, ForeignKeyAction};

use crate::error::{AlterToolError, Result};

/// Returns the dialect for a platform name.
pub fn for_platform(name: &str) -> Result<Box<dyn PlatformEmitter>> {
    match name.to_ascii_lowercase().as_str() {
        "sqlite" => Ok(Box::new(SqliteDialect::new())),
        "postgresql" | "postgres" => Ok(Box::new(PostgresDialect::new())),
        _ => Err(AlterToolError::NoDialect(name.to_string())),
    }
}

/// Formats statements as a script, one statement per line, with a header
/// naming the dialect and the generation time.
#[must_use]
pub fn script(dialect: &str, statements: &[String]) -> String {
    let mut out = format!(
        "-- Generated by oxide-alter for {} at {}\n",
        dialect,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    if statements.is_empty() {
        out.push_str("-- Schema is up to date\n");
    }
    for sql in statements {
        if sql.starts_with("--") {
            out.push_str(sql);
        } else {
            out.push_str(sql);
            out.push(';');
        }
        out.push('\n');
    }
    out
}

/// `CONSTRAINT ... FOREIGN KEY ... REFERENCES ...` clause.
pub(crate) fn foreign_key_clause<E: PlatformEmitter + ?Sized>(
    emitter: &E,
    table: &str,
    foreign_key: &ForeignKey,
) -> String {
    let quote_all = |names: Vec<&str>| -> String {
        names
            .into_iter()
            .map(|n| emitter.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut sql = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        emitter.quote_identifier(&foreign_key.constraint_name(table)),
        quote_all(
            foreign_key
                .references
                .iter()
                .map(|r| r.local_column.as_str())
                .collect()
        ),
        emitter.quote_identifier(&foreign_key.foreign_table),
        quote_all(
            foreign_key
                .references
                .iter()
                .map(|r| r.foreign_column.as_str())
                .collect()
        ),
    );
    if foreign_key.on_delete != ForeignKeyAction::NoAction {
        sql.push_str(" ON DELETE ");
        sql.push_str(foreign_key.on_delete.to_sql());
    }
    if foreign_key.on_update != ForeignKeyAction::NoAction {
        sql.push_str(" ON UPDATE ");
        sql.push_str(foreign_key.on_update.to_sql());
    }
    sql
}

/// Quoted, comma separated primary key column list.
pub(crate) fn primary_key_columns<E: PlatformEmitter + ?Sized>(
    emitter: &E,
    columns: &[&Column],
) -> String {
    columns
        .iter()
        .map(|c| emitter.quote_identifier(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}
