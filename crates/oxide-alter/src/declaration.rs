//! Declared models.
//!
//! A declaration is the JSON form of a [`Database`], e.g.
//!
//! ```json
//! {
//!   "name": "shop",
//!   "tables": [
//!     {
//!       "name": "items",
//!       "columns": [
//!         { "name": "id", "type": "INTEGER", "primary_key": true, "required": true },
//!         { "name": "code", "type": "VARCHAR", "size": 50 }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::path::Path;

use oxide_alter_core::model::Database;
use tracing::debug;

use crate::error::Result;

/// Parses and validates a declared model.
pub fn parse_model(source: &str, case_sensitive: bool) -> Result<Database> {
    let model: Database = serde_json::from_str(source)?;
    model.validate(case_sensitive)?;
    debug!(name = %model.name, tables = model.tables.len(), "Parsed model declaration");
    Ok(model)
}

/// Reads a declared model from a file.
pub fn read_model_file(path: &Path, case_sensitive: bool) -> Result<Database> {
    let source = std::fs::read_to_string(path)?;
    parse_model(&source, case_sensitive)
}

/// Serializes a model as pretty-printed JSON.
pub fn write_model(model: &Database) -> Result<String> {
    Ok(serde_json::to_string_pretty(model)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlterToolError;
    use oxide_alter_core::error::AlterError;
    use oxide_alter_core::model::{Column, JdbcType, Table};

    const SHOP: &str = r#"{
        "name": "shop",
        "tables": [
            {
                "name": "items",
                "columns": [
                    { "name": "id", "type": "INTEGER", "primary_key": true, "required": true },
                    { "name": "code", "type": "VARCHAR", "size": 50 }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_model() {
        let model = parse_model(SHOP, true).unwrap();
        let items = model.find_table("ITEMS", false).unwrap();
        assert_eq!(items.primary_key_names(), vec!["id".to_string()]);
        let code = items.find_column("code", true).unwrap();
        assert_eq!(code.type_code, JdbcType::VarChar);
        assert_eq!(code.size, Some(50));
        assert!(!code.required);
    }

    #[test]
    fn test_parse_rejects_invalid_model() {
        let source = r#"{ "name": "x", "tables": [ { "name": "a" }, { "name": "A" } ] }"#;
        assert!(parse_model(source, true).is_ok());
        assert!(matches!(
            parse_model(source, false),
            Err(AlterToolError::Alter(AlterError::DuplicateTable(_)))
        ));
        assert!(matches!(
            parse_model("{", true),
            Err(AlterToolError::Json(_))
        ));
    }

    #[test]
    fn test_write_then_read() {
        let model = Database::new("shop").table(
            Table::new("items")
                .column(Column::new("id", JdbcType::Integer).primary_key())
                .column(Column::new("price", JdbcType::Decimal).precision(10, 2)),
        );
        let json = write_model(&model).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.json");
        std::fs::write(&path, json).unwrap();
        let read = read_model_file(&path, true).unwrap();
        assert_eq!(read, model);
    }
}
