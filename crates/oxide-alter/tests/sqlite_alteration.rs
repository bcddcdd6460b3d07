//! End-to-end alterations against in-memory SQLite databases.

use oxide_alter::prelude::*;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

const SHOP_V1: &str = r#"{
    "name": "main",
    "tables": [
        {
            "name": "customers",
            "columns": [
                { "name": "id", "type": "INTEGER", "primary_key": true, "required": true, "auto_increment": true },
                { "name": "email", "type": "VARCHAR", "size": 120, "required": true },
                { "name": "joined", "type": "DATE", "default": "date('now')" }
            ],
            "indexes": [
                { "name": "uq_customers_email", "kind": "unique", "columns": [ { "name": "email" } ] }
            ]
        },
        {
            "name": "orders",
            "columns": [
                { "name": "id", "type": "INTEGER", "primary_key": true, "required": true },
                { "name": "customer_id", "type": "INTEGER", "required": true },
                { "name": "total", "type": "DECIMAL", "size": 10, "scale": 2 },
                { "name": "note", "type": "VARCHAR", "size": 200 }
            ],
            "foreign_keys": [
                {
                    "foreign_table": "customers",
                    "references": [ { "local_column": "customer_id", "foreign_column": "id" } ],
                    "on_delete": "cascade"
                }
            ]
        }
    ]
}"#;

/// Drops `note`, resizes `total` and appends `status`.
fn shop_v2(total_precision: u32) -> Database {
    let mut model = parse_model(SHOP_V1, false).unwrap();
    let orders = model.find_table_mut("orders", false).unwrap();
    orders.columns.retain(|c| c.name != "note");
    let total = orders.find_column_mut("total", false).unwrap();
    total.size = Some(total_precision);
    orders.columns.push(
        Column::new("status", JdbcType::VarChar)
            .size(20)
            .required()
            .default_value("'open'"),
    );
    model
}

#[tokio::test]
async fn declared_model_reads_back_unchanged() {
    let pool = memory_pool().await;
    let platform = Platform::sqlite();
    let target = parse_model(SHOP_V1, false).unwrap();

    let executor = AlterationExecutor::new(pool.clone(), SqliteDialect::new());
    let (plan, report) = executor.migrate(&target, &platform).await.unwrap();
    assert!(!plan.is_empty());
    assert_eq!(report.skipped, 0);

    let live = read_model(&pool, "main", None).await.unwrap();
    assert!(plan_for(&live, &target).is_empty());

    let customers = live.find_table("customers", false).unwrap();
    let email = customers.find_column("email", false).unwrap();
    assert_eq!(email.type_code, JdbcType::VarChar);
    assert_eq!(email.size, Some(120));
    assert_eq!(
        customers.find_column("joined", false).unwrap().default_value.as_deref(),
        Some("date('now')")
    );
    assert!(customers.find_column("id", false).unwrap().auto_increment);

    let orders = live.find_table("orders", false).unwrap();
    assert_eq!(orders.foreign_keys.len(), 1);
    assert_eq!(orders.foreign_keys[0].on_delete, ForeignKeyAction::Cascade);
}

fn plan_for(source: &Database, target: &Database) -> AlterationPlan {
    plan(source, target, &Platform::sqlite(), false).unwrap()
}

#[tokio::test]
async fn recreation_keeps_rows_and_warns() {
    let pool = memory_pool().await;
    let platform = Platform::sqlite();
    let executor = AlterationExecutor::new(pool.clone(), SqliteDialect::new());
    executor
        .migrate(&parse_model(SHOP_V1, false).unwrap(), &platform)
        .await
        .unwrap();

    sqlx::query("INSERT INTO customers (email) VALUES ('ada@example.com')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO orders (id, customer_id, total, note) VALUES (7, 1, 12.5, 'gift')")
        .execute(&pool)
        .await
        .unwrap();

    // Narrowing forces a recreation on SQLite.
    let target = shop_v2(8);
    let (plan, report) = executor.migrate(&target, &platform).await.unwrap();
    assert_eq!(plan.recreations().count(), 1);
    assert!(report.warnings.iter().any(|w| matches!(
        w,
        AlterationWarning::LossyConversion { column, .. } if column == "total"
    )));
    executor.verify(&target, &platform).await.unwrap();

    let (customer, total, status): (i64, f64, String) =
        sqlx::query_as("SELECT customer_id, total, status FROM orders WHERE id = 7")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(customer, 1);
    assert!((total - 12.5).abs() < f64::EPSILON);
    assert_eq!(status, "open");

    // The foreign key survives the rebuild.
    let orphan = sqlx::query("INSERT INTO orders (id, customer_id) VALUES (8, 42)")
        .execute(&pool)
        .await;
    assert!(orphan.is_err());
}

#[tokio::test]
async fn dump_round_trips_through_json() {
    let pool = memory_pool().await;
    let executor = AlterationExecutor::new(pool.clone(), SqliteDialect::new());
    executor
        .migrate(&parse_model(SHOP_V1, false).unwrap(), &Platform::sqlite())
        .await
        .unwrap();

    let live = read_model(&pool, "main", None).await.unwrap();
    let json = write_model(&live).unwrap();
    let reparsed = parse_model(&json, false).unwrap();
    assert!(reparsed.is_equivalent(&live, false));
}

#[tokio::test]
async fn sql_script_for_postgres() {
    let pool = memory_pool().await;
    let executor = AlterationExecutor::new(pool.clone(), SqliteDialect::new());
    executor
        .migrate(&parse_model(SHOP_V1, false).unwrap(), &Platform::sqlite())
        .await
        .unwrap();
    let live = read_model(&pool, "main", None).await.unwrap();

    let platform = Platform::postgresql();
    let plan = plan(&live, &shop_v2(12), &platform, false).unwrap();
    assert_eq!(plan.recreations().count(), 0);

    let dialect = for_platform("postgres").unwrap();
    let statements = dialect.emit_plan(&plan, &live, false).unwrap();
    let sql = script(dialect.name(), &statements);
    assert!(sql.starts_with("-- Generated by oxide-alter for postgresql at "));
    assert!(sql.contains("ALTER TABLE \"orders\" DROP COLUMN \"note\";"));
    assert!(sql.contains("ALTER TABLE \"orders\" ALTER COLUMN \"total\" TYPE NUMERIC(12,2)"));
    assert!(sql.contains(
        "ALTER TABLE \"orders\" ADD COLUMN \"status\" VARCHAR(20) NOT NULL DEFAULT 'open';"
    ));
}

#[test]
fn unknown_dialect_is_an_error() {
    assert!(matches!(
        for_platform("oracle"),
        Err(AlterToolError::NoDialect(name)) if name == "oracle"
    ));
}
