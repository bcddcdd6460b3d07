//! Plan executor.
//!
//! Renders an [`AlterationPlan`] with a dialect and runs it against a
//! SQLite database in a single transaction.

use oxide_alter_core::comparator::remove_tables_matching;
use oxide_alter_core::emitter::PlatformEmitter;
use oxide_alter_core::model::Database;
use oxide_alter_core::platform::Platform;
use oxide_alter_core::recreation::AlterationWarning;
use oxide_alter_core::sequencer::{plan, AlterationPlan, AlterationSequencer};
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use sqlx::{Acquire, Row};
use tracing::{debug, info, warn};

use crate::error::{AlterToolError, Result};
use crate::introspect::read_model;

/// Outcome of running a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    /// Statements sent to the database (or printed in dry-run mode).
    pub executed: usize,
    /// Comments standing in for unsupported operations.
    pub skipped: usize,
    /// Data warnings of the plan.
    pub warnings: Vec<AlterationWarning>,
}

/// Executes alteration plans against a database.
pub struct AlterationExecutor<E: PlatformEmitter> {
    pool: SqlitePool,
    emitter: E,
    case_sensitive: bool,
    dry_run: bool,
}

impl<E: PlatformEmitter> AlterationExecutor<E> {
    /// Creates a new executor.
    pub fn new(pool: SqlitePool, emitter: E) -> Self {
        Self {
            pool,
            emitter,
            case_sensitive: false,
            dry_run: false,
        }
    }

    /// Enables dry-run mode (SQL is printed but not executed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Matches names exactly instead of case-insensitively.
    #[must_use]
    pub fn case_sensitive(mut self, enabled: bool) -> Self {
        self.case_sensitive = enabled;
        self
    }

    /// Returns the emitter.
    #[must_use]
    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    /// Reads the current schema of the database.
    pub async fn current_model(&self) -> Result<Database> {
        read_model(&self.pool, "main", None).await
    }

    /// Generates SQL for a plan without executing it.
    pub fn sql_for(&self, plan: &AlterationPlan, source: &Database) -> Result<Vec<String>> {
        Ok(self.emitter.emit_plan(plan, source, self.case_sensitive)?)
    }

    /// Runs a plan computed against `source`.
    ///
    /// Foreign key enforcement is switched off for the duration of the
    /// transaction so tables can be dropped and renamed; the keys are
    /// checked before committing and any violation rolls everything back.
    pub async fn execute(
        &self,
        plan: &AlterationPlan,
        source: &Database,
    ) -> Result<ExecutionReport> {
        let statements = self.sql_for(plan, source)?;
        let mut report = ExecutionReport {
            warnings: plan.warnings.clone(),
            ..ExecutionReport::default()
        };

        if self.dry_run {
            for sql in &statements {
                if sql.starts_with("--") {
                    println!("{}", sql);
                    report.skipped += 1;
                } else {
                    println!("{};", sql);
                    report.executed += 1;
                }
            }
            return Ok(report);
        }

        let mut conn = self.pool.acquire().await?;
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *conn)
            .await?;

        let outcome = async {
            let mut tx = conn.begin().await?;
            for sql in &statements {
                if sql.starts_with("--") {
                    warn!(comment = %sql, "Skipping comment (unsupported operation)");
                    report.skipped += 1;
                    continue;
                }
                debug!(sql = %sql, "Executing SQL");
                sqlx::query(sql).execute(&mut *tx).await?;
                report.executed += 1;
            }

            let violations = sqlx::query("PRAGMA foreign_key_check")
                .fetch_all(&mut *tx)
                .await?;
            if !violations.is_empty() {
                for row in &violations {
                    let table: String = row.try_get(0)?;
                    warn!(table = %table, "Foreign key violation");
                }
                tx.rollback().await?;
                return Err(AlterToolError::ForeignKeyViolation {
                    count: violations.len(),
                });
            }
            tx.commit().await?;
            Ok::<(), AlterToolError>(())
        }
        .await;

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&mut *conn)
            .await?;
        outcome?;

        info!(
            executed = report.executed,
            skipped = report.skipped,
            warnings = report.warnings.len(),
            "Alteration applied"
        );
        Ok(report)
    }

    /// Brings the database in line with `target`: reads the current
    /// schema, plans the alteration for `platform` and runs it.
    pub async fn migrate(
        &self,
        target: &Database,
        platform: &Platform,
    ) -> Result<(AlterationPlan, ExecutionReport)> {
        let source = self.current_model().await?;
        let plan = plan(&source, target, platform, self.case_sensitive)?;
        if plan.is_empty() {
            info!("Schema is up to date");
            return Ok((plan, ExecutionReport::default()));
        }
        let report = self.execute(&plan, &source).await?;
        Ok((plan, report))
    }

    /// Drops every table whose name matches `pattern`, removing foreign
    /// keys of the remaining tables that point at them first.
    pub async fn drop_tables(
        &self,
        pattern: &str,
        platform: &Platform,
    ) -> Result<(AlterationPlan, ExecutionReport)> {
        let source = self.current_model().await?;
        let changes = remove_tables_matching(&source, pattern, self.case_sensitive)?;
        let plan =
            AlterationSequencer::new(platform, self.case_sensitive).sequence(&source, changes)?;
        let report = self.execute(&plan, &source).await?;
        Ok((plan, report))
    }

    /// Checks that the database now matches `target` under `platform`.
    pub async fn verify(&self, target: &Database, platform: &Platform) -> Result<()> {
        let current = self.current_model().await?;
        let remaining = plan(&current, target, platform, self.case_sensitive)?;
        if remaining.is_empty() {
            return Ok(());
        }
        let pending: Vec<String> = remaining.steps.iter().map(|s| s.description()).collect();
        Err(AlterToolError::Verification(pending.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;
    use oxide_alter_core::model::{Column, ForeignKey, Index, JdbcType, Table};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    fn users(name_size: u32) -> Table {
        Table::new("users")
            .column(
                Column::new("id", JdbcType::Integer)
                    .primary_key()
                    .auto_increment(),
            )
            .column(Column::new("name", JdbcType::VarChar).size(name_size).required())
            .index(Index::new("idx_users_name", ["name"]))
    }

    fn posts() -> Table {
        Table::new("posts")
            .column(Column::new("id", JdbcType::Integer).primary_key())
            .column(Column::new("author_id", JdbcType::Integer))
            .foreign_key(ForeignKey::new("users").reference("author_id", "id"))
    }

    #[tokio::test]
    async fn test_create_from_scratch() {
        let pool = create_test_pool().await;
        let executor = AlterationExecutor::new(pool, SqliteDialect::new());
        let target = Database::new("main").table(users(20)).table(posts());

        let (plan, report) = executor.migrate(&target, &Platform::sqlite()).await.unwrap();
        assert_eq!(plan.recreations().count(), 0);
        assert_eq!(report.skipped, 0);
        executor.verify(&target, &Platform::sqlite()).await.unwrap();
    }

    #[tokio::test]
    async fn test_recreation_keeps_rows() {
        let pool = create_test_pool().await;
        let executor = AlterationExecutor::new(pool.clone(), SqliteDialect::new());
        let platform = Platform::sqlite();

        let before = Database::new("main").table(users(20)).table(posts());
        executor.migrate(&before, &platform).await.unwrap();
        sqlx::query("INSERT INTO users (name) VALUES ('ada')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO posts (id, author_id) VALUES (1, 1)")
            .execute(&pool)
            .await
            .unwrap();

        let after = Database::new("main").table(users(80)).table(posts());
        let (plan, _) = executor.migrate(&after, &platform).await.unwrap();
        assert_eq!(plan.recreations().count(), 1);
        executor.verify(&after, &platform).await.unwrap();

        let (name,): (String,) = sqlx::query_as("SELECT name FROM users WHERE id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(name, "ada");
        let (author,): (i64,) = sqlx::query_as("SELECT author_id FROM posts WHERE id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(author, 1);
    }

    #[tokio::test]
    async fn test_dry_run() {
        let pool = create_test_pool().await;
        let executor = AlterationExecutor::new(pool.clone(), SqliteDialect::new()).dry_run(true);
        let target = Database::new("main").table(users(20));

        let (_, report) = executor.migrate(&target, &Platform::sqlite()).await.unwrap();
        assert_eq!(report.executed, 2);

        // Table should NOT exist (dry run)
        let row: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name='users'")
                .fetch_optional(&pool)
                .await
                .unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn test_foreign_key_violation_rolls_back() {
        let pool = create_test_pool().await;
        let executor = AlterationExecutor::new(pool.clone(), SqliteDialect::new());
        let platform = Platform::sqlite();

        let loose = Table::new("posts")
            .column(Column::new("id", JdbcType::Integer).primary_key())
            .column(Column::new("author_id", JdbcType::Integer));
        executor
            .migrate(&Database::new("main").table(users(20)).table(loose), &platform)
            .await
            .unwrap();
        sqlx::query("INSERT INTO posts (id, author_id) VALUES (1, 99)")
            .execute(&pool)
            .await
            .unwrap();

        let strict = Database::new("main").table(users(20)).table(posts());
        let result = executor.migrate(&strict, &platform).await;
        assert!(matches!(
            result,
            Err(AlterToolError::ForeignKeyViolation { count: 1 })
        ));

        let current = executor.current_model().await.unwrap();
        assert!(current.find_table("posts", false).unwrap().foreign_keys.is_empty());
    }

    #[tokio::test]
    async fn test_drop_tables_matching() {
        let pool = create_test_pool().await;
        let executor = AlterationExecutor::new(pool, SqliteDialect::new());
        let platform = Platform::sqlite();

        let audit = Table::new("audit_log")
            .column(Column::new("id", JdbcType::Integer).primary_key())
            .column(Column::new("post_id", JdbcType::Integer))
            .foreign_key(ForeignKey::new("posts").reference("post_id", "id"));
        let target = Database::new("main")
            .table(users(20))
            .table(posts())
            .table(audit);
        executor.migrate(&target, &platform).await.unwrap();

        executor.drop_tables("^(users|posts)$", &platform).await.unwrap();

        let current = executor.current_model().await.unwrap();
        let names: Vec<&str> = current.table_names().collect();
        assert_eq!(names, vec!["audit_log"]);
        assert!(current.tables[0].foreign_keys.is_empty());
    }
}
