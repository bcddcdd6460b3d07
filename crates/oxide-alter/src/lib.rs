//! Bring a live database schema in line with a declared model.
//!
//! `oxide-alter` puts [`oxide_alter_core`] to work against real databases:
//! - Live SQLite schemas are read into models through the catalog pragmas
//! - Models are declared as JSON files
//! - Plans are rendered as SQLite or PostgreSQL statements
//! - Plans run against SQLite in a single transaction
//!
//! # Architecture
//!
//! - **Introspect** - Reads `sqlite_master` and the table pragmas
//! - **Declaration** - JSON model files
//! - **Dialect** - `PlatformEmitter` implementations per database
//! - **Executor** - Dry runs, transactions and foreign key checks
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_alter::prelude::*;
//! use sqlx::sqlite::SqlitePoolOptions;
//!
//! let pool = SqlitePoolOptions::new().connect("sqlite:app.db").await?;
//! let target = read_model_file(Path::new("schema.json"), false)?;
//!
//! let executor = AlterationExecutor::new(pool, SqliteDialect::new());
//! let (plan, report) = executor.migrate(&target, &Platform::sqlite()).await?;
//! println!("{} steps, {} statements", plan.len(), report.executed);
//! ```

pub mod declaration;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod introspect;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::declaration::{parse_model, read_model_file, write_model};
    pub use crate::dialect::{for_platform, script, PostgresDialect, SqliteDialect};
    pub use crate::error::{AlterToolError, Result};
    pub use crate::executor::{AlterationExecutor, ExecutionReport};
    pub use crate::introspect::{parse_declared_type, read_model};
    pub use oxide_alter_core::prelude::*;
}
