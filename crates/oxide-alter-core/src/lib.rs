//! Schema comparison and alteration for relational databases.
//!
//! `oxide-alter-core` computes how to turn one database schema into
//! another:
//! - Two models are compared into an ordered, dependency-safe list of
//!   [`Change`](change::Change)s
//! - Each platform decides which column changes it applies in place
//! - Tables the platform cannot alter are rebuilt through a temporary
//!   table, with their data copied over
//!
//! The crate performs no I/O. Reading a live schema, rendering SQL for a
//! specific database and executing it are left to the caller; the
//! [`PlatformEmitter`](emitter::PlatformEmitter) trait is the seam for
//! SQL rendering.
//!
//! # Architecture
//!
//! - **Model** - `Database`, `Table`, `Column`, `Index`, `ForeignKey`
//! - **Comparator** - Diffs two models into changes, phase by phase
//! - **Predicate** - Per-platform policy for in-place alteration
//! - **Sequencer** - Groups changes per table and substitutes recreations
//! - **Recreation** - Temporary table, copy, drop and rename
//! - **Emitter** - Dialect-specific SQL generation
//!
//! # Example
//!
//! ```rust
//! use oxide_alter_core::prelude::*;
//!
//! let current = Database::new("shop").table(
//!     Table::new("items")
//!         .column(Column::new("id", JdbcType::Integer).primary_key())
//!         .column(Column::new("code", JdbcType::VarChar).size(10)),
//! );
//! let desired = Database::new("shop").table(
//!     Table::new("items")
//!         .column(Column::new("id", JdbcType::Integer).primary_key())
//!         .column(Column::new("code", JdbcType::VarChar).size(50)),
//! );
//!
//! let registry = PlatformRegistry::with_builtin();
//! let platform = registry.require("sqlite")?;
//! let plan = plan(&current, &desired, platform, false)?;
//! assert_eq!(plan.recreations().count(), 1);
//! # Ok::<(), AlterError>(())
//! ```

pub mod change;
pub mod comparator;
pub mod emitter;
pub mod error;
pub mod model;
pub mod platform;
pub mod predicate;
pub mod recreation;
pub mod sequencer;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::change::{apply_all, Change, ChangeKind};
    pub use crate::comparator::{remove_tables_matching, Comparison, ModelComparator};
    pub use crate::emitter::PlatformEmitter;
    pub use crate::error::{AlterError, Result};
    pub use crate::model::{
        names_equal, Column, Database, DefaultValue, ForeignKey, ForeignKeyAction, Index,
        IndexColumn, IndexKind, JdbcType, Reference, Table,
    };
    pub use crate::platform::{Platform, PlatformInfo, PlatformRegistry};
    pub use crate::predicate::{
        DefaultTableDefinitionChangesPredicate, PostgresTableDefinitionChangesPredicate,
        SqliteTableDefinitionChangesPredicate, TableDefinitionChangesPredicate,
    };
    pub use crate::recreation::{
        AlterationWarning, ColumnCopy, Conversion, CopySource, RecreationStep, TableRecreation,
    };
    pub use crate::sequencer::{plan, AlterationPlan, AlterationSequencer, PlanStep};
}
