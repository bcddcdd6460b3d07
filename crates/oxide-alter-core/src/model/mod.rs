//! Schema model types.
//!
//! These types describe the structure of a database: tables, columns,
//! indexes and foreign keys. They carry no behavior beyond lookups,
//! validation and structural comparison.
//!
//! Every lookup takes a `case_sensitive` flag; when it is false names are
//! matched after ASCII case folding.

mod column;
mod database;
mod foreign_key;
mod index;
mod table;
mod types;

pub use column::Column;
pub use database::Database;
pub use foreign_key::{ForeignKey, Reference};
pub use index::{Index, IndexColumn, IndexKind};
pub use table::Table;
pub use types::{DefaultValue, ForeignKeyAction, JdbcType};

/// Compares two identifiers under the case rule.
#[must_use]
pub fn names_equal(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

/// Key used to put identifiers in sets and maps under the case rule.
pub(crate) fn fold(name: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        name.to_string()
    } else {
        name.to_ascii_lowercase()
    }
}
