//! Foreign key definitions.
//!
//! A foreign key names its foreign table instead of pointing at it, so a
//! model can be cloned or partially built without dangling references.
//! Resolution happens by lookup in the owning [`Database`](super::Database).

use serde::{Deserialize, Serialize};

use super::names_equal;
use super::types::ForeignKeyAction;

/// A local column paired with the foreign column it references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Column in the owning table.
    pub local_column: String,
    /// Column in the foreign table.
    pub foreign_column: String,
}

impl Reference {
    /// Creates a reference pair.
    #[must_use]
    pub fn new(local_column: impl Into<String>, foreign_column: impl Into<String>) -> Self {
        Self {
            local_column: local_column.into(),
            foreign_column: foreign_column.into(),
        }
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name; synthesized by [`ForeignKey::constraint_name`] when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name of the referenced table.
    pub foreign_table: String,
    /// Ordered column pairs.
    pub references: Vec<Reference>,
    /// Action on update.
    #[serde(default)]
    pub on_update: ForeignKeyAction,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: ForeignKeyAction,
}

impl ForeignKey {
    /// Creates an unnamed foreign key without references.
    #[must_use]
    pub fn new(foreign_table: impl Into<String>) -> Self {
        Self {
            name: None,
            foreign_table: foreign_table.into(),
            references: Vec::new(),
            on_update: ForeignKeyAction::NoAction,
            on_delete: ForeignKeyAction::NoAction,
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a reference pair.
    #[must_use]
    pub fn reference(
        mut self,
        local_column: impl Into<String>,
        foreign_column: impl Into<String>,
    ) -> Self {
        self.references
            .push(Reference::new(local_column, foreign_column));
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Returns the declared name or `fk_<table>_<local columns>`.
    #[must_use]
    pub fn constraint_name(&self, table: &str) -> String {
        self.name.clone().unwrap_or_else(|| {
            let columns: Vec<&str> = self
                .references
                .iter()
                .map(|r| r.local_column.as_str())
                .collect();
            format!("fk_{}_{}", table, columns.join("_"))
        })
    }

    /// Whether the key points at the given table.
    #[must_use]
    pub fn references_table(&self, table: &str, case_sensitive: bool) -> bool {
        names_equal(&self.foreign_table, table, case_sensitive)
    }

    /// Whether one of the local columns is `column`.
    #[must_use]
    pub fn uses_local_column(&self, column: &str, case_sensitive: bool) -> bool {
        self.references
            .iter()
            .any(|r| names_equal(&r.local_column, column, case_sensitive))
    }

    /// Whether one of the foreign columns is `column`.
    #[must_use]
    pub fn uses_foreign_column(&self, column: &str, case_sensitive: bool) -> bool {
        self.references
            .iter()
            .any(|r| names_equal(&r.foreign_column, column, case_sensitive))
    }

    /// Structural equality: same foreign table, same ordered column pairs
    /// and same actions. Names are ignored.
    #[must_use]
    pub fn same_structure(&self, other: &Self, case_sensitive: bool) -> bool {
        names_equal(&self.foreign_table, &other.foreign_table, case_sensitive)
            && self.on_update == other.on_update
            && self.on_delete == other.on_delete
            && self.references.len() == other.references.len()
            && self.references.iter().zip(&other.references).all(|(a, b)| {
                names_equal(&a.local_column, &b.local_column, case_sensitive)
                    && names_equal(&a.foreign_column, &b.foreign_column, case_sensitive)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fk() -> ForeignKey {
        ForeignKey::new("users")
            .reference("user_id", "id")
            .on_delete(ForeignKeyAction::Cascade)
    }

    #[test]
    fn test_constraint_name() {
        assert_eq!(fk().constraint_name("posts"), "fk_posts_user_id");
        assert_eq!(fk().named("fk_author").constraint_name("posts"), "fk_author");
    }

    #[test]
    fn test_same_structure_ignores_names() {
        assert!(fk().named("a").same_structure(&fk().named("b"), true));
        assert!(!fk().same_structure(&fk().on_delete(ForeignKeyAction::SetNull), true));
        assert!(!fk().same_structure(&ForeignKey::new("users").reference("author_id", "id"), true));
    }

    #[test]
    fn test_case_rules() {
        let upper = ForeignKey::new("USERS")
            .reference("USER_ID", "ID")
            .on_delete(ForeignKeyAction::Cascade);
        assert!(fk().same_structure(&upper, false));
        assert!(!fk().same_structure(&upper, true));
        assert!(upper.references_table("users", false));
        assert!(upper.uses_local_column("user_id", false));
        assert!(upper.uses_foreign_column("id", false));
    }
}
