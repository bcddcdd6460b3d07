//! Index definitions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{fold, names_equal};

/// Whether an index enforces uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Unique index.
    Unique,
    /// Plain index.
    #[default]
    NonUnique,
}

/// A column participating in an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name.
    pub name: String,
    /// Number of leading characters indexed, when the platform supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_length: Option<u32>,
}

impl IndexColumn {
    /// Creates an index column covering the whole value.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix_length: None,
        }
    }
}

/// An index on a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    /// Index name; synthesized by [`Index::effective_name`] when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Unique or not.
    #[serde(default)]
    pub kind: IndexKind,
    /// Indexed columns, in order.
    pub columns: Vec<IndexColumn>,
}

impl Index {
    /// Creates a non-unique index over the given columns.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: Some(name.into()),
            kind: IndexKind::NonUnique,
            columns: columns.into_iter().map(IndexColumn::new).collect(),
        }
    }

    /// Creates a unique index over the given columns.
    #[must_use]
    pub fn unique<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: IndexKind::Unique,
            ..Self::new(name, columns)
        }
    }

    /// Whether this index enforces uniqueness.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.kind == IndexKind::Unique
    }

    /// Returns the declared name or `idx_<table>_<columns>`.
    #[must_use]
    pub fn effective_name(&self, table: &str) -> String {
        self.name.clone().unwrap_or_else(|| {
            let columns: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
            format!("idx_{}_{}", table, columns.join("_"))
        })
    }

    /// Whether the index covers the given column.
    #[must_use]
    pub fn covers(&self, column: &str, case_sensitive: bool) -> bool {
        self.columns
            .iter()
            .any(|c| names_equal(&c.name, column, case_sensitive))
    }

    /// Whether both indexes have the same kind and the same ordered
    /// columns (including prefix lengths).
    #[must_use]
    pub fn same_definition(&self, other: &Self, case_sensitive: bool) -> bool {
        self.kind == other.kind
            && self.columns.len() == other.columns.len()
            && self.columns.iter().zip(&other.columns).all(|(a, b)| {
                names_equal(&a.name, &b.name, case_sensitive) && a.prefix_length == b.prefix_length
            })
    }

    /// Whether `other` denotes the same index: equal names when both are
    /// named, otherwise the same kind over the same unordered column set.
    #[must_use]
    pub fn matches(&self, other: &Self, case_sensitive: bool) -> bool {
        match (&self.name, &other.name) {
            (Some(a), Some(b)) => names_equal(a, b, case_sensitive),
            _ => {
                self.kind == other.kind
                    && self.column_set(case_sensitive) == other.column_set(case_sensitive)
            }
        }
    }

    fn column_set(&self, case_sensitive: bool) -> BTreeSet<String> {
        self.columns
            .iter()
            .map(|c| fold(&c.name, case_sensitive))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_name() {
        let mut idx = Index::new("idx_email", ["email"]);
        assert_eq!(idx.effective_name("users"), "idx_email");
        idx.name = None;
        assert_eq!(idx.effective_name("users"), "idx_users_email");
    }

    #[test]
    fn test_matches_by_name() {
        let a = Index::new("idx_a", ["a"]);
        let b = Index::new("IDX_A", ["b"]);
        assert!(a.matches(&b, false));
        assert!(!a.matches(&b, true));
        assert!(!a.same_definition(&b, false));
    }

    #[test]
    fn test_matches_unnamed_by_column_set() {
        let mut a = Index::unique("x", ["a", "b"]);
        a.name = None;
        let mut b = Index::unique("y", ["b", "a"]);
        b.name = None;
        assert!(a.matches(&b, true));

        let mut c = Index::new("z", ["a", "b"]);
        c.name = None;
        assert!(!a.matches(&c, true));
    }

    #[test]
    fn test_covers() {
        let idx = Index::new("idx", ["Email"]);
        assert!(idx.covers("email", false));
        assert!(!idx.covers("email", true));
    }
}
