//! Platform capabilities and the registry holding them.
//!
//! A [`Platform`] bundles what the comparator and sequencer need to know
//! about a target database: how its native types round-trip
//! ([`PlatformInfo`]) and which table definition changes it applies in
//! place (a [`TableDefinitionChangesPredicate`]). Platforms are plain
//! values collected in a [`PlatformRegistry`] owned by the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AlterError, Result};
use crate::model::{Column, JdbcType};
use crate::predicate::{
    DefaultTableDefinitionChangesPredicate, PostgresTableDefinitionChangesPredicate,
    SqliteTableDefinitionChangesPredicate, TableDefinitionChangesPredicate,
};

/// Static capabilities of a database platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Platform name, e.g. `"sqlite"`.
    pub name: String,
    /// Types the platform stores under another code (e.g. TINYINT read
    /// back as SMALLINT). Types absent from the map round-trip unchanged.
    native_types: BTreeMap<JdbcType, JdbcType>,
    /// Size assumed for sized types declared without one.
    default_sizes: BTreeMap<JdbcType, u32>,
    /// Whether tables can be recreated (create, copy, drop, rename).
    pub supports_table_recreation: bool,
    /// Whether foreign keys can be added to or dropped from an existing
    /// table.
    pub supports_foreign_key_alteration: bool,
    /// Whether auto-increment columns are implicitly NOT NULL.
    pub auto_increment_implies_required: bool,
}

impl PlatformInfo {
    /// Capabilities of a platform with exact type round-trips that can
    /// alter foreign keys and recreate tables.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native_types: BTreeMap::new(),
            default_sizes: BTreeMap::new(),
            supports_table_recreation: true,
            supports_foreign_key_alteration: true,
            auto_increment_implies_required: false,
        }
    }

    /// Records that `declared` is stored as `native`.
    #[must_use]
    pub fn native_type(mut self, declared: JdbcType, native: JdbcType) -> Self {
        self.native_types.insert(declared, native);
        self
    }

    /// Records the size assumed for `type_code` when none is declared.
    #[must_use]
    pub fn default_size(mut self, type_code: JdbcType, size: u32) -> Self {
        self.default_sizes.insert(type_code, size);
        self
    }

    /// Marks table recreation as unavailable.
    #[must_use]
    pub fn without_table_recreation(mut self) -> Self {
        self.supports_table_recreation = false;
        self
    }

    /// Marks foreign keys as fixed once a table exists.
    #[must_use]
    pub fn without_foreign_key_alteration(mut self) -> Self {
        self.supports_foreign_key_alteration = false;
        self
    }

    /// Marks auto-increment columns as implicitly NOT NULL.
    #[must_use]
    pub fn with_auto_increment_implying_required(mut self) -> Self {
        self.auto_increment_implies_required = true;
        self
    }

    /// Returns the code a column declared as `type_code` reads back as.
    #[must_use]
    pub fn target_type(&self, type_code: JdbcType) -> JdbcType {
        self.native_types
            .get(&type_code)
            .copied()
            .unwrap_or(type_code)
    }

    /// Returns the size assumed for `type_code` when none is declared.
    #[must_use]
    pub fn default_size_of(&self, type_code: JdbcType) -> Option<u32> {
        self.default_sizes
            .get(&self.target_type(type_code))
            .or_else(|| self.default_sizes.get(&type_code))
            .copied()
    }

    /// Size of a column with the platform default filled in.
    #[must_use]
    pub fn effective_size(&self, column: &Column) -> Option<u32> {
        column
            .size
            .or_else(|| self.default_size_of(column.type_code))
    }

    /// Whether a column is NOT NULL on this platform.
    #[must_use]
    pub fn is_required(&self, column: &Column) -> bool {
        column.required || (self.auto_increment_implies_required && column.auto_increment)
    }

    /// Generic platform: exact types, everything supported.
    #[must_use]
    pub fn generic() -> Self {
        Self::new("generic")
    }

    /// SQLite: integer and floating point types collapse to their storage
    /// classes and foreign keys only exist as part of `CREATE TABLE`.
    #[must_use]
    pub fn sqlite() -> Self {
        Self::new("sqlite")
            .native_type(JdbcType::Bit, JdbcType::Integer)
            .native_type(JdbcType::Boolean, JdbcType::Integer)
            .native_type(JdbcType::TinyInt, JdbcType::Integer)
            .native_type(JdbcType::SmallInt, JdbcType::Integer)
            .native_type(JdbcType::BigInt, JdbcType::Integer)
            .native_type(JdbcType::Float, JdbcType::Double)
            .native_type(JdbcType::Real, JdbcType::Double)
            .native_type(JdbcType::Clob, JdbcType::LongVarChar)
            .native_type(JdbcType::LongVarBinary, JdbcType::Blob)
            .without_foreign_key_alteration()
            .with_auto_increment_implying_required()
    }

    /// PostgreSQL, mapped the way its catalog reports types back.
    #[must_use]
    pub fn postgresql() -> Self {
        Self::new("postgresql")
            .native_type(JdbcType::TinyInt, JdbcType::SmallInt)
            .native_type(JdbcType::Bit, JdbcType::Boolean)
            .native_type(JdbcType::Float, JdbcType::Double)
            .native_type(JdbcType::Numeric, JdbcType::Decimal)
            .native_type(JdbcType::Clob, JdbcType::LongVarChar)
            .native_type(JdbcType::Binary, JdbcType::LongVarBinary)
            .native_type(JdbcType::VarBinary, JdbcType::LongVarBinary)
            .native_type(JdbcType::Blob, JdbcType::LongVarBinary)
            .default_size(JdbcType::Char, 1)
            .with_auto_increment_implying_required()
    }
}

/// A platform: capabilities plus in-place alteration policy.
#[derive(Debug, Clone)]
pub struct Platform {
    info: PlatformInfo,
    predicate: Arc<dyn TableDefinitionChangesPredicate>,
}

impl Platform {
    /// Creates a platform from its parts.
    pub fn new(
        info: PlatformInfo,
        predicate: impl TableDefinitionChangesPredicate + 'static,
    ) -> Self {
        Self {
            info,
            predicate: Arc::new(predicate),
        }
    }

    /// Platform name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Platform capabilities.
    #[must_use]
    pub const fn info(&self) -> &PlatformInfo {
        &self.info
    }

    /// In-place alteration policy.
    #[must_use]
    pub fn predicate(&self) -> &dyn TableDefinitionChangesPredicate {
        self.predicate.as_ref()
    }

    /// The generic platform with the default predicate.
    #[must_use]
    pub fn generic() -> Self {
        Self::new(
            PlatformInfo::generic(),
            DefaultTableDefinitionChangesPredicate::new(),
        )
    }

    /// SQLite.
    #[must_use]
    pub fn sqlite() -> Self {
        Self::new(
            PlatformInfo::sqlite(),
            SqliteTableDefinitionChangesPredicate::new(),
        )
    }

    /// PostgreSQL.
    #[must_use]
    pub fn postgresql() -> Self {
        Self::new(
            PlatformInfo::postgresql(),
            PostgresTableDefinitionChangesPredicate::new(),
        )
    }
}

/// Platforms by name.
///
/// Names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct PlatformRegistry {
    platforms: BTreeMap<String, Platform>,
}

impl PlatformRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `generic`, `sqlite` and `postgresql`.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Platform::generic());
        registry.register(Platform::sqlite());
        registry.register(Platform::postgresql());
        registry
    }

    /// Registers a platform, returning the one it replaces.
    pub fn register(&mut self, platform: Platform) -> Option<Platform> {
        self.platforms
            .insert(platform.name().to_ascii_lowercase(), platform)
    }

    /// Gets a platform by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Platform> {
        self.platforms.get(&name.to_ascii_lowercase())
    }

    /// Gets a platform by name or fails with
    /// [`AlterError::UnknownPlatform`].
    pub fn require(&self, name: &str) -> Result<&Platform> {
        self.get(name)
            .ok_or_else(|| AlterError::UnknownPlatform(name.to_string()))
    }

    /// Registered platform names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.platforms.values().map(Platform::name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_type() {
        let sqlite = PlatformInfo::sqlite();
        assert_eq!(sqlite.target_type(JdbcType::BigInt), JdbcType::Integer);
        assert_eq!(sqlite.target_type(JdbcType::VarChar), JdbcType::VarChar);
        assert_eq!(
            PlatformInfo::generic().target_type(JdbcType::BigInt),
            JdbcType::BigInt
        );
    }

    #[test]
    fn test_effective_size() {
        let pg = PlatformInfo::postgresql();
        assert_eq!(pg.effective_size(&Column::new("c", JdbcType::Char)), Some(1));
        assert_eq!(
            pg.effective_size(&Column::new("c", JdbcType::Char).size(3)),
            Some(3)
        );
        assert_eq!(pg.effective_size(&Column::new("v", JdbcType::VarChar)), None);
    }

    #[test]
    fn test_auto_increment_implies_required() {
        let column = Column::new("id", JdbcType::Integer).auto_increment();
        assert!(PlatformInfo::sqlite().is_required(&column));
        assert!(!PlatformInfo::generic().is_required(&column));
    }

    #[test]
    fn test_registry() {
        let registry = PlatformRegistry::with_builtin();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["generic", "postgresql", "sqlite"]);
        assert_eq!(registry.get("SQLite").map(Platform::name), Some("sqlite"));
        assert!(matches!(
            registry.require("oracle"),
            Err(AlterError::UnknownPlatform(_))
        ));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = PlatformRegistry::with_builtin();
        let custom = Platform::new(
            PlatformInfo::new("sqlite").without_table_recreation(),
            SqliteTableDefinitionChangesPredicate::new(),
        );
        assert!(registry.register(custom).is_some());
        assert!(!registry.require("sqlite").unwrap().info().supports_table_recreation);
    }
}
