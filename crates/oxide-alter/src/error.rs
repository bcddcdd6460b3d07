//! Error types for the alteration tool.

use oxide_alter_core::error::AlterError;

/// Errors that can occur while reading, planning or applying alterations.
#[derive(Debug, thiserror::Error)]
pub enum AlterToolError {
    /// Comparison or planning failed.
    #[error(transparent)]
    Alter(#[from] AlterError),

    /// Database error while reading or altering the schema.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The live schema could not be turned into a model.
    #[error("Introspection failed: {0}")]
    Introspection(String),

    /// IO error (reading model files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// No SQL dialect exists for the platform.
    #[error("No SQL dialect for platform '{0}'")]
    NoDialect(String),

    /// Rows violate foreign keys once the alteration is done.
    #[error("{count} foreign key violation(s) after alteration, rolled back")]
    ForeignKeyViolation {
        /// Number of violating rows.
        count: usize,
    },

    /// The altered schema still differs from the declared model.
    #[error("Schema still differs from the model after alteration: {0}")]
    Verification(String),
}

/// Result type for the alteration tool.
pub type Result<T> = std::result::Result<T, AlterToolError>;
