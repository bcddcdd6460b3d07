//! Column definitions.

use serde::{Deserialize, Serialize};

use super::types::{DefaultValue, JdbcType};

/// A table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// JDBC type code.
    #[serde(rename = "type")]
    pub type_code: JdbcType,
    /// Length for sized types, precision for NUMERIC/DECIMAL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    /// Scale for NUMERIC/DECIMAL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Whether the column is NOT NULL.
    #[serde(default)]
    pub required: bool,
    /// Whether the column is part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Whether the database generates values for this column.
    #[serde(default)]
    pub auto_increment: bool,
    /// Raw default value as written in the declaration or metadata.
    #[serde(default, rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Column {
    /// Creates a nullable column without default.
    #[must_use]
    pub fn new(name: impl Into<String>, type_code: JdbcType) -> Self {
        Self {
            name: name.into(),
            type_code,
            size: None,
            scale: None,
            required: false,
            primary_key: false,
            auto_increment: false,
            default_value: None,
            description: None,
        }
    }

    /// Sets the size (length or precision).
    #[must_use]
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.size = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the column as part of the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.required = true;
        self
    }

    /// Sets the column to auto-increment.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Sets the raw default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Returns the typed default used for comparisons.
    #[must_use]
    pub fn parsed_default(&self) -> Option<DefaultValue> {
        self.parsed_default_as(self.type_code)
    }

    /// Returns the default as it would read on a column of `type_code`.
    #[must_use]
    pub fn parsed_default_as(&self, type_code: JdbcType) -> Option<DefaultValue> {
        self.default_value
            .as_deref()
            .map(|raw| DefaultValue::parse(raw, type_code))
    }

    /// Whether values must be supplied when inserting a row that does not
    /// mention this column.
    #[must_use]
    pub fn needs_value(&self) -> bool {
        self.required && self.default_value.is_none() && !self.auto_increment
    }

    /// Human-readable type, e.g. `VARCHAR(50)` or `DECIMAL(10,2)`.
    #[must_use]
    pub fn type_description(&self) -> String {
        match (self.size, self.scale) {
            (Some(size), Some(scale)) if self.type_code.has_precision_and_scale() => {
                format!("{}({},{})", self.type_code, size, scale)
            }
            (Some(size), _)
                if self.type_code.has_size() || self.type_code.has_precision_and_scale() =>
            {
                format!("{}({})", self.type_code, size)
            }
            _ => self.type_code.to_string(),
        }
    }
}
