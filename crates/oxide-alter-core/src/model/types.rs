//! Column type codes, default values and referential actions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// JDBC-style type code of a column.
///
/// The discriminants follow `java.sql.Types` so that codes read from
/// driver metadata map one to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JdbcType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    Clob,
    Binary,
    VarBinary,
    LongVarBinary,
    Blob,
    Date,
    Time,
    Timestamp,
    Boolean,
    Other,
}

impl JdbcType {
    /// Every known type code.
    pub const ALL: [Self; 23] = [
        Self::Bit,
        Self::TinyInt,
        Self::SmallInt,
        Self::Integer,
        Self::BigInt,
        Self::Float,
        Self::Real,
        Self::Double,
        Self::Numeric,
        Self::Decimal,
        Self::Char,
        Self::VarChar,
        Self::LongVarChar,
        Self::Clob,
        Self::Binary,
        Self::VarBinary,
        Self::LongVarBinary,
        Self::Blob,
        Self::Date,
        Self::Time,
        Self::Timestamp,
        Self::Boolean,
        Self::Other,
    ];

    /// Returns the `java.sql.Types` integer code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Bit => -7,
            Self::TinyInt => -6,
            Self::SmallInt => 5,
            Self::Integer => 4,
            Self::BigInt => -5,
            Self::Float => 6,
            Self::Real => 7,
            Self::Double => 8,
            Self::Numeric => 2,
            Self::Decimal => 3,
            Self::Char => 1,
            Self::VarChar => 12,
            Self::LongVarChar => -1,
            Self::Clob => 2005,
            Self::Binary => -2,
            Self::VarBinary => -3,
            Self::LongVarBinary => -4,
            Self::Blob => 2004,
            Self::Date => 91,
            Self::Time => 92,
            Self::Timestamp => 93,
            Self::Boolean => 16,
            Self::Other => 1111,
        }
    }

    /// Looks up a type by its `java.sql.Types` code.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bit => "BIT",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Real => "REAL",
            Self::Double => "DOUBLE",
            Self::Numeric => "NUMERIC",
            Self::Decimal => "DECIMAL",
            Self::Char => "CHAR",
            Self::VarChar => "VARCHAR",
            Self::LongVarChar => "LONGVARCHAR",
            Self::Clob => "CLOB",
            Self::Binary => "BINARY",
            Self::VarBinary => "VARBINARY",
            Self::LongVarBinary => "LONGVARBINARY",
            Self::Blob => "BLOB",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::Boolean => "BOOLEAN",
            Self::Other => "OTHER",
        }
    }

    /// Integer, fixed-point and floating-point types.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::TinyInt
                | Self::SmallInt
                | Self::Integer
                | Self::BigInt
                | Self::Float
                | Self::Real
                | Self::Double
                | Self::Numeric
                | Self::Decimal
        )
    }

    /// Character types.
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(
            self,
            Self::Char | Self::VarChar | Self::LongVarChar | Self::Clob
        )
    }

    /// Binary types.
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(
            self,
            Self::Binary | Self::VarBinary | Self::LongVarBinary | Self::Blob
        )
    }

    /// Types whose definition carries a length (char/binary families).
    #[must_use]
    pub const fn has_size(self) -> bool {
        matches!(
            self,
            Self::Char | Self::VarChar | Self::Binary | Self::VarBinary
        )
    }

    /// Types whose definition carries precision and scale.
    #[must_use]
    pub const fn has_precision_and_scale(self) -> bool {
        matches!(self, Self::Numeric | Self::Decimal)
    }

    /// Boolean-like types.
    #[must_use]
    pub const fn is_boolean(self) -> bool {
        matches!(self, Self::Bit | Self::Boolean)
    }

    /// Rank used to judge whether converting between two types of the same
    /// family narrows the value range. Higher holds more.
    pub(crate) const fn width_rank(self) -> u8 {
        match self {
            Self::Bit | Self::Boolean => 0,
            Self::TinyInt => 1,
            Self::SmallInt => 2,
            Self::Integer => 3,
            Self::BigInt => 4,
            Self::Real => 5,
            Self::Float | Self::Double => 6,
            Self::Numeric | Self::Decimal => 7,
            Self::Char | Self::Binary => 1,
            Self::VarChar | Self::VarBinary => 2,
            Self::LongVarChar | Self::LongVarBinary => 3,
            Self::Clob | Self::Blob => 4,
            Self::Date | Self::Time => 1,
            Self::Timestamp => 2,
            Self::Other => 0,
        }
    }
}

impl fmt::Display for JdbcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JdbcType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "INT" => return Ok(Self::Integer),
            "BOOL" => return Ok(Self::Boolean),
            "TEXT" => return Ok(Self::LongVarChar),
            "DATETIME" => return Ok(Self::Timestamp),
            "DOUBLE PRECISION" => return Ok(Self::Double),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|t| t.name() == upper)
            .ok_or_else(|| format!("unknown type '{}'", s))
    }
}

/// Parsed form of a column default, used for comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// Explicit NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Floating point or fixed-point default.
    Float(f64),
    /// String default, unquoted.
    String(String),
    /// SQL expression (e.g., "CURRENT_TIMESTAMP").
    Expression(String),
}

impl DefaultValue {
    /// Interprets a raw default string according to a column type.
    ///
    /// Values that cannot be read as the column's type are kept as
    /// expressions, so that e.g. `now()` on a TIMESTAMP compares by text.
    #[must_use]
    pub fn parse(raw: &str, type_code: JdbcType) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("null") {
            return Self::Null;
        }
        let unquoted = unquote(trimmed);

        if type_code.is_boolean() {
            let value = unquoted.unwrap_or(trimmed);
            return match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "t" | "y" | "yes" => Self::Bool(true),
                "0" | "false" | "f" | "n" | "no" => Self::Bool(false),
                _ => Self::Expression(trimmed.to_string()),
            };
        }

        if type_code.is_numeric() {
            let value = unquoted.unwrap_or(trimmed);
            if matches!(type_code, JdbcType::Float | JdbcType::Real | JdbcType::Double)
                || type_code.has_precision_and_scale()
            {
                if let Ok(f) = value.parse::<f64>() {
                    return Self::Float(f);
                }
            } else if let Ok(i) = value.parse::<i64>() {
                return Self::Integer(i);
            }
            return Self::Expression(trimmed.to_string());
        }

        match unquoted {
            Some(inner) => Self::String(inner.replace("''", "'")),
            None if type_code.is_text() && !looks_like_expression(trimmed) => {
                Self::String(trimmed.to_string())
            }
            None => Self::Expression(trimmed.to_string()),
        }
    }

    /// Returns the SQL representation of this default value.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Expression(expr) => expr.clone(),
        }
    }
}

fn unquote(value: &str) -> Option<&str> {
    (value.len() >= 2 && value.starts_with('\'') && value.ends_with('\''))
        .then(|| &value[1..value.len() - 1])
}

fn looks_like_expression(value: &str) -> bool {
    value.ends_with(')')
        || value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c == '_')
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses the SQL spelling used by driver metadata.
    #[must_use]
    pub fn from_sql(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "RESTRICT" => Self::Restrict,
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            _ => Self::NoAction,
        }
    }
}
