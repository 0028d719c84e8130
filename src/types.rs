use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Values that can be bound as query parameters or read back from a row.
///
/// ```rust
/// use mssql_connector::prelude::*;
///
/// let params = vec![
///     QueryParam::inferred("id", RowValues::Int(1)),
///     QueryParam::typed("name", SqlType::NVarChar(Some(64)), RowValues::Text("alice".into())),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// SQL Server type used to declare a parameter carrying this value when no
    /// explicit type tag was given.
    #[must_use]
    pub fn inferred_sql_type(&self) -> SqlType {
        match self {
            RowValues::Int(_) => SqlType::BigInt,
            RowValues::Float(_) => SqlType::Float,
            RowValues::Text(_) | RowValues::JSON(_) | RowValues::Null => SqlType::NVarChar(None),
            RowValues::Bool(_) => SqlType::Bit,
            RowValues::Timestamp(_) => SqlType::DateTime2,
            RowValues::Blob(_) => SqlType::VarBinary(None),
        }
    }
}

/// Explicit SQL Server type tag for a parameter.
///
/// Length-bearing variants use `None` for `MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Bit,
    Float,
    Real,
    Decimal { precision: u8, scale: u8 },
    Money,
    Char(u16),
    NChar(u16),
    VarChar(Option<u16>),
    NVarChar(Option<u16>),
    Date,
    Time,
    DateTime,
    DateTime2,
    DateTimeOffset,
    UniqueIdentifier,
    VarBinary(Option<u16>),
}

fn length(len: Option<u16>) -> String {
    len.map_or_else(|| "MAX".to_string(), |n| n.to_string())
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::TinyInt => f.write_str("TINYINT"),
            SqlType::SmallInt => f.write_str("SMALLINT"),
            SqlType::Int => f.write_str("INT"),
            SqlType::BigInt => f.write_str("BIGINT"),
            SqlType::Bit => f.write_str("BIT"),
            SqlType::Float => f.write_str("FLOAT"),
            SqlType::Real => f.write_str("REAL"),
            SqlType::Decimal { precision, scale } => write!(f, "DECIMAL({precision}, {scale})"),
            SqlType::Money => f.write_str("MONEY"),
            SqlType::Char(n) => write!(f, "CHAR({n})"),
            SqlType::NChar(n) => write!(f, "NCHAR({n})"),
            SqlType::VarChar(n) => write!(f, "VARCHAR({})", length(*n)),
            SqlType::NVarChar(n) => write!(f, "NVARCHAR({})", length(*n)),
            SqlType::Date => f.write_str("DATE"),
            SqlType::Time => f.write_str("TIME"),
            SqlType::DateTime => f.write_str("DATETIME"),
            SqlType::DateTime2 => f.write_str("DATETIME2"),
            SqlType::DateTimeOffset => f.write_str("DATETIMEOFFSET"),
            SqlType::UniqueIdentifier => f.write_str("UNIQUEIDENTIFIER"),
            SqlType::VarBinary(n) => write!(f, "VARBINARY({})", length(*n)),
        }
    }
}

/// A named query parameter.
///
/// `Typed` carries an explicit [`SqlType`]; `Inferred` leaves the type to the
/// driver. Names are unique within one request scope.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Typed {
        name: String,
        sql_type: SqlType,
        value: RowValues,
    },
    Inferred {
        name: String,
        value: RowValues,
    },
}

impl QueryParam {
    #[must_use]
    pub fn typed(name: impl Into<String>, sql_type: SqlType, value: RowValues) -> Self {
        QueryParam::Typed {
            name: name.into(),
            sql_type,
            value,
        }
    }

    #[must_use]
    pub fn inferred(name: impl Into<String>, value: RowValues) -> Self {
        QueryParam::Inferred {
            name: name.into(),
            value,
        }
    }

    /// Parameter name without a leading `@`.
    #[must_use]
    pub fn name(&self) -> &str {
        let name = match self {
            QueryParam::Typed { name, .. } | QueryParam::Inferred { name, .. } => name,
        };
        name.strip_prefix('@').unwrap_or(name)
    }

    #[must_use]
    pub fn value(&self) -> &RowValues {
        match self {
            QueryParam::Typed { value, .. } | QueryParam::Inferred { value, .. } => value,
        }
    }

    /// The type this parameter is declared with: the explicit tag, or one
    /// inferred from the value.
    #[must_use]
    pub fn sql_type(&self) -> SqlType {
        match self {
            QueryParam::Typed { sql_type, .. } => *sql_type,
            QueryParam::Inferred { value, .. } => value.inferred_sql_type(),
        }
    }
}
