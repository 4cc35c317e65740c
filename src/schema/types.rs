//! Schema type definitions
//!
//! Supported column types:
//! - string: UTF-8 string
//! - integer: 64-bit signed integer
//! - decimal: exact decimal, rendered as a string
//! - boolean: true/false
//! - timestamp: RFC 3339 instant, normalized to UTC
//! - json: arbitrary JSON, passed through structurally

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// Name of the implicit identifier column
pub const ID_COLUMN: &str = "id";

/// Supported column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    String,
    Integer,
    Decimal,
    Boolean,
    Timestamp,
    Json,
}

impl ColumnType {
    /// Returns the type name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Decimal => "decimal",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Json => "json",
        }
    }

    /// Types accepting range operators (`gt`, `lt`, `gte`, `lte`)
    pub fn is_orderable(&self) -> bool {
        matches!(
            self,
            ColumnType::Integer | ColumnType::Decimal | ColumnType::Timestamp
        )
    }

    /// Types accepting `sum`, `avg`, `min` and `max`
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Decimal)
    }

    /// Types accepting `like` and participating in full-text search
    pub fn is_text(&self) -> bool {
        matches!(self, ColumnType::String)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(ColumnType::String),
            "integer" => Ok(ColumnType::Integer),
            "decimal" => Ok(ColumnType::Decimal),
            "boolean" => Ok(ColumnType::Boolean),
            "timestamp" | "datetime" => Ok(ColumnType::Timestamp),
            "json" => Ok(ColumnType::Json),
            other => Err(EngineError::schema(format!(
                "unsupported column type '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ColumnType {
    type Error = EngineError;

    fn try_from(s: String) -> EngineResult<Self> {
        s.parse()
    }
}

impl From<ColumnType> for String {
    fn from(t: ColumnType) -> Self {
        t.as_str().to_string()
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,

    #[serde(default)]
    pub nullable: bool,

    #[serde(default)]
    pub unique: bool,

    #[serde(default)]
    pub readonly: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ColumnDef {
    /// Create a required, mutable column without default
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            unique: false,
            readonly: false,
            default: None,
        }
    }

    /// The implicit identifier column every schema starts with
    pub fn id() -> Self {
        Self {
            readonly: true,
            ..Self::new(ID_COLUMN, ColumnType::String)
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn is_id(&self) -> bool {
        self.name == ID_COLUMN
    }
}

/// A collection schema: ordered columns, `id` first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Bumped on every column change
    pub version: u64,
}

impl CollectionSchema {
    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column named by a request, reporting unknown names as
    /// validation failures against `param`
    pub fn require_column(&self, param: &str, name: &str) -> EngineResult<&ColumnDef> {
        self.column(name).ok_or_else(|| {
            EngineError::validation(
                param,
                format!("unknown column '{}' in collection '{}'", name, self.name),
            )
        })
    }

    /// Columns other than `id`
    pub fn user_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !c.is_id())
    }

    /// User columns searched by `q`
    pub fn search_columns(&self) -> Vec<String> {
        self.user_columns()
            .filter(|c| c.column_type.is_text())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Introspection view
    pub fn describe(&self) -> SchemaView {
        SchemaView {
            collection: self.name.clone(),
            fields: self.columns.clone(),
            total: self.columns.len(),
        }
    }
}

/// Schema introspection body
#[derive(Debug, Clone, Serialize)]
pub struct SchemaView {
    pub collection: String,
    pub fields: Vec<ColumnDef>,
    pub total: usize,
}
