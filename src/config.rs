//! Engine Configuration
//!
//! Limits applied by the query compiler, paginator, batch executor and
//! schema registry. Every field has a default so an empty JSON object is a
//! valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Hard lower bound for a page
pub const MIN_PAGE_SIZE: usize = 1;

/// Hard upper bound for a page; `pagination.max_limit` may only lower it
pub const MAX_PAGE_SIZE: usize = 100;

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub schema: SchemaConfig,
}

/// Page size limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size when `limit` is absent (default: 15)
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Largest accepted `limit` (default: 100)
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

/// Query shape limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum filter parameters per request (default: 20)
    #[serde(default = "default_max_filters")]
    pub max_filters: usize,

    /// Maximum sort keys per request (default: 5)
    #[serde(default = "default_max_sort_fields")]
    pub max_sort_fields: usize,
}

/// Batch mutation limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum items in one create/update/destroy call (default: 100)
    #[serde(default = "default_max_batch_size")]
    pub max_size: usize,
}

/// Schema registry limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Maximum number of collections (default: 1000)
    #[serde(default = "default_max_collections")]
    pub max_collections: usize,

    /// Maximum columns per collection, including `id` (default: 100)
    #[serde(default = "default_max_columns")]
    pub max_columns: usize,

    /// Maximum collection and column name length (default: 63)
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

fn default_limit() -> usize {
    15
}
fn default_max_limit() -> usize {
    MAX_PAGE_SIZE
}
fn default_max_filters() -> usize {
    20
}
fn default_max_sort_fields() -> usize {
    5
}
fn default_max_batch_size() -> usize {
    100
}
fn default_max_collections() -> usize {
    1000
}
fn default_max_columns() -> usize {
    100
}
fn default_max_name_length() -> usize {
    63
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_filters: default_max_filters(),
            max_sort_fields: default_max_sort_fields(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_batch_size(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            max_collections: default_max_collections(),
            max_columns: default_max_columns(),
            max_name_length: default_max_name_length(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config: {}", e)))?;

        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| EngineError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Reject inconsistent limits
    pub fn validate(&self) -> EngineResult<()> {
        let p = &self.pagination;
        if p.max_limit < MIN_PAGE_SIZE || p.max_limit > MAX_PAGE_SIZE {
            return Err(EngineError::Config(format!(
                "pagination.max_limit must be within [{}, {}], got {}",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE, p.max_limit
            )));
        }
        if p.default_limit < MIN_PAGE_SIZE || p.default_limit > p.max_limit {
            return Err(EngineError::Config(format!(
                "pagination.default_limit must be within [{}, {}], got {}",
                MIN_PAGE_SIZE, p.max_limit, p.default_limit
            )));
        }

        let caps = [
            ("query.max_filters", self.query.max_filters),
            ("query.max_sort_fields", self.query.max_sort_fields),
            ("batch.max_size", self.batch.max_size),
            ("schema.max_collections", self.schema.max_collections),
            ("schema.max_name_length", self.schema.max_name_length),
        ];
        for (name, value) in caps {
            if value == 0 {
                return Err(EngineError::Config(format!("{} must be > 0", name)));
            }
        }

        // room for `id` plus at least one user column
        if self.schema.max_columns < 2 {
            return Err(EngineError::Config(
                "schema.max_columns must be >= 2".to_string(),
            ));
        }

        Ok(())
    }
}
