//! Schema registry
//!
//! Owns collection definitions. Every mutation publishes a new immutable
//! `Arc<CollectionSchema>` snapshot with a bumped version, so a request that
//! resolved a schema keeps a consistent column set even while a concurrent
//! `add_column`/`drop_column` lands.
//!
//! Mutations take an optional commit hook that runs under the write lock
//! with the candidate schema. The engine uses it to apply the matching
//! storage DDL; a failing hook leaves the registry unchanged.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::coerce::coerce_field;
use super::types::{CollectionSchema, ColumnDef, ID_COLUMN};
use crate::config::SchemaConfig;
use crate::error::{EngineError, EngineResult};

/// Shortest accepted collection name
const MIN_COLLECTION_NAME_LENGTH: usize = 2;

/// In-memory registry of collection schemas
#[derive(Debug)]
pub struct SchemaRegistry {
    collections: RwLock<HashMap<String, Arc<CollectionSchema>>>,
    limits: SchemaConfig,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(SchemaConfig::default())
    }
}

impl SchemaRegistry {
    pub fn new(limits: SchemaConfig) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            limits,
        }
    }

    fn read(&self) -> EngineResult<RwLockReadGuard<'_, HashMap<String, Arc<CollectionSchema>>>> {
        self.collections
            .read()
            .map_err(|_| EngineError::internal("schema registry lock poisoned"))
    }

    fn write(&self) -> EngineResult<RwLockWriteGuard<'_, HashMap<String, Arc<CollectionSchema>>>> {
        self.collections
            .write()
            .map_err(|_| EngineError::internal("schema registry lock poisoned"))
    }

    /// Current schema of a collection
    pub fn resolve(&self, name: &str) -> EngineResult<Arc<CollectionSchema>> {
        let key = name.trim().to_lowercase();
        self.read()?
            .get(&key)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("collection '{}' not found", key)))
    }

    /// Registered collection names, sorted
    pub fn names(&self) -> EngineResult<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn register(
        &self,
        name: &str,
        columns: Vec<ColumnDef>,
    ) -> EngineResult<Arc<CollectionSchema>> {
        self.register_with(name, columns, |_| Ok(()))
    }

    /// Register a new collection; `id` is prepended to the given columns
    pub fn register_with<F>(
        &self,
        name: &str,
        columns: Vec<ColumnDef>,
        commit: F,
    ) -> EngineResult<Arc<CollectionSchema>>
    where
        F: FnOnce(&CollectionSchema) -> EngineResult<()>,
    {
        let name = normalize_collection_name(name, self.limits.max_name_length)?;

        if columns.len() + 1 > self.limits.max_columns {
            return Err(EngineError::schema(format!(
                "collection '{}' declares {} columns, maximum is {}",
                name,
                columns.len() + 1,
                self.limits.max_columns
            )));
        }

        let mut all = Vec::with_capacity(columns.len() + 1);
        all.push(ColumnDef::id());
        for column in columns {
            self.validate_column(&column)?;
            if all.iter().any(|c: &ColumnDef| c.name == column.name) {
                return Err(EngineError::schema(format!(
                    "column '{}' declared more than once",
                    column.name
                )));
            }
            all.push(column);
        }

        let schema = CollectionSchema {
            name: name.clone(),
            columns: all,
            version: 1,
        };

        let mut collections = self.write()?;
        if collections.contains_key(&name) {
            return Err(EngineError::schema(format!(
                "collection '{}' already exists",
                name
            )));
        }
        if collections.len() >= self.limits.max_collections {
            return Err(EngineError::schema(format!(
                "maximum number of collections ({}) reached",
                self.limits.max_collections
            )));
        }

        commit(&schema)?;

        let schema = Arc::new(schema);
        collections.insert(name, Arc::clone(&schema));
        Ok(schema)
    }

    pub fn add_column(&self, name: &str, column: ColumnDef) -> EngineResult<Arc<CollectionSchema>> {
        self.add_column_with(name, column, |_| Ok(()))
    }

    /// Append a column. Existing rows are backfilled, so the column must be
    /// nullable or carry a default.
    pub fn add_column_with<F>(
        &self,
        name: &str,
        column: ColumnDef,
        commit: F,
    ) -> EngineResult<Arc<CollectionSchema>>
    where
        F: FnOnce(&CollectionSchema) -> EngineResult<()>,
    {
        self.validate_column(&column)?;
        if !column.nullable && column.default.is_none() {
            return Err(EngineError::schema(format!(
                "added column '{}' must be nullable or declare a default",
                column.name
            )));
        }

        self.mutate(name, commit, |current| {
            if current.column(&column.name).is_some() {
                return Err(EngineError::schema(format!(
                    "column '{}' already exists in '{}'",
                    column.name, current.name
                )));
            }
            if current.columns.len() + 1 > self.limits.max_columns {
                return Err(EngineError::schema(format!(
                    "collection '{}' already has the maximum of {} columns",
                    current.name, self.limits.max_columns
                )));
            }
            let mut next = current.clone();
            next.columns.push(column);
            Ok(next)
        })
    }

    pub fn drop_column(&self, name: &str, column: &str) -> EngineResult<Arc<CollectionSchema>> {
        self.drop_column_with(name, column, |_| Ok(()))
    }

    /// Remove a column; `id` cannot be dropped
    pub fn drop_column_with<F>(
        &self,
        name: &str,
        column: &str,
        commit: F,
    ) -> EngineResult<Arc<CollectionSchema>>
    where
        F: FnOnce(&CollectionSchema) -> EngineResult<()>,
    {
        if column == ID_COLUMN {
            return Err(EngineError::schema("column 'id' cannot be dropped"));
        }

        self.mutate(name, commit, |current| {
            if current.column(column).is_none() {
                return Err(EngineError::schema(format!(
                    "column '{}' does not exist in '{}'",
                    column, current.name
                )));
            }
            let mut next = current.clone();
            next.columns.retain(|c| c.name != column);
            Ok(next)
        })
    }

    pub fn drop_collection(&self, name: &str) -> EngineResult<Arc<CollectionSchema>> {
        self.drop_collection_with(name, |_| Ok(()))
    }

    /// Remove a collection; the hook sees the schema being removed
    pub fn drop_collection_with<F>(&self, name: &str, commit: F) -> EngineResult<Arc<CollectionSchema>>
    where
        F: FnOnce(&CollectionSchema) -> EngineResult<()>,
    {
        let key = name.trim().to_lowercase();
        let mut collections = self.write()?;
        let current = collections
            .get(&key)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("collection '{}' not found", key)))?;

        commit(&current)?;

        collections.remove(&key);
        Ok(current)
    }

    /// Derive, commit and publish a new version of one schema
    fn mutate<F, B>(&self, name: &str, commit: F, build: B) -> EngineResult<Arc<CollectionSchema>>
    where
        F: FnOnce(&CollectionSchema) -> EngineResult<()>,
        B: FnOnce(&CollectionSchema) -> EngineResult<CollectionSchema>,
    {
        let key = name.trim().to_lowercase();
        let mut collections = self.write()?;
        let current = collections
            .get(&key)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("collection '{}' not found", key)))?;

        let mut next = build(&current)?;
        next.version = current.version + 1;

        commit(&next)?;

        let next = Arc::new(next);
        collections.insert(key, Arc::clone(&next));
        Ok(next)
    }

    fn validate_column(&self, column: &ColumnDef) -> EngineResult<()> {
        if column.name == ID_COLUMN {
            return Err(EngineError::schema("column name 'id' is reserved"));
        }
        if !is_identifier(&column.name) {
            return Err(EngineError::schema(format!(
                "invalid column name '{}': must match [a-z][a-z0-9_]*",
                column.name
            )));
        }
        if column.name.len() > self.limits.max_name_length {
            return Err(EngineError::schema(format!(
                "column name '{}' exceeds {} characters",
                column.name, self.limits.max_name_length
            )));
        }
        if column.unique && column.nullable {
            return Err(EngineError::schema(format!(
                "unique column '{}' must not be nullable",
                column.name
            )));
        }
        if column.unique && column.default.is_some() {
            return Err(EngineError::schema(format!(
                "unique column '{}' must not declare a default",
                column.name
            )));
        }
        if column.readonly && column.default.is_none() {
            return Err(EngineError::schema(format!(
                "readonly column '{}' must declare a default",
                column.name
            )));
        }
        if let Some(default) = &column.default {
            coerce_field(Some(default), column).map_err(|e| {
                EngineError::schema(format!(
                    "default for column '{}' is invalid: {}",
                    column.name, e
                ))
            })?;
        }
        Ok(())
    }
}

/// Lowercase a collection name and check it is a valid identifier
pub fn normalize_collection_name(name: &str, max_length: usize) -> EngineResult<String> {
    let normalized = name.trim().to_lowercase();
    if !is_identifier(&normalized) {
        return Err(EngineError::schema(format!(
            "invalid collection name '{}': must match [a-z][a-z0-9_]*",
            name
        )));
    }
    if normalized.len() < MIN_COLLECTION_NAME_LENGTH || normalized.len() > max_length {
        return Err(EngineError::schema(format!(
            "collection name '{}' must be {}-{} characters",
            name, MIN_COLLECTION_NAME_LENGTH, max_length
        )));
    }
    Ok(normalized)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
