//! In-process storage adapter
//!
//! Tables live in a `RwLock`-guarded map. Every adapter call takes the lock
//! once, so each call is atomic with respect to the others.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::adapter::{SelectQuery, StorageAdapter};
use super::errors::{StorageError, StorageResult};
use crate::aggregate::{aggregate_records, AggregationSpec};
use crate::schema::{coerce_field, CollectionSchema, ColumnDef, ID_COLUMN};
use crate::value::{FieldValue, Record};

#[derive(Debug, Default)]
struct Table {
    columns: Vec<ColumnDef>,
    rows: BTreeMap<String, Record>,
}

impl Table {
    fn check_columns(&self, row: &Record) -> StorageResult<()> {
        for (column, _) in row.iter() {
            if !self.columns.iter().any(|c| &c.name == column) {
                return Err(StorageError::UnknownColumn(column.clone()));
            }
        }
        Ok(())
    }

    /// Full rows carry exactly the table's columns
    fn check_shape(&self, row: &Record) -> StorageResult<()> {
        self.check_columns(row)?;
        match self.columns.iter().find(|c| !row.contains(&c.name)) {
            Some(column) => Err(StorageError::MissingColumn(column.name.clone())),
            None => Ok(()),
        }
    }

    /// Reject `candidate` if a unique column value is held by another row
    fn check_unique(&self, candidate: &Record, own_id: &str) -> StorageResult<()> {
        for column in self.columns.iter().filter(|c| c.unique) {
            let value = candidate.value(&column.name);
            if value.is_null() {
                continue;
            }
            let taken = self
                .rows
                .iter()
                .any(|(id, row)| id != own_id && row.value(&column.name) == value);
            if taken {
                return Err(StorageError::UniqueViolation {
                    column: column.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// `StorageAdapter` backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<String, Table>>> {
        self.tables
            .read()
            .map_err(|_| StorageError::Internal("table lock poisoned".to_string()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, HashMap<String, Table>>> {
        self.tables
            .write()
            .map_err(|_| StorageError::Internal("table lock poisoned".to_string()))
    }

    /// Number of rows in a table
    pub fn row_count(&self, collection: &str) -> StorageResult<usize> {
        let tables = self.read()?;
        tables
            .get(collection)
            .map(|t| t.rows.len())
            .ok_or_else(|| StorageError::TableNotFound(collection.to_string()))
    }
}

fn missing(collection: &str) -> StorageError {
    StorageError::TableNotFound(collection.to_string())
}

impl StorageAdapter for MemoryStorage {
    fn create_table(&self, schema: &CollectionSchema) -> StorageResult<()> {
        let mut tables = self.write()?;
        if tables.contains_key(&schema.name) {
            return Err(StorageError::TableExists(schema.name.clone()));
        }
        tables.insert(
            schema.name.clone(),
            Table {
                columns: schema.columns.clone(),
                rows: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn alter_table(&self, schema: &CollectionSchema) -> StorageResult<()> {
        let mut tables = self.write()?;
        let table = tables
            .get_mut(&schema.name)
            .ok_or_else(|| missing(&schema.name))?;

        let added: Vec<&ColumnDef> = schema
            .columns
            .iter()
            .filter(|c| !table.columns.iter().any(|old| old.name == c.name))
            .collect();
        let dropped: Vec<String> = table
            .columns
            .iter()
            .filter(|old| schema.column(&old.name).is_none())
            .map(|old| old.name.clone())
            .collect();

        let mut backfill = Vec::with_capacity(added.len());
        for column in added {
            let value = coerce_field(None, column).map_err(|e| {
                StorageError::Internal(format!("cannot backfill '{}': {}", column.name, e))
            })?;
            backfill.push((column.name.clone(), value));
        }

        for row in table.rows.values_mut() {
            for column in &dropped {
                row.remove(column);
            }
            for (column, value) in &backfill {
                row.set(column.clone(), value.clone());
            }
        }
        table.columns = schema.columns.clone();
        Ok(())
    }

    fn drop_table(&self, collection: &str) -> StorageResult<()> {
        self.write()?
            .remove(collection)
            .map(|_| ())
            .ok_or_else(|| missing(collection))
    }

    fn insert_row(&self, collection: &str, row: Record) -> StorageResult<String> {
        let id = match row.value(ID_COLUMN) {
            FieldValue::String(id) => id.clone(),
            _ => return Err(StorageError::Internal("row has no string id".to_string())),
        };

        let mut tables = self.write()?;
        let table = tables.get_mut(collection).ok_or_else(|| missing(collection))?;

        table.check_shape(&row)?;
        if table.rows.contains_key(&id) {
            return Err(StorageError::UniqueViolation {
                column: ID_COLUMN.to_string(),
            });
        }
        table.check_unique(&row, &id)?;

        table.rows.insert(id.clone(), row);
        Ok(id)
    }

    fn update_row(&self, collection: &str, id: &str, patch: &Record) -> StorageResult<bool> {
        let mut tables = self.write()?;
        let table = tables.get_mut(collection).ok_or_else(|| missing(collection))?;

        table.check_columns(patch)?;
        let Some(current) = table.rows.get(id) else {
            return Ok(false);
        };

        let mut merged = current.clone();
        merged.merge(patch);
        table.check_unique(&merged, id)?;

        table.rows.insert(id.to_string(), merged);
        Ok(true)
    }

    fn delete_row(&self, collection: &str, id: &str) -> StorageResult<bool> {
        let mut tables = self.write()?;
        let table = tables.get_mut(collection).ok_or_else(|| missing(collection))?;
        Ok(table.rows.remove(id).is_some())
    }

    fn select_rows(&self, collection: &str, query: &SelectQuery) -> StorageResult<Vec<Record>> {
        let tables = self.read()?;
        let table = tables.get(collection).ok_or_else(|| missing(collection))?;

        let mut rows: Vec<Record> = table
            .rows
            .values()
            .filter(|row| query.predicate.matches(row))
            .cloned()
            .collect();
        query.order.sort(&mut rows);
        rows.truncate(query.limit);
        Ok(rows)
    }

    fn aggregate_rows(
        &self,
        collection: &str,
        spec: &AggregationSpec,
    ) -> StorageResult<Vec<Record>> {
        let tables = self.read()?;
        let table = tables.get(collection).ok_or_else(|| missing(collection))?;

        let matching = table
            .rows
            .values()
            .filter(|row| spec.filters.iter().all(|c| c.matches(row)));
        aggregate_records(spec, matching).map_err(StorageError::Internal)
    }
}
