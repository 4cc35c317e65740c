//! # Storage Adapter
//!
//! The narrow persistence interface the engine consumes. Each call is
//! atomic on its own; the engine never asks for a multi-call transaction.

use super::errors::StorageResult;
use crate::aggregate::AggregationSpec;
use crate::pagination::{SeekBound, SortOrder, Window};
use crate::query::{Condition, SearchTerm};
use crate::schema::{CollectionSchema, ID_COLUMN};
use crate::value::Record;

/// Row filter: AND'ed conditions, optional search term, optional seek bound
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub conditions: Vec<Condition>,
    pub search: Option<SearchTerm>,
    pub seek: Option<SeekBound>,
}

impl Predicate {
    pub fn new(conditions: Vec<Condition>, search: Option<SearchTerm>) -> Self {
        Self {
            conditions,
            search,
            seek: None,
        }
    }

    /// Match a single id
    pub fn by_id(id: &str) -> Self {
        Self::new(vec![Condition::eq(ID_COLUMN, id)], None)
    }

    /// Same predicate narrowed to one id
    pub fn with_id(&self, id: &str) -> Self {
        let mut narrowed = self.clone();
        narrowed.conditions.push(Condition::eq(ID_COLUMN, id));
        narrowed
    }

    pub fn with_seek(mut self, seek: Option<SeekBound>) -> Self {
        self.seek = seek;
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
            && self.search.as_ref().map_or(true, |s| s.matches(record))
            && self.seek.as_ref().map_or(true, |s| s.matches(record))
    }
}

/// A bounded, ordered selection
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub predicate: Predicate,
    pub order: SortOrder,
    pub limit: usize,
}

impl SelectQuery {
    /// Selection for a paginator window under a base predicate
    pub fn window(base: &Predicate, window: Window) -> Self {
        Self {
            predicate: base.clone().with_seek(window.seek),
            order: window.order,
            limit: window.fetch,
        }
    }
}

/// Persistence backend
pub trait StorageAdapter: Send + Sync {
    /// Create the table backing a new collection
    fn create_table(&self, schema: &CollectionSchema) -> StorageResult<()>;

    /// Bring a table in line with a new schema version. Added columns are
    /// backfilled with their default or null; dropped columns are removed.
    fn alter_table(&self, schema: &CollectionSchema) -> StorageResult<()>;

    fn drop_table(&self, collection: &str) -> StorageResult<()>;

    /// Insert a complete row (including `id`); returns the id
    fn insert_row(&self, collection: &str, row: Record) -> StorageResult<String>;

    /// Merge `patch` into the row; `false` if no such row
    fn update_row(&self, collection: &str, id: &str, patch: &Record) -> StorageResult<bool>;

    /// `false` if no such row
    fn delete_row(&self, collection: &str, id: &str) -> StorageResult<bool>;

    /// Matching rows in `query.order`, at most `query.limit`
    fn select_rows(&self, collection: &str, query: &SelectQuery) -> StorageResult<Vec<Record>>;

    /// Grouped aggregate rows for `spec`, in group-key order
    fn aggregate_rows(&self, collection: &str, spec: &AggregationSpec)
        -> StorageResult<Vec<Record>>;

    /// Fetch one row by id
    fn get_row(&self, collection: &str, id: &str) -> StorageResult<Option<Record>> {
        let query = SelectQuery {
            predicate: Predicate::by_id(id),
            order: SortOrder::effective(&[]),
            limit: 1,
        };
        Ok(self.select_rows(collection, &query)?.into_iter().next())
    }
}
