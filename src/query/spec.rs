//! Compiled query specification

use super::filter::{Condition, SearchTerm};
use crate::value::Record;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn reverse(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Schema-validated query
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// AND'ed filter conditions
    pub filters: Vec<Condition>,
    /// Requested sort, without the `id` tiebreaker
    pub sort: Vec<SortKey>,
    pub search: Option<SearchTerm>,
    /// Projection; `id` first. `None` returns every column.
    pub fields: Option<Vec<String>>,
    /// `after` cursor, a record id
    pub cursor: Option<String>,
    pub limit: usize,
}

impl QuerySpec {
    /// Apply the projection, if any
    pub fn project(&self, record: &Record) -> Record {
        match &self.fields {
            Some(fields) => record.project(fields),
            None => record.clone(),
        }
    }
}
