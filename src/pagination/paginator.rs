//! # Cursor Paginator
//!
//! Stateless: given the requested sort and page size it describes which
//! window to fetch and derives `next`/`prev` cursors from what came back.
//!
//! - `next` is the id of the last record on the page when at least one more
//!   record follows it. The forward window fetches `limit + 1` rows to know.
//! - `prev` is computed from the rows preceding the first record of the
//!   page, fetched in reverse order. If more than `limit` precede it, `prev`
//!   is the record just before the previous page; otherwise the previous
//!   page is the first page and `prev` is null.

use super::order::{SeekBound, SortOrder};
use crate::query::SortKey;
use crate::value::Record;

/// A fetch description: seek bound, order and row count
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub seek: Option<SeekBound>,
    pub order: SortOrder,
    pub fetch: usize,
}

/// One page of records plus the forward cursor
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub next: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Paginator {
    order: SortOrder,
    limit: usize,
}

impl Paginator {
    pub fn new(sort: &[SortKey], limit: usize) -> Self {
        Self {
            order: SortOrder::effective(sort),
            limit,
        }
    }

    pub fn order(&self) -> &SortOrder {
        &self.order
    }

    /// Window for the page following `anchor` (or the first page)
    pub fn forward(&self, anchor: Option<&Record>) -> Window {
        Window {
            seek: anchor.map(|a| SeekBound::after(&self.order, a)),
            order: self.order.clone(),
            fetch: self.limit + 1,
        }
    }

    /// Window over the rows preceding `first`, nearest first
    pub fn backward(&self, first: &Record) -> Window {
        Window {
            seek: Some(SeekBound::before(&self.order, first)),
            order: self.order.reversed(),
            fetch: self.limit + 1,
        }
    }

    /// Cut a forward fetch down to the page and derive `next`
    pub fn page(&self, mut rows: Vec<Record>) -> Page {
        let more = rows.len() > self.limit;
        rows.truncate(self.limit);
        let next = if more {
            rows.last().and_then(Record::id).map(str::to_string)
        } else {
            None
        };
        Page {
            records: rows,
            next,
        }
    }

    /// Derive `prev` from a backward fetch
    pub fn prev_cursor(&self, preceding: &[Record]) -> Option<String> {
        preceding
            .get(self.limit)
            .and_then(Record::id)
            .map(str::to_string)
    }
}
