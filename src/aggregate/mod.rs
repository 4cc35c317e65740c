//! Aggregation Engine subsystem
//!
//! Filters with the list-query grammar, groups by zero or more columns and
//! computes count/sum/avg/min/max per group. The wire format lives in
//! `AggregationSpec` so it can change without touching the accumulators.

mod accumulator;
mod spec;

pub use accumulator::{aggregate_records, AVG_SCALE};
pub use spec::{Aggregate, AggregateFunction, AggregationSpec, PARAM_GROUP_BY, ROW_COUNT};

use crate::pagination::SortOrder;
use crate::value::Record;

/// Order output rows by the requested sort. Stable, so rows tied on every
/// key keep their group-key order.
pub fn sort_output(spec: &AggregationSpec, rows: &mut [Record]) {
    if spec.sort.is_empty() {
        return;
    }
    SortOrder::new(spec.sort.clone()).sort(rows);
}
