//! Query Compiler subsystem
//!
//! Raw query parameters in, schema-validated `QuerySpec` out. Every column
//! named by a filter, sort or projection must exist in the resolved schema,
//! and every filter literal is coerced to its column type at compile time.

mod compiler;
mod filter;
mod spec;

pub use compiler::{
    compile, compile_filter, operator_supported, parse_sort_with, split_filter_key, split_list,
    PARAM_AFTER, PARAM_FIELDS, PARAM_LIMIT, PARAM_SEARCH, PARAM_SORT,
};
pub use filter::{Condition, FilterOperator, LikePattern, SearchTerm};
pub use spec::{QuerySpec, SortDirection, SortKey};
