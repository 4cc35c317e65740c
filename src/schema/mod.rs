//! Schema Registry subsystem
//!
//! Collections are defined at runtime. The registry owns their column
//! definitions and every value written to a collection is coerced against
//! them first.
//!
//! # Design Principles
//!
//! - Closed set of column types, one coercion function per type
//! - `id` is implicit, string, non-nullable and readonly
//! - Schemas are immutable snapshots; mutations publish a new version
//! - Resolve per request, never cache across requests

mod coerce;
mod registry;
mod types;

pub use coerce::{coerce, coerce_field, coerce_literal};
pub use registry::{normalize_collection_name, SchemaRegistry};
pub use types::{CollectionSchema, ColumnDef, ColumnType, SchemaView, ID_COLUMN};
