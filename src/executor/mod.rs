//! Execution subsystem
//!
//! The `CollectionEngine` is the single entry point for reads, writes,
//! aggregations and schema changes.
//!
//! # Execution Flow
//!
//! 1. Check the caller's write capability (writes only)
//! 2. Resolve the collection schema snapshot
//! 3. Compile and validate the request
//! 4. Call the storage adapter
//! 5. Shape the response envelope
//!
//! Steps 1 to 3 fail the whole request. Inside a batch, step 4 fails per
//! item.

mod batch;
mod context;
mod engine;
mod response;

pub use batch::{batch_items, BatchOp, BatchResult, BatchSummary, ItemError, ItemOutcome, ItemStatus};
pub use context::CallerContext;
pub use engine::CollectionEngine;
pub use response::{BatchResponse, DataResponse, DestroyData, DestroyResponse, ListMeta, ListResponse};
