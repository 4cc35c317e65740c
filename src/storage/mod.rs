//! Storage Adapter subsystem
//!
//! Persistence is an external collaborator reached through the
//! `StorageAdapter` trait. `MemoryStorage` is the in-process adapter used
//! by tests and by embedders that do not need durability.
//!
//! # Contract
//!
//! - Each call is atomic on its own
//! - Unique columns are enforced on insert and update
//! - Failures are surfaced, never retried

mod adapter;
mod errors;
mod memory;

pub use adapter::{Predicate, SelectQuery, StorageAdapter};
pub use errors::{StorageError, StorageResult};
pub use memory::MemoryStorage;
