//! Engine counters
//!
//! - Counters only, monotonic
//! - Reset only when the engine is created
//! - Relaxed atomics; exact totals, no cross-counter consistency

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one engine instance
#[derive(Debug, Default)]
pub struct EngineMetrics {
    queries_executed: AtomicU64,
    queries_rejected: AtomicU64,
    records_created: AtomicU64,
    records_updated: AtomicU64,
    records_deleted: AtomicU64,
    batch_items_failed: AtomicU64,
    aggregates_executed: AtomicU64,
    schema_changes: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_executed: u64,
    pub queries_rejected: u64,
    pub records_created: u64,
    pub records_updated: u64,
    pub records_deleted: u64,
    pub batch_items_failed: u64,
    pub aggregates_executed: u64,
    pub schema_changes: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records_created(&self, n: u64) {
        self.records_created.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_records_updated(&self, n: u64) {
        self.records_updated.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_records_deleted(&self, n: u64) {
        self.records_deleted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_batch_items_failed(&self, n: u64) {
        self.batch_items_failed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn increment_aggregates_executed(&self) {
        self.aggregates_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_schema_changes(&self) {
        self.schema_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            records_created: self.records_created.load(Ordering::Relaxed),
            records_updated: self.records_updated.load(Ordering::Relaxed),
            records_deleted: self.records_deleted.load(Ordering::Relaxed),
            batch_items_failed: self.batch_items_failed.load(Ordering::Relaxed),
            aggregates_executed: self.aggregates_executed.load(Ordering::Relaxed),
            schema_changes: self.schema_changes.load(Ordering::Relaxed),
        }
    }
}
