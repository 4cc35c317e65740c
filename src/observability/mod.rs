//! Observability subsystem
//!
//! - Structured logging through `tracing`, one typed `Event` per log line
//! - Per-engine counters
//!
//! The library never installs a subscriber.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. No background threads

mod events;
mod metrics;

pub use events::Event;
pub use metrics::{EngineMetrics, MetricsSnapshot};
