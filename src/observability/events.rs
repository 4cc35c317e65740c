//! Observable engine events
//!
//! Events are explicit and typed. They are emitted through `tracing` with
//! the event name in the `event` field.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Schema
    /// Collection registered
    CollectionRegistered,
    /// Column appended to a collection
    ColumnAdded,
    /// Column removed from a collection
    ColumnDropped,
    /// Collection removed
    CollectionDropped,

    // Query
    /// List query served
    QueryExecuted,
    /// Query rejected before touching storage
    QueryRejected,
    /// `after` cursor did not resolve
    CursorRejected,

    // Batch
    /// One batch item failed; siblings continue
    BatchItemFailed,
    /// Batch finished
    BatchCompleted,

    // Aggregation
    /// Aggregation served
    AggregateExecuted,

    // Access
    /// Write attempted without write capability
    PermissionDenied,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::CollectionRegistered => "COLLECTION_REGISTERED",
            Event::ColumnAdded => "COLUMN_ADDED",
            Event::ColumnDropped => "COLUMN_DROPPED",
            Event::CollectionDropped => "COLLECTION_DROPPED",

            Event::QueryExecuted => "QUERY_EXECUTED",
            Event::QueryRejected => "QUERY_REJECTED",
            Event::CursorRejected => "CURSOR_REJECTED",

            Event::BatchItemFailed => "BATCH_ITEM_FAILED",
            Event::BatchCompleted => "BATCH_COMPLETED",

            Event::AggregateExecuted => "AGGREGATE_EXECUTED",

            Event::PermissionDenied => "PERMISSION_DENIED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::CollectionRegistered,
            Event::ColumnAdded,
            Event::ColumnDropped,
            Event::CollectionDropped,
            Event::QueryExecuted,
            Event::QueryRejected,
            Event::CursorRejected,
            Event::BatchItemFailed,
            Event::BatchCompleted,
            Event::AggregateExecuted,
            Event::PermissionDenied,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::BatchCompleted), "BATCH_COMPLETED");
    }
}
