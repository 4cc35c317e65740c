//! # Batch Results
//!
//! Every create/update/destroy call is a batch; a single object or id is a
//! batch of one. Each item is its own atomic storage interaction and ends as
//! an explicit outcome value. The call as a whole fails only when no item
//! succeeded, and then with the first item's error.

use serde::Serialize;
use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::value::Record;

/// Batch operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp {
    Create,
    Update,
    Destroy,
}

impl BatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchOp::Create => "create",
            BatchOp::Update => "update",
            BatchOp::Destroy => "destroy",
        }
    }

    /// Status of a successful item
    pub fn success_status(&self) -> ItemStatus {
        match self {
            BatchOp::Create => ItemStatus::Created,
            BatchOp::Update => ItemStatus::Updated,
            BatchOp::Destroy => ItemStatus::Deleted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Created,
    Updated,
    Deleted,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Created => "created",
            ItemStatus::Updated => "updated",
            ItemStatus::Deleted => "deleted",
            ItemStatus::Failed => "failed",
        }
    }
}

/// Outcome of one batch item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    /// Position in the input
    pub index: usize,
    pub id: Option<String>,
    pub status: ItemStatus,
    /// Stored record for created/updated items
    pub data: Option<Record>,
    pub error: Option<EngineError>,
}

impl ItemOutcome {
    pub fn succeeded(
        index: usize,
        op: BatchOp,
        id: impl Into<String>,
        data: Option<Record>,
    ) -> Self {
        Self {
            index,
            id: Some(id.into()),
            status: op.success_status(),
            data,
            error: None,
        }
    }

    pub fn failed(index: usize, id: Option<String>, error: EngineError) -> Self {
        Self {
            index,
            id,
            status: ItemStatus::Failed,
            data: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status != ItemStatus::Failed
    }
}

/// `{total, succeeded, failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Failed item as rendered in a response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemError {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub code: &'static str,
    pub message: String,
}

/// All item outcomes of one call, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub op: BatchOp,
    pub items: Vec<ItemOutcome>,
}

impl BatchResult {
    pub fn new(op: BatchOp) -> Self {
        Self {
            op,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: ItemOutcome) {
        self.items.push(outcome);
    }

    pub fn summary(&self) -> BatchSummary {
        let succeeded = self.items.iter().filter(|i| i.is_success()).count();
        BatchSummary {
            total: self.items.len(),
            succeeded,
            failed: self.items.len() - succeeded,
        }
    }

    /// Error of the first failed item
    fn first_error(&self) -> Option<&EngineError> {
        self.items.iter().find_map(|i| i.error.as_ref())
    }

    /// `Err` with the first item error when nothing succeeded
    pub fn check(self) -> EngineResult<Self> {
        if self.summary().succeeded == 0 {
            let err = self
                .first_error()
                .cloned()
                .unwrap_or_else(|| EngineError::internal("empty batch result"));
            return Err(err);
        }
        Ok(self)
    }

    /// Records of successful items, in input order
    pub fn records(&self) -> Vec<Record> {
        self.items.iter().filter_map(|i| i.data.clone()).collect()
    }

    /// Ids of successful items, in input order
    pub fn ids(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|i| i.is_success())
            .filter_map(|i| i.id.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<ItemError> {
        self.items
            .iter()
            .filter_map(|i| {
                i.error.as_ref().map(|e| ItemError {
                    index: i.index,
                    id: i.id.clone(),
                    code: e.code(),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    /// `"N record(s) created successfully"` or `"S of T record(s) ..."`
    pub fn message(&self) -> String {
        let summary = self.summary();
        let verb = self.op.success_status().as_str();
        if summary.failed == 0 {
            format!("{} record(s) {} successfully", summary.succeeded, verb)
        } else {
            format!(
                "{} of {} record(s) {} successfully",
                summary.succeeded, summary.total, verb
            )
        }
    }
}

/// Split a payload into batch items. A non-array payload is a batch of
/// one; the flag reports that case.
pub fn batch_items(payload: &Value, max_size: usize) -> EngineResult<(Vec<&Value>, bool)> {
    match payload {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(EngineError::validation(
                    "data",
                    "batch must contain at least one item",
                ));
            }
            if items.len() > max_size {
                return Err(EngineError::validation(
                    "data",
                    format!(
                        "batch of {} items exceeds the maximum of {}",
                        items.len(),
                        max_size
                    ),
                ));
            }
            Ok((items.iter().collect(), false))
        }
        single => Ok((vec![single], true)),
    }
}
