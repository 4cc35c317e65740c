//! # Response Envelopes
//!
//! Serializable bodies returned by the engine. Transport framing is left to
//! the embedder.

use serde::Serialize;

use super::batch::{BatchResult, BatchSummary, ItemError};
use crate::value::Record;

/// `{data}`: single record, aggregation rows, schema view, names
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Page metadata. `next`/`prev` serialize as `null` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListMeta {
    /// Records on this page, not the collection total
    pub count: usize,
    pub limit: usize,
    pub next: Option<String>,
    pub prev: Option<String>,
}

/// `{data: [...], meta: {count, limit, next, prev}}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResponse {
    pub data: Vec<Record>,
    pub meta: ListMeta,
}

impl ListResponse {
    pub fn new(
        data: Vec<Record>,
        limit: usize,
        next: Option<String>,
        prev: Option<String>,
    ) -> Self {
        let count = data.len();
        Self {
            data,
            meta: ListMeta {
                count,
                limit,
                next,
                prev,
            },
        }
    }
}

/// `{data: [...], meta: {total, succeeded, failed}, message, errors?}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    pub data: Vec<Record>,
    pub meta: BatchSummary,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ItemError>,
}

impl From<&BatchResult> for BatchResponse {
    fn from(result: &BatchResult) -> Self {
        Self {
            data: result.records(),
            meta: result.summary(),
            message: result.message(),
            errors: result.errors(),
        }
    }
}

/// Destroy `data`: the id for a single delete, the id list otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DestroyData {
    One(String),
    Many(Vec<String>),
}

/// `{data: id | [ids...], meta?, message, errors?}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestroyResponse {
    pub data: DestroyData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<BatchSummary>,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ItemError>,
}

impl DestroyResponse {
    pub fn from_batch(result: &BatchResult, single: bool) -> Self {
        let mut ids = result.ids();
        let data = match (single, ids.len()) {
            (true, 1) => DestroyData::One(ids.remove(0)),
            _ => DestroyData::Many(ids),
        };
        Self {
            data,
            meta: (!single).then(|| result.summary()),
            message: result.message(),
            errors: result.errors(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::executor::batch::{BatchOp, ItemOutcome};
    use crate::value::FieldValue;
    use serde_json::json;

    #[test]
    fn test_list_meta_nulls() {
        let response = ListResponse::new(vec![], 15, None, None);
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(
            body,
            json!({"data": [], "meta": {"count": 0, "limit": 15, "next": null, "prev": null}})
        );
    }

    #[test]
    fn test_batch_response_body() {
        let mut record = Record::new();
        record.set("id", FieldValue::from("a"));

        let mut result = BatchResult::new(BatchOp::Create);
        result.push(ItemOutcome::succeeded(0, BatchOp::Create, "a", Some(record)));
        let body = serde_json::to_value(BatchResponse::from(&result)).unwrap();

        assert_eq!(body["meta"], json!({"total": 1, "succeeded": 1, "failed": 0}));
        assert_eq!(body["message"], "1 record(s) created successfully");
        assert_eq!(body["data"][0]["id"], "a");
        assert!(body.get("errors").is_none());
    }

    #[test]
    fn test_destroy_single_and_many() {
        let mut one = BatchResult::new(BatchOp::Destroy);
        one.push(ItemOutcome::succeeded(0, BatchOp::Destroy, "a", None));
        let body = serde_json::to_value(DestroyResponse::from_batch(&one, true)).unwrap();
        assert_eq!(body["data"], "a");
        assert!(body.get("meta").is_none());

        let mut many = BatchResult::new(BatchOp::Destroy);
        many.push(ItemOutcome::succeeded(0, BatchOp::Destroy, "a", None));
        many.push(ItemOutcome::failed(
            1,
            Some("b".into()),
            EngineError::not_found("record 'b' not found"),
        ));
        let body = serde_json::to_value(DestroyResponse::from_batch(&many, false)).unwrap();
        assert_eq!(body["data"], json!(["a"]));
        assert_eq!(body["meta"]["failed"], 1);
        assert_eq!(body["message"], "1 of 2 record(s) deleted successfully");
        assert_eq!(body["errors"][0]["id"], "b");
        assert_eq!(body["errors"][0]["code"], "NOT_FOUND");
    }
}
