//! Batch Isolation Tests
//!
//! Batch writes apply item by item:
//! - A failing item never prevents the others from being stored
//! - The call fails only when every item failed
//! - Batch shape errors abort before any write
//! - Write capability is checked before anything else

use std::sync::Arc;
use std::thread;

use aerotable::{
    CallerContext, CollectionEngine, ColumnDef, ColumnType, EngineConfig, EngineError,
    MemoryStorage, SequentialIdGenerator, UlidGenerator,
};
use serde_json::{json, Value};

type Engine = CollectionEngine<MemoryStorage, SequentialIdGenerator>;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_engine(config: EngineConfig) -> Engine {
    let engine = CollectionEngine::new(MemoryStorage::new(), SequentialIdGenerator::new(), config);
    engine
        .define_collection(
            &CallerContext::writer(),
            "products",
            vec![
                ColumnDef::new("brand", ColumnType::String),
                ColumnDef::new("sku", ColumnType::String).unique(),
                ColumnDef::new("in_stock", ColumnType::Boolean).with_default(json!(true)),
            ],
        )
        .unwrap();
    engine
}

fn row_count(engine: &Engine) -> usize {
    engine.storage().row_count("products").unwrap()
}

// =============================================================================
// Create
// =============================================================================

/// One bad item in three: two stored, one reported.
#[test]
fn test_create_partial_success() {
    let engine = setup_engine(EngineConfig::default());
    let response = engine
        .create(
            &CallerContext::writer(),
            "products",
            &json!([
                {"brand": "Wow", "sku": "A1"},
                {"brand": null, "sku": "B2"},
                {"brand": "Orange", "sku": "C3"}
            ]),
        )
        .unwrap();

    assert_eq!(response.meta.total, 3);
    assert_eq!(response.meta.succeeded, 2);
    assert_eq!(response.meta.failed, 1);
    assert_eq!(response.data.len(), 2);
    assert_eq!(response.message, "2 of 3 record(s) created successfully");
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].index, 1);
    assert_eq!(response.errors[0].code, "VALIDATION_ERROR");

    assert_eq!(row_count(&engine), 2);
}

/// Unique violations fail the item with a conflict.
#[test]
fn test_unique_violation_is_per_item_conflict() {
    let engine = setup_engine(EngineConfig::default());
    let ctx = CallerContext::writer();
    engine
        .create(&ctx, "products", &json!({"brand": "Wow", "sku": "A1"}))
        .unwrap();

    let response = engine
        .create(
            &ctx,
            "products",
            &json!([{"brand": "Dup", "sku": "A1"}, {"brand": "New", "sku": "Z9"}]),
        )
        .unwrap();
    assert_eq!(response.meta.succeeded, 1);
    assert_eq!(response.errors[0].code, "CONFLICT");

    let err = engine
        .create(&ctx, "products", &json!({"brand": "Dup", "sku": "A1"}))
        .unwrap_err();
    assert_eq!(err.code(), "CONFLICT");
    assert_eq!(err.status_code(), 409);
    assert_eq!(row_count(&engine), 2);
}

/// When every item fails, the first item's error is the call's error.
#[test]
fn test_all_failed_returns_first_error() {
    let engine = setup_engine(EngineConfig::default());
    let err = engine
        .create(
            &CallerContext::writer(),
            "products",
            &json!([{"sku": "A1"}, {"brand": "X", "colour": "red"}]),
        )
        .unwrap_err();
    assert_eq!(err.field(), Some("brand"));
    assert_eq!(row_count(&engine), 0);
}

/// Empty and oversized batches are rejected up front.
#[test]
fn test_batch_shape_limits() {
    let mut config = EngineConfig::default();
    config.batch.max_size = 2;
    let engine = setup_engine(config);
    let ctx = CallerContext::writer();

    let err = engine.create(&ctx, "products", &json!([])).unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));

    let items: Vec<Value> = (0..3)
        .map(|i| json!({"brand": "B", "sku": format!("S{}", i)}))
        .collect();
    let err = engine
        .create(&ctx, "products", &Value::Array(items))
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
    assert_eq!(row_count(&engine), 0);
}

// =============================================================================
// Update and Destroy
// =============================================================================

/// Update items fail independently.
#[test]
fn test_update_partial_success() {
    let engine = setup_engine(EngineConfig::default());
    let ctx = CallerContext::writer();
    engine
        .create(
            &ctx,
            "products",
            &json!([{"brand": "Wow", "sku": "A1"}, {"brand": "Orange", "sku": "B2"}]),
        )
        .unwrap();

    let response = engine
        .update(
            &ctx,
            "products",
            &json!([
                {"id": "00000000000000000001", "in_stock": false},
                {"id": "00000000000000000002", "sku": "A1"},
                {"id": "ghost", "brand": "X"}
            ]),
        )
        .unwrap();
    assert_eq!(response.meta.succeeded, 1);
    assert_eq!(response.meta.failed, 2);
    assert_eq!(response.errors[0].code, "CONFLICT");
    assert_eq!(response.errors[1].code, "NOT_FOUND");
    assert_eq!(response.errors[1].id.as_deref(), Some("ghost"));
    assert_eq!(response.data[0].value("in_stock").to_json(), json!(false));
    assert_eq!(response.data[0].value("brand").to_json(), json!("Wow"));
}

/// Destroying a single id renders the id; a list renders ids and summary.
#[test]
fn test_destroy_shapes() {
    let engine = setup_engine(EngineConfig::default());
    let ctx = CallerContext::writer();
    engine
        .create(
            &ctx,
            "products",
            &json!([
                {"brand": "A", "sku": "1"},
                {"brand": "B", "sku": "2"},
                {"brand": "C", "sku": "3"}
            ]),
        )
        .unwrap();

    let single = engine
        .destroy(&ctx, "products", &json!("00000000000000000001"))
        .unwrap();
    let body = serde_json::to_value(&single).unwrap();
    assert_eq!(body["data"], json!("00000000000000000001"));
    assert_eq!(body["message"], json!("1 record(s) deleted successfully"));

    let many = engine
        .destroy(
            &ctx,
            "products",
            &json!(["00000000000000000002", "00000000000000000001"]),
        )
        .unwrap();
    let body = serde_json::to_value(&many).unwrap();
    assert_eq!(body["data"], json!(["00000000000000000002"]));
    assert_eq!(body["meta"], json!({"total": 2, "succeeded": 1, "failed": 1}));

    assert_eq!(row_count(&engine), 1);
}

// =============================================================================
// Permissions
// =============================================================================

/// Writers need the write capability; nothing is stored otherwise.
#[test]
fn test_permission_denied() {
    let engine = setup_engine(EngineConfig::default());
    let ctx = CallerContext::read_only();

    let err = engine
        .create(&ctx, "products", &json!({"brand": "Wow", "sku": "A1"}))
        .unwrap_err();
    assert!(matches!(err, EngineError::Permission(_)));
    assert_eq!(err.status_code(), 403);

    assert!(engine.update(&ctx, "products", &json!({"id": "x", "brand": "y"})).is_err());
    assert!(engine.destroy(&ctx, "products", &json!("x")).is_err());
    assert!(engine
        .add_column(&ctx, "products", ColumnDef::new("note", ColumnType::String).nullable())
        .is_err());
    assert_eq!(row_count(&engine), 0);
}

// =============================================================================
// Concurrency
// =============================================================================

/// Concurrent creates get distinct ids and all land.
#[test]
fn test_concurrent_creates_unique_ids() {
    let engine = Arc::new(CollectionEngine::new(
        MemoryStorage::new(),
        UlidGenerator::new(),
        EngineConfig::default(),
    ));
    engine
        .define_collection(
            &CallerContext::writer(),
            "events",
            vec![ColumnDef::new("worker", ColumnType::Integer)],
        )
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let ctx = CallerContext::writer();
                let items: Vec<Value> = (0..25).map(|_| json!({"worker": worker})).collect();
                let response = engine.create(&ctx, "events", &Value::Array(items)).unwrap();
                response
                    .data
                    .iter()
                    .filter_map(|r| r.id().map(str::to_string))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let total = ids.len();
    ids.sort();
    ids.dedup();

    assert_eq!(total, 200);
    assert_eq!(ids.len(), 200);
    assert_eq!(engine.storage().row_count("events").unwrap(), 200);
    assert_eq!(engine.metrics().records_created, 200);
}
