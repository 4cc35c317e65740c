//! Schema Concurrency Tests
//!
//! Column changes racing record writes:
//! - A write never stores a row shaped for an older column set
//! - Columns added mid-write are present (with their default) on every row
//! - Dropped columns never reappear through a late write
//! - Items that cannot be applied fail cleanly

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use aerotable::pagination::SortOrder;
use aerotable::storage::{Predicate, SelectQuery};
use aerotable::{
    CallerContext, CollectionEngine, ColumnDef, ColumnType, EngineConfig, FieldValue,
    MemoryStorage, Record, StorageAdapter, UlidGenerator,
};
use serde_json::json;

type Engine = CollectionEngine<MemoryStorage, UlidGenerator>;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_engine(columns: Vec<ColumnDef>) -> Arc<Engine> {
    let engine = Arc::new(CollectionEngine::new(
        MemoryStorage::new(),
        UlidGenerator::new(),
        EngineConfig::default(),
    ));
    engine
        .define_collection(&CallerContext::writer(), "items", columns)
        .unwrap();
    engine
}

fn all_rows(engine: &Engine) -> Vec<Record> {
    let query = SelectQuery {
        predicate: Predicate::default(),
        order: SortOrder::effective(&[]),
        limit: usize::MAX,
    };
    engine.storage().select_rows("items", &query).unwrap()
}

fn column_names(engine: &Engine) -> Vec<String> {
    engine
        .describe(&CallerContext::read_only(), "items")
        .unwrap()
        .data
        .fields
        .into_iter()
        .map(|c| c.name)
        .collect()
}

fn assert_rows_match_schema(engine: &Engine) {
    let columns = column_names(engine);
    for row in all_rows(engine) {
        let keys: Vec<&String> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), columns.len(), "row {:?}", row.id());
        for column in &columns {
            assert!(row.contains(column), "row {:?} lacks '{}'", row.id(), column);
        }
    }
}

// =============================================================================
// Add Column Races
// =============================================================================

/// Creates running while defaulted columns are added all carry every column.
#[test]
fn test_create_racing_add_column() {
    let engine = setup_engine(vec![ColumnDef::new("title", ColumnType::String)]);
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let engine = Arc::clone(&engine);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let ctx = CallerContext::writer();
            let mut created = 0usize;
            while !done.load(Ordering::SeqCst) || created < 200 {
                if engine.create(&ctx, "items", &json!({"title": "t"})).is_ok() {
                    created += 1;
                }
            }
            created
        })
    };

    let ctx = CallerContext::writer();
    for n in 0..40 {
        engine
            .add_column(
                &ctx,
                "items",
                ColumnDef::new(format!("c{}", n), ColumnType::String).with_default(json!("d")),
            )
            .unwrap();
    }
    done.store(true, Ordering::SeqCst);
    let created = writer.join().unwrap();

    let rows = all_rows(&engine);
    assert_eq!(rows.len(), created);
    assert_rows_match_schema(&engine);
    for row in &rows {
        for n in 0..40 {
            assert_eq!(row.value(&format!("c{}", n)), &FieldValue::from("d"));
        }
    }
}

// =============================================================================
// Drop Column Races
// =============================================================================

/// Creates and updates racing drop/re-add of a column never leave a
/// dropped column behind.
#[test]
fn test_writes_racing_drop_column() {
    let engine = setup_engine(vec![
        ColumnDef::new("title", ColumnType::String),
        ColumnDef::new("extra", ColumnType::String).with_default(json!("x")),
    ]);
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let engine = Arc::clone(&engine);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let ctx = CallerContext::writer();
            let mut rounds = 0usize;
            while !done.load(Ordering::SeqCst) || rounds < 100 {
                rounds += 1;
                let Ok(created) = engine.create(&ctx, "items", &json!({"title": "t"})) else {
                    continue;
                };
                let id = created.data[0].id().unwrap().to_string();
                if let Ok(updated) = engine.update(&ctx, "items", &json!({"id": id, "title": "u"})) {
                    assert_eq!(updated.data[0].value("title"), &FieldValue::from("u"));
                }
            }
        })
    };

    let ctx = CallerContext::writer();
    for _ in 0..30 {
        engine.drop_column(&ctx, "items", "extra").unwrap();
        engine
            .add_column(
                &ctx,
                "items",
                ColumnDef::new("extra", ColumnType::String).with_default(json!("x")),
            )
            .unwrap();
    }
    engine.drop_column(&ctx, "items", "extra").unwrap();
    done.store(true, Ordering::SeqCst);
    writer.join().unwrap();

    assert_rows_match_schema(&engine);
    for row in all_rows(&engine) {
        assert!(!row.contains("extra"));
    }
}

/// A write shaped for a dropped column fails cleanly once retried against
/// the current schema.
#[test]
fn test_write_naming_dropped_column_fails_cleanly() {
    let engine = setup_engine(vec![
        ColumnDef::new("title", ColumnType::String),
        ColumnDef::new("extra", ColumnType::String).nullable(),
    ]);
    let ctx = CallerContext::writer();
    let created = engine
        .create(&ctx, "items", &json!({"title": "t", "extra": "e"}))
        .unwrap();
    let id = created.data[0].id().unwrap().to_string();

    engine.drop_column(&ctx, "items", "extra").unwrap();

    let err = engine
        .create(&ctx, "items", &json!({"title": "t", "extra": "e"}))
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    let err = engine
        .update(&ctx, "items", &json!({"id": id, "extra": "e"}))
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    assert_eq!(all_rows(&engine).len(), 1);
    assert_rows_match_schema(&engine);
}
