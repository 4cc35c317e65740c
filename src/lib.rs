//! aerotable - dynamic collection data and query engine
//!
//! Runtime-defined collections with typed columns, URL-style filter/sort/
//! search/projection queries, keyset cursor pagination, batch writes with
//! per-item outcomes, and grouped aggregations.
//!
//! ```no_run
//! use aerotable::{CallerContext, CollectionEngine, ColumnDef, ColumnType, MemoryStorage};
//! use serde_json::json;
//!
//! let engine = CollectionEngine::with_storage(MemoryStorage::new());
//! let ctx = CallerContext::writer();
//! engine
//!     .define_collection(&ctx, "products", vec![ColumnDef::new("brand", ColumnType::String)])
//!     .unwrap();
//! engine.create(&ctx, "products", &json!({"brand": "Wow"})).unwrap();
//!
//! let params = vec![("brand[like]".to_string(), "Wo%".to_string())];
//! let page = engine.list(&ctx, "products", &params).unwrap();
//! assert_eq!(page.meta.count, 1);
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod executor;
pub mod id;
pub mod observability;
pub mod pagination;
pub mod query;
pub mod schema;
pub mod storage;
pub mod value;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, ErrorResponse};
pub use executor::{
    BatchResponse, CallerContext, CollectionEngine, DataResponse, DestroyResponse, ListResponse,
};
pub use id::{IdGenerator, SequentialIdGenerator, UlidGenerator};
pub use schema::{CollectionSchema, ColumnDef, ColumnType, SchemaRegistry, SchemaView};
pub use storage::{MemoryStorage, StorageAdapter, StorageError};
pub use value::{FieldValue, Record};
