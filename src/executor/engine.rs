//! # Collection Engine
//!
//! Orchestrates every operation on a collection: resolve the schema,
//! compile the request, call the storage adapter, shape the response.
//!
//! Request-level faults (unknown collection, bad query, bad cursor, missing
//! write capability) abort before any storage call. Batch items fail
//! individually.

use serde_json::{Map, Value};
use tracing::{debug, info, info_span, warn};

use super::batch::{batch_items, BatchOp, BatchResult, ItemOutcome};
use super::context::CallerContext;
use super::response::{BatchResponse, DataResponse, DestroyResponse, ListResponse};
use crate::aggregate::{sort_output, AggregationSpec};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::id::{IdGenerator, UlidGenerator};
use crate::observability::{EngineMetrics, Event, MetricsSnapshot};
use crate::pagination::Paginator;
use crate::query::compile;
use crate::schema::{
    coerce, coerce_field, CollectionSchema, ColumnDef, SchemaRegistry, SchemaView, ID_COLUMN,
};
use crate::storage::{Predicate, SelectQuery, StorageAdapter};
use crate::value::{FieldValue, Record};

/// Times one batch item is tried against a freshly resolved schema
const SCHEMA_ATTEMPTS: usize = 4;

/// Data and query engine over runtime-defined collections
pub struct CollectionEngine<S, G = UlidGenerator> {
    registry: SchemaRegistry,
    storage: S,
    ids: G,
    config: EngineConfig,
    metrics: EngineMetrics,
}

impl<S: StorageAdapter> CollectionEngine<S, UlidGenerator> {
    /// Engine with ULID ids and default limits
    pub fn with_storage(storage: S) -> Self {
        Self::new(storage, UlidGenerator::new(), EngineConfig::default())
    }
}

impl<S: StorageAdapter, G: IdGenerator> CollectionEngine<S, G> {
    pub fn new(storage: S, ids: G, config: EngineConfig) -> Self {
        Self {
            registry: SchemaRegistry::new(config.schema.clone()),
            storage,
            ids,
            config,
            metrics: EngineMetrics::new(),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn require_write(&self, ctx: &CallerContext) -> EngineResult<()> {
        if ctx.can_write {
            return Ok(());
        }
        warn!(event = %Event::PermissionDenied, "write capability required");
        Err(EngineError::permission("write capability required"))
    }

    // ==================
    // Collections
    // ==================

    /// Register a collection and create its table
    pub fn define_collection(
        &self,
        ctx: &CallerContext,
        name: &str,
        columns: Vec<ColumnDef>,
    ) -> EngineResult<DataResponse<SchemaView>> {
        let span = info_span!("engine", request_id = %ctx.request_id, collection = %name, op = "define_collection");
        let _guard = span.enter();
        self.require_write(ctx)?;

        let schema = self.registry.register_with(name, columns, |schema| {
            self.storage.create_table(schema).map_err(EngineError::from)
        })?;

        self.metrics.increment_schema_changes();
        info!(event = %Event::CollectionRegistered, columns = schema.columns.len());
        Ok(DataResponse::new(schema.describe()))
    }

    /// Append a column; existing rows get its default or null
    pub fn add_column(
        &self,
        ctx: &CallerContext,
        collection: &str,
        column: ColumnDef,
    ) -> EngineResult<DataResponse<SchemaView>> {
        let span = info_span!("engine", request_id = %ctx.request_id, collection = %collection, op = "add_column");
        let _guard = span.enter();
        self.require_write(ctx)?;

        let column_name = column.name.clone();
        let schema = self.registry.add_column_with(collection, column, |schema| {
            self.storage.alter_table(schema).map_err(EngineError::from)
        })?;

        self.metrics.increment_schema_changes();
        info!(event = %Event::ColumnAdded, column = %column_name, version = schema.version);
        Ok(DataResponse::new(schema.describe()))
    }

    pub fn drop_column(
        &self,
        ctx: &CallerContext,
        collection: &str,
        column: &str,
    ) -> EngineResult<DataResponse<SchemaView>> {
        let span = info_span!("engine", request_id = %ctx.request_id, collection = %collection, op = "drop_column");
        let _guard = span.enter();
        self.require_write(ctx)?;

        let schema = self.registry.drop_column_with(collection, column, |schema| {
            self.storage.alter_table(schema).map_err(EngineError::from)
        })?;

        self.metrics.increment_schema_changes();
        info!(event = %Event::ColumnDropped, column = %column, version = schema.version);
        Ok(DataResponse::new(schema.describe()))
    }

    /// Remove a collection and its table; returns the collection name
    pub fn drop_collection(
        &self,
        ctx: &CallerContext,
        collection: &str,
    ) -> EngineResult<DataResponse<String>> {
        let span = info_span!("engine", request_id = %ctx.request_id, collection = %collection, op = "drop_collection");
        let _guard = span.enter();
        self.require_write(ctx)?;

        let schema = self.registry.drop_collection_with(collection, |schema| {
            self.storage.drop_table(&schema.name).map_err(EngineError::from)
        })?;

        self.metrics.increment_schema_changes();
        info!(event = %Event::CollectionDropped);
        Ok(DataResponse::new(schema.name.clone()))
    }

    /// Schema introspection
    pub fn describe(
        &self,
        ctx: &CallerContext,
        collection: &str,
    ) -> EngineResult<DataResponse<SchemaView>> {
        let span = info_span!("engine", request_id = %ctx.request_id, collection = %collection, op = "describe");
        let _guard = span.enter();

        let schema = self.registry.resolve(collection)?;
        Ok(DataResponse::new(schema.describe()))
    }

    /// Registered collection names, sorted
    pub fn collections(&self, ctx: &CallerContext) -> EngineResult<DataResponse<Vec<String>>> {
        let span = info_span!("engine", request_id = %ctx.request_id, op = "collections");
        let _guard = span.enter();

        Ok(DataResponse::new(self.registry.names()?))
    }

    // ==================
    // Reads
    // ==================

    /// Filtered, sorted, searched, projected page of records
    pub fn list(
        &self,
        ctx: &CallerContext,
        collection: &str,
        params: &[(String, String)],
    ) -> EngineResult<ListResponse> {
        let span = info_span!("engine", request_id = %ctx.request_id, collection = %collection, op = "list");
        let _guard = span.enter();

        let schema = self.registry.resolve(collection)?;
        let spec = compile(params, &schema, &self.config).map_err(|e| self.rejected(e))?;

        let base = Predicate::new(spec.filters.clone(), spec.search.clone());
        let paginator = Paginator::new(&spec.sort, spec.limit);

        let anchor = match &spec.cursor {
            Some(cursor) => Some(self.resolve_cursor(&schema, &base, &paginator, cursor)?),
            None => None,
        };

        let rows = self.storage.select_rows(
            &schema.name,
            &SelectQuery::window(&base, paginator.forward(anchor.as_ref())),
        )?;
        let page = paginator.page(rows);

        let prev = match (&anchor, page.records.first()) {
            (Some(_), Some(first)) => {
                let preceding = self.storage.select_rows(
                    &schema.name,
                    &SelectQuery::window(&base, paginator.backward(first)),
                )?;
                paginator.prev_cursor(&preceding)
            }
            _ => None,
        };

        let data: Vec<Record> = page.records.iter().map(|r| spec.project(r)).collect();

        self.metrics.increment_queries_executed();
        info!(
            event = %Event::QueryExecuted,
            count = data.len(),
            limit = spec.limit,
            has_next = page.next.is_some(),
            has_prev = prev.is_some()
        );
        Ok(ListResponse::new(data, spec.limit, page.next, prev))
    }

    /// The cursor must name a record visible under the active predicate
    fn resolve_cursor(
        &self,
        schema: &CollectionSchema,
        base: &Predicate,
        paginator: &Paginator,
        cursor: &str,
    ) -> EngineResult<Record> {
        let query = SelectQuery {
            predicate: base.with_id(cursor),
            order: paginator.order().clone(),
            limit: 1,
        };
        match self.storage.select_rows(&schema.name, &query)?.into_iter().next() {
            Some(record) => Ok(record),
            None => {
                self.metrics.increment_queries_rejected();
                warn!(event = %Event::CursorRejected, cursor = %cursor);
                Err(EngineError::cursor(format!(
                    "cursor '{}' does not match any record under the current filters",
                    cursor
                )))
            }
        }
    }

    fn rejected(&self, err: EngineError) -> EngineError {
        self.metrics.increment_queries_rejected();
        warn!(event = %Event::QueryRejected, code = err.code(), error = %err);
        err
    }

    /// Single record by id
    pub fn get(
        &self,
        ctx: &CallerContext,
        collection: &str,
        id: &str,
    ) -> EngineResult<DataResponse<Record>> {
        let span = info_span!("engine", request_id = %ctx.request_id, collection = %collection, op = "get");
        let _guard = span.enter();

        let schema = self.registry.resolve(collection)?;
        let record = self
            .storage
            .get_row(&schema.name, id)?
            .ok_or_else(|| record_not_found(id))?;
        Ok(DataResponse::new(record))
    }

    /// Grouped aggregates over the filtered set
    pub fn aggregate(
        &self,
        ctx: &CallerContext,
        collection: &str,
        params: &[(String, String)],
    ) -> EngineResult<DataResponse<Vec<Record>>> {
        let span = info_span!("engine", request_id = %ctx.request_id, collection = %collection, op = "aggregate");
        let _guard = span.enter();

        let schema = self.registry.resolve(collection)?;
        let spec = AggregationSpec::compile(params, &schema, &self.config)
            .map_err(|e| self.rejected(e))?;

        let mut rows = self.storage.aggregate_rows(&schema.name, &spec)?;
        sort_output(&spec, &mut rows);

        self.metrics.increment_aggregates_executed();
        info!(
            event = %Event::AggregateExecuted,
            groups = rows.len(),
            aggregates = spec.aggregates.len()
        );
        Ok(DataResponse::new(rows))
    }

    // ==================
    // Writes
    // ==================

    /// Create one record or a batch
    pub fn create(
        &self,
        ctx: &CallerContext,
        collection: &str,
        payload: &Value,
    ) -> EngineResult<BatchResponse> {
        let span = info_span!("engine", request_id = %ctx.request_id, collection = %collection, op = "create");
        let _guard = span.enter();
        self.require_write(ctx)?;

        let (items, _) = batch_items(payload, self.config.batch.max_size)?;
        let mut result = BatchResult::new(BatchOp::Create);

        for (index, item) in items.into_iter().enumerate() {
            let outcome = match self.against_current_schema(collection, |schema| {
                self.create_one(schema, item)
            }) {
                Ok(record) => {
                    let id = record.id().unwrap_or_default().to_string();
                    ItemOutcome::succeeded(index, BatchOp::Create, id, Some(record))
                }
                Err(err) => self.item_failed(index, None, err),
            };
            result.push(outcome);
        }

        let result = self.finish_batch(result)?;
        self.metrics
            .add_records_created(result.summary().succeeded as u64);
        Ok(BatchResponse::from(&result))
    }

    fn create_one(&self, schema: &CollectionSchema, item: &Value) -> EngineResult<Record> {
        let fields = as_object(item)?;

        for key in fields.keys() {
            let column = schema
                .column(key)
                .ok_or_else(|| EngineError::validation(key, "unknown field"))?;
            if column.readonly {
                return Err(EngineError::validation(key, "field is readonly"));
            }
        }

        let mut record = Record::new();
        for column in schema.user_columns() {
            record.set(column.name.clone(), coerce_field(fields.get(&column.name), column)?);
        }
        record.set(ID_COLUMN, FieldValue::String(self.ids.new_id()));

        self.storage.insert_row(&schema.name, record.clone())?;
        Ok(record)
    }

    /// Merge-patch one record or a batch; each item carries its `id`
    pub fn update(
        &self,
        ctx: &CallerContext,
        collection: &str,
        payload: &Value,
    ) -> EngineResult<BatchResponse> {
        let span = info_span!("engine", request_id = %ctx.request_id, collection = %collection, op = "update");
        let _guard = span.enter();
        self.require_write(ctx)?;

        let (items, _) = batch_items(payload, self.config.batch.max_size)?;
        let mut result = BatchResult::new(BatchOp::Update);

        for (index, item) in items.into_iter().enumerate() {
            let id = target_id(item);
            let outcome = match self.against_current_schema(collection, |schema| {
                self.update_one(schema, id.as_deref(), item)
            }) {
                Ok(record) => {
                    ItemOutcome::succeeded(index, BatchOp::Update, id.unwrap_or_default(), Some(record))
                }
                Err(err) => self.item_failed(index, id, err),
            };
            result.push(outcome);
        }

        let result = self.finish_batch(result)?;
        self.metrics
            .add_records_updated(result.summary().succeeded as u64);
        Ok(BatchResponse::from(&result))
    }

    fn update_one(
        &self,
        schema: &CollectionSchema,
        id: Option<&str>,
        item: &Value,
    ) -> EngineResult<Record> {
        let fields = as_object(item)?;
        let id = id.ok_or_else(|| {
            EngineError::validation(ID_COLUMN, "update item requires a string id")
        })?;

        let mut patch = Record::new();
        for (key, value) in fields {
            if key == ID_COLUMN {
                continue;
            }
            let column = schema
                .column(key)
                .ok_or_else(|| EngineError::validation(key, "unknown field"))?;
            if column.readonly {
                return Err(EngineError::validation(key, "field is readonly"));
            }
            patch.set(key.clone(), coerce(value, column)?);
        }
        if patch.is_empty() {
            return Err(EngineError::validation("data", "no fields to update"));
        }

        if !self.storage.update_row(&schema.name, id, &patch)? {
            return Err(record_not_found(id));
        }
        self.storage
            .get_row(&schema.name, id)?
            .ok_or_else(|| record_not_found(id))
    }

    /// Delete one id or a batch of ids
    pub fn destroy(
        &self,
        ctx: &CallerContext,
        collection: &str,
        payload: &Value,
    ) -> EngineResult<DestroyResponse> {
        let span = info_span!("engine", request_id = %ctx.request_id, collection = %collection, op = "destroy");
        let _guard = span.enter();
        self.require_write(ctx)?;

        let (items, single) = batch_items(payload, self.config.batch.max_size)?;
        let schema = self.registry.resolve(collection)?;
        let mut result = BatchResult::new(BatchOp::Destroy);

        for (index, item) in items.into_iter().enumerate() {
            let outcome = match item.as_str() {
                Some(id) => match self.storage.delete_row(&schema.name, id) {
                    Ok(true) => ItemOutcome::succeeded(index, BatchOp::Destroy, id, None),
                    Ok(false) => self.item_failed(index, Some(id.to_string()), record_not_found(id)),
                    Err(err) => self.item_failed(index, Some(id.to_string()), err.into()),
                },
                None => self.item_failed(
                    index,
                    None,
                    EngineError::validation(ID_COLUMN, "id must be a string"),
                ),
            };
            result.push(outcome);
        }

        let result = self.finish_batch(result)?;
        self.metrics
            .add_records_deleted(result.summary().succeeded as u64);
        Ok(DestroyResponse::from_batch(&result, single))
    }

    /// Run one item against the current schema. Storage rejecting the row
    /// for a stale column set re-resolves the schema and reruns the item.
    fn against_current_schema<T, F>(&self, collection: &str, mut apply: F) -> EngineResult<T>
    where
        F: FnMut(&CollectionSchema) -> EngineResult<T>,
    {
        let mut attempt = 1;
        loop {
            let schema = self.registry.resolve(collection)?;
            match apply(schema.as_ref()) {
                Err(EngineError::Storage(err))
                    if err.is_schema_mismatch() && attempt < SCHEMA_ATTEMPTS =>
                {
                    debug!(version = schema.version, attempt, error = %err, "schema changed under write");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn item_failed(&self, index: usize, id: Option<String>, err: EngineError) -> ItemOutcome {
        debug!(
            event = %Event::BatchItemFailed,
            index,
            id = id.as_deref().unwrap_or(""),
            code = err.code(),
            error = %err
        );
        ItemOutcome::failed(index, id, err)
    }

    fn finish_batch(&self, result: BatchResult) -> EngineResult<BatchResult> {
        let summary = result.summary();
        self.metrics.add_batch_items_failed(summary.failed as u64);
        info!(
            event = %Event::BatchCompleted,
            op = result.op.as_str(),
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed
        );
        result.check()
    }
}

fn as_object(item: &Value) -> EngineResult<&Map<String, Value>> {
    item.as_object()
        .ok_or_else(|| EngineError::validation("data", "record must be a JSON object"))
}

fn target_id(item: &Value) -> Option<String> {
    item.get(ID_COLUMN)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn record_not_found(id: &str) -> EngineError {
    EngineError::not_found(format!("record '{}' not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialIdGenerator;
    use crate::schema::ColumnType;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    type Engine = CollectionEngine<MemoryStorage, SequentialIdGenerator>;

    fn engine() -> Engine {
        let engine = CollectionEngine::new(
            MemoryStorage::new(),
            SequentialIdGenerator::new(),
            EngineConfig::default(),
        );
        engine
            .define_collection(
                &CallerContext::writer(),
                "products",
                vec![
                    ColumnDef::new("brand", ColumnType::String),
                    ColumnDef::new("quantity", ColumnType::Integer).with_default(json!(0)),
                    ColumnDef::new("price", ColumnType::Decimal).nullable(),
                    ColumnDef::new("origin", ColumnType::String)
                        .readonly()
                        .with_default(json!("local")),
                ],
            )
            .unwrap();
        engine
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_create_applies_defaults() {
        let e = engine();
        let response = e
            .create(&CallerContext::writer(), "products", &json!({"brand": "Wow"}))
            .unwrap();

        let record = &response.data[0];
        assert_eq!(record.id(), Some("00000000000000000001"));
        assert_eq!(record.value("quantity"), &FieldValue::Integer(0));
        assert!(record.value("price").is_null());
        assert_eq!(record.value("origin"), &FieldValue::from("local"));
    }

    #[test]
    fn test_create_rejects_readonly_and_unknown() {
        let e = engine();
        let ctx = CallerContext::writer();
        for payload in [
            json!({"brand": "Wow", "id": "mine"}),
            json!({"brand": "Wow", "origin": "abroad"}),
            json!({"brand": "Wow", "colour": "red"}),
            json!({"quantity": 3}),
            json!("Wow"),
        ] {
            let err = e.create(&ctx, "products", &payload).unwrap_err();
            assert!(matches!(err, EngineError::Validation { .. }), "{}", payload);
        }
    }

    #[test]
    fn test_update_merge_patch() {
        let e = engine();
        let ctx = CallerContext::writer();
        e.create(&ctx, "products", &json!({"brand": "Wow", "quantity": 5}))
            .unwrap();

        let response = e
            .update(
                &ctx,
                "products",
                &json!({"id": "00000000000000000001", "price": "9.50"}),
            )
            .unwrap();
        let record = &response.data[0];
        assert_eq!(record.value("brand"), &FieldValue::from("Wow"));
        assert_eq!(record.value("quantity"), &FieldValue::Integer(5));
        assert_eq!(record.value("price").to_json(), json!("9.50"));
        assert_eq!(response.message, "1 record(s) updated successfully");
    }

    #[test]
    fn test_update_errors() {
        let e = engine();
        let ctx = CallerContext::writer();
        e.create(&ctx, "products", &json!({"brand": "Wow"})).unwrap();

        let missing = e.update(&ctx, "products", &json!({"id": "nope", "brand": "X"}));
        assert!(matches!(missing, Err(EngineError::NotFound(_))));

        let no_id = e.update(&ctx, "products", &json!({"brand": "X"}));
        assert!(matches!(no_id, Err(EngineError::Validation { .. })));

        let empty = e.update(&ctx, "products", &json!({"id": "00000000000000000001"}));
        assert!(matches!(empty, Err(EngineError::Validation { .. })));

        let readonly = e.update(
            &ctx,
            "products",
            &json!({"id": "00000000000000000001", "origin": "x"}),
        );
        assert!(matches!(readonly, Err(EngineError::Validation { .. })));
    }

    #[test]
    fn test_destroy_partial() {
        let e = engine();
        let ctx = CallerContext::writer();
        e.create(&ctx, "products", &json!([{"brand": "A"}, {"brand": "B"}]))
            .unwrap();

        let response = e
            .destroy(&ctx, "products", &json!(["00000000000000000001", "ghost", 7]))
            .unwrap();
        assert_eq!(response.meta.unwrap().succeeded, 1);
        assert_eq!(response.errors.len(), 2);
        assert_eq!(response.errors[0].code, "NOT_FOUND");

        let response = e
            .destroy(&ctx, "products", &json!("00000000000000000002"))
            .unwrap();
        assert_eq!(
            serde_json::to_value(&response).unwrap()["data"],
            json!("00000000000000000002")
        );
    }

    #[test]
    fn test_write_requires_capability() {
        let e = engine();
        let ctx = CallerContext::read_only();
        assert!(matches!(
            e.create(&ctx, "products", &json!({"brand": "Wow"})),
            Err(EngineError::Permission(_))
        ));
        assert!(matches!(
            e.drop_collection(&ctx, "products"),
            Err(EngineError::Permission(_))
        ));
        assert!(e.list(&ctx, "products", &[]).is_ok());
    }

    #[test]
    fn test_unknown_collection() {
        let e = engine();
        let ctx = CallerContext::writer();
        assert!(matches!(
            e.list(&ctx, "ghosts", &[]),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            e.create(&ctx, "ghosts", &json!({"a": 1})),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_projection_and_cursor() {
        let e = engine();
        let ctx = CallerContext::writer();
        let items: Vec<Value> = (0..5).map(|i| json!({"brand": format!("B{}", i)})).collect();
        e.create(&ctx, "products", &Value::Array(items)).unwrap();

        let page = e
            .list(&ctx, "products", &params(&[("limit", "2"), ("fields", "brand")]))
            .unwrap();
        assert_eq!(page.meta.count, 2);
        assert_eq!(page.meta.next.as_deref(), Some("00000000000000000002"));
        assert_eq!(page.meta.prev, None);
        assert_eq!(page.data[0].len(), 2);

        let next = e
            .list(
                &ctx,
                "products",
                &params(&[("limit", "2"), ("after", "00000000000000000002")]),
            )
            .unwrap();
        assert_eq!(next.data[0].id(), Some("00000000000000000003"));

        let bad = e.list(&ctx, "products", &params(&[("after", "ghost")]));
        assert!(matches!(bad, Err(EngineError::Cursor(_))));

        // cursor outside the filtered set
        let filtered = e.list(
            &ctx,
            "products",
            &params(&[("brand[eq]", "B4"), ("after", "00000000000000000001")]),
        );
        assert!(matches!(filtered, Err(EngineError::Cursor(_))));
    }

    #[test]
    fn test_schema_lifecycle() {
        let e = engine();
        let ctx = CallerContext::writer();
        e.create(&ctx, "products", &json!({"brand": "Wow"})).unwrap();

        let view = e
            .add_column(
                &ctx,
                "products",
                ColumnDef::new("colour", ColumnType::String).nullable(),
            )
            .unwrap();
        assert_eq!(view.data.total, 6);

        let record = e.get(&ctx, "products", "00000000000000000001").unwrap();
        assert!(record.data.contains("colour"));

        e.drop_column(&ctx, "products", "colour").unwrap();
        assert_eq!(e.describe(&ctx, "products").unwrap().data.total, 5);

        assert_eq!(e.collections(&ctx).unwrap().data, vec!["products".to_string()]);
        e.drop_collection(&ctx, "products").unwrap();
        assert!(e.collections(&ctx).unwrap().data.is_empty());
        assert_eq!(e.metrics().schema_changes, 4);
    }
}
