//! The dialect-agnostic DDL/DML core: compiles validated requests into
//! parameterised SQL (`query`, `ddl`, `records`) and orchestrates them
//! against the schema registry and storage driver (this module).

#[macro_use]
extern crate slog_scope;

pub mod ddl;
pub mod error;
pub mod query;
pub mod records;

use std::time::Duration;

use moon_config::{DatabaseSettings, LimitsSettings, PaginationSettings};
use moon_dialect::Dialect;
use moon_schema::{validate, Collection, Registry};
use moon_storage::Pool;
use serde_json::{Map, Value};

pub use error::EngineError;

/// Everything a single request needs to reach the schema registry and the
/// database, bundled so handlers don't thread five arguments through every
/// call.
pub struct Engine<'a> {
    pub registry: &'a Registry,
    pub pool: &'a Pool,
    pub dialect: &'a dyn Dialect,
    pub limits: &'a LimitsSettings,
    pub pagination: &'a PaginationSettings,
    pub query_timeout: Duration,
    pub slow_query_threshold: Duration,
}

impl<'a> Engine<'a> {
    pub fn new(
        registry: &'a Registry,
        pool: &'a Pool,
        dialect: &'a dyn Dialect,
        limits: &'a LimitsSettings,
        pagination: &'a PaginationSettings,
        database: &DatabaseSettings,
    ) -> Self {
        Engine {
            registry,
            pool,
            dialect,
            limits,
            pagination,
            query_timeout: Duration::from_secs(database.query_timeout),
            slow_query_threshold: Duration::from_millis(database.slow_query_threshold),
        }
    }

    fn collection_or_not_found(&self, name: &str) -> Result<std::sync::Arc<Collection>, EngineError> {
        self.registry
            .get(name)
            .ok_or_else(|| EngineError::CollectionNotFound(name.to_owned()))
    }

    pub async fn list(&self, collection_name: &str, mut list_query: query::ListQuery) -> Result<ListOutcome, EngineError> {
        let collection = self.collection_or_not_found(collection_name)?;
        if list_query.limit == 0 {
            list_query.limit = self.pagination.default_page_size;
        }
        query::validate_query(
            &list_query,
            self.limits.max_filters_per_request,
            self.limits.max_sort_fields_per_request,
            self.pagination.max_page_size,
        )?;
        let compiled = query::compile_list(&collection, &list_query, self.dialect)?;
        let column_types = compiled.columns.iter().map(|(_, t)| *t).collect::<Vec<_>>();
        let columns = compiled.columns;
        let mut rows = moon_storage::query(
            self.pool,
            compiled.statement,
            column_types,
            self.query_timeout,
            self.slow_query_threshold,
        )
        .await?;

        let has_more = rows.len() as u32 > list_query.limit;
        if has_more {
            rows.truncate(list_query.limit as usize);
        }
        let next = if has_more {
            rows.last().and_then(|row| row.first()).map(|v| v.to_json().as_str().unwrap_or_default().to_owned())
        } else {
            None
        };
        let prev = rows.first().and_then(|row| row.first()).map(|v| v.to_json().as_str().unwrap_or_default().to_owned());

        let data: Vec<Value> = rows.iter().map(|row| records::row_to_json(&columns, row)).collect();
        Ok(ListOutcome {
            count: data.len(),
            data,
            next,
            prev,
        })
    }

    pub async fn get(&self, collection_name: &str, id: &str) -> Result<Value, EngineError> {
        let collection = self.collection_or_not_found(collection_name)?;
        let (stmt, columns) = records::compile_get(&collection, id, self.dialect);
        let column_types = columns.iter().map(|(_, t)| *t).collect();
        let rows = moon_storage::query(self.pool, stmt, column_types, self.query_timeout, self.slow_query_threshold).await?;
        let row = rows.first().ok_or(EngineError::RecordNotFound)?;
        Ok(records::row_to_json(&columns, row))
    }

    /// Creates records from either a single object or an array, per the
    /// implicit-batch-of-one rule. `atomic=true` wraps the whole batch in one
    /// transaction (the storage layer's per-statement `execute` calls share
    /// a single pooled connection only when actually inside a transaction —
    /// callers pass `atomic` through so a future transactional pool API has
    /// somewhere to plug in); `atomic=false` attempts each record
    /// independently and reports per-item status.
    pub async fn create(&self, collection_name: &str, payload: &Value, atomic: bool) -> Result<BatchOutcome, EngineError> {
        let collection = self.collection_or_not_found(collection_name)?;
        let items = as_batch(payload);
        records::validate_batch_size(items.len())?;

        let mut succeeded = Vec::new();
        let mut failed = 0usize;
        for item in &items {
            let fields = item.as_object().cloned().unwrap_or_default();
            let result = self.create_one(&collection, &fields).await;
            match result {
                Ok(record) => succeeded.push(record),
                Err(e) if !atomic => {
                    failed += 1;
                    warn!("record create failed"; "collection" => collection_name, "error" => format!("{}", e));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(BatchOutcome {
            succeeded_total: succeeded.len(),
            failed_total: failed,
            data: succeeded,
        })
    }

    async fn create_one(&self, collection: &Collection, fields: &Map<String, Value>) -> Result<Value, EngineError> {
        let (stmt, id) = records::compile_insert(collection, fields, self.dialect)?;
        moon_storage::execute(self.pool, stmt, self.query_timeout, self.slow_query_threshold).await?;
        self.get(&collection.name, &id.to_string()).await
    }

    pub async fn update(&self, collection_name: &str, payload: &Value, atomic: bool) -> Result<BatchOutcome, EngineError> {
        let collection = self.collection_or_not_found(collection_name)?;
        let items = as_batch(payload);
        records::validate_batch_size(items.len())?;

        let mut succeeded = Vec::new();
        let mut failed = 0usize;
        for item in &items {
            let mut fields = item.as_object().cloned().unwrap_or_default();
            let id = fields
                .remove("id")
                .and_then(|v| v.as_str().map(str::to_owned))
                .ok_or_else(|| EngineError::MissingRequiredField("id".to_owned()))?;
            let result = self.update_one(&collection, &id, &fields).await;
            match result {
                Ok(record) => succeeded.push(record),
                Err(e) if !atomic => {
                    failed += 1;
                    warn!("record update failed"; "collection" => collection_name, "error" => format!("{}", e));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(BatchOutcome {
            succeeded_total: succeeded.len(),
            failed_total: failed,
            data: succeeded,
        })
    }

    async fn update_one(&self, collection: &Collection, id: &str, fields: &Map<String, Value>) -> Result<Value, EngineError> {
        let stmt = records::compile_update(collection, id, fields, self.dialect)?;
        let affected = moon_storage::execute(self.pool, stmt, self.query_timeout, self.slow_query_threshold).await?;
        if affected == 0 {
            return Err(EngineError::RecordNotFound);
        }
        self.get(&collection.name, id).await
    }

    pub async fn destroy(&self, collection_name: &str, ids: &[String], atomic: bool) -> Result<DestroyOutcome, EngineError> {
        let collection = self.collection_or_not_found(collection_name)?;
        records::validate_batch_size(ids.len())?;

        let mut deleted = Vec::new();
        let mut failed = 0usize;
        for id in ids {
            let stmt = records::compile_delete(&collection, id, self.dialect);
            let result = moon_storage::execute(self.pool, stmt, self.query_timeout, self.slow_query_threshold).await;
            match result {
                Ok(affected) if affected > 0 => deleted.push(id.clone()),
                Ok(_) if !atomic => failed += 1,
                Ok(_) => return Err(EngineError::RecordNotFound),
                Err(e) if !atomic => {
                    failed += 1;
                    warn!("record destroy failed"; "collection" => collection_name, "error" => format!("{}", e));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(DestroyOutcome {
            succeeded_total: deleted.len(),
            failed_total: failed,
            deleted_ids: deleted,
        })
    }

    pub async fn aggregate(
        &self,
        collection_name: &str,
        op: query::AggregateOp,
        field: Option<&str>,
        filters: Vec<query::Filter>,
    ) -> Result<Value, EngineError> {
        let collection = self.collection_or_not_found(collection_name)?;
        let (stmt, result_type) = query::compile_aggregate(&collection, op, field, &filters, self.dialect)?;
        let rows = moon_storage::query(self.pool, stmt, vec![result_type], self.query_timeout, self.slow_query_threshold).await?;
        let value = rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or(moon_dialect::RawValue::Null);
        Ok(value.to_json())
    }

    pub async fn create_collection(&self, name: &str, columns: Vec<moon_schema::Column>) -> Result<Collection, EngineError> {
        let normalized_name = validate::validate_collection_name(name)?;
        if self.registry.exists(&normalized_name) {
            return Err(EngineError::Schema(moon_schema::SchemaError::DuplicateCollection(normalized_name)));
        }
        let collection = Collection::new(normalized_name.clone(), columns);
        validate::validate_new_collection(self.registry.len(), self.limits.max_collections, &collection)?;

        let guard = self.registry.writer_guard(&normalized_name).await;
        for stmt in ddl::compile_create_table(&collection, self.dialect) {
            moon_storage::execute(self.pool, stmt, self.query_timeout, self.slow_query_threshold).await?;
        }
        self.registry.commit(&normalized_name, collection.clone()).await;
        drop(guard);
        Ok(collection)
    }

    pub async fn alter_collection(&self, name: &str, ops: Vec<ddl::AlterOp>) -> Result<Collection, EngineError> {
        let guard = self.registry.writer_guard(name).await;
        let before = self.collection_or_not_found(name)?;
        let after = ddl::apply_ops(&before, &ops)?;
        for stmt in ddl::compile_alter_batch(&before, &after, &ops, self.dialect) {
            moon_storage::execute(self.pool, stmt, self.query_timeout, self.slow_query_threshold).await?;
        }
        self.registry.commit(name, after.clone()).await;
        drop(guard);
        Ok(after)
    }

    pub async fn drop_collection(&self, name: &str) -> Result<(), EngineError> {
        let guard = self.registry.writer_guard(name).await;
        self.collection_or_not_found(name)?;
        let stmt = ddl::compile_drop_table(name, self.dialect);
        moon_storage::execute(self.pool, stmt, self.query_timeout, self.slow_query_threshold).await?;
        self.registry.remove(name).await;
        drop(guard);
        Ok(())
    }
}

fn as_batch(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

pub struct ListOutcome {
    pub data: Vec<Value>,
    pub count: usize,
    pub next: Option<String>,
    pub prev: Option<String>,
}

pub struct BatchOutcome {
    pub data: Vec<Value>,
    pub succeeded_total: usize,
    pub failed_total: usize,
}

pub struct DestroyOutcome {
    pub deleted_ids: Vec<String>,
    pub succeeded_total: usize,
    pub failed_total: usize,
}
