use std::collections::HashMap;

use actix_web::{http::Method, HttpResponse};
use moon_dialect::RawValue;
use moon_engine::query::{AggregateOp, Filter, FilterOp, ListQuery, SortField};
use moon_engine::Engine;
use moon_schema::Collection;
use serde_json::{json, Value};

use crate::{envelope, error::ApiError, state::AppState};

const RESERVED_PARAMS: &[&str] = &["sort", "fields", "limit", "after", "search", "field", "atomic"];

fn engine(state: &AppState) -> Engine<'_> {
    Engine::new(&state.registry, &state.pool, &*state.dialect, &state.settings.limits, &state.settings.pagination, &state.settings.database)
}

fn query_params(query_string: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query_string.as_bytes()).into_owned().collect()
}

fn coerce_filter_value(collection: &Collection, column_name: &str, raw: &str) -> Result<Option<RawValue>, ApiError> {
    let column = collection.column(column_name).ok_or_else(|| ApiError::new("INVALID_PARAMETER", format!("unknown column '{}'", column_name)))?;
    let value = match column.semantic_type {
        moon_dialect::SemanticType::String => RawValue::Text(raw.to_owned()),
        moon_dialect::SemanticType::Integer => RawValue::Integer(
            raw.parse()
                .map_err(|_| ApiError::new("INVALID_PARAMETER", format!("'{}' is not an integer", raw)))?,
        ),
        moon_dialect::SemanticType::Decimal => RawValue::Decimal(raw.to_owned()),
        moon_dialect::SemanticType::Boolean => RawValue::Boolean(raw == "true" || raw == "1"),
        moon_dialect::SemanticType::Datetime => RawValue::Datetime(raw.to_owned()),
        moon_dialect::SemanticType::Json => RawValue::Json(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))),
    };
    Ok(Some(value))
}

/// Query params other than the reserved list become filters. A `__op`
/// suffix (`price__gt=100`) selects the operator; bare keys default to
/// equality (`status=active`).
fn parse_filters(collection: &Collection, params: &HashMap<String, String>) -> Result<Vec<Filter>, ApiError> {
    let mut filters = Vec::new();
    for (key, raw_value) in params {
        if RESERVED_PARAMS.contains(&key.as_str()) {
            continue;
        }
        let (column, op) = match key.split_once("__") {
            Some((col, suffix)) => (
                col,
                match suffix {
                    "ne" => FilterOp::Ne,
                    "gt" => FilterOp::Gt,
                    "lt" => FilterOp::Lt,
                    "gte" => FilterOp::Gte,
                    "lte" => FilterOp::Lte,
                    "like" => FilterOp::Like,
                    "null" => FilterOp::Null,
                    "notnull" => FilterOp::NotNull,
                    _ => return Err(ApiError::new("INVALID_PARAMETER", format!("unknown filter operator '{}'", suffix))),
                },
            ),
            None => (key.as_str(), FilterOp::Eq),
        };
        let value = match op {
            FilterOp::Null | FilterOp::NotNull => None,
            _ => coerce_filter_value(collection, column, raw_value)?,
        };
        filters.push(Filter { column: column.to_owned(), op, value });
    }
    Ok(filters)
}

fn parse_sort(params: &HashMap<String, String>) -> Vec<SortField> {
    params
        .get("sort")
        .map(|raw| {
            raw.split(',')
                .filter(|s| !s.is_empty())
                .map(|field| {
                    if let Some(stripped) = field.strip_prefix('-') {
                        SortField { column: stripped.to_owned(), descending: true }
                    } else {
                        SortField { column: field.to_owned(), descending: false }
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_fields(params: &HashMap<String, String>) -> Option<Vec<String>> {
    params.get("fields").map(|raw| raw.split(',').filter(|s| !s.is_empty()).map(str::to_owned).collect())
}

pub async fn dispatch(state: &AppState, collection_name: &str, action: &str, method: &Method, query_string: &str, body: &[u8]) -> Result<HttpResponse, ApiError> {
    let params = query_params(query_string);
    match (action, method) {
        ("list", &Method::GET) => list(state, collection_name, &params).await,
        ("get", &Method::GET) => get(state, collection_name, &params).await,
        ("schema", &Method::GET) => schema(state, collection_name).await,
        ("count", &Method::GET) => aggregate(state, collection_name, AggregateOp::Count, &params).await,
        ("sum", &Method::GET) => aggregate(state, collection_name, AggregateOp::Sum, &params).await,
        ("avg", &Method::GET) => aggregate(state, collection_name, AggregateOp::Avg, &params).await,
        ("min", &Method::GET) => aggregate(state, collection_name, AggregateOp::Min, &params).await,
        ("max", &Method::GET) => aggregate(state, collection_name, AggregateOp::Max, &params).await,
        ("create", &Method::POST) => create(state, collection_name, &params, body).await,
        ("update", &Method::POST) => update(state, collection_name, &params, body).await,
        ("destroy", &Method::POST) => destroy(state, collection_name, &params, body).await,
        (_, _) => Err(ApiError::new("METHOD_NOT_ALLOWED", format!("{} is not supported for action '{}'", method, action))),
    }
}

async fn list(state: &AppState, collection_name: &str, params: &HashMap<String, String>) -> Result<HttpResponse, ApiError> {
    let collection = state.registry.get(collection_name).ok_or_else(|| ApiError::not_found(format!("collection '{}' does not exist", collection_name)))?;
    let filters = parse_filters(&collection, params)?;
    let limit = params.get("limit").and_then(|s| s.parse().ok()).unwrap_or(0);
    let query = ListQuery {
        filters,
        sort: parse_sort(params),
        search: params.get("search").cloned(),
        fields: parse_fields(params),
        limit,
        after: params.get("after").cloned(),
    };
    let effective_limit = if limit == 0 { state.settings.pagination.default_page_size } else { limit };
    let outcome = engine(state).list(collection_name, query).await?;
    Ok(envelope::list(outcome.data, effective_limit, outcome.next, outcome.prev))
}

async fn get(state: &AppState, collection_name: &str, params: &HashMap<String, String>) -> Result<HttpResponse, ApiError> {
    let id = params.get("id").ok_or_else(|| ApiError::validation("the 'id' query parameter is required"))?;
    let record = engine(state).get(collection_name, id).await?;
    Ok(envelope::ok(record))
}

async fn schema(state: &AppState, collection_name: &str) -> Result<HttpResponse, ApiError> {
    let collection = state.registry.get(collection_name).ok_or_else(|| ApiError::not_found(format!("collection '{}' does not exist", collection_name)))?;
    let columns: Vec<Value> = collection
        .user_columns()
        .map(|c| json!({"name": c.name, "type": c.semantic_type.as_str(), "nullable": c.nullable, "unique": c.unique, "scale": c.scale}))
        .collect();
    Ok(envelope::ok(json!({"name": collection.name, "columns": columns})))
}

fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::invalid_json(e.to_string()))
}

fn atomic_flag(params: &HashMap<String, String>) -> bool {
    params.get("atomic").map(|v| v != "false").unwrap_or(true)
}

async fn create(state: &AppState, collection_name: &str, params: &HashMap<String, String>, body: &[u8]) -> Result<HttpResponse, ApiError> {
    let payload = parse_body(body)?;
    let outcome = engine(state).create(collection_name, &payload, atomic_flag(params)).await?;
    Ok(envelope::created(json!({
        "data": outcome.data,
        "succeeded": outcome.succeeded_total,
        "failed": outcome.failed_total,
    })))
}

async fn update(state: &AppState, collection_name: &str, params: &HashMap<String, String>, body: &[u8]) -> Result<HttpResponse, ApiError> {
    let payload = parse_body(body)?;
    let outcome = engine(state).update(collection_name, &payload, atomic_flag(params)).await?;
    Ok(envelope::ok(json!({
        "data": outcome.data,
        "succeeded": outcome.succeeded_total,
        "failed": outcome.failed_total,
    })))
}

async fn destroy(state: &AppState, collection_name: &str, params: &HashMap<String, String>, body: &[u8]) -> Result<HttpResponse, ApiError> {
    let payload = parse_body(body)?;
    let ids: Vec<String> = match payload {
        Value::Array(items) => items.into_iter().filter_map(|v| v.as_str().map(str::to_owned)).collect(),
        Value::Object(ref obj) => obj
            .get("ids")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect())
            .or_else(|| obj.get("id").and_then(Value::as_str).map(|id| vec![id.to_owned()]))
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    if ids.is_empty() {
        return Err(ApiError::validation("destroy requires an 'id', an array of ids, or {\"ids\": [...]}"));
    }
    let outcome = engine(state).destroy(collection_name, &ids, atomic_flag(params)).await?;
    Ok(envelope::ok(json!({
        "deleted_ids": outcome.deleted_ids,
        "succeeded": outcome.succeeded_total,
        "failed": outcome.failed_total,
    })))
}

async fn aggregate(state: &AppState, collection_name: &str, op: AggregateOp, params: &HashMap<String, String>) -> Result<HttpResponse, ApiError> {
    let collection = state.registry.get(collection_name).ok_or_else(|| ApiError::not_found(format!("collection '{}' does not exist", collection_name)))?;
    let filters = parse_filters(&collection, params)?;
    let field = params.get("field").map(String::as_str);
    let value = engine(state).aggregate(collection_name, op, field, filters).await?;
    Ok(envelope::ok(value))
}
