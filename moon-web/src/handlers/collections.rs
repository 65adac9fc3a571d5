use actix_web::{web, HttpResponse};
use moon_engine::{ddl::AlterOp, Engine};
use moon_schema::{Column, SchemaError};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{envelope, error::ApiError, state::AppState};

fn engine(state: &AppState) -> Engine<'_> {
    Engine::new(&state.registry, &state.pool, &*state.dialect, &state.settings.limits, &state.settings.pagination, &state.settings.database)
}

fn collection_json(collection: &moon_schema::Collection) -> Value {
    json!({
        "name": collection.name,
        "columns": collection.user_columns().map(column_json).collect::<Vec<_>>(),
    })
}

fn column_json(column: &Column) -> Value {
    json!({
        "name": column.name,
        "type": column.semantic_type.as_str(),
        "nullable": column.nullable,
        "unique": column.unique,
        "scale": column.scale,
    })
}

/// Parses one column object from the request body, rejecting a
/// client-supplied `default` up front rather than silently ignoring it —
/// defaults are entirely backend-managed (§3).
fn parse_column(value: &Value) -> Result<Column, ApiError> {
    let obj = value.as_object().ok_or_else(|| ApiError::validation("each column must be an object"))?;
    if obj.contains_key("default") {
        return Err(EngineErrorWrap(moon_engine::EngineError::Schema(SchemaError::ClientSuppliedDefault)).into());
    }
    let name = obj.get("name").and_then(Value::as_str).ok_or_else(|| ApiError::validation("column.name is required"))?;
    let type_name = obj.get("type").and_then(Value::as_str).ok_or_else(|| ApiError::validation("column.type is required"))?;
    let semantic_type: moon_dialect::SemanticType = type_name.parse().map_err(|_| ApiError::validation(format!("unknown column type '{}'", type_name)))?;
    let nullable = obj.get("nullable").and_then(Value::as_bool).unwrap_or(true);
    let unique = obj.get("unique").and_then(Value::as_bool).unwrap_or(false);
    let scale = obj.get("scale").and_then(Value::as_u64).map(|s| s as u32);
    Ok(Column {
        name: name.to_owned(),
        semantic_type,
        nullable,
        unique,
        scale,
        system: false,
    })
}

/// A transparent pass-through so [`moon_engine::EngineError`] (which already
/// implements `ReportableError`) can convert into [`ApiError`] from this
/// module without exposing the blanket impl's generic bound here.
struct EngineErrorWrap(moon_engine::EngineError);

impl From<EngineErrorWrap> for ApiError {
    fn from(wrapped: EngineErrorWrap) -> Self {
        wrapped.0.into()
    }
}

pub async fn list(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let snapshot = state.registry.snapshot();
    let names = snapshot.list();
    let collections: Vec<Value> = names.iter().filter_map(|n| snapshot.get(n)).map(|c| collection_json(&c)).collect();
    Ok(envelope::ok(collections))
}

#[derive(Deserialize)]
pub struct NameQuery {
    pub name: String,
}

pub async fn get(state: web::Data<AppState>, query: web::Query<NameQuery>) -> Result<HttpResponse, ApiError> {
    let collection = state.registry.get(&query.name).ok_or_else(|| ApiError::not_found(format!("collection '{}' does not exist", query.name)))?;
    Ok(envelope::ok(collection_json(&collection)))
}

#[derive(Deserialize)]
pub struct CreateCollectionBody {
    pub name: String,
    pub columns: Vec<Value>,
}

pub async fn create(state: web::Data<AppState>, body: web::Json<CreateCollectionBody>) -> Result<HttpResponse, ApiError> {
    let columns = body.columns.iter().map(parse_column).collect::<Result<Vec<_>, _>>()?;
    let collection = engine(&state).create_collection(&body.name, columns).await?;
    Ok(envelope::created(collection_json(&collection)))
}

#[derive(Deserialize)]
pub struct AlterOpInput {
    pub op: String,
    pub column: Option<Value>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct AlterCollectionBody {
    pub name: String,
    pub ops: Vec<AlterOpInput>,
}

pub async fn alter(state: web::Data<AppState>, body: web::Json<AlterCollectionBody>) -> Result<HttpResponse, ApiError> {
    let mut ops = Vec::with_capacity(body.ops.len());
    for op in &body.ops {
        let parsed = match op.op.as_str() {
            "rename_column" => AlterOp::RenameColumn {
                from: op.from.clone().ok_or_else(|| ApiError::validation("rename_column requires 'from'"))?,
                to: op.to.clone().ok_or_else(|| ApiError::validation("rename_column requires 'to'"))?,
            },
            "modify_column" => AlterOp::ModifyColumn {
                column: parse_column(op.column.as_ref().ok_or_else(|| ApiError::validation("modify_column requires 'column'"))?)?,
            },
            "add_column" => AlterOp::AddColumn {
                column: parse_column(op.column.as_ref().ok_or_else(|| ApiError::validation("add_column requires 'column'"))?)?,
            },
            "remove_column" => AlterOp::RemoveColumn {
                name: op.name.clone().ok_or_else(|| ApiError::validation("remove_column requires 'name'"))?,
            },
            other => return Err(ApiError::validation(format!("unknown alter op '{}'", other))),
        };
        ops.push(parsed);
    }
    let collection = engine(&state).alter_collection(&body.name, ops).await?;
    Ok(envelope::ok(collection_json(&collection)))
}

#[derive(Deserialize)]
pub struct DestroyCollectionBody {
    pub name: String,
}

pub async fn destroy(state: web::Data<AppState>, body: web::Json<DestroyCollectionBody>) -> Result<HttpResponse, ApiError> {
    engine(&state).drop_collection(&body.name).await?;
    Ok(envelope::ok(json!({"name": body.name})))
}
