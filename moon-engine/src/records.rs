//! Single and batch create/update/destroy, plus the JSON ⇄ [`RawValue`]
//! conversion that drives every marshalling decision off a collection's
//! column list instead of a static record type.

use moon_decimal::FixedDecimal;
use moon_dialect::{CompiledStatement, Dialect, RawValue, SemanticType, StatementBuilder};
use moon_identifier::Id;
use moon_schema::{Collection, Column};
use serde_json::{Map, Value};

use crate::error::EngineError;

pub const MAX_BATCH_SIZE: usize = 50;
pub const MAX_BATCH_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Converts one JSON field value into its bound [`RawValue`], validating
/// presence/nullability/type against `column`. `for_create` controls whether
/// a missing non-nullable field is an error (create) or simply "don't touch
/// it" (update, where only supplied fields are validated).
fn coerce(column: &Column, value: &Value) -> Result<RawValue, EngineError> {
    if value.is_null() {
        if !column.nullable {
            return Err(EngineError::UnexpectedNull(column.name.clone()));
        }
        return Ok(RawValue::Null);
    }
    match column.semantic_type {
        SemanticType::String => value
            .as_str()
            .map(|s| RawValue::Text(s.to_owned()))
            .ok_or(EngineError::TypeMismatch {
                field: column.name.clone(),
                expected: "string",
            }),
        SemanticType::Integer => value
            .as_i64()
            .map(RawValue::Integer)
            .ok_or(EngineError::TypeMismatch {
                field: column.name.clone(),
                expected: "integer",
            }),
        SemanticType::Boolean => value
            .as_bool()
            .map(RawValue::Boolean)
            .ok_or(EngineError::TypeMismatch {
                field: column.name.clone(),
                expected: "boolean",
            }),
        SemanticType::Datetime => value
            .as_str()
            .map(|s| RawValue::Datetime(s.to_owned()))
            .ok_or(EngineError::TypeMismatch {
                field: column.name.clone(),
                expected: "datetime",
            }),
        SemanticType::Json => Ok(RawValue::Json(value.clone())),
        SemanticType::Decimal => {
            let raw = value.as_str().ok_or(EngineError::TypeMismatch {
                field: column.name.clone(),
                expected: "decimal string",
            })?;
            let parsed = FixedDecimal::parse(raw, column.effective_scale())?;
            Ok(RawValue::Decimal(parsed.to_string()))
        }
    }
}

fn default_for(column: &Column) -> RawValue {
    match column.semantic_type.default_value(column.effective_scale()) {
        Some(v) => coerce(column, &v).unwrap_or(RawValue::Null),
        None => RawValue::Null,
    }
}

/// Builds the `INSERT` for one record, minting a fresh `id`. Every
/// non-system field present in `fields` must name a real column; every
/// non-nullable column without a supplied value is an error, every nullable
/// column without one falls back to its type-derived default.
pub fn compile_insert(
    collection: &Collection,
    fields: &Map<String, Value>,
    dialect: &dyn Dialect,
) -> Result<(CompiledStatement, Id), EngineError> {
    for key in fields.keys() {
        if key == "id" || key == "pkid" {
            continue;
        }
        if collection.column(key).is_none() {
            return Err(EngineError::UnknownColumn(key.clone()));
        }
    }

    let id = Id::generate();
    let mut names = vec!["id".to_owned()];
    let mut values = vec![RawValue::Text(id.to_string())];

    for column in collection.user_columns() {
        let value = match fields.get(&column.name) {
            Some(v) => coerce(column, v)?,
            None if column.nullable => default_for(column),
            None => return Err(EngineError::MissingRequiredField(column.name.clone())),
        };
        names.push(column.name.clone());
        values.push(value);
    }

    let mut builder = StatementBuilder::new();
    builder.push_sql("INSERT INTO ");
    builder.push_ident(dialect, &collection.name);
    builder.push_sql(" (");
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            builder.push_sql(", ");
        }
        builder.push_ident(dialect, name);
    }
    builder.push_sql(") VALUES (");
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            builder.push_sql(", ");
        }
        builder.push_param(dialect, value);
    }
    builder.push_sql(")");

    Ok((builder.build(), id))
}

/// Builds the `UPDATE ... SET ... WHERE id = ?` for one record. Only fields
/// actually present in `fields` are touched; any key that isn't a real
/// column is rejected rather than silently ignored.
pub fn compile_update(
    collection: &Collection,
    id: &str,
    fields: &Map<String, Value>,
    dialect: &dyn Dialect,
) -> Result<CompiledStatement, EngineError> {
    let mut assignments = Vec::new();
    for (key, value) in fields {
        if key == "id" {
            continue;
        }
        let column = collection.column(key).ok_or_else(|| EngineError::UnknownColumn(key.clone()))?;
        if column.system {
            return Err(EngineError::UnknownColumn(key.clone()));
        }
        assignments.push((column.name.clone(), coerce(column, value)?));
    }

    let mut builder = StatementBuilder::new();
    builder.push_sql("UPDATE ");
    builder.push_ident(dialect, &collection.name);
    builder.push_sql(" SET ");
    for (i, (name, value)) in assignments.into_iter().enumerate() {
        if i > 0 {
            builder.push_sql(", ");
        }
        builder.push_ident(dialect, &name);
        builder.push_sql(" = ");
        builder.push_param(dialect, value);
    }
    builder.push_sql(" WHERE ");
    builder.push_ident(dialect, "id");
    builder.push_sql(" = ");
    builder.push_param(dialect, RawValue::Text(id.to_owned()));

    Ok(builder.build())
}

pub fn compile_delete(collection: &Collection, id: &str, dialect: &dyn Dialect) -> CompiledStatement {
    let mut builder = StatementBuilder::new();
    builder.push_sql("DELETE FROM ");
    builder.push_ident(dialect, &collection.name);
    builder.push_sql(" WHERE ");
    builder.push_ident(dialect, "id");
    builder.push_sql(" = ");
    builder.push_param(dialect, RawValue::Text(id.to_owned()));
    builder.build()
}

/// Builds `SELECT <all columns> FROM collection WHERE id = ?`, used by
/// `/{collection}:get` and to re-read a record right after create/update.
pub fn compile_get(collection: &Collection, id: &str, dialect: &dyn Dialect) -> (CompiledStatement, Vec<(String, SemanticType)>) {
    let mut builder = StatementBuilder::new();
    builder.push_sql("SELECT ");
    for (i, column) in collection.columns.iter().enumerate() {
        if i > 0 {
            builder.push_sql(", ");
        }
        builder.push_ident(dialect, &column.name);
    }
    builder.push_sql(" FROM ");
    builder.push_ident(dialect, &collection.name);
    builder.push_sql(" WHERE ");
    builder.push_ident(dialect, "id");
    builder.push_sql(" = ");
    builder.push_param(dialect, RawValue::Text(id.to_owned()));

    let columns = collection.columns.iter().map(|c| (c.name.clone(), c.semantic_type)).collect();
    (builder.build(), columns)
}

/// Converts one decoded row back into the JSON object the client sees, keyed
/// by column name in declaration order.
pub fn row_to_json(columns: &[(String, SemanticType)], row: &[RawValue]) -> Value {
    let mut map = Map::with_capacity(columns.len());
    for ((name, _), value) in columns.iter().zip(row.iter()) {
        map.insert(name.clone(), value.to_json());
    }
    Value::Object(map)
}

pub fn validate_batch_size(len: usize) -> Result<(), EngineError> {
    if len > MAX_BATCH_SIZE {
        return Err(EngineError::BatchTooLarge(MAX_BATCH_SIZE));
    }
    Ok(())
}
