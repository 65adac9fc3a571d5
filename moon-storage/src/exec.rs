//! Deadline-bound statement execution. Every call takes the pool, a
//! [`CompiledStatement`] already built by `moon-engine`, and the caller's
//! timeout; the blocking driver call runs on the actix blocking pool and the
//! whole thing is wrapped in a `tokio::time::timeout` so a wedged connection
//! can't hang a request past its deadline. Queries slower than
//! `database.slow_query_threshold` are logged at warn level with redacted
//! parameters.

use std::time::{Duration, Instant};

use moon_dialect::{CompiledStatement, RawValue, SemanticType};

use crate::error::StorageError;
use crate::pool::Pool;

/// Runs a statement that doesn't return rows (INSERT/UPDATE/DELETE/DDL) and
/// returns the number of affected rows.
pub async fn execute(
    pool: &Pool,
    stmt: CompiledStatement,
    deadline: Duration,
    slow_query_threshold: Duration,
) -> Result<u64, StorageError> {
    let pool = pool.clone();
    let sql_for_log = stmt.sql.clone();
    let started = Instant::now();
    let result = tokio::time::timeout(
        deadline,
        tokio::task::spawn_blocking(move || execute_blocking(&pool, &stmt)),
    )
    .await
    .map_err(|_| StorageError::Timeout(deadline))?
    .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

    log_if_slow(&sql_for_log, started.elapsed(), slow_query_threshold);
    result
}

/// Runs a statement that returns rows. `column_types` must list the
/// semantic type of each selected column, in order, so each backend's
/// native row representation can be decoded back into [`RawValue`]s without
/// a schema lookup mid-query.
pub async fn query(
    pool: &Pool,
    stmt: CompiledStatement,
    column_types: Vec<SemanticType>,
    deadline: Duration,
    slow_query_threshold: Duration,
) -> Result<Vec<Vec<RawValue>>, StorageError> {
    let pool = pool.clone();
    let sql_for_log = stmt.sql.clone();
    let started = Instant::now();
    let result = tokio::time::timeout(
        deadline,
        tokio::task::spawn_blocking(move || query_blocking(&pool, &stmt, &column_types)),
    )
    .await
    .map_err(|_| StorageError::Timeout(deadline))?
    .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

    log_if_slow(&sql_for_log, started.elapsed(), slow_query_threshold);
    result
}

/// `sql` is the compiled statement text with bind placeholders, never the
/// bound values themselves (those are never interpolated into it), so
/// there's nothing here that needs redaction before it hits the logs.
fn log_if_slow(sql: &str, elapsed: Duration, threshold: Duration) {
    if elapsed >= threshold {
        warn!("slow query";
            "duration_ms" => elapsed.as_millis() as u64,
            "sql" => sql,
        );
    }
}

fn execute_blocking(pool: &Pool, stmt: &CompiledStatement) -> Result<u64, StorageError> {
    match pool {
        Pool::Sqlite(p) => {
            let conn = p.get().map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
            let params: Vec<rusqlite::types::Value> = stmt.params.iter().map(sqlite_param).collect();
            let params: Vec<&dyn rusqlite::ToSql> = params.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
            conn.execute(&stmt.sql, params.as_slice())
                .map(|n| n as u64)
                .map_err(sqlite_error)
        }
        Pool::Postgres(p) => {
            let mut conn = p.get().map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
            let params: Vec<PgParam> = stmt.params.iter().map(PgParam::from).collect();
            let refs: Vec<&(dyn postgres::types::ToSql + Sync)> =
                params.iter().map(|p| p.as_ref()).collect();
            conn.execute(stmt.sql.as_str(), refs.as_slice())
                .map_err(postgres_error)
        }
        Pool::Mysql(p) => {
            use r2d2_mysql::mysql::prelude::Queryable;
            let mut conn = p.get().map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
            let params: Vec<r2d2_mysql::mysql::Value> = stmt.params.iter().map(mysql_param).collect();
            conn.exec_drop(stmt.sql.as_str(), params).map_err(mysql_error)?;
            Ok(conn.affected_rows())
        }
    }
}

fn query_blocking(
    pool: &Pool,
    stmt: &CompiledStatement,
    column_types: &[SemanticType],
) -> Result<Vec<Vec<RawValue>>, StorageError> {
    match pool {
        Pool::Sqlite(p) => {
            let conn = p.get().map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
            let mut prepared = conn.prepare(&stmt.sql).map_err(sqlite_error)?;
            let params: Vec<rusqlite::types::Value> = stmt.params.iter().map(sqlite_param).collect();
            let params: Vec<&dyn rusqlite::ToSql> = params.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
            let rows = prepared
                .query_map(params.as_slice(), |row| sqlite_row(row, column_types))
                .map_err(sqlite_error)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(sqlite_error)?);
            }
            Ok(out)
        }
        Pool::Postgres(p) => {
            let mut conn = p.get().map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
            let params: Vec<PgParam> = stmt.params.iter().map(PgParam::from).collect();
            let refs: Vec<&(dyn postgres::types::ToSql + Sync)> =
                params.iter().map(|p| p.as_ref()).collect();
            let rows = conn.query(stmt.sql.as_str(), refs.as_slice()).map_err(postgres_error)?;
            Ok(rows.iter().map(|row| postgres_row(row, column_types)).collect())
        }
        Pool::Mysql(p) => {
            use r2d2_mysql::mysql::prelude::Queryable;
            let mut conn = p.get().map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
            let params: Vec<r2d2_mysql::mysql::Value> = stmt.params.iter().map(mysql_param).collect();
            let rows: Vec<r2d2_mysql::mysql::Row> =
                conn.exec(stmt.sql.as_str(), params).map_err(mysql_error)?;
            Ok(rows.iter().map(|row| mysql_row(row, column_types)).collect())
        }
    }
}

// --- SQLite ---------------------------------------------------------------

fn sqlite_param(v: &RawValue) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match v {
        RawValue::Null => Value::Null,
        RawValue::Text(s) => Value::Text(s.clone()),
        RawValue::Integer(i) => Value::Integer(*i),
        RawValue::Decimal(s) => Value::Text(s.clone()),
        RawValue::Boolean(b) => Value::Integer(if *b { 1 } else { 0 }),
        RawValue::Datetime(s) => Value::Text(s.clone()),
        RawValue::Json(j) => Value::Text(j.to_string()),
    }
}

fn sqlite_row(row: &rusqlite::Row<'_>, column_types: &[SemanticType]) -> rusqlite::Result<Vec<RawValue>> {
    let mut out = Vec::with_capacity(column_types.len());
    for (i, ty) in column_types.iter().enumerate() {
        let value: rusqlite::types::Value = row.get(i)?;
        out.push(match value {
            rusqlite::types::Value::Null => RawValue::Null,
            rusqlite::types::Value::Integer(n) if *ty == SemanticType::Boolean => RawValue::Boolean(n != 0),
            rusqlite::types::Value::Integer(n) => RawValue::Integer(n),
            rusqlite::types::Value::Real(f) => RawValue::Decimal(format!("{}", f)),
            rusqlite::types::Value::Text(s) if *ty == SemanticType::Json => {
                RawValue::Json(serde_json::from_str(&s).unwrap_or(serde_json::Value::Null))
            }
            rusqlite::types::Value::Text(s) => RawValue::Text(s),
            rusqlite::types::Value::Blob(b) => RawValue::Text(String::from_utf8_lossy(&b).into_owned()),
        });
    }
    Ok(out)
}

fn sqlite_error(e: rusqlite::Error) -> StorageError {
    if e.to_string().contains("UNIQUE constraint failed") {
        StorageError::UniqueViolation(e.to_string())
    } else {
        StorageError::QueryFailed(e.to_string())
    }
}

// --- PostgreSQL -------------------------------------------------------------

enum PgParam {
    Null,
    Text(String),
    Integer(i64),
    Decimal(rust_decimal::Decimal),
    Boolean(bool),
    Json(serde_json::Value),
}

impl From<&RawValue> for PgParam {
    fn from(v: &RawValue) -> Self {
        match v {
            RawValue::Null => PgParam::Null,
            RawValue::Text(s) => PgParam::Text(s.clone()),
            RawValue::Integer(i) => PgParam::Integer(*i),
            RawValue::Decimal(s) => PgParam::Decimal(s.parse().unwrap_or_default()),
            RawValue::Boolean(b) => PgParam::Boolean(*b),
            RawValue::Datetime(s) => PgParam::Text(s.clone()),
            RawValue::Json(j) => PgParam::Json(j.clone()),
        }
    }
}

static NULL_PARAM: Option<String> = None;

impl PgParam {
    fn as_ref(&self) -> &(dyn postgres::types::ToSql + Sync) {
        match self {
            PgParam::Null => &NULL_PARAM,
            PgParam::Text(s) => s,
            PgParam::Integer(i) => i,
            PgParam::Decimal(d) => d,
            PgParam::Boolean(b) => b,
            PgParam::Json(j) => j,
        }
    }
}

fn postgres_row(row: &postgres::Row, column_types: &[SemanticType]) -> Vec<RawValue> {
    let mut out = Vec::with_capacity(column_types.len());
    for (i, ty) in column_types.iter().enumerate() {
        out.push(match ty {
            SemanticType::String | SemanticType::Datetime => row
                .try_get::<_, Option<String>>(i)
                .ok()
                .flatten()
                .map(|s| {
                    if *ty == SemanticType::Datetime {
                        RawValue::Datetime(s)
                    } else {
                        RawValue::Text(s)
                    }
                })
                .unwrap_or(RawValue::Null),
            SemanticType::Integer => row
                .try_get::<_, Option<i64>>(i)
                .ok()
                .flatten()
                .map(RawValue::Integer)
                .unwrap_or(RawValue::Null),
            SemanticType::Decimal => row
                .try_get::<_, Option<rust_decimal::Decimal>>(i)
                .ok()
                .flatten()
                .map(|d| RawValue::Decimal(d.to_string()))
                .unwrap_or(RawValue::Null),
            SemanticType::Boolean => row
                .try_get::<_, Option<bool>>(i)
                .ok()
                .flatten()
                .map(RawValue::Boolean)
                .unwrap_or(RawValue::Null),
            SemanticType::Json => row
                .try_get::<_, Option<serde_json::Value>>(i)
                .ok()
                .flatten()
                .map(RawValue::Json)
                .unwrap_or(RawValue::Null),
        });
    }
    out
}

fn postgres_error(e: postgres::Error) -> StorageError {
    if e.to_string().contains("duplicate key") {
        StorageError::UniqueViolation(e.to_string())
    } else {
        StorageError::QueryFailed(e.to_string())
    }
}

// --- MySQL -------------------------------------------------------------

fn mysql_param(v: &RawValue) -> r2d2_mysql::mysql::Value {
    use r2d2_mysql::mysql::Value;
    match v {
        RawValue::Null => Value::NULL,
        RawValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
        RawValue::Integer(i) => Value::Int(*i),
        RawValue::Decimal(s) => Value::Bytes(s.clone().into_bytes()),
        RawValue::Boolean(b) => Value::Int(if *b { 1 } else { 0 }),
        RawValue::Datetime(s) => Value::Bytes(s.clone().into_bytes()),
        RawValue::Json(j) => Value::Bytes(j.to_string().into_bytes()),
    }
}

fn mysql_row(row: &r2d2_mysql::mysql::Row, column_types: &[SemanticType]) -> Vec<RawValue> {
    use r2d2_mysql::mysql::from_value_opt;
    let mut out = Vec::with_capacity(column_types.len());
    for (i, ty) in column_types.iter().enumerate() {
        let cell = row.get(i).unwrap_or(r2d2_mysql::mysql::Value::NULL);
        out.push(match (ty, cell) {
            (_, r2d2_mysql::mysql::Value::NULL) => RawValue::Null,
            (SemanticType::Integer, v) => from_value_opt::<i64>(v).map(RawValue::Integer).unwrap_or(RawValue::Null),
            (SemanticType::Boolean, v) => from_value_opt::<i64>(v).map(|n| RawValue::Boolean(n != 0)).unwrap_or(RawValue::Null),
            (SemanticType::Json, v) => from_value_opt::<String>(v)
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
                .map(RawValue::Json)
                .unwrap_or(RawValue::Null),
            (SemanticType::Datetime, v) => from_value_opt::<String>(v).map(RawValue::Datetime).unwrap_or(RawValue::Null),
            (SemanticType::Decimal, v) => from_value_opt::<String>(v).map(RawValue::Decimal).unwrap_or(RawValue::Null),
            (SemanticType::String, v) => from_value_opt::<String>(v).map(RawValue::Text).unwrap_or(RawValue::Null),
        });
    }
    out
}

fn mysql_error(e: r2d2_mysql::mysql::Error) -> StorageError {
    if e.to_string().contains("Duplicate entry") {
        StorageError::UniqueViolation(e.to_string())
    } else {
        StorageError::QueryFailed(e.to_string())
    }
}
