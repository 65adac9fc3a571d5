use serde_json::Value as JsonValue;

use crate::semantic_type::SemanticType;

/// The tagged-value representation records are built from: a sum over the
/// six semantic types, driven entirely by a collection's column list rather
/// than a single static record struct. This is both the in-process value
/// representation and what gets bound into SQL statements.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Text(String),
    Integer(i64),
    /// Decimal values travel as their canonical fixed-scale string so no
    /// precision is lost crossing the boundary into the driver.
    Decimal(String),
    Boolean(bool),
    /// RFC3339 in UTC.
    Datetime(String),
    Json(JsonValue),
}

impl RawValue {
    pub fn semantic_type(&self) -> Option<SemanticType> {
        match self {
            RawValue::Null => None,
            RawValue::Text(_) => Some(SemanticType::String),
            RawValue::Integer(_) => Some(SemanticType::Integer),
            RawValue::Decimal(_) => Some(SemanticType::Decimal),
            RawValue::Boolean(_) => Some(SemanticType::Boolean),
            RawValue::Datetime(_) => Some(SemanticType::Datetime),
            RawValue::Json(_) => Some(SemanticType::Json),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            RawValue::Null => JsonValue::Null,
            RawValue::Text(s) => JsonValue::String(s.clone()),
            RawValue::Integer(i) => JsonValue::from(*i),
            RawValue::Decimal(s) => JsonValue::String(s.clone()),
            RawValue::Boolean(b) => JsonValue::Bool(*b),
            RawValue::Datetime(s) => JsonValue::String(s.clone()),
            RawValue::Json(v) => v.clone(),
        }
    }
}

/// A fully compiled statement: dialect-specific placeholder text already
/// substituted, plus the positional arguments to bind. No user-supplied
/// value ever appears inside `sql` itself.
#[derive(Debug, Clone, Default)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<RawValue>,
}

impl CompiledStatement {
    pub fn new(sql: String, params: Vec<RawValue>) -> Self {
        CompiledStatement { sql, params }
    }
}

/// Accumulates SQL text and bound parameters while walking a dialect's
/// placeholder numbering, so every compiler (query, DDL, record engine)
/// builds statements the same way.
#[derive(Debug, Default)]
pub struct StatementBuilder {
    sql: String,
    params: Vec<RawValue>,
}

impl StatementBuilder {
    pub fn new() -> Self {
        StatementBuilder::default()
    }

    pub fn push_sql(&mut self, fragment: &str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    /// Appends a bind placeholder for `value` using `dialect`'s numbering
    /// convention, and records the value to bind.
    pub fn push_param(&mut self, dialect: &dyn crate::Dialect, value: RawValue) -> &mut Self {
        self.params.push(value);
        self.sql.push_str(&dialect.placeholder(self.params.len()));
        self
    }

    pub fn push_ident(&mut self, dialect: &dyn crate::Dialect, ident: &str) -> &mut Self {
        self.sql.push_str(&dialect.quote_ident(ident));
        self
    }

    pub fn build(self) -> CompiledStatement {
        CompiledStatement {
            sql: self.sql,
            params: self.params,
        }
    }
}
