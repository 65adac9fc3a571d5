use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dialect::Backend;

/// The six column types a collection can declare. Deliberately closed —
/// clients cannot register new ones. `text` and `float` were considered
/// during design and rejected: `string` already covers unbounded text and
/// a fixed-scale `decimal` covers money better than a float ever would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    String,
    Integer,
    Decimal,
    Boolean,
    Datetime,
    Json,
}

impl SemanticType {
    /// The SQL column type for this semantic type on `backend`. `scale`
    /// only affects `Decimal` and is ignored otherwise.
    pub fn sql_type(&self, backend: Backend, scale: u32) -> String {
        match (self, backend) {
            (SemanticType::String, _) => "TEXT".to_owned(),
            (SemanticType::Integer, Backend::Sqlite) => "INTEGER".to_owned(),
            (SemanticType::Integer, Backend::Postgres) => "BIGINT".to_owned(),
            (SemanticType::Integer, Backend::Mysql) => "BIGINT".to_owned(),
            (SemanticType::Decimal, Backend::Sqlite) => "NUMERIC".to_owned(),
            (SemanticType::Decimal, Backend::Postgres) => format!("NUMERIC(19,{})", scale),
            (SemanticType::Decimal, Backend::Mysql) => format!("DECIMAL(19,{})", scale),
            (SemanticType::Boolean, Backend::Sqlite) => "INTEGER".to_owned(),
            (SemanticType::Boolean, Backend::Postgres) => "BOOLEAN".to_owned(),
            (SemanticType::Boolean, Backend::Mysql) => "BOOLEAN".to_owned(),
            (SemanticType::Datetime, Backend::Sqlite) => "TEXT".to_owned(),
            (SemanticType::Datetime, Backend::Postgres) => "TIMESTAMP".to_owned(),
            (SemanticType::Datetime, Backend::Mysql) => "TIMESTAMP".to_owned(),
            (SemanticType::Json, Backend::Sqlite) => "TEXT".to_owned(),
            (SemanticType::Json, Backend::Postgres) => "JSON".to_owned(),
            (SemanticType::Json, Backend::Mysql) => "JSON".to_owned(),
        }
    }

    /// The type-derived default applied to a nullable column at DDL time.
    /// `None` means the column default is SQL `NULL`.
    pub fn default_value(&self, scale: u32) -> Option<Value> {
        match self {
            SemanticType::String => Some(json!("")),
            SemanticType::Integer => Some(json!(0)),
            SemanticType::Decimal => Some(json!(format!("{:.*}", scale as usize, 0))),
            SemanticType::Boolean => Some(json!(false)),
            SemanticType::Datetime => None,
            SemanticType::Json => Some(json!({})),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::String => "string",
            SemanticType::Integer => "integer",
            SemanticType::Decimal => "decimal",
            SemanticType::Boolean => "boolean",
            SemanticType::Datetime => "datetime",
            SemanticType::Json => "json",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownSemanticType;

impl FromStr for SemanticType {
    type Err = UnknownSemanticType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(SemanticType::String),
            "integer" => Ok(SemanticType::Integer),
            "decimal" => Ok(SemanticType::Decimal),
            "boolean" => Ok(SemanticType::Boolean),
            "datetime" => Ok(SemanticType::Datetime),
            "json" => Ok(SemanticType::Json),
            // `text` and `float` are explicitly rejected, not merely unknown,
            // but callers that want a distinct message can match on those
            // separately; from a parsing standpoint they're just unknown.
            _ => Err(UnknownSemanticType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_removed_types() {
        assert!("text".parse::<SemanticType>().is_err());
        assert!("float".parse::<SemanticType>().is_err());
    }

    #[test]
    fn decimal_default_respects_scale() {
        assert_eq!(
            SemanticType::Decimal.default_value(2),
            Some(json!("0.00"))
        );
    }

    #[test]
    fn datetime_default_is_null() {
        assert_eq!(SemanticType::Datetime.default_value(0), None);
    }
}
