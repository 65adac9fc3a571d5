use thiserror::Error;

use moon_decimal::{validate_scale as validate_decimal_scale, DecimalError};
use moon_dialect::SemanticType;

use crate::{
    keywords::is_sql_keyword,
    model::{is_system_table, Collection, Column, RESERVED_NAMES},
};

pub const MAX_COLLECTIONS: usize = 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("collection name must be 2-63 chars, lowercase, starting with a letter, and contain only letters, digits and underscores")]
    InvalidCollectionName,

    #[error("collection names starting with 'moon_' or equal to 'moon' are reserved")]
    ReservedCollectionPrefix,

    #[error("'{0}' is a reserved name and cannot be used for a collection")]
    ReservedCollectionName(String),

    #[error("'{0}' is a SQL keyword and cannot be used as a collection name")]
    CollectionNameIsKeyword(String),

    #[error("column name must be 3-63 chars, lowercase, starting with a letter, and contain only letters, digits and underscores")]
    InvalidColumnName,

    #[error("'{0}' is a SQL keyword and cannot be used as a column name")]
    ColumnNameIsKeyword(String),

    #[error("'id' and 'pkid' are reserved system column names")]
    ReservedColumnName,

    #[error("duplicate column name '{0}'")]
    DuplicateColumnName(String),

    #[error("a collection may declare at most {0} columns, including system columns")]
    TooManyColumns(usize),

    #[error("the server may hold at most {0} collections")]
    TooManyCollections(usize),

    #[error("clients may not set a column 'default': defaults are backend-managed")]
    ClientSuppliedDefault,

    #[error(transparent)]
    InvalidDecimalScale(#[from] DecimalError),

    #[error("collection '{0}' already exists")]
    DuplicateCollection(String),

    #[error("collection '{0}' does not exist")]
    CollectionNotFound(String),

    #[error("system collections cannot be created, altered or dropped through this API")]
    SystemCollectionProtected,
}

fn is_valid_ident(name: &str, min_len: usize) -> bool {
    if name.len() < min_len || name.len() > 63 {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Validates and lowercases a proposed collection name. Case-normalisation
/// happens here so every downstream consumer (registry, DDL, router) only
/// ever sees the canonical lowercase form.
pub fn validate_collection_name(raw: &str) -> Result<String, SchemaError> {
    let name = raw.to_ascii_lowercase();
    if !is_valid_ident(&name, 2) {
        return Err(SchemaError::InvalidCollectionName);
    }
    if is_system_table(&name) {
        return Err(SchemaError::ReservedCollectionPrefix);
    }
    if RESERVED_NAMES.contains(&name.as_str()) {
        return Err(SchemaError::ReservedCollectionName(name));
    }
    if is_sql_keyword(&name) {
        return Err(SchemaError::CollectionNameIsKeyword(name));
    }
    Ok(name)
}

pub fn validate_column_name(raw: &str) -> Result<String, SchemaError> {
    let name = raw.to_ascii_lowercase();
    if !is_valid_ident(&name, 3) {
        return Err(SchemaError::InvalidColumnName);
    }
    if name == "id" || name == "pkid" {
        return Err(SchemaError::ReservedColumnName);
    }
    if is_sql_keyword(&name) {
        return Err(SchemaError::ColumnNameIsKeyword(name));
    }
    Ok(name)
}

/// Validates a single column definition in isolation (name, type, scale).
/// Does not check cross-column invariants like duplicate names or the
/// per-collection column limit — see [`validate_column_batch`].
pub fn validate_column(column: &Column) -> Result<(), SchemaError> {
    validate_column_name(&column.name)?;
    if column.semantic_type == SemanticType::Decimal {
        validate_decimal_scale(column.effective_scale())?;
    }
    Ok(())
}

/// Validates a full proposed column set for a new or altered collection:
/// per-column rules, duplicate names, and the 100-column hard cap
/// (system columns included).
pub fn validate_column_batch(columns: &[Column]) -> Result<(), SchemaError> {
    if columns.len() > crate::model::MAX_COLUMNS_PER_COLLECTION_HARD_CAP {
        return Err(SchemaError::TooManyColumns(
            crate::model::MAX_COLUMNS_PER_COLLECTION_HARD_CAP,
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for column in columns {
        if !column.system {
            validate_column(column)?;
        }
        if !seen.insert(column.name.clone()) {
            return Err(SchemaError::DuplicateColumnName(column.name.clone()));
        }
    }
    Ok(())
}

pub fn validate_new_collection(
    existing_count: usize,
    max_collections: usize,
    collection: &Collection,
) -> Result<(), SchemaError> {
    if existing_count >= max_collections {
        return Err(SchemaError::TooManyCollections(max_collections));
    }
    validate_column_batch(&collection.columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_case() {
        assert_eq!(validate_collection_name("Products").unwrap(), "products");
    }

    #[test]
    fn rejects_moon_prefixed_names() {
        assert_eq!(
            validate_collection_name("moon_internal").unwrap_err(),
            SchemaError::ReservedCollectionPrefix
        );
        assert_eq!(
            validate_collection_name("moon").unwrap_err(),
            SchemaError::ReservedCollectionPrefix
        );
    }

    #[test]
    fn rejects_reserved_resource_names() {
        assert!(matches!(
            validate_collection_name("users"),
            Err(SchemaError::ReservedCollectionName(_))
        ));
    }

    #[test]
    fn rejects_sql_keywords() {
        assert!(matches!(
            validate_collection_name("select"),
            Err(SchemaError::CollectionNameIsKeyword(_))
        ));
    }

    #[test]
    fn rejects_short_names() {
        assert_eq!(
            validate_collection_name("x").unwrap_err(),
            SchemaError::InvalidCollectionName
        );
    }

    #[test]
    fn rejects_id_and_pkid_columns() {
        assert_eq!(
            validate_column_name("id").unwrap_err(),
            SchemaError::ReservedColumnName
        );
        assert_eq!(
            validate_column_name("pkid").unwrap_err(),
            SchemaError::ReservedColumnName
        );
    }

    #[test]
    fn catches_duplicate_columns() {
        let columns = vec![
            Column {
                name: "title".into(),
                semantic_type: SemanticType::String,
                nullable: true,
                unique: false,
                scale: None,
                system: false,
            },
            Column {
                name: "title".into(),
                semantic_type: SemanticType::String,
                nullable: true,
                unique: false,
                scale: None,
                system: false,
            },
        ];
        assert!(matches!(
            validate_column_batch(&columns),
            Err(SchemaError::DuplicateColumnName(_))
        ));
    }
}
