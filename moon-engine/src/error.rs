use moon_common::ReportableError;
use moon_decimal::DecimalError;
use moon_schema::SchemaError;
use moon_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("collection '{0}' does not exist")]
    CollectionNotFound(String),

    #[error("record not found")]
    RecordNotFound,

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("field '{0}' is required")]
    MissingRequiredField(String),

    #[error("field '{0}' must not be null")]
    UnexpectedNull(String),

    #[error("'{field}' expects a {expected} value")]
    TypeMismatch { field: String, expected: &'static str },

    #[error("aggregation field must be integer or decimal")]
    InvalidAggregationField,

    #[error("at most {0} filters are allowed per request")]
    TooManyFilters(usize),

    #[error("at most {0} sort fields are allowed per request")]
    TooManySortFields(usize),

    #[error("page size must be between 1 and {0}")]
    PageSizeExceeded(u32),

    #[error("invalid cursor")]
    InvalidCursor,

    #[error("at most {0} records are allowed per batch")]
    BatchTooLarge(usize),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Decimal(#[from] DecimalError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ReportableError for EngineError {
    fn error_code(&self) -> &'static str {
        match self {
            EngineError::CollectionNotFound(_) => "COLLECTION_NOT_FOUND",
            EngineError::RecordNotFound => "RECORD_NOT_FOUND",
            EngineError::UnknownColumn(_)
            | EngineError::MissingRequiredField(_)
            | EngineError::UnexpectedNull(_)
            | EngineError::TypeMismatch { .. }
            | EngineError::InvalidAggregationField
            | EngineError::TooManyFilters(_)
            | EngineError::TooManySortFields(_)
            | EngineError::BatchTooLarge(_) => "VALIDATION_ERROR",
            EngineError::PageSizeExceeded(_) => "PAGE_SIZE_EXCEEDED",
            EngineError::InvalidCursor => "INVALID_CURSOR",
            EngineError::Schema(inner) => match inner {
                SchemaError::DuplicateCollection(_) => "DUPLICATE_COLLECTION",
                SchemaError::CollectionNotFound(_) => "COLLECTION_NOT_FOUND",
                SchemaError::TooManyCollections(_) => "MAX_COLLECTIONS_REACHED",
                SchemaError::TooManyColumns(_) => "MAX_COLUMNS_REACHED",
                _ => "VALIDATION_ERROR",
            },
            EngineError::Decimal(_) => "VALIDATION_ERROR",
            EngineError::Storage(inner) => match inner {
                StorageError::Timeout(_) => "QUERY_TIMEOUT",
                StorageError::UniqueViolation(_) => "UNIQUE_CONSTRAINT_VIOLATION",
                _ => "INTERNAL_ERROR",
            },
        }
    }

    fn client_message(&self) -> String {
        match self {
            EngineError::Storage(inner) if inner.is_internal() => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, EngineError::Storage(inner) if inner.is_internal())
    }
}
