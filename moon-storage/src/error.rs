use std::time::Duration;

use moon_common::ReportableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to obtain a database connection: {0}")]
    ConnectionFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("query exceeded its {0:?} deadline")]
    Timeout(Duration),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("unsupported database backend configured: {0}")]
    UnsupportedBackend(String),
}

impl ReportableError for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            StorageError::Timeout(_) => "QUERY_TIMEOUT",
            StorageError::UniqueViolation(_) => "UNIQUE_CONSTRAINT_VIOLATION",
            _ => "INTERNAL_ERROR",
        }
    }

    fn client_message(&self) -> String {
        match self {
            StorageError::Timeout(_) => "the request took too long to complete".to_owned(),
            StorageError::UniqueViolation(field) => {
                format!("a record with that {} already exists", field)
            }
            _ => "an internal error occurred".to_owned(),
        }
    }

    fn is_internal(&self) -> bool {
        !matches!(self, StorageError::Timeout(_) | StorageError::UniqueViolation(_))
    }
}
