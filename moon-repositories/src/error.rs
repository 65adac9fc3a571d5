use moon_common::ReportableError;
use moon_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("user not found")]
    UserNotFound,

    #[error("api key not found")]
    ApiKeyNotFound,

    #[error("refresh token not found")]
    RefreshTokenNotFound,

    #[error("username or email already in use")]
    DuplicateUser,

    #[error("system requires at least one admin user")]
    LastAdminProtected,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ReportableError for RepositoryError {
    fn error_code(&self) -> &'static str {
        match self {
            RepositoryError::UserNotFound | RepositoryError::ApiKeyNotFound | RepositoryError::RefreshTokenNotFound => {
                "RECORD_NOT_FOUND"
            }
            RepositoryError::DuplicateUser => "DUPLICATE_RECORD",
            RepositoryError::LastAdminProtected => "VALIDATION_ERROR",
            RepositoryError::Storage(e) => e.error_code(),
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }

    fn is_internal(&self) -> bool {
        matches!(self, RepositoryError::Storage(e) if e.is_internal())
    }
}
