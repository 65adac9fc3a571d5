use moon_common::ReportableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Deliberately generic: the bearer-token classification rules (§4.7)
    /// require one unauthenticated-failure family so a caller can't probe
    /// for which half of a credential was wrong.
    #[error("authentication failed")]
    InvalidCredentials,

    #[error("password does not meet complexity requirements")]
    WeakPassword,

    #[error("token has been revoked")]
    TokenRevoked,

    #[error("token has expired")]
    TokenExpired,
}

impl ReportableError for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            AuthError::WeakPassword => "VALIDATION_ERROR",
            _ => "UNAUTHORIZED",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}
