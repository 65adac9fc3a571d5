//! Password hashing, JWT sign/verify, API key generation and the unified
//! bearer-token classifier. Repository-backed orchestration (looking up a
//! user, checking the blacklist, rotating a refresh token) lives one layer
//! up, in `moon-repositories` and `moon-web`, which call into these
//! primitives.

pub mod apikey;
pub mod bearer;
pub mod error;
pub mod jwt;
pub mod password;

use moon_config::JwtSettings;

pub use bearer::BearerKind;
pub use error::AuthError;
pub use jwt::{Claims, IssuedToken, TokenKind};

/// The identity and role a request authenticated as, regardless of whether
/// the credential was a JWT or an API key.
#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: String,
    pub role: String,
    pub via: BearerKind,
}

pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Mints a fresh access/refresh pair for a user at login or after a
/// successful refresh rotation.
pub fn issue_token_pair(user_id: &str, role: &str, now: i64, settings: &JwtSettings) -> Result<TokenPair, AuthError> {
    let access = jwt::issue_access(user_id, role, now, settings.access_expiry, &settings.issuer, &settings.audience, &settings.secret)?;
    let refresh = jwt::issue_refresh(user_id, role, now, settings.refresh_expiry, &settings.issuer, &settings.audience, &settings.secret)?;
    Ok(TokenPair { access, refresh })
}

pub fn verify_access(token: &str, settings: &JwtSettings) -> Result<Claims, AuthError> {
    let claims = jwt::verify(token, &settings.issuer, &settings.audience, &settings.secret)?;
    if claims.kind != TokenKind::Access {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(claims)
}

pub fn verify_refresh(token: &str, settings: &JwtSettings) -> Result<Claims, AuthError> {
    let claims = jwt::verify(token, &settings.issuer, &settings.audience, &settings.secret)?;
    if claims.kind != TokenKind::Refresh {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(claims)
}
