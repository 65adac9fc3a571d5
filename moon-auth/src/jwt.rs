//! HS256 access and refresh tokens. Both carry a `jti` so either can be
//! revoked early: access tokens via the blacklist, refresh tokens via the
//! `moon_refresh_tokens` repository's `revoked_at`/`replaced_by` chain.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub jti: String,
    pub role: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: i64,
}

fn issue(
    user_id: &str,
    role: &str,
    kind: TokenKind,
    now: i64,
    expiry_seconds: u64,
    issuer: &str,
    audience: &str,
    secret: &str,
) -> Result<IssuedToken, AuthError> {
    let jti = moon_identifier_id();
    let exp = now + expiry_seconds as i64;
    let claims = Claims {
        sub: user_id.to_owned(),
        jti: jti.clone(),
        role: role.to_owned(),
        kind,
        iat: now,
        exp,
        iss: issuer.to_owned(),
        aud: audience.to_owned(),
    };
    let token = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|_| AuthError::InvalidCredentials)?;
    Ok(IssuedToken {
        token,
        jti,
        expires_at: exp,
    })
}

pub fn issue_access(
    user_id: &str,
    role: &str,
    now: i64,
    expiry_seconds: u64,
    issuer: &str,
    audience: &str,
    secret: &str,
) -> Result<IssuedToken, AuthError> {
    issue(user_id, role, TokenKind::Access, now, expiry_seconds, issuer, audience, secret)
}

pub fn issue_refresh(
    user_id: &str,
    role: &str,
    now: i64,
    expiry_seconds: u64,
    issuer: &str,
    audience: &str,
    secret: &str,
) -> Result<IssuedToken, AuthError> {
    issue(user_id, role, TokenKind::Refresh, now, expiry_seconds, issuer, audience, secret)
}

/// Verifies signature, expiry, issuer and audience. Does not check the
/// blacklist or the refresh-rotation chain — those require a repository
/// lookup and are layered on top by the caller.
pub fn verify(token: &str, issuer: &str, audience: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|_| AuthError::InvalidCredentials)?;
    Ok(data.claims)
}

/// A token with exactly three non-empty dot-separated segments is a JWT
/// candidate, per the bearer classification rule in [`crate::bearer`].
fn moon_identifier_id() -> String {
    moon_identifier::Id::generate().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-at-least-32-bytes-long!!";

    #[test]
    fn round_trips_a_valid_access_token() {
        let issued = issue_access("user-1", "user", 1_000, 900, "moon", "moon", SECRET).unwrap();
        let claims = verify(&issued.token, "moon", "moon", SECRET).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn rejects_tokens_signed_with_a_different_secret() {
        let issued = issue_access("user-1", "user", 1_000, 900, "moon", "moon", SECRET).unwrap();
        assert!(verify(&issued.token, "moon", "moon", "a-totally-different-secret-value").is_err());
    }

    #[test]
    fn rejects_wrong_audience() {
        let issued = issue_access("user-1", "user", 1_000, 900, "moon", "moon", SECRET).unwrap();
        assert!(verify(&issued.token, "moon", "someone-else", SECRET).is_err());
    }
}
