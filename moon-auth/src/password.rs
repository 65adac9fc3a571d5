//! Bcrypt password hashing and the complexity policy enforced at account
//! creation and password change.

use crate::error::AuthError;

const BCRYPT_COST: u32 = 12;

pub fn hash_password(plaintext: &str) -> Result<String, AuthError> {
    bcrypt::hash(plaintext, BCRYPT_COST).map_err(|_| AuthError::InvalidCredentials)
}

pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

/// At least 8 characters, at least one upper, one lower, one digit, one
/// symbol.
pub fn validate_complexity(plaintext: &str) -> Result<(), AuthError> {
    if plaintext.len() < 8
        || !plaintext.chars().any(|c| c.is_ascii_uppercase())
        || !plaintext.chars().any(|c| c.is_ascii_lowercase())
        || !plaintext.chars().any(|c| c.is_ascii_digit())
        || !plaintext.chars().any(|c| !c.is_ascii_alphanumeric())
    {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bcrypt() {
        let hash = hash_password("Correct-Horse9").unwrap();
        assert!(verify_password("Correct-Horse9", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn rejects_weak_passwords() {
        assert!(validate_complexity("short1A").is_err());
        assert!(validate_complexity("alllowercase1!").is_err());
        assert!(validate_complexity("Correct-Horse9").is_ok());
    }
}
