//! Classifies a bearer token before any validation is attempted, so a
//! malformed credential fails fast with a generic 401 instead of being fed
//! into JWT parsing.

use crate::apikey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerKind {
    ApiKey,
    Jwt,
}

/// `moon_live_...` is an API key candidate. Exactly three non-empty
/// dot-separated segments is a JWT candidate. Anything else is rejected
/// before a single byte of it is parsed as a JWT.
pub fn classify(token: &str) -> Option<BearerKind> {
    if apikey::looks_like_api_key(token) {
        return Some(BearerKind::ApiKey);
    }
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() == 3 && segments.iter().all(|s| !s.is_empty()) {
        return Some(BearerKind::Jwt);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_prefix_wins_even_if_it_also_has_dots() {
        assert_eq!(classify("moon_live_abc.def.ghi"), Some(BearerKind::ApiKey));
    }

    #[test]
    fn three_segments_is_a_jwt_candidate() {
        assert_eq!(classify("header.payload.signature"), Some(BearerKind::Jwt));
    }

    #[test]
    fn rejects_malformed_candidates_without_touching_jwt_parsing() {
        assert_eq!(classify("not-a-token"), None);
        assert_eq!(classify("a..c"), None);
        assert_eq!(classify("a.b.c.d"), None);
        assert_eq!(classify(""), None);
    }
}
