//! Redaction of sensitive values before they reach logs or error envelopes.
//!
//! Mirrors the key-based approach the rest of the stack uses for stripping
//! auth material out of request logging: walk the value, match keys
//! case-insensitively against a fixed set, replace the value in place.

use serde_json::Value;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "token",
    "secret",
    "api_key",
    "apikey",
    "authorization",
    "jwt",
    "refresh_token",
    "access_token",
    "client_secret",
    "private_key",
    "credential",
    "auth",
    "bearer",
];

/// Redacts `value` in place, consulting `additional` fields configured by
/// the operator in `logging.additional_sensitive_fields`.
pub fn redact_value(value: &mut Value, additional: &[String]) {
    walk(value, additional);
}

/// Convenience entry point that clones `value`, redacts the clone, and
/// returns it — used where the caller doesn't own a mutable reference (e.g.
/// building a log record from a borrowed request body).
pub fn redacted(value: &Value, additional: &[String]) -> Value {
    let mut cloned = value.clone();
    walk(&mut cloned, additional);
    cloned
}

fn is_sensitive(key: &str, additional: &[String]) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|k| *k == lower)
        || additional.iter().any(|k| k.to_ascii_lowercase() == lower)
}

fn walk(value: &mut Value, additional: &[String]) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if is_sensitive(key, additional) {
                    *v = Value::String(REDACTED.to_owned());
                } else {
                    walk(v, additional);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                walk(item, additional);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_known_keys_case_insensitively() {
        let mut value = json!({
            "username": "ada",
            "Password": "hunter2",
            "nested": { "refresh_token": "abc.def.ghi" },
            "items": [{ "api_key": "moon_live_xyz" }],
        });
        redact_value(&mut value, &[]);
        assert_eq!(value["Password"], json!("[REDACTED]"));
        assert_eq!(value["nested"]["refresh_token"], json!("[REDACTED]"));
        assert_eq!(value["items"][0]["api_key"], json!("[REDACTED]"));
        assert_eq!(value["username"], json!("ada"));
    }

    #[test]
    fn honours_additional_sensitive_fields() {
        let mut value = json!({ "ssn": "123-45-6789" });
        redact_value(&mut value, &["ssn".to_owned()]);
        assert_eq!(value["ssn"], json!("[REDACTED]"));
    }
}
