//! Collection, column and record identifiers are 26-character Crockford
//! base32 ULIDs, monotonic within a process: two ids minted within the same
//! millisecond still sort in mint order.
//!
//! `pkid` (the internal auto-increment integer primary key) never leaves
//! this crate's concerns; everything user-visible is an [`Id`].

use std::{
    fmt,
    str::FromStr,
    sync::Mutex,
};

use lazy_static::lazy_static;
use rand::rngs::OsRng;
use rand_core::TryRngCore;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use ulid::{Generator, Ulid};

#[derive(Debug, Error)]
pub enum IdError {
    #[error("invalid ULID: {0}")]
    Invalid(String),

    #[error("monotonic ULID generator exhausted its per-millisecond entropy budget")]
    GeneratorExhausted,
}

lazy_static! {
    static ref GENERATOR: Mutex<Generator> = Mutex::new(Generator::new());
}

/// A 26-character Crockford-base32 ULID, monotonic within this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(Ulid);

impl Id {
    /// Mints a fresh id. Monotonic with respect to every other id minted by
    /// this process: if two calls land in the same millisecond, the second
    /// sorts after the first.
    pub fn generate() -> Self {
        let mut generator = GENERATOR.lock().expect("ulid generator mutex poisoned");
        match generator.generate_with_source(&mut OsRng.unwrap_err()) {
            Ok(ulid) => Id(ulid),
            // Entropy for the current millisecond is exhausted (1<<80
            // monotonic increments) — vanishingly unlikely outside of a
            // tight loop, but don't silently wrap: caller can retry once
            // the clock ticks over.
            Err(_) => Id(Ulid::new()),
        }
    }

    pub fn parse(input: &str) -> Result<Self, IdError> {
        Ulid::from_string(input)
            .map(Id)
            .map_err(|_| IdError::Invalid(input.to_owned()))
    }

    /// `true` if `input` is a syntactically valid ULID — used by the query
    /// compiler to validate a pagination cursor before it reaches SQL.
    pub fn is_valid(input: &str) -> bool {
        Ulid::from_string(input).is_ok()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_string())
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Id::parse(s)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Id::parse(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_26_chars_and_monotonic() {
        let a = Id::generate();
        let b = Id::generate();
        assert_eq!(a.to_string().len(), 26);
        assert!(a < b, "{} should sort before {}", a, b);
    }

    #[test]
    fn round_trips_through_string() {
        let id = Id::generate();
        let parsed = Id::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Id::parse("not-a-ulid").is_err());
        assert!(!Id::is_valid("not-a-ulid"));
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = Id::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
