//! API key minting and verification. The plaintext key is shown to the
//! caller exactly once; only its SHA-256 hash and a short lookup prefix are
//! ever persisted.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const KEY_PREFIX: &str = "moon_live_";

/// Lookup prefix length, stored alongside the hash so a repository can
/// narrow a `WHERE prefix = ?` scan before comparing hashes.
const LOOKUP_PREFIX_LEN: usize = 12;

pub struct GeneratedKey {
    pub plaintext: String,
    pub lookup_prefix: String,
    pub hash: String,
}

pub fn generate() -> GeneratedKey {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let encoded = URL_SAFE_NO_PAD.encode(bytes);
    let plaintext = format!("{}{}", KEY_PREFIX, encoded);
    let lookup_prefix = plaintext.chars().take(LOOKUP_PREFIX_LEN).collect();
    GeneratedKey {
        hash: hash(&plaintext),
        lookup_prefix,
        plaintext,
    }
}

pub fn hash(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn lookup_prefix(plaintext: &str) -> String {
    plaintext.chars().take(LOOKUP_PREFIX_LEN).collect()
}

pub fn looks_like_api_key(candidate: &str) -> bool {
    candidate.starts_with(KEY_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_carries_the_prefix_and_verifies_by_hash() {
        let key = generate();
        assert!(key.plaintext.starts_with(KEY_PREFIX));
        assert_eq!(hash(&key.plaintext), key.hash);
        assert_eq!(lookup_prefix(&key.plaintext), key.lookup_prefix);
    }

    #[test]
    fn distinct_keys_hash_differently() {
        let a = generate();
        let b = generate();
        assert_ne!(a.hash, b.hash);
    }
}
