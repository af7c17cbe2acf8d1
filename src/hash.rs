// src/hash.rs

//! Content hashing for configuration identity
//!
//! Two algorithms are in use:
//!
//! | Use Case | Algorithm | Why |
//! |----------|-----------|-----|
//! | Checksum chain (`csum`) | SHA-256 | Stored remotely, must be stable and collision resistant |
//! | Config/schema identity in composed ids | XXH128 | Fast content addressing only |
//!
//! Identity hashes are taken over a canonical JSON encoding: object keys
//! sorted, and empty strings, nulls, empty arrays and empty objects removed
//! recursively, so cosmetically empty fields do not change identity.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use xxhash_rust::xxh3::xxh3_128;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// SHA-256, 64 hex characters
    #[default]
    Sha256,
    /// XXH128, 32 hex characters
    Xxh128,
}

impl HashAlgorithm {
    /// Get the hash output length as a hex string
    #[inline]
    pub const fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Xxh128 => 32,
        }
    }

    /// Get the algorithm name as a string
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Xxh128 => "xxh128",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Compute the lower-hex hash of a byte slice
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(data);
            hex::encode(hasher.finalize())
        }
        HashAlgorithm::Xxh128 => hex::encode(xxh3_128(data).to_be_bytes()),
    }
}

/// Compute SHA-256 hash (convenience function)
#[inline]
pub fn sha256(data: &[u8]) -> String {
    hash_bytes(HashAlgorithm::Sha256, data)
}

/// Remove empty strings, nulls, empty arrays and empty objects recursively
///
/// Containers that become empty after stripping are removed as well. A
/// top-level value that strips away entirely becomes `null`.
pub fn strip_empty(value: &Value) -> Value {
    strip(value).unwrap_or(Value::Null)
}

fn strip(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) => {
            let kept: Vec<Value> = items.iter().filter_map(strip).collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .iter()
                .filter_map(|(k, v)| strip(v).map(|v| (k.clone(), v)))
                .collect();
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        other => Some(other.clone()),
    }
}

/// Canonical encoding used for identity hashing
///
/// `serde_json::Map` keeps keys sorted, so serializing the stripped value
/// is already key-ordered.
pub fn canonical_json(value: &Value) -> String {
    strip_empty(value).to_string()
}

/// XXH128 identity hash of a configuration value
pub fn content_hash(value: &Value) -> String {
    hash_bytes(HashAlgorithm::Xxh128, canonical_json(value).as_bytes())
}
