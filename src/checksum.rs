// src/checksum.rs

//! Checksum chain for configuration-affecting inputs
//!
//! The chain tracks changes that are invisible in the config tree itself,
//! such as a rotated secret referenced by name. Its state is an ordered list
//! of segments: the inherited checksum (or an empty string) followed by
//! caller-supplied tokens. The digest is SHA-256 over the segments joined
//! with `\n`, lower-hex encoded.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Ordered checksum segments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumChain {
    segments: Vec<String>,
}

impl ChecksumChain {
    /// Start a chain from an inherited checksum (empty when there is none)
    pub fn new(previous: impl Into<String>) -> Self {
        Self {
            segments: vec![previous.into()],
        }
    }

    /// Append a token
    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    /// Segments in chain order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Lower-hex SHA-256 over the newline-joined segments
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                hasher.update(b"\n");
            }
            hasher.update(segment.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Fold `segments` onto `previous` and return the new digest
pub fn update<S: AsRef<str>>(previous: &str, segments: &[S]) -> String {
    let mut chain = ChecksumChain::new(previous);
    for segment in segments {
        chain.push(segment.as_ref());
    }
    chain.digest()
}

/// [`update`] over loosely typed input; every segment must be a string
pub fn update_values(previous: &str, segments: &[Value]) -> Result<String> {
    let tokens = string_segments(segments)?;
    Ok(update(previous, &tokens))
}

/// Check that every segment is a string
pub fn string_segments(segments: &[Value]) -> Result<Vec<&str>> {
    segments
        .iter()
        .enumerate()
        .map(|(index, value)| match value {
            Value::String(s) => Ok(s.as_str()),
            other => Err(Error::ChecksumInput {
                index,
                found: value_kind(other),
            }),
        })
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
