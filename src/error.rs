// src/error.rs

//! Error types for configuration composition and tool invocation
//!
//! Every failure names the section index, path, field or command it came
//! from. Process failures keep their underlying cause in a separate
//! [`ProcessFailure`] so callers can walk the `source()` chain.

use std::time::Duration;
use thiserror::Error;

/// Result type for pkgcompose operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while composing, (de)serializing or exchanging configuration
#[derive(Error, Debug)]
pub enum Error {
    /// A section did not set exactly one of `json`, `list`, `map`
    #[error("section '{path}' must set exactly one of json, list, map (found {found})")]
    MissingPayload { path: String, found: usize },

    /// A section path is empty or has an empty segment
    #[error("invalid section path '{path}': empty path segment")]
    InvalidPath { path: String },

    /// The walk-prefix of a path runs through a non-mapping node
    #[error("path conflict at '{walked}' while resolving '{path}': existing value is not a mapping")]
    PathConflict { path: String, walked: String },

    /// A `json` section payload is not an accepted JSON value
    #[error("invalid JSON in section '{path}': {reason}")]
    InvalidJson { path: String, reason: String },

    /// Failure while processing the section at `index` (submission order)
    #[error("section {index}: {source}")]
    Section {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// A wire field is absent, has the wrong type or holds malformed JSON
    #[error("field '{field}' has wrong type: {reason}")]
    FieldType { field: &'static str, reason: String },

    /// `package` is set but a companion version field is missing
    #[error("package version field '{field}' is required when 'package' is set")]
    MissingVersionField { field: &'static str },

    /// A checksum chain segment was not a string
    #[error("checksum segment {index} must be a string, found {found}")]
    ChecksumInput { index: usize, found: &'static str },

    /// A command template could not be resolved
    #[error("invalid command template '{template}': {reason}")]
    Template { template: String, reason: String },

    /// No tool is configured for a package
    #[error("no external tool configured for package '{0}'")]
    UnknownTool(String),

    /// Spawning or running an external tool failed
    #[error("external tool '{command}' failed")]
    Process {
        command: String,
        #[source]
        source: ProcessFailure,
    },

    /// Captured tool output is not valid JSON
    #[error("failed to reload configuration from {origin}")]
    ConfigReload {
        origin: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Settings file could not be parsed
    #[error("failed to parse settings: {0}")]
    Settings(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an error with the index of the section that caused it
    pub(crate) fn in_section(self, index: usize) -> Self {
        Self::Section {
            index,
            source: Box::new(self),
        }
    }
}

/// Why an external tool did not complete successfully
#[derive(Error, Debug)]
pub enum ProcessFailure {
    #[error("failed to spawn: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to wait for exit: {0}")]
    Wait(#[source] std::io::Error),

    #[error("pipe error: {0}")]
    Pipe(#[source] std::io::Error),

    #[error("exited with code {code}: {stderr}")]
    Exit { code: i32, stderr: String },

    #[error("terminated by signal: {stderr}")]
    Signaled { stderr: String },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_section_wrapper_keeps_cause() {
        let err = Error::PathConflict {
            path: "a.b.c".to_string(),
            walked: "a.b".to_string(),
        }
        .in_section(3);

        assert!(err.to_string().starts_with("section 3: path conflict at 'a.b'"));
        let cause = err.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(cause.starts_with("path conflict"));
    }

    #[test]
    fn test_process_error_chain() {
        let err = Error::Process {
            command: "tool".to_string(),
            source: ProcessFailure::Exit {
                code: 2,
                stderr: "boom".to_string(),
            },
        };
        assert_eq!(err.to_string(), "external tool 'tool' failed");
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("exited with code 2: boom".to_string())
        );
    }
}
