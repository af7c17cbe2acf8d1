// src/lib.rs

//! pkgcompose - package configuration composition
//!
//! Builds the configuration document of a package from independently
//! supplied path/value sections and exchanges it with external tools.
//!
//! # Architecture
//!
//! - Sections: dotted-path fragments merged in submission order
//! - Deep merge: overlay wins, mappings merge, arrays are replaced
//! - ConfigSpec: package identity + config tree + checksum, with a flat
//!   string wire format for the remote config store
//! - Checksum chain: SHA-256 over an inherited checksum and opaque tokens
//! - External tools: `%ID%` / `%CONFIG%` command templates exchanging JSON
//!   over stdin, stdout or a temp file, run under a sandboxed `HOME`
//!
//! # Example
//!
//! ```
//! use pkgcompose::{ComposeRequest, Composer, RawSection};
//!
//! let request = ComposeRequest::new()
//!     .with_section(RawSection {
//!         path: "server.port".to_string(),
//!         json: Some("8080".to_string()),
//!         ..Default::default()
//!     })
//!     .with_checksum_input("secret-rev-3");
//!
//! let spec = Composer::new().compose(request).unwrap();
//! assert_eq!(spec.config["server"]["port"], 8080);
//! assert_eq!(spec.checksum().len(), 64);
//! ```

pub mod autotype;
pub mod checksum;
pub mod compose;
mod error;
pub mod hash;
pub mod merge;
pub mod model;
pub mod section;
pub mod settings;
pub mod tool;

pub use compose::{ComposeRequest, Composer, TransformStep};
pub use error::{Error, ProcessFailure, Result};
pub use hash::{content_hash, HashAlgorithm};
pub use merge::{merge, Tree};
pub use model::{ConfigSpec, PackageVersion, WireMap};
pub use section::{merge_sections, section_to_tree, RawSection, Section, SectionPayload};
pub use settings::{ToolConfig, ToolSettings};
pub use tool::{CliInvocation, CommandTemplate, ToolInvoker, ToolRegistry, TransferMode};
