// src/model/mod.rs

//! ConfigSpec - the versioned unit exchanged with the remote config store
//!
//! A spec carries an optional package identity (name, version, schema), the
//! composed config tree and a checksum. The checksum has no setter: it is
//! produced by [`ConfigSpec::seal`] from the checksum chain, or read back
//! from the wire.
//!
//! # Identity
//!
//! [`ConfigSpec::compose_id`] derives a stable id from content:
//! `name:version:schemaHash-configHash`, or just `configHash` for an
//! unversioned spec. Hashes are XXH128 over the canonical JSON encoding
//! (see [`crate::hash::content_hash`]).

mod wire;

pub use wire::{WireMap, FIELD_CONFIG, FIELD_CSUM, FIELD_PACKAGE, FIELD_SCHEMA, FIELD_VERSION};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::checksum;
use crate::hash::content_hash;
use crate::merge::Tree;

/// Package identity attached to a config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersion {
    /// Package name
    pub name: String,
    /// Package version string
    pub version: String,
    /// Configuration schema of this package version
    #[serde(default)]
    pub schema: Tree,
}

impl PackageVersion {
    /// Create a package version
    pub fn new(name: impl Into<String>, version: impl Into<String>, schema: Tree) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            schema,
        }
    }
}

/// A package configuration document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSpec {
    /// Package identity, absent for unversioned configs
    pub version: Option<PackageVersion>,
    /// Composed configuration tree
    pub config: Tree,
    checksum: String,
}

impl ConfigSpec {
    /// Create a spec sealed with an empty checksum chain
    pub fn new(version: Option<PackageVersion>, config: Tree) -> Self {
        Self {
            version,
            config,
            checksum: checksum::update::<&str>("", &[]),
        }
    }

    /// Create an empty, unversioned spec
    pub fn empty() -> Self {
        Self::new(None, Map::new())
    }

    /// Current checksum
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Recompute the checksum from an inherited checksum and new segments
    pub fn seal<S: AsRef<str>>(&mut self, previous: &str, segments: &[S]) {
        self.checksum = checksum::update(previous, segments);
    }

    /// Config tree as a JSON value
    pub fn config_value(&self) -> Value {
        Value::Object(self.config.clone())
    }

    /// Derive the content id of this spec
    pub fn compose_id(&self) -> String {
        let config_hash = content_hash(&self.config_value());
        match &self.version {
            Some(v) => format!(
                "{}:{}:{}-{}",
                v.name,
                v.version,
                content_hash(&Value::Object(v.schema.clone())),
                config_hash
            ),
            None => config_hash,
        }
    }
}

impl Default for ConfigSpec {
    fn default() -> Self {
        Self::empty()
    }
}
