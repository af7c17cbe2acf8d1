// src/model/wire.rs

//! Flat wire format of the remote config store
//!
//! | field     | meaning |
//! |-----------|---------|
//! | `config`  | JSON-encoded mapping, the composed tree |
//! | `package` | package name, only together with `version`/`schema` |
//! | `version` | package version string |
//! | `schema`  | JSON-encoded mapping, the package schema |
//! | `csum`    | hex SHA-256 checksum |

use serde_json::Value;
use std::collections::BTreeMap;

use super::{ConfigSpec, PackageVersion};
use crate::error::{Error, Result};
use crate::merge::Tree;

/// Flat string-keyed wire representation
pub type WireMap = BTreeMap<String, String>;

pub const FIELD_CONFIG: &str = "config";
pub const FIELD_PACKAGE: &str = "package";
pub const FIELD_VERSION: &str = "version";
pub const FIELD_SCHEMA: &str = "schema";
pub const FIELD_CSUM: &str = "csum";

const KNOWN_FIELDS: [&str; 5] = [
    FIELD_CONFIG,
    FIELD_PACKAGE,
    FIELD_VERSION,
    FIELD_SCHEMA,
    FIELD_CSUM,
];

impl ConfigSpec {
    /// Serialize into the flat wire map
    ///
    /// Version fields are flattened into the same map and written last, so
    /// they win over any base field of the same name.
    pub fn to_wire(&self) -> WireMap {
        let mut wire = WireMap::new();
        wire.insert(FIELD_CONFIG.to_string(), self.config_value().to_string());

        if let Some(version) = &self.version {
            wire.insert(FIELD_PACKAGE.to_string(), version.name.clone());
            wire.insert(FIELD_VERSION.to_string(), version.version.clone());
            wire.insert(
                FIELD_SCHEMA.to_string(),
                Value::Object(version.schema.clone()).to_string(),
            );
        }

        wire.insert(FIELD_CSUM.to_string(), self.checksum.clone());
        wire
    }

    /// Deserialize from the flat wire map
    pub fn from_wire(wire: &WireMap) -> Result<Self> {
        let config = parse_mapping(FIELD_CONFIG, required_field(wire, FIELD_CONFIG)?)?;
        let checksum = required_field(wire, FIELD_CSUM)?.to_string();

        Ok(Self {
            version: parse_version(wire)?,
            config,
            checksum,
        })
    }

    /// Deserialize from a loosely typed JSON object
    ///
    /// Every known field that is present must be a string. Unknown fields
    /// are ignored.
    pub fn from_wire_value(value: &Value) -> Result<Self> {
        let Value::Object(object) = value else {
            return Err(Error::FieldType {
                field: "wire",
                reason: "expected an object of string fields".to_string(),
            });
        };

        let mut wire = WireMap::new();
        for field in KNOWN_FIELDS {
            match object.get(field) {
                None => {}
                Some(Value::String(s)) => {
                    wire.insert(field.to_string(), s.clone());
                }
                Some(other) => {
                    return Err(Error::FieldType {
                        field,
                        reason: format!("expected string, found {other}"),
                    });
                }
            }
        }

        Self::from_wire(&wire)
    }
}

/// `config` and `csum` must be present as strings
fn required_field<'a>(wire: &'a WireMap, field: &'static str) -> Result<&'a str> {
    wire.get(field)
        .map(String::as_str)
        .ok_or_else(|| Error::FieldType {
            field,
            reason: "expected a string, field is missing".to_string(),
        })
}

/// The `package`/`version`/`schema` group: all or nothing
fn parse_version(wire: &WireMap) -> Result<Option<PackageVersion>> {
    let Some(name) = wire.get(FIELD_PACKAGE).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let version = required_version_field(wire, FIELD_VERSION)?;
    let schema = required_version_field(wire, FIELD_SCHEMA)?;

    Ok(Some(PackageVersion {
        name: name.clone(),
        version: version.to_string(),
        schema: parse_mapping(FIELD_SCHEMA, schema)?,
    }))
}

fn required_version_field<'a>(wire: &'a WireMap, field: &'static str) -> Result<&'a str> {
    wire.get(field)
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(Error::MissingVersionField { field })
}

fn parse_mapping(field: &'static str, raw: &str) -> Result<Tree> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::FieldType {
            field,
            reason: "expected a JSON-encoded mapping".to_string(),
        }),
        Err(e) => Err(Error::FieldType {
            field,
            reason: format!("malformed JSON: {e}"),
        }),
    }
}
