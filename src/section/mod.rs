// src/section/mod.rs

//! Path-addressed configuration sections
//!
//! A section places one payload at a dotted path, e.g. `server.tls.ciphers`.
//! All segments but the last form the walk-prefix and must resolve through
//! mapping nodes; the last segment is the target key.
//!
//! Payload kinds:
//! - `json`: an embedded JSON number, boolean, string, array or object
//! - `list`: strings, optionally autotyped, kept in order
//! - `map`: string values keyed by name, optionally autotyped
//!
//! Sections are merged in submission order, so a later section wins on a
//! scalar target and deep-merges into a mapping target.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::autotype;
use crate::error::{Error, Result};
use crate::merge::{self, Tree};

/// Section as supplied by the resource runtime
///
/// Exactly one of `json`, `list`, `map` must be set; [`Section::from_raw`]
/// enforces that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSection {
    /// Dot-separated target path
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<BTreeMap<String, String>>,
}

/// Validated section payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionPayload {
    Json(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl SectionPayload {
    /// Payload kind name as used in raw input
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

/// A validated section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub path: String,
    pub payload: SectionPayload,
}

impl Section {
    /// Create a section from a path and payload
    pub fn new(path: impl Into<String>, payload: SectionPayload) -> Self {
        Self {
            path: path.into(),
            payload,
        }
    }

    /// Section with an embedded JSON payload
    pub fn json(path: impl Into<String>, json: impl Into<String>) -> Self {
        Self::new(path, SectionPayload::Json(json.into()))
    }

    /// Section with a list payload
    pub fn list<I, S>(path: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            path,
            SectionPayload::List(items.into_iter().map(Into::into).collect()),
        )
    }

    /// Section with a map payload
    pub fn map<I, K, V>(path: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            path,
            SectionPayload::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        )
    }

    /// Validate a raw section: exactly one payload kind must be populated
    pub fn from_raw(raw: RawSection) -> Result<Self> {
        let found = usize::from(raw.json.is_some())
            + usize::from(raw.list.is_some())
            + usize::from(raw.map.is_some());

        let payload = match (raw.json, raw.list, raw.map) {
            (Some(json), None, None) => SectionPayload::Json(json),
            (None, Some(list), None) => SectionPayload::List(list),
            (None, None, Some(map)) => SectionPayload::Map(map),
            _ => {
                return Err(Error::MissingPayload {
                    path: raw.path,
                    found,
                });
            }
        };

        Ok(Self {
            path: raw.path,
            payload,
        })
    }

    /// Split the path into walk-prefix and target key
    pub fn split_path(&self) -> Result<(Vec<&str>, &str)> {
        let mut segments: Vec<&str> = self.path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidPath {
                path: self.path.clone(),
            });
        }
        // split() always yields at least one element
        let target = segments.pop().unwrap_or_default();
        Ok((segments, target))
    }

    /// Resolve the payload into a JSON value
    pub fn resolve(&self, autotype: bool) -> Result<Value> {
        match &self.payload {
            SectionPayload::Json(raw) => parse_json_payload(&self.path, raw),
            SectionPayload::List(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| autotype::convert(item, autotype))
                    .collect(),
            )),
            SectionPayload::Map(entries) => Ok(Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), autotype::convert(v, autotype)))
                    .collect(),
            )),
        }
    }
}

impl TryFrom<RawSection> for Section {
    type Error = Error;

    fn try_from(raw: RawSection) -> Result<Self> {
        Self::from_raw(raw)
    }
}

/// Accept a number, boolean, string, array or object; anything else fails
fn parse_json_payload(path: &str, raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).map_err(|e| Error::InvalidJson {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    match value {
        Value::Null => Err(Error::InvalidJson {
            path: path.to_string(),
            reason: "null is not an accepted section value".to_string(),
        }),
        value => Ok(value),
    }
}

/// Build the tree fragment for a single section
pub fn section_to_tree(section: &Section, autotype: bool) -> Result<Tree> {
    let mut root = Map::new();
    place(&mut root, section, autotype)?;
    Ok(root)
}

/// Walk (creating mappings as needed) to the section's target and set it
fn place(root: &mut Tree, section: &Section, autotype: bool) -> Result<()> {
    let (prefix, target) = section.split_path()?;
    let mut node = root;

    for (depth, segment) in prefix.iter().enumerate() {
        let child = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        node = match child {
            Value::Object(map) => map,
            _ => {
                return Err(Error::PathConflict {
                    path: section.path.clone(),
                    walked: prefix[..=depth].join("."),
                });
            }
        };
    }

    node.insert(target.to_string(), section.resolve(autotype)?);
    Ok(())
}

/// Check the section's walk-prefix against an existing tree
fn check_prefix(tree: &Tree, section: &Section) -> Result<()> {
    let (prefix, _) = section.split_path()?;
    let mut node = tree;

    for (depth, segment) in prefix.iter().enumerate() {
        match node.get(*segment) {
            Some(Value::Object(map)) => node = map,
            Some(_) => {
                return Err(Error::PathConflict {
                    path: section.path.clone(),
                    walked: prefix[..=depth].join("."),
                });
            }
            None => return Ok(()),
        }
    }
    Ok(())
}

/// Fold all sections, in submission order, into one tree
///
/// The first failing section aborts the fold; its error is wrapped with
/// the section index and no partial tree is returned.
pub fn merge_sections(sections: &[Section], autotype: bool) -> Result<Tree> {
    let mut tree = Map::new();

    for (index, section) in sections.iter().enumerate() {
        check_prefix(&tree, section).map_err(|e| e.in_section(index))?;
        let fragment = section_to_tree(section, autotype).map_err(|e| e.in_section(index))?;
        merge::merge_into(&mut tree, fragment);
        debug!(
            "Merged {} section {} at '{}'",
            section.payload.kind(),
            index,
            section.path
        );
    }

    Ok(tree)
}

/// Validate raw sections and merge them
pub fn merge_raw_sections(raw: Vec<RawSection>, autotype: bool) -> Result<Tree> {
    let sections = raw
        .into_iter()
        .enumerate()
        .map(|(index, raw)| Section::from_raw(raw).map_err(|e| e.in_section(index)))
        .collect::<Result<Vec<_>>>()?;
    merge_sections(&sections, autotype)
}
