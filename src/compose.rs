// src/compose.rs

//! Composition pipeline
//!
//! Turns one request into a sealed [`ConfigSpec`]:
//!
//! 1. validate and merge the sections (submission order)
//! 2. deep-merge the result onto the `extend` spec, if any, inheriting its
//!    version and carrying its checksum as the chain's previous value
//! 3. run the package's external tool over the config, if requested
//! 4. seal the checksum
//!
//! Checksum inputs are validated before any tool runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::checksum;
use crate::error::{Error, Result};
use crate::merge;
use crate::model::{ConfigSpec, PackageVersion, WireMap, FIELD_CONFIG};
use crate::section::{self, RawSection};
use crate::tool::ToolInvoker;

/// Run the external tool of `package` over the composed config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformStep {
    pub package: String,
}

/// Everything needed to compose one configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeRequest {
    /// Sections in submission order
    pub sections: Vec<RawSection>,

    /// Infer primitive types for `list`/`map` section values
    pub autotype: bool,

    /// Previously stored spec (wire form) to build upon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extend: Option<WireMap>,

    /// Package identity; inherited from `extend` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<PackageVersion>,

    /// Opaque checksum tokens, must all be strings
    pub checksum_inputs: Vec<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformStep>,
}

impl ComposeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, section: RawSection) -> Self {
        self.sections.push(section);
        self
    }

    pub fn with_autotype(mut self, autotype: bool) -> Self {
        self.autotype = autotype;
        self
    }

    pub fn with_extend(mut self, wire: WireMap) -> Self {
        self.extend = Some(wire);
        self
    }

    pub fn with_version(mut self, version: PackageVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_checksum_input(mut self, token: impl Into<Value>) -> Self {
        self.checksum_inputs.push(token.into());
        self
    }

    pub fn with_transform(mut self, package: impl Into<String>) -> Self {
        self.transform = Some(TransformStep {
            package: package.into(),
        });
        self
    }
}

/// Composes requests, optionally running external tools
#[derive(Default)]
pub struct Composer<'a> {
    invoker: Option<&'a ToolInvoker>,
}

impl<'a> Composer<'a> {
    /// Composer without tool support; transform steps fail
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invoker(invoker: &'a ToolInvoker) -> Self {
        Self {
            invoker: Some(invoker),
        }
    }

    /// Run the full pipeline
    pub fn compose(&self, request: ComposeRequest) -> Result<ConfigSpec> {
        let ComposeRequest {
            sections,
            autotype,
            extend,
            version,
            checksum_inputs,
            transform,
        } = request;

        let segments = checksum::string_segments(&checksum_inputs)?;

        let count = sections.len();
        let tree = section::merge_raw_sections(sections, autotype)?;
        debug!("Merged {} sections", count);

        let (previous, inherited, config) = match extend {
            Some(wire) => {
                let base = ConfigSpec::from_wire(&wire)?;
                let previous = base.checksum().to_string();
                debug!("Extending spec with checksum {}", previous);
                (previous, base.version, merge::merge(base.config, tree))
            }
            None => (String::new(), None, tree),
        };

        let mut spec = ConfigSpec::new(version.or(inherited), config);

        if let Some(step) = transform {
            self.transform(&mut spec, &step.package)?;
        }

        spec.seal(&previous, &segments);
        Ok(spec)
    }

    /// Hand the config to the package's tool, keyed by the current compose id
    fn transform(&self, spec: &mut ConfigSpec, package: &str) -> Result<()> {
        let invoker = self
            .invoker
            .ok_or_else(|| Error::UnknownTool(package.to_string()))?;

        let id = spec.compose_id();
        let mut payload = spec.config_value();
        invoker.invoke(package, &id, &mut payload)?;

        match payload {
            Value::Object(config) => {
                spec.config = config;
                Ok(())
            }
            other => Err(Error::FieldType {
                field: FIELD_CONFIG,
                reason: format!("external tool returned a non-mapping value: {other}"),
            }),
        }
    }
}
