// src/settings.rs

//! Settings for external tool invocation
//!
//! # Example settings.toml
//!
//! ```toml
//! # HOME directory handed to every spawned tool
//! sandbox_home = "/var/lib/pkgcompose/home"
//!
//! # Seconds to wait for a tool before killing it (0 = no limit)
//! timeout_secs = 120
//!
//! # Where exchange files are created (defaults to the system temp dir)
//! temp_dir = "/var/tmp"
//!
//! [tools.nginx]
//! command = "nginx-conf render <%CONFIG% --id %ID%"
//! setup = "nginx-conf init %ID%"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Default tool timeout (5 minutes)
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Tool invocation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSettings {
    /// HOME for spawned processes
    pub sandbox_home: PathBuf,

    /// Timeout in seconds, 0 disables it
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Directory for exchange files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,

    /// Per-package tool definitions
    #[serde(default)]
    pub tools: BTreeMap<String, ToolConfig>,
}

/// External tool of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// Command template with `%ID%` / `%CONFIG%` macros
    pub command: String,

    /// One-time preparation command, `%ID%` expands to the package name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ToolSettings {
    /// Settings with defaults and no tools
    pub fn new(sandbox_home: impl Into<PathBuf>) -> Self {
        Self {
            sandbox_home: sandbox_home.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            temp_dir: None,
            tools: BTreeMap::new(),
        }
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Register a tool for a package
    pub fn with_tool(mut self, package: impl Into<String>, tool: ToolConfig) -> Self {
        self.tools.insert(package.into(), tool);
        self
    }

    /// Timeout as a duration, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Tool configured for a package
    pub fn tool(&self, package: &str) -> Option<&ToolConfig> {
        self.tools.get(package)
    }
}

impl ToolConfig {
    /// Tool without a setup step
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            setup: None,
        }
    }

    /// Add a one-time setup command
    pub fn with_setup(mut self, setup: impl Into<String>) -> Self {
        self.setup = Some(setup.into());
        self
    }
}
