// src/tool/mod.rs

//! External tool invocation
//!
//! A package may delegate part of its configuration to an external
//! program. The program is described by a command template (see
//! [`template`] for the macro syntax) and exchanges the JSON payload in one
//! of four ways, picked once when the template is parsed:
//!
//! | mode       | before spawn               | after a successful exit       |
//! |------------|----------------------------|-------------------------------|
//! | `Stdin`    | payload piped to stdin     | -                             |
//! | `Stdout`   | -                          | stdout parsed as new payload  |
//! | `TempFile` | payload written to a file  | file re-read as new payload   |
//! | `None`     | -                          | -                             |
//!
//! Every child runs with the caller's environment and `HOME` set to the
//! configured sandbox. Exchange files are removed when the call returns,
//! whatever the outcome.

mod exec;
mod registry;
pub mod template;

pub use registry::ToolRegistry;
pub use template::{CommandTemplate, TransferMode, CONFIG_MACRO, ID_MACRO};

use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::settings::ToolSettings;
use exec::{ProcessOutput, ProcessSpec};

/// A single templated call with its payload
#[derive(Debug, Clone, PartialEq)]
pub struct CliInvocation {
    /// Command template with `%ID%` / `%CONFIG%` macros
    pub template: String,
    /// Value substituted for `%ID%`
    pub id: String,
    /// Configuration exchanged with the tool, replaced when the tool produces one
    pub payload: Value,
}

impl CliInvocation {
    pub fn new(template: impl Into<String>, id: impl Into<String>, payload: Value) -> Self {
        Self {
            template: template.into(),
            id: id.into(),
            payload,
        }
    }
}

/// Runs external tools according to [`ToolSettings`]
pub struct ToolInvoker {
    settings: ToolSettings,
    registry: ToolRegistry,
    timeout: Option<Duration>,
}

impl ToolInvoker {
    /// Create an invoker with the timeout taken from the settings
    pub fn new(settings: ToolSettings) -> Self {
        Self {
            timeout: settings.timeout(),
            settings,
            registry: ToolRegistry::new(),
        }
    }

    /// Override the timeout (`None` waits indefinitely)
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Prepare the tool of `package` once: create the sandbox HOME and run
    /// its setup command
    ///
    /// Returns `true` when this call did the preparation.
    pub fn prepare(&self, package: &str) -> Result<bool> {
        let tool = self
            .settings
            .tool(package)
            .ok_or_else(|| Error::UnknownTool(package.to_string()))?;

        self.registry.prepare(package, || {
            fs::create_dir_all(&self.settings.sandbox_home)?;

            let Some(setup) = &tool.setup else {
                return Ok(());
            };
            let command = CommandTemplate::parse(setup, package)?;
            if command.mode() != TransferMode::None {
                return Err(Error::Template {
                    template: setup.clone(),
                    reason: format!("setup commands cannot use {}", CONFIG_MACRO),
                });
            }

            let label = command.to_string();
            info!("Running setup for package {}: {}", package, label);
            self.execute(&label, command.resolve(None), None)?;
            Ok(())
        })
    }

    /// Run the tool configured for `package`, preparing it first
    pub fn invoke(&self, package: &str, id: &str, payload: &mut Value) -> Result<TransferMode> {
        let tool = self
            .settings
            .tool(package)
            .ok_or_else(|| Error::UnknownTool(package.to_string()))?;

        self.prepare(package)?;
        self.exchange(&tool.command, id, payload)
    }

    /// Run an explicit invocation; no package preparation takes place
    pub fn run(&self, invocation: &mut CliInvocation) -> Result<TransferMode> {
        self.exchange(&invocation.template, &invocation.id, &mut invocation.payload)
    }

    fn exchange(&self, template: &str, id: &str, payload: &mut Value) -> Result<TransferMode> {
        let command = CommandTemplate::parse(template, id)?;
        let mode = command.mode();
        let label = command.to_string();
        debug!("Command '{}' uses {} transfer", label, mode);
        info!("Running external tool: {}", label);

        match mode {
            TransferMode::Stdin => {
                let input = serde_json::to_vec(payload)?;
                self.execute(&label, command.resolve(None), Some(&input))?;
            }
            TransferMode::Stdout => {
                let output = self.execute(&label, command.resolve(None), None)?;
                *payload = reload("stdout", &output.stdout)?;
            }
            TransferMode::TempFile => {
                // Removed on drop, on every path out of this block
                let mut file = self.exchange_file()?;
                serde_json::to_writer(&mut file, payload)?;
                file.flush()?;

                self.execute(&label, command.resolve(Some(file.path())), None)?;

                let contents = fs::read(file.path())?;
                *payload = reload("tempfile", &contents)?;
            }
            TransferMode::None => {
                self.execute(&label, command.resolve(None), None)?;
            }
        }

        info!("External tool completed: {}", label);
        Ok(mode)
    }

    fn exchange_file(&self) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pkgcompose-").suffix(".json");
        let file = match &self.settings.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        debug!("Exchange file: {}", file.path().display());
        Ok(file)
    }

    fn execute(&self, label: &str, argv: Vec<OsString>, stdin: Option<&[u8]>) -> Result<ProcessOutput> {
        exec::run(ProcessSpec {
            label,
            argv,
            home: &self.settings.sandbox_home,
            stdin,
            timeout: self.timeout,
        })
    }
}

fn reload(origin: &'static str, bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(|source| Error::ConfigReload { origin, source })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::settings::ToolConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn invoker(root: &TempDir) -> ToolInvoker {
        let exchange = root.path().join("exchange");
        fs::create_dir_all(&exchange).unwrap();
        let mut settings = ToolSettings::new(root.path().join("home"));
        settings.temp_dir = Some(exchange);
        ToolInvoker::new(settings)
    }

    fn exchange_files(root: &TempDir) -> usize {
        fs::read_dir(root.path().join("exchange")).unwrap().count()
    }

    #[test]
    fn test_timeout_from_settings() {
        let mut settings = ToolSettings::new("/tmp");
        settings.timeout_secs = 7;
        let invoker = ToolInvoker::new(settings);
        assert_eq!(invoker.timeout, Some(Duration::from_secs(7)));

        let invoker = invoker.with_timeout(None);
        assert_eq!(invoker.timeout, None);
    }

    #[test]
    fn test_stdout_capture_replaces_payload() {
        let root = TempDir::new().unwrap();
        let mut invocation = CliInvocation::new("/bin/echo {\"port\":%ID%} >%CONFIG%", "8080", json!({}));

        let mode = invoker(&root).run(&mut invocation).unwrap();
        assert_eq!(mode, TransferMode::Stdout);
        assert_eq!(invocation.payload, json!({"port": 8080}));
    }

    #[test]
    fn test_stdout_not_json_is_reload_error() {
        let root = TempDir::new().unwrap();
        let mut invocation = CliInvocation::new("/bin/echo not-json >%CONFIG%", "x", json!({"keep": 1}));

        let err = invoker(&root).run(&mut invocation).unwrap_err();
        assert!(matches!(err, Error::ConfigReload { origin: "stdout", .. }));
        assert_eq!(invocation.payload, json!({"keep": 1}));
    }

    #[test]
    fn test_tempfile_round_trip_unchanged_and_removed() {
        let root = TempDir::new().unwrap();
        let payload = json!({"a": {"b": [1, 2]}});
        let mut invocation = CliInvocation::new("/bin/true %CONFIG%", "x", payload.clone());

        let mode = invoker(&root).run(&mut invocation).unwrap();
        assert_eq!(mode, TransferMode::TempFile);
        assert_eq!(invocation.payload, payload);
        assert_eq!(exchange_files(&root), 0);
    }

    #[test]
    fn test_tempfile_removed_on_failure() {
        let root = TempDir::new().unwrap();
        let mut invocation = CliInvocation::new("/bin/false %CONFIG%", "x", json!({}));

        let err = invoker(&root).run(&mut invocation).unwrap_err();
        assert!(matches!(err, Error::Process { .. }));
        assert_eq!(exchange_files(&root), 0);
    }

    #[test]
    fn test_invoke_unknown_tool() {
        let root = TempDir::new().unwrap();
        let err = invoker(&root)
            .invoke("missing", "id", &mut json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTool(ref p) if p == "missing"));
    }

    #[test]
    fn test_prepare_creates_sandbox_once() {
        let root = TempDir::new().unwrap();
        let mut settings = ToolSettings::new(root.path().join("home"));
        settings = settings.with_tool("app", ToolConfig::new("/bin/true"));
        let invoker = ToolInvoker::new(settings);

        assert!(invoker.prepare("app").unwrap());
        assert!(root.path().join("home").is_dir());
        assert!(!invoker.prepare("app").unwrap());
        assert!(invoker.registry().is_prepared("app"));
    }

    #[test]
    fn test_setup_cannot_exchange_config() {
        let root = TempDir::new().unwrap();
        let settings = ToolSettings::new(root.path().join("home")).with_tool(
            "app",
            ToolConfig::new("/bin/true").with_setup("/bin/true %CONFIG%"),
        );
        let invoker = ToolInvoker::new(settings);

        let err = invoker.prepare("app").unwrap_err();
        assert!(matches!(err, Error::Template { .. }));
        assert!(!invoker.registry().is_prepared("app"));
    }
}
