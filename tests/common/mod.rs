// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use pkgcompose::{ToolConfig, ToolInvoker, ToolSettings};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Sandbox for tool tests: a HOME directory, an exchange directory for temp
/// files and a place for helper scripts.
///
/// Keep the fixture alive for the duration of the test to prevent cleanup.
pub struct ToolFixture {
    pub root: TempDir,
}

impl ToolFixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("exchange")).unwrap();
        fs::create_dir_all(root.path().join("scripts")).unwrap();
        Self { root }
    }

    pub fn home(&self) -> PathBuf {
        self.root.path().join("home")
    }

    pub fn exchange_dir(&self) -> PathBuf {
        self.root.path().join("exchange")
    }

    /// Write a shell script and return a command prefix running it.
    ///
    /// Scripts are run through `/bin/sh` so they need no exec bit.
    pub fn script(&self, name: &str, body: &str) -> String {
        let path = self.root.path().join("scripts").join(format!("{name}.sh"));
        fs::write(&path, body).unwrap();
        format!("/bin/sh {}", path.display())
    }

    /// Settings with no tools, pointing at this fixture's directories
    pub fn settings(&self) -> ToolSettings {
        let mut settings = ToolSettings::new(self.home());
        settings.temp_dir = Some(self.exchange_dir());
        settings
    }

    /// Invoker with a single tool registered for `package`
    pub fn invoker_with(&self, package: &str, tool: ToolConfig) -> ToolInvoker {
        ToolInvoker::new(self.settings().with_tool(package, tool))
    }

    /// Number of files left in the exchange directory
    pub fn exchange_files(&self) -> usize {
        fs::read_dir(self.exchange_dir()).unwrap().count()
    }

    /// Read a file relative to the fixture root
    pub fn read(&self, relative: impl AsRef<Path>) -> String {
        fs::read_to_string(self.root.path().join(relative)).unwrap()
    }
}
