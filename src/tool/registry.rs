// src/tool/registry.rs

//! Per-package preparation cache
//!
//! Remembers which packages have had their tool prepared. The first
//! `prepare` for a key runs the setup closure while holding that key's lock,
//! so concurrent first calls run setup once and the rest wait for it. A
//! failed setup leaves the key unprepared and the next call retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::Result;

/// Thread-safe record of prepared tools, keyed by package name
#[derive(Debug, Default)]
pub struct ToolRegistry {
    entries: Mutex<HashMap<String, Arc<Mutex<bool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `setup` unless `package` is already prepared
    ///
    /// Returns `true` when this call performed the preparation.
    pub fn prepare<F>(&self, package: &str, setup: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        let slot = self.slot(package);
        let mut prepared = lock(&slot);
        if *prepared {
            return Ok(false);
        }

        debug!("Preparing tool for package {}", package);
        setup()?;
        *prepared = true;
        Ok(true)
    }

    /// Whether `package` has been prepared
    pub fn is_prepared(&self, package: &str) -> bool {
        let Some(slot) = lock(&self.entries).get(package).cloned() else {
            return false;
        };
        *lock(&slot)
    }

    /// Forget every prepared package
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    fn slot(&self, package: &str) -> Arc<Mutex<bool>> {
        let mut entries = lock(&self.entries);
        Arc::clone(entries.entry(package.to_string()).or_default())
    }
}

// The guarded values stay consistent even if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
