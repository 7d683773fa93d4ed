//! DDL script assets, one per phase version.

use crate::error::MigrationError;
use crate::version::Version;
use std::collections::HashMap;
use std::path::PathBuf;

/// Resolves the DDL script of a phase.
pub trait ScriptSource: Send + Sync {
    /// Script text for a version, or `None` if none is registered.
    fn script(&self, version: Version) -> Result<Option<String>, MigrationError>;
}

/// Scripts stored as `<base>/<major>.<minor>.<patch>.sql`.
#[derive(Debug, Clone)]
pub struct DirectoryScripts {
    base: PathBuf,
}

impl DirectoryScripts {
    /// Create a source rooted at a directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Path the script for a version is expected at.
    pub fn path_for(&self, version: Version) -> PathBuf {
        self.base.join(format!("{}.sql", version))
    }
}

impl ScriptSource for DirectoryScripts {
    fn script(&self, version: Version) -> Result<Option<String>, MigrationError> {
        let path = self.path_for(version);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Scripts registered in memory, e.g. with `include_str!`.
#[derive(Debug, Clone, Default)]
pub struct MemoryScripts {
    scripts: HashMap<Version, String>,
}

impl MemoryScripts {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a script.
    pub fn with_script(mut self, version: Version, script: impl Into<String>) -> Self {
        self.scripts.insert(version, script.into());
        self
    }

    /// Register a script in place.
    pub fn insert(&mut self, version: Version, script: impl Into<String>) {
        self.scripts.insert(version, script.into());
    }
}

impl ScriptSource for MemoryScripts {
    fn script(&self, version: Version) -> Result<Option<String>, MigrationError> {
        Ok(self.scripts.get(&version).cloned())
    }
}
