//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings applied when an [`Engine`](crate::Engine) starts.
///
/// Every field is optional; unset limits leave the runtime defaults in
/// place.
///
/// # Example
/// ```
/// use script_engine::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{ "memory_limit": 33554432 }"#).unwrap();
/// assert_eq!(config.memory_limit, Some(32 * 1024 * 1024));
///
/// let config = EngineConfig::default().with_max_stack_size(512 * 1024);
/// assert_eq!(config.max_stack_size, Some(512 * 1024));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path of the running executable, used to locate runtime resources.
    /// Defaults to the current executable.
    pub executable_path: Option<PathBuf>,
    /// Heap limit in bytes
    pub memory_limit: Option<usize>,
    /// Native stack limit in bytes
    pub max_stack_size: Option<usize>,
    /// Allocation volume in bytes that triggers a collection
    pub gc_threshold: Option<usize>,
}

impl EngineConfig {
    /// Parse a configuration from JSON.
    ///
    /// # Errors
    /// Returns the `serde_json` error when the document is malformed or a
    /// field has the wrong type.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the executable path
    pub fn with_executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// Set the heap limit
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Set the native stack limit
    pub fn with_max_stack_size(mut self, bytes: usize) -> Self {
        self.max_stack_size = Some(bytes);
        self
    }

    /// Set the collection threshold
    pub fn with_gc_threshold(mut self, bytes: usize) -> Self {
        self.gc_threshold = Some(bytes);
        self
    }

    /// The configured executable path, falling back to the running binary.
    pub(crate) fn resolve_executable(&self) -> Option<PathBuf> {
        self.executable_path
            .clone()
            .or_else(|| std::env::current_exe().ok())
    }
}

/// Returns the directory containing `executable`, if it has one.
pub(crate) fn executable_dir(executable: &Path) -> Option<&Path> {
    executable.parent().filter(|dir| !dir.as_os_str().is_empty())
}
