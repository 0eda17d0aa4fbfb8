//! Environment lookups and log directory resolution

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Overrides the computed log directory
pub const LOG_DIR_ENV: &str = "LOG_DIR";
/// Overrides the minimum console level
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
/// Overrides the rotation rule of the file sinks
pub const LOG_ROTATION_ENV: &str = "LOG_ROTATION";
/// Overrides the retention rule of the file sinks
pub const LOG_RETENTION_ENV: &str = "LOG_RETENTION";

/// Source of environment variables.
///
/// Production code reads the process environment through [`ProcessEnv`];
/// tests hand in a `HashMap` so they never touch global state.
pub trait EnvSource {
    /// Raw value of `key`, if set
    fn var(&self, key: &str) -> Option<String>;

    /// Value of `key`, treating an empty string as unset
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|value| !value.is_empty())
    }
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Get the ValueCell system environment directory (<config dir>/valuecell)
/// Falls back to ./.valuecell if no config directory can be determined
pub fn system_env_dir() -> PathBuf {
    try_system_env_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine config directory, using current directory for logs");
        PathBuf::from(".valuecell")
    })
}

/// Try to get the system environment directory, returning None if the platform has none
pub fn try_system_env_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("valuecell"))
}

/// Get the log directory: `LOG_DIR` if set, otherwise `<system env dir>/logs`
pub fn resolve_log_dir() -> PathBuf {
    resolve_log_dir_from(&ProcessEnv, &system_env_dir())
}

/// Resolve the log directory against an explicit environment and base directory
pub fn resolve_log_dir_from(env: &dyn EnvSource, system_env_dir: &Path) -> PathBuf {
    match env.non_empty(LOG_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => system_env_dir.join("logs"),
    }
}

/// Ensure the log directory exists, creating parents as needed
pub fn ensure_log_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))
}
