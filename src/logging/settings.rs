//! Caller-facing logging settings and their environment-aware resolution
//!
//! Precedence, highest first:
//!
//! 1. `LOG_LEVEL`, `LOG_ROTATION`, `LOG_RETENTION` (when set and non-empty)
//! 2. the values in [`LogSettings`]
//! 3. [`LogSettings::default`]
//!
//! The log directory follows its own chain: an explicit `log_dir`, then
//! `LOG_DIR`, then `<system env dir>/logs`.

use std::path::{Path, PathBuf};

use crate::config::{
    resolve_log_dir_from, system_env_dir, EnvSource, ProcessEnv, LOG_LEVEL_ENV,
    LOG_RETENTION_ENV, LOG_ROTATION_ENV,
};

use super::level::LogLevel;
use super::policy::{Compression, Retention, Rotation};

/// A settings string that could not be understood
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),
    #[error("Invalid rotation rule '{0}'")]
    InvalidRotation(String),
    #[error("Invalid retention rule '{0}'")]
    InvalidRetention(String),
    #[error("Unsupported compression '{0}'")]
    InvalidCompression(String),
}

/// Logging parameters as passed by the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Minimum level of the console sink (default: INFO)
    pub log_level: String,
    /// Directory for log files; resolved from the environment when None
    pub log_dir: Option<PathBuf>,
    /// Rotation rule for file sinks (default: 10 MB)
    pub rotation: String,
    /// Retention rule for file sinks (default: 30 days)
    pub retention: String,
    /// Compression of closed files (default: zip)
    pub compression: String,
    /// Register the stderr sink
    pub enable_console: bool,
    /// Register the combined and error file sinks
    pub enable_file: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            log_dir: None,
            rotation: "10 MB".to_string(),
            retention: "30 days".to_string(),
            compression: "zip".to_string(),
            enable_console: true,
            enable_file: true,
        }
    }
}

/// Fully resolved, immutable logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    /// Console level; None only when the console is off and the name is unknown
    pub level: Option<LogLevel>,
    /// The level as configured, upper-cased
    pub level_name: String,
    /// Set exactly when file output is enabled
    pub log_dir: Option<PathBuf>,
    pub rotation: Rotation,
    pub retention: Retention,
    pub compression: Compression,
    pub enable_console: bool,
    pub enable_file: bool,
}

impl LogSettings {
    /// Resolve against the process environment
    pub fn resolve(&self) -> Result<ResolvedSettings, SettingsError> {
        self.resolve_with(&ProcessEnv, &system_env_dir())
    }

    /// Resolve against an explicit environment and system environment directory
    pub fn resolve_with(
        &self,
        env: &dyn EnvSource,
        system_env_dir: &Path,
    ) -> Result<ResolvedSettings, SettingsError> {
        let level = env
            .non_empty(LOG_LEVEL_ENV)
            .unwrap_or_else(|| self.log_level.clone());
        let rotation = env
            .non_empty(LOG_ROTATION_ENV)
            .unwrap_or_else(|| self.rotation.clone());
        let retention = env
            .non_empty(LOG_RETENTION_ENV)
            .unwrap_or_else(|| self.retention.clone());

        let level_name = level.trim().to_uppercase();
        // Only the console sink uses the level
        let level = match level.parse::<LogLevel>() {
            Ok(level) => Some(level),
            Err(err) if self.enable_console => return Err(err),
            Err(_) => None,
        };

        let log_dir = if self.enable_file {
            Some(
                self.log_dir
                    .clone()
                    .unwrap_or_else(|| resolve_log_dir_from(env, system_env_dir)),
            )
        } else {
            None
        };

        Ok(ResolvedSettings {
            level,
            level_name,
            log_dir,
            rotation: rotation.parse()?,
            retention: retention.parse()?,
            compression: self.compression.parse()?,
            enable_console: self.enable_console,
            enable_file: self.enable_file,
        })
    }
}
