//! ValueCell logger - process-wide logging setup
//!
//! Resolves logging settings from the environment and caller parameters and
//! installs console and rotating file sinks on a `tracing` dispatcher.
//!
//! ```no_run
//! use valuecell_logger::{setup_logger, LogSettings};
//!
//! let logger = setup_logger(&LogSettings::default())?;
//! tracing::info!("Starting application");
//! logger.shutdown()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod logging;

pub use config::{resolve_log_dir, system_env_dir, EnvSource, ProcessEnv};
pub use logging::{get_logger, setup_logger, LogLevel, LogSettings, Logger, ResolvedSettings};
