//! Logging system for ValueCell
//!
//! Provides a reconfigurable `tracing` pipeline with a colorized console sink
//! and two date-stamped file sinks that rotate, compress and prune their own
//! output.

mod compress;
mod file_writer;
mod format;
mod level;
mod logger;
mod non_blocking;
mod policy;
mod retention;
mod settings;
mod sink;

pub use compress::compress_file;
pub use file_writer::{RollingFileBuilder, RollingFileWriter};
pub use format::{LineFormat, PlainFields, TIME_FORMAT};
pub use level::LogLevel;
pub use logger::{get_logger, setup_logger, Logger};
pub use non_blocking::{
    NonBlocking, NonBlockingBuilder, WorkerGuard, DEFAULT_BUFFERED_LINES_LIMIT,
};
pub use policy::{Compression, Retention, Rotation};
pub use retention::apply_retention;
pub use settings::{LogSettings, ResolvedSettings, SettingsError};
pub use sink::{
    SinkConfig, SinkDestination, COMBINED_PREFIX, ERROR_PREFIX, ERROR_TEMPLATE, LINE_TEMPLATE,
};
