//! Sink descriptions and the `tracing` layers built from them

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{Layer, Registry};

use super::file_writer::RollingFileBuilder;
use super::format::{LineFormat, PlainFields};
use super::level::LogLevel;
use super::non_blocking::{NonBlockingBuilder, WorkerGuard};
use super::policy::{Compression, Retention, Rotation};
use super::settings::ResolvedSettings;

/// File name prefix of the combined sink
pub const COMBINED_PREFIX: &str = "valuecell";
/// File name prefix of the error sink
pub const ERROR_PREFIX: &str = "error";

/// Layout of console and combined-file lines
pub const LINE_TEMPLATE: &str =
    "{time:YYYY-MM-DD HH:mm:ss} | {level: <8} | {name}:{function}:{line} - {message}";
/// Layout of error-file lines: the line followed by span diagnostics and a backtrace
pub const ERROR_TEMPLATE: &str =
    "{time:YYYY-MM-DD HH:mm:ss} | {level: <8} | {name}:{function}:{line} - {message}\n{exception}";

pub(crate) type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Where a sink writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkDestination {
    /// Colorized standard error
    Stderr,
    /// `<dir>/<prefix>_<YYYY-MM-DD>.log`
    File { dir: PathBuf, prefix: String },
}

impl fmt::Display for SinkDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkDestination::Stderr => write!(f, "stderr"),
            SinkDestination::File { dir, prefix } => {
                write!(f, "{}", dir.join(format!("{prefix}_{{time}}.log")).display())
            }
        }
    }
}

/// An immutable description of one registered sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    pub destination: SinkDestination,
    pub min_level: LogLevel,
    pub template: &'static str,
    pub rotation: Rotation,
    pub retention: Retention,
    pub compression: Compression,
    /// Writes go through a background worker thread
    pub asynchronous: bool,
    /// Span diagnostics and a backtrace follow ERROR lines
    pub diagnose: bool,
}

impl SinkConfig {
    /// Colorized stderr at `level`
    pub fn console(level: LogLevel) -> Self {
        Self {
            destination: SinkDestination::Stderr,
            min_level: level,
            template: LINE_TEMPLATE,
            rotation: Rotation::Never,
            retention: Retention::Forever,
            compression: Compression::None,
            asynchronous: false,
            diagnose: false,
        }
    }

    /// Everything at DEBUG and above, in `valuecell_<date>.log`
    pub fn combined_file(dir: &Path, settings: &ResolvedSettings) -> Self {
        Self {
            destination: SinkDestination::File {
                dir: dir.to_path_buf(),
                prefix: COMBINED_PREFIX.to_string(),
            },
            min_level: LogLevel::Debug,
            template: LINE_TEMPLATE,
            rotation: settings.rotation.clone(),
            retention: settings.retention.clone(),
            compression: settings.compression,
            asynchronous: true,
            diagnose: false,
        }
    }

    /// ERROR only, in `error_<date>.log`, with diagnostics
    pub fn error_file(dir: &Path, settings: &ResolvedSettings) -> Self {
        Self {
            destination: SinkDestination::File {
                dir: dir.to_path_buf(),
                prefix: ERROR_PREFIX.to_string(),
            },
            min_level: LogLevel::Error,
            template: ERROR_TEMPLATE,
            rotation: settings.rotation.clone(),
            retention: settings.retention.clone(),
            compression: settings.compression,
            asynchronous: true,
            diagnose: true,
        }
    }

    /// Build the layer for this sink, plus the guard owning its writer thread
    pub(crate) fn build(&self) -> io::Result<(BoxedLayer, Option<WorkerGuard>)> {
        let max_level = self.min_level.as_tracing();
        let format = LineFormat::new()
            .with_max_level(LevelFilter::from_level(max_level))
            .with_diagnostics(self.diagnose)
            .with_backtrace(self.diagnose);

        match &self.destination {
            SinkDestination::Stderr => {
                let layer: BoxedLayer = tracing_subscriber::fmt::layer()
                    .event_format(format)
                    .with_ansi(true)
                    .with_writer(std::io::stderr.with_max_level(max_level))
                    .boxed();
                Ok((layer, None))
            }
            SinkDestination::File { dir, prefix } => {
                let file = RollingFileBuilder::new(dir, prefix.as_str())
                    .rotation(self.rotation.clone())
                    .retention(self.retention.clone())
                    .compression(self.compression)
                    .build()?;
                let (writer, guard) = NonBlockingBuilder::default()
                    .thread_name(format!("valuecell-log-{prefix}"))
                    .finish(file)?;
                let layer: BoxedLayer = tracing_subscriber::fmt::layer()
                    .fmt_fields(PlainFields::new())
                    .event_format(format)
                    .with_ansi(false)
                    .with_writer(writer.with_max_level(max_level))
                    .boxed();
                Ok((layer, Some(guard)))
            }
        }
    }
}
