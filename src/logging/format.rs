//! Line layout shared by every sink
//!
//! `2026-01-21 14:30:45 | INFO     | valuecell::agent:run:42 - message`
//!
//! The function slot holds the innermost span name (the function name for
//! `#[instrument]`ed code), or `-` outside any span.

use std::fmt;

use chrono::Local;
use colored::{Color, Colorize};
use tracing::{Event, Subscriber};
use tracing_subscriber::field::RecordFields;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

use super::level::LogLevel;

/// Timestamp layout of every line
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Event formatter producing `time | LEVEL | name:function:line - message`
#[derive(Debug, Clone, Copy)]
pub struct LineFormat {
    max_level: LevelFilter,
    diagnose: bool,
    backtrace: bool,
}

impl Default for LineFormat {
    fn default() -> Self {
        Self {
            max_level: LevelFilter::TRACE,
            diagnose: false,
            backtrace: false,
        }
    }
}

impl LineFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce nothing for events more verbose than `max_level`
    pub fn with_max_level(mut self, max_level: LevelFilter) -> Self {
        self.max_level = max_level;
        self
    }

    /// Append the chain of enclosing spans and their fields to each line
    pub fn with_diagnostics(mut self, diagnose: bool) -> Self {
        self.diagnose = diagnose;
        self
    }

    /// Append a captured backtrace to ERROR lines
    pub fn with_backtrace(mut self, backtrace: bool) -> Self {
        self.backtrace = backtrace;
        self
    }
}

fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Trace => Color::Cyan,
        LogLevel::Debug => Color::Blue,
        LogLevel::Info => Color::White,
        LogLevel::Warning => Color::Yellow,
        LogLevel::Error => Color::Red,
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        if *meta.level() > self.max_level {
            return Ok(());
        }
        let level = LogLevel::from(*meta.level());
        let timestamp = Local::now().format(TIME_FORMAT).to_string();
        let function = ctx
            .event_scope()
            .and_then(|mut scope| scope.next())
            .map(|span| span.name())
            .unwrap_or("-");
        let location = format!(
            "{}:{}:{}",
            meta.target(),
            function,
            meta.line().unwrap_or(0)
        );
        let padded_level = format!("{:<8}", level);

        if writer.has_ansi_escapes() {
            let mut level_text = padded_level.color(level_color(level));
            if level >= LogLevel::Info {
                level_text = level_text.bold();
            }
            write!(
                writer,
                "{} | {} | {} - ",
                timestamp.green(),
                level_text,
                location.cyan()
            )?;
        } else {
            write!(writer, "{} | {} | {} - ", timestamp, padded_level, location)?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)?;

        if self.diagnose {
            if let Some(scope) = ctx.event_scope() {
                for span in scope {
                    write!(writer, "    in {}::{}", span.metadata().target(), span.name())?;
                    let extensions = span.extensions();
                    if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                        if !fields.is_empty() {
                            write!(writer, " with {}", fields.as_str())?;
                        }
                    }
                    writeln!(writer)?;
                }
            }
        }

        if self.backtrace && level == LogLevel::Error {
            let backtrace = std::backtrace::Backtrace::force_capture();
            writeln!(writer, "Stack backtrace:\n{}", backtrace)?;
        }

        Ok(())
    }
}

/// Field formatter for file sinks.
///
/// A separate type from the console's [`DefaultFields`] so the span fields
/// cached for file output are never rendered with ANSI escapes.
#[derive(Debug)]
pub struct PlainFields(DefaultFields);

impl PlainFields {
    pub fn new() -> Self {
        Self(DefaultFields::new())
    }
}

impl Default for PlainFields {
    fn default() -> Self {
        Self::new()
    }
}

impl<'writer> FormatFields<'writer> for PlainFields {
    fn format_fields<R: RecordFields>(&self, writer: Writer<'writer>, fields: R) -> fmt::Result {
        self.0.format_fields(writer, fields)
    }
}
