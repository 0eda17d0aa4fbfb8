//! The logger handle and its configuration entry points
//!
//! A [`Logger`] owns a `tracing` dispatcher whose sinks live behind a reload
//! handle, under a level filter that stays in place across reloads. Every
//! call to [`Logger::configure`] first tears down the previous sinks
//! (flushing their queues and joining their writer threads) and then
//! installs the new set in one step.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use anyhow::{Context, Result};
use tracing::Dispatch;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{reload, Registry};

use crate::config::{ensure_log_dir, system_env_dir, EnvSource};

use super::non_blocking::WorkerGuard;
use super::settings::{LogSettings, ResolvedSettings};
use super::sink::{BoxedLayer, SinkConfig};

type SinkSubscriber = Layered<reload::Layer<Vec<BoxedLayer>, Registry>, Registry>;

#[derive(Default)]
struct LoggerState {
    sinks: Vec<SinkConfig>,
    guards: Vec<WorkerGuard>,
    settings: Option<ResolvedSettings>,
}

/// An explicitly constructed logging pipeline
pub struct Logger {
    dispatch: Dispatch,
    sink_handle: reload::Handle<Vec<BoxedLayer>, Registry>,
    filter_handle: reload::Handle<LevelFilter, SinkSubscriber>,
    state: Mutex<LoggerState>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("sinks", &self.sinks())
            .finish_non_exhaustive()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// A logger with no sinks. Events are discarded until it is configured.
    pub fn new() -> Self {
        let (sink_layer, sink_handle) = reload::Layer::new(Vec::<BoxedLayer>::new());
        let (filter_layer, filter_handle) = reload::Layer::new(LevelFilter::OFF);
        let dispatch = Dispatch::new(Registry::default().with(sink_layer).with(filter_layer));
        Self {
            dispatch,
            sink_handle,
            filter_handle,
            state: Mutex::new(LoggerState::default()),
        }
    }

    /// The dispatcher to use with `tracing::dispatcher::with_default`
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Make this logger the process-wide `tracing` dispatcher
    pub fn install_global(&self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .context("A global tracing subscriber is already installed")
    }

    /// Configure against the process environment
    pub fn configure(&self, settings: &LogSettings) -> Result<()> {
        let resolved = settings.resolve().context("Invalid logging settings")?;
        self.apply(resolved)
    }

    /// Configure against an explicit environment
    pub fn configure_with(&self, settings: &LogSettings, env: &dyn EnvSource) -> Result<()> {
        let resolved = settings
            .resolve_with(env, &system_env_dir())
            .context("Invalid logging settings")?;
        self.apply(resolved)
    }

    /// Replace the current sinks with the ones described by `resolved`
    pub fn apply(&self, resolved: ResolvedSettings) -> Result<()> {
        let mut state = self.lock_state();
        self.clear(&mut state)?;

        let mut sinks = Vec::new();
        if let (true, Some(level)) = (resolved.enable_console, resolved.level) {
            sinks.push(SinkConfig::console(level));
        }
        if let Some(dir) = resolved.log_dir.as_deref() {
            ensure_log_dir(dir)?;
            sinks.push(SinkConfig::combined_file(dir, &resolved));
            sinks.push(SinkConfig::error_file(dir, &resolved));
        }

        let mut layers = Vec::with_capacity(sinks.len());
        let mut guards = Vec::new();
        for sink in &sinks {
            let (layer, guard) = sink
                .build()
                .with_context(|| format!("Failed to open log sink: {}", sink.destination))?;
            layers.push(layer);
            guards.extend(guard);
        }

        self.sink_handle
            .reload(layers)
            .context("Failed to install log sinks")?;
        self.filter_handle
            .reload(most_verbose(&sinks))
            .context("Failed to install log sinks")?;
        self.rebuild_interest();
        state.sinks = sinks;
        state.guards = guards;
        state.settings = Some(resolved.clone());
        drop(state);

        tracing::dispatcher::with_default(&self.dispatch, || {
            if let Some(dir) = &resolved.log_dir {
                tracing::info!("Log files directory: {}", dir.display());
            }
            tracing::debug!(
                "Logging configured - level: {}, console: {}, file: {}",
                resolved.level_name,
                resolved.enable_console,
                resolved.enable_file
            );
        });
        Ok(())
    }

    /// Descriptions of the sinks currently registered
    pub fn sinks(&self) -> Vec<SinkConfig> {
        self.lock_state().sinks.clone()
    }

    /// Settings of the last successful configuration
    pub fn settings(&self) -> Option<ResolvedSettings> {
        self.lock_state().settings.clone()
    }

    /// Remove every sink, flushing queued records to disk. Files of sinks
    /// without a rotation rule are compressed and pruned before this returns.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.lock_state();
        self.clear(&mut state)
    }

    fn clear(&self, state: &mut LoggerState) -> Result<()> {
        self.filter_handle
            .reload(LevelFilter::OFF)
            .context("Failed to remove log sinks")?;
        self.sink_handle
            .reload(Vec::new())
            .context("Failed to remove log sinks")?;
        self.rebuild_interest();
        state.sinks.clear();
        state.settings = None;
        // Joins the writer threads
        state.guards.clear();
        Ok(())
    }

    /// Recompute callsite interest with this logger as the current
    /// dispatcher; a reload alone rebuilds against the thread's default.
    fn rebuild_interest(&self) {
        tracing::dispatcher::with_default(&self.dispatch, tracing::callsite::rebuild_interest_cache);
    }

    fn lock_state(&self) -> MutexGuard<'_, LoggerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The most verbose level any sink accepts
fn most_verbose(sinks: &[SinkConfig]) -> LevelFilter {
    sinks
        .iter()
        .map(|sink| LevelFilter::from_level(sink.min_level.as_tracing()))
        .max()
        .unwrap_or(LevelFilter::OFF)
}

static GLOBAL: OnceLock<Logger> = OnceLock::new();

/// The process-wide logger.
///
/// Created on first use and installed as the global `tracing` dispatcher
/// unless another one is already set. Call [`Logger::shutdown`] before the
/// process exits so queued records reach disk.
pub fn get_logger() -> &'static Logger {
    GLOBAL.get_or_init(|| {
        let logger = Logger::new();
        if let Err(err) = logger.install_global() {
            eprintln!("valuecell logger not installed globally: {err:#}");
        }
        logger
    })
}

/// Configure the process-wide logger
pub fn setup_logger(settings: &LogSettings) -> Result<&'static Logger> {
    let logger = get_logger();
    logger.configure(settings)?;
    Ok(logger)
}
