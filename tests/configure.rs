use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;
use valuecell_logger::logging::{LogLevel, LogSettings, Logger, SinkDestination};

fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
    vars.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn files_only(dir: &Path, compression: &str) -> LogSettings {
    LogSettings {
        log_dir: Some(dir.to_path_buf()),
        compression: compression.to_string(),
        enable_console: false,
        ..LogSettings::default()
    }
}

fn find_file(dir: &Path, prefix: &str, suffix: &str) -> PathBuf {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .find(|path| {
            let name = path.file_name().unwrap().to_string_lossy();
            name.starts_with(&format!("{prefix}_")) && name.ends_with(suffix)
        })
        .unwrap_or_else(|| panic!("no {prefix}_*{suffix} in {}", dir.display()))
}

#[test]
fn test_error_reaches_both_files_info_only_combined() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Logger::new();
    logger
        .configure_with(&files_only(temp_dir.path(), "none"), &env(&[]))
        .unwrap();

    tracing::dispatcher::with_default(logger.dispatch(), || {
        tracing::info!("portfolio refreshed");
        tracing::error!("exchange unreachable");
    });
    logger.shutdown().unwrap();

    let combined = fs::read_to_string(find_file(temp_dir.path(), "valuecell", ".log")).unwrap();
    let errors = fs::read_to_string(find_file(temp_dir.path(), "error", ".log")).unwrap();

    assert!(combined.contains("| INFO     | "));
    assert!(combined.contains(" - portfolio refreshed"));
    assert!(combined.contains(" - exchange unreachable"));
    assert!(errors.contains("| ERROR    | "));
    assert!(errors.contains(" - exchange unreachable"));
    assert!(!errors.contains("portfolio refreshed"));
}

#[test]
fn test_combined_file_receives_debug_regardless_of_console_level() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Logger::new();
    let settings = LogSettings {
        log_level: "ERROR".to_string(),
        ..files_only(temp_dir.path(), "none")
    };
    logger.configure_with(&settings, &env(&[])).unwrap();

    tracing::dispatcher::with_default(logger.dispatch(), || {
        tracing::debug!(symbol = "BTC", "quote cached");
        tracing::trace!("too verbose for any file");
    });
    logger.shutdown().unwrap();

    let combined = fs::read_to_string(find_file(temp_dir.path(), "valuecell", ".log")).unwrap();
    assert!(combined.contains("quote cached symbol=\"BTC\""));
    assert!(!combined.contains("too verbose"));
}

#[test]
fn test_configuration_is_announced() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Logger::new();
    logger
        .configure_with(&files_only(temp_dir.path(), "none"), &env(&[]))
        .unwrap();
    logger.shutdown().unwrap();

    let combined = fs::read_to_string(find_file(temp_dir.path(), "valuecell", ".log")).unwrap();
    assert!(combined.contains(&format!(
        "Log files directory: {}",
        temp_dir.path().display()
    )));
    assert!(combined.contains("Logging configured - level: INFO, console: false, file: true"));
}

#[test]
fn test_reconfigure_switches_directory() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let logger = Logger::new();

    logger
        .configure_with(&files_only(first.path(), "none"), &env(&[]))
        .unwrap();
    logger
        .configure_with(&files_only(second.path(), "none"), &env(&[]))
        .unwrap();

    tracing::dispatcher::with_default(logger.dispatch(), || {
        tracing::warn!("after reconfigure");
    });
    logger.shutdown().unwrap();

    let sinks_second =
        fs::read_to_string(find_file(second.path(), "valuecell", ".log")).unwrap();
    let sinks_first = fs::read_to_string(find_file(first.path(), "valuecell", ".log")).unwrap();
    assert!(sinks_second.contains("after reconfigure"));
    assert!(!sinks_first.contains("after reconfigure"));
}

#[test]
fn test_log_dir_env_is_used_when_no_directory_given() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("from-env");
    let logger = Logger::new();
    let settings = LogSettings {
        compression: "none".to_string(),
        enable_console: false,
        ..LogSettings::default()
    };

    logger
        .configure_with(&settings, &env(&[("LOG_DIR", dir.to_str().unwrap())]))
        .unwrap();

    let sinks = logger.sinks();
    assert_eq!(sinks.len(), 2);
    for sink in &sinks {
        match &sink.destination {
            SinkDestination::File { dir: sink_dir, .. } => assert_eq!(sink_dir, &dir),
            SinkDestination::Stderr => panic!("console sink was disabled"),
        }
    }
    assert!(dir.is_dir());
    logger.shutdown().unwrap();
}

#[test]
fn test_env_level_applies_to_console_sink() {
    let logger = Logger::new();
    let settings = LogSettings {
        log_level: "WARNING".to_string(),
        enable_file: false,
        ..LogSettings::default()
    };

    logger
        .configure_with(&settings, &env(&[("LOG_LEVEL", "debug")]))
        .unwrap();

    assert_eq!(logger.settings().unwrap().level_name, "DEBUG");
    assert_eq!(logger.sinks()[0].min_level, LogLevel::Debug);
}

#[test]
fn test_shutdown_zips_files_without_rotation() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Logger::new();
    let settings = LogSettings {
        log_dir: Some(temp_dir.path().to_path_buf()),
        rotation: "never".to_string(),
        enable_console: false,
        ..LogSettings::default()
    };
    logger.configure_with(&settings, &env(&[])).unwrap();

    tracing::dispatcher::with_default(logger.dispatch(), || {
        tracing::error!("order rejected");
    });
    logger.shutdown().unwrap();

    let archive = find_file(temp_dir.path(), "error", ".log.zip");
    let mut zip = zip::ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
    let mut contents = String::new();
    zip.by_index(0)
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert!(contents.contains(" - order rejected"));

    let leftover = fs::read_dir(temp_dir.path())
        .unwrap()
        .filter(|entry| {
            let path = entry.as_ref().unwrap().path();
            path.extension().is_some_and(|ext| ext == "log")
        })
        .count();
    assert_eq!(leftover, 0);
}

fn heartbeat(logger: &Logger, beat: u32) {
    tracing::dispatcher::with_default(logger.dispatch(), || {
        tracing::info!("heartbeat {}", beat);
    });
}

#[test]
fn test_reconfigure_keeps_callsites_enabled() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Logger::new();
    let settings = files_only(temp_dir.path(), "none");

    logger.configure_with(&settings, &env(&[])).unwrap();
    heartbeat(&logger, 1);
    logger.configure_with(&settings, &env(&[])).unwrap();
    heartbeat(&logger, 2);
    logger.shutdown().unwrap();

    let combined = fs::read_to_string(find_file(temp_dir.path(), "valuecell", ".log")).unwrap();
    assert!(combined.contains("heartbeat 1"));
    assert!(combined.contains("heartbeat 2"));
    assert_eq!(combined.matches("Logging configured").count(), 2);
}

#[test]
fn test_fresh_logger_writes_after_another_was_used() {
    for _ in 0..2 {
        let temp_dir = TempDir::new().unwrap();
        let logger = Logger::new();
        logger
            .configure_with(&files_only(temp_dir.path(), "none"), &env(&[]))
            .unwrap();
        heartbeat(&logger, 7);
        logger.shutdown().unwrap();

        let combined =
            fs::read_to_string(find_file(temp_dir.path(), "valuecell", ".log")).unwrap();
        assert!(combined.contains("heartbeat 7"));
    }
}

#[test]
fn test_reconfigure_appends_to_live_file() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Logger::new();
    let settings = LogSettings {
        log_dir: Some(temp_dir.path().to_path_buf()),
        enable_console: false,
        ..LogSettings::default()
    };

    for _ in 0..3 {
        logger.configure_with(&settings, &env(&[])).unwrap();
    }
    logger.shutdown().unwrap();

    let mut names: Vec<String> = fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2, "unexpected files: {names:?}");
    assert!(names.iter().all(|name| name.ends_with(".log")));

    let combined = fs::read_to_string(find_file(temp_dir.path(), "valuecell", ".log")).unwrap();
    assert_eq!(combined.matches("Logging configured").count(), 3);
}

static FORMATTED: AtomicUsize = AtomicUsize::new(0);

struct Counted;

impl fmt::Debug for Counted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        FORMATTED.fetch_add(1, Ordering::SeqCst);
        f.write_str("counted")
    }
}

#[test]
fn test_events_are_formatted_only_by_accepting_sinks() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Logger::new();
    logger
        .configure_with(&files_only(temp_dir.path(), "none"), &env(&[]))
        .unwrap();

    tracing::dispatcher::with_default(logger.dispatch(), || {
        tracing::trace!(value = ?Counted, "below every sink");
    });
    assert_eq!(FORMATTED.load(Ordering::SeqCst), 0);

    tracing::dispatcher::with_default(logger.dispatch(), || {
        tracing::debug!(value = ?Counted, "combined file only");
    });
    logger.shutdown().unwrap();

    assert_eq!(FORMATTED.load(Ordering::SeqCst), 1);
    let combined = fs::read_to_string(find_file(temp_dir.path(), "valuecell", ".log")).unwrap();
    assert!(combined.contains("combined file only value=counted"));
    assert!(!combined.contains("below every sink"));
}
