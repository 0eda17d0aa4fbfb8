//! Log file retention management
//!
//! Removes closed files of one sink once they fall outside its retention rule.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Result;

use super::policy::Retention;

/// Apply `retention` to the files of the sink whose names start with
/// `<prefix>_`, never touching `keep` (the file currently open).
///
/// Returns the number of files deleted.
pub fn apply_retention(
    logs_dir: &Path,
    prefix: &str,
    retention: &Retention,
    keep: Option<&Path>,
) -> Result<usize> {
    if *retention == Retention::Forever || !logs_dir.exists() {
        return Ok(0);
    }

    let mut candidates = sink_files(logs_dir, prefix, keep)?;
    let expired: Vec<PathBuf> = match retention {
        Retention::Forever => Vec::new(),
        Retention::Age(max_age) => {
            let cutoff = SystemTime::now()
                .checked_sub(*max_age)
                .unwrap_or(SystemTime::UNIX_EPOCH);
            candidates
                .into_iter()
                .filter(|(_, modified)| *modified < cutoff)
                .map(|(path, _)| path)
                .collect()
        }
        Retention::Count(count) => {
            // Newest first
            candidates.sort_by(|a, b| b.1.cmp(&a.1));
            candidates
                .into_iter()
                .skip(*count)
                .map(|(path, _)| path)
                .collect()
        }
    };

    let mut deleted_count = 0;
    for path in expired {
        if fs::remove_file(&path).is_ok() {
            deleted_count += 1;
        }
    }
    Ok(deleted_count)
}

/// Files belonging to the sink, with their modification times
fn sink_files(
    logs_dir: &Path,
    prefix: &str,
    keep: Option<&Path>,
) -> Result<Vec<(PathBuf, SystemTime)>> {
    let name_prefix = format!("{}_", prefix);
    let mut files = Vec::new();

    for entry in fs::read_dir(logs_dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if !name.starts_with(&name_prefix) || !name.contains(".log") {
                continue;
            }
        } else {
            continue;
        }
        if keep.is_some_and(|keep| keep == path.as_path()) {
            continue;
        }

        if let Ok(metadata) = entry.metadata() {
            if !metadata.is_file() {
                continue;
            }
            if let Ok(modified) = metadata.modified() {
                files.push((path, modified));
            }
        }
    }

    Ok(files)
}
