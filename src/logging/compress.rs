//! Compression of closed log files

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use flate2::write::GzEncoder;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::policy::Compression;

/// Compress `path` next to itself and remove the original.
///
/// Returns the archive path, or None when compression is disabled. An
/// existing archive is never overwritten; a timestamped name is used instead.
pub fn compress_file(path: &Path, compression: Compression) -> io::Result<Option<PathBuf>> {
    let now = Local::now().naive_local();
    let archive = match compression {
        Compression::None => return Ok(None),
        Compression::Gzip => write_gzip(path, archive_path(path, "gz", now))?,
        Compression::Zip => write_zip(path, archive_path(path, "zip", now))?,
    };

    fs::remove_file(path)?;
    Ok(Some(archive))
}

fn write_gzip(path: &Path, archive: PathBuf) -> io::Result<PathBuf> {
    let mut reader = BufReader::new(File::open(path)?);
    let writer = BufWriter::new(File::create(&archive)?);

    let mut encoder = GzEncoder::new(writer, flate2::Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?.flush()?;
    Ok(archive)
}

fn write_zip(path: &Path, archive: PathBuf) -> io::Result<PathBuf> {
    let mut reader = BufReader::new(File::open(path)?);
    let writer = BufWriter::new(File::create(&archive)?);

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(writer);
    zip.start_file(name, options).map_err(zip_error)?;
    io::copy(&mut reader, &mut zip)?;
    zip.finish().map_err(zip_error)?.flush()?;
    Ok(archive)
}

fn zip_error(err: zip::result::ZipError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

/// `<file>.<ext>`, or `<stem>.<timestamp>.log.<ext>` if that is taken
fn archive_path(path: &Path, extension: &str, now: NaiveDateTime) -> PathBuf {
    let candidate = PathBuf::from(format!("{}.{}", path.display(), extension));
    if !candidate.exists() {
        return candidate;
    }
    let suffix = match path.extension() {
        Some(ext) => format!(".{}.{}", ext.to_string_lossy(), extension),
        None => format!(".{}", extension),
    };
    unique_timestamped_path(path, &suffix, now)
}

/// `<dir>/<stem>.<YYYY-MM-DD_HH-MM-SS_ffffff><suffix>`, with a counter
/// appended to the timestamp until the name is free
pub(crate) fn unique_timestamped_path(path: &Path, suffix: &str, now: NaiveDateTime) -> PathBuf {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let timestamp = now.format("%Y-%m-%d_%H-%M-%S_%6f");

    let mut candidate = dir.join(format!("{stem}.{timestamp}{suffix}"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}.{timestamp}.{counter}{suffix}"));
        counter += 1;
    }
    candidate
}
