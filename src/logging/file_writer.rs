//! Date-stamped log files with rotation
//!
//! Each file sink writes `<prefix>_<YYYY-MM-DD>.log`, the date taken when the
//! file is opened. When the rotation rule fires the file is closed (and
//! renamed if the next file would reuse its name), compressed, and retention
//! is applied to the sink's older files.
//!
//! Dropping the writer runs the same clean-up only for [`Rotation::Never`].
//! With a rotation rule the live file stays as it is, and the next writer
//! for the same prefix appends to it.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use super::compress::{compress_file, unique_timestamped_path};
use super::policy::{Compression, Retention, Rotation};
use super::retention::apply_retention;

/// Builder for [`RollingFileWriter`]
#[derive(Debug, Clone)]
pub struct RollingFileBuilder {
    dir: PathBuf,
    prefix: String,
    rotation: Rotation,
    retention: Retention,
    compression: Compression,
}

impl RollingFileBuilder {
    /// Files are written to `dir` as `<prefix>_<date>.log`
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            rotation: Rotation::Never,
            retention: Retention::Forever,
            compression: Compression::None,
        }
    }

    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Open the first file. The directory must already exist.
    pub fn build(self) -> io::Result<RollingFileWriter> {
        let now = Local::now().naive_local();
        let mut writer = RollingFileWriter {
            dir: self.dir,
            prefix: self.prefix,
            rotation: self.rotation,
            retention: self.retention,
            compression: self.compression,
            file: None,
            path: PathBuf::new(),
            size: 0,
            next_rotation: None,
        };
        writer.open(now)?;
        Ok(writer)
    }
}

/// A file writer that rotates, compresses and prunes its own output
#[derive(Debug)]
pub struct RollingFileWriter {
    dir: PathBuf,
    prefix: String,
    rotation: Rotation,
    retention: Retention,
    compression: Compression,
    file: Option<File>,
    path: PathBuf,
    size: u64,
    next_rotation: Option<NaiveDateTime>,
}

impl RollingFileWriter {
    /// Path of the file currently written to
    pub fn current_path(&self) -> &Path {
        &self.path
    }

    fn file_path(&self, now: NaiveDateTime) -> PathBuf {
        self.dir
            .join(format!("{}_{}.log", self.prefix, now.format("%Y-%m-%d")))
    }

    fn open(&mut self, now: NaiveDateTime) -> io::Result<()> {
        let path = self.file_path(now);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.size = file.metadata()?.len();
        self.file = Some(file);
        self.path = path;
        self.next_rotation = self.rotation.next_boundary(now);
        Ok(())
    }

    fn should_rotate(&self, incoming: usize, now: NaiveDateTime) -> bool {
        match &self.rotation {
            Rotation::Never => false,
            Rotation::Size(limit) => self.size > 0 && self.size + incoming as u64 > *limit,
            _ => self.next_rotation.is_some_and(|at| now >= at),
        }
    }

    /// Close the current file and open the next one. A file that could not
    /// be renamed is reopened and appended to instead of being finished.
    fn rotate(&mut self, now: NaiveDateTime) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            if let Err(err) = file.flush() {
                eprintln!("Failed to flush log file '{}': {}", self.path.display(), err);
            }
        }

        let mut closed = Some(self.path.clone());
        if self.file_path(now) == self.path {
            let renamed = unique_timestamped_path(&self.path, ".log", now);
            closed = match fs::rename(&self.path, &renamed) {
                Ok(()) => Some(renamed),
                Err(err) => {
                    eprintln!(
                        "Failed to rename log file '{}': {}",
                        self.path.display(),
                        err
                    );
                    None
                }
            };
        }

        self.open(now)?;
        if let Some(closed) = closed.filter(|path| path.exists()) {
            self.finish_file(&closed);
        }
        Ok(())
    }

    /// Compress a closed file and prune the sink's old files. Failures go
    /// to stderr.
    fn finish_file(&self, closed: &Path) {
        if let Err(err) = compress_file(closed, self.compression) {
            eprintln!("Failed to compress log file '{}': {}", closed.display(), err);
        }
        let keep = self.file.as_ref().map(|_| self.path.as_path());
        if let Err(err) = apply_retention(&self.dir, &self.prefix, &self.retention, keep) {
            eprintln!(
                "Failed to apply log retention in '{}': {}",
                self.dir.display(),
                err
            );
        }
    }

    fn write_at(&mut self, buf: &[u8], now: NaiveDateTime) -> io::Result<usize> {
        if self.file.is_none() {
            self.open(now)?;
        } else if self.should_rotate(buf.len(), now) {
            self.rotate(now)?;
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let written = file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }
}

impl Write for RollingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_at(buf, Local::now().naive_local())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

impl Drop for RollingFileWriter {
    fn drop(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
            drop(file);
            if self.rotation == Rotation::Never {
                let closed = self.path.clone();
                self.finish_file(&closed);
            }
        }
    }
}
