//! File Sink - rotating, retention-limited plaintext files
//!
//! Appends each batch to one file in the log directory. Files are named
//! `{file_name_root}{yyyyMMddHHmmss}.log`, so lexical order is creation order.
//!
//! # Rotation
//!
//! - With no file open, the sink lists `{file_name_root}*.log`, newest first,
//!   and appends to the first one still below `max_file_size`. If none
//!   qualifies it creates a new file.
//! - A batch is never split across files; after the batch, a file at or over
//!   `max_file_size` is closed and the next batch selects again.
//! - After every batch only the newest `max_file_count` files are kept
//!   (`0` keeps everything).
//!
//! # Directory Structure
//!
//! ```text
//! logs/
//! ├── app-20250115103045.log
//! ├── app-20250115103045_001.log   # second file created in the same second
//! └── app-20250115104512.log       # currently open
//! ```
//!
//! The open file handle is owned by the sink and only touched from the
//! pipeline's consumer task.

mod format;

use std::fs::{self, DirEntry, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use logbatch_pipeline::{LogRecord, Sink, SinkError};

pub use format::{LINE_TIMESTAMP_FORMAT, format_record};

/// Timestamp layout embedded in file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Extension of every managed file
pub const FILE_EXTENSION: &str = ".log";

/// Highest collision suffix tried within one second
const MAX_NAME_COLLISIONS: u32 = 999;

/// Configuration for the file sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSinkConfig {
    /// Directory holding the log files (created on first write)
    pub directory: PathBuf,

    /// File name prefix; must not contain a path component
    pub file_name_root: String,

    /// Rotation threshold in bytes (default: 10MB)
    pub max_file_size: u64,

    /// Files to keep; 0 disables pruning (default: 10)
    pub max_file_count: usize,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name_root: "logbatch-".into(),
            max_file_size: 10 * 1024 * 1024, // 10MB
            max_file_count: 10,
        }
    }
}

impl FileSinkConfig {
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    #[must_use]
    pub fn with_file_name_root(mut self, root: impl Into<String>) -> Self {
        self.file_name_root = root.into();
        self
    }

    #[must_use]
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    #[must_use]
    pub fn with_max_file_count(mut self, count: usize) -> Self {
        self.max_file_count = count;
        self
    }

    /// Check the configuration
    pub fn validate(&self) -> Result<(), FileSinkError> {
        if self.directory.as_os_str().is_empty() {
            return Err(FileSinkError::invalid("directory", "must not be empty"));
        }
        if self.file_name_root.trim().is_empty() {
            return Err(FileSinkError::invalid("file_name_root", "must not be empty"));
        }
        if self.file_name_root.contains(['/', '\\']) {
            return Err(FileSinkError::invalid(
                "file_name_root",
                "must not contain a path component",
            ));
        }
        if self.max_file_size == 0 {
            return Err(FileSinkError::invalid("max_file_size", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Errors from file sink construction
#[derive(Debug, thiserror::Error)]
pub enum FileSinkError {
    /// Invalid configuration value
    #[error("invalid file sink configuration: {field} {message}")]
    InvalidConfig {
        field: &'static str,
        message: String,
    },
}

impl FileSinkError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            message: message.into(),
        }
    }
}

/// A managed log file found in the directory
#[derive(Debug, Clone)]
struct LogFile {
    name: String,
    path: PathBuf,
    len: u64,
}

/// The file currently receiving batches
struct OpenFile {
    path: PathBuf,
    writer: BufWriter<File>,
    size: u64,
}

/// Sink writing batches to rotating files
pub struct FileSink {
    config: FileSinkConfig,
    name: String,
    current: Option<OpenFile>,
    line_buf: String,
}

impl FileSink {
    /// Create a file sink; no file is touched until the first batch
    pub fn new(config: FileSinkConfig) -> Result<Self, FileSinkError> {
        Self::with_name(config, "file")
    }

    /// Create a file sink with a custom name
    pub fn with_name(config: FileSinkConfig, name: impl Into<String>) -> Result<Self, FileSinkError> {
        config.validate()?;
        Ok(Self {
            config,
            name: name.into(),
            current: None,
            line_buf: String::with_capacity(512),
        })
    }

    pub fn config(&self) -> &FileSinkConfig {
        &self.config
    }

    /// Path of the open file, if any
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|f| f.path.as_path())
    }

    /// Managed files, newest first
    pub fn list_files(&self) -> io::Result<Vec<PathBuf>> {
        Ok(self.scan()?.into_iter().map(|f| f.path).collect())
    }

    fn write_records(&mut self, records: &[LogRecord]) -> io::Result<()> {
        if self.current.is_none() {
            self.current = Some(self.open_file()?);
        }
        let Some(file) = self.current.as_mut() else {
            return Ok(());
        };

        for record in records {
            format_record(record, &mut self.line_buf);
            file.writer.write_all(self.line_buf.as_bytes())?;
            file.size += self.line_buf.len() as u64;
        }
        file.writer.flush()?;

        if file.size >= self.config.max_file_size {
            tracing::debug!(sink = %self.name, path = %file.path.display(), size = file.size, "log file full, closing");
            self.current = None;
        }
        Ok(())
    }

    /// Newest file still under the size limit, or a fresh one
    fn open_file(&self) -> io::Result<OpenFile> {
        let reusable = self
            .scan()?
            .into_iter()
            .find(|f| f.len < self.config.max_file_size);

        match reusable {
            Some(existing) => {
                let file = OpenOptions::new().append(true).open(&existing.path)?;
                tracing::debug!(sink = %self.name, path = %existing.path.display(), "appending to log file");
                Ok(OpenFile {
                    path: existing.path,
                    writer: BufWriter::new(file),
                    size: existing.len,
                })
            }
            None => self.create_file(),
        }
    }

    fn create_file(&self) -> io::Result<OpenFile> {
        let stamp = Local::now().format(FILE_TIMESTAMP_FORMAT).to_string();
        self.create_file_stamped(&stamp)
    }

    /// Create `{root}{stamp}.log`, or `{root}{stamp}_NNN.log` if taken
    fn create_file_stamped(&self, stamp: &str) -> io::Result<OpenFile> {
        let root = &self.config.file_name_root;

        for attempt in 0..=MAX_NAME_COLLISIONS {
            let name = if attempt == 0 {
                format!("{root}{stamp}{FILE_EXTENSION}")
            } else {
                format!("{root}{stamp}_{attempt:03}{FILE_EXTENSION}")
            };
            let path = self.config.directory.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    tracing::debug!(sink = %self.name, path = %path.display(), "created log file");
                    return Ok(OpenFile {
                        path,
                        writer: BufWriter::new(file),
                        size: 0,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free log file name for timestamp {stamp}"),
        ))
    }

    /// Files matching `{root}*.log`, sorted descending by name
    fn scan(&self) -> io::Result<Vec<LogFile>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.config.directory)? {
            if let Some(file) = self.managed_file(&entry?)? {
                files.push(file);
            }
        }

        files.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(files)
    }

    /// `None` for foreign names, directories, and files removed since listing
    fn managed_file(&self, entry: &DirEntry) -> io::Result<Option<LogFile>> {
        let Ok(name) = entry.file_name().into_string() else {
            return Ok(None);
        };
        if !name.starts_with(self.config.file_name_root.as_str()) || !name.ends_with(FILE_EXTENSION) {
            return Ok(None);
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(LogFile {
            name,
            path: entry.path(),
            len: metadata.len(),
        }))
    }

    /// Keep the newest `max_file_count` files
    fn remove_old_files(&self) -> io::Result<()> {
        if self.config.max_file_count == 0 {
            return Ok(());
        }

        for old in self.scan()?.into_iter().skip(self.config.max_file_count) {
            match fs::remove_file(&old.path) {
                Ok(()) => {
                    tracing::debug!(sink = %self.name, path = %old.path.display(), "removed old log file");
                }
                Err(e) => {
                    tracing::warn!(sink = %self.name, path = %old.path.display(), error = %e, "failed to remove old log file");
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write_batch(&mut self, records: &[LogRecord]) -> Result<(), SinkError> {
        fs::create_dir_all(&self.config.directory).map_err(|source| SinkError::CreateDir {
            path: self.config.directory.display().to_string(),
            source,
        })?;

        if let Err(e) = self.write_records(records) {
            // Reselect on the next batch rather than reuse a broken handle.
            self.current = None;
            return Err(SinkError::Io(e));
        }

        if let Err(e) = self.remove_old_files() {
            tracing::warn!(sink = %self.name, error = %e, "log retention scan failed");
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut file) = self.current.take() {
            file.writer.flush()?;
        }
        Ok(())
    }
}
