//! `[file]` section: rotating file sink

use std::path::PathBuf;

use logbatch_sinks::{FileSinkConfig, FileSinkError};
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// File sink settings
///
/// ```toml
/// [file]
/// directory = "/var/log/myapp"
/// file_name_root = "myapp-"
/// max_file_size = 10485760   # bytes
/// max_file_count = 10        # 0 keeps every file
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileSettings {
    pub directory: PathBuf,
    pub file_name_root: String,
    pub max_file_size: u64,
    pub max_file_count: usize,
}

impl Default for FileSettings {
    fn default() -> Self {
        let defaults = FileSinkConfig::default();
        Self {
            directory: defaults.directory,
            file_name_root: defaults.file_name_root,
            max_file_size: defaults.max_file_size,
            max_file_count: defaults.max_file_count,
        }
    }
}

impl FileSettings {
    /// Validated file sink configuration
    pub fn to_file_sink_config(&self) -> Result<FileSinkConfig> {
        let config = FileSinkConfig::default()
            .with_directory(&self.directory)
            .with_file_name_root(&self.file_name_root)
            .with_max_file_size(self.max_file_size)
            .with_max_file_count(self.max_file_count);

        config.validate().map_err(|e| match e {
            FileSinkError::InvalidConfig { field, message } => {
                ConfigError::invalid_value("file", field, message)
            }
        })?;
        Ok(config)
    }
}
