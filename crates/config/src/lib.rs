//! Logbatch Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file is a valid configuration.
//!
//! # Parsing
//!
//! ```
//! use logbatch_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[pipeline]\nmax_batch_size = 64").unwrap();
//! assert_eq!(config.pipeline.max_batch_size, 64);
//! ```
//!
//! # Example Full Config
//!
//! ```toml
//! [log]
//! level = "info"
//! format = "console"
//!
//! [pipeline]
//! enabled = true
//! max_batch_size = 32
//! max_queue_size = 1024
//! max_wait_interval = "1s"
//!
//! [file]
//! directory = "logs"
//! file_name_root = "logbatch-"
//! max_file_size = 10485760
//! max_file_count = 10
//! ```

mod error;
mod file;
mod logging;
mod pipeline;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use error::{ConfigError, Result};
pub use file::FileSettings;
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use pipeline::PipelineSettings;

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Internal diagnostics
    pub log: LogConfig,

    /// Batching and queue bounds
    pub pipeline: PipelineSettings,

    /// Rotating file sink
    pub file: FileSettings,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, contains invalid TOML, or
    /// fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
