//! `[pipeline]` section: batching and queue bounds
//!
//! Defaults and bounds come from `logbatch_pipeline::PipelineConfig`; this
//! section only adds the TOML shape.

use logbatch_pipeline::{PipelineConfig, PipelineError};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Batching pipeline settings
///
/// ```toml
/// [pipeline]
/// enabled = true
/// max_batch_size = 32
/// max_queue_size = 1024
/// max_wait_interval = "1s"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineSettings {
    /// When false records are discarded and no worker runs
    pub enabled: bool,

    /// Upper bound on records per sink call
    pub max_batch_size: usize,

    /// Queue capacity; must exceed `max_batch_size`
    pub max_queue_size: usize,

    /// Longest a pending record waits before a flush
    #[serde(with = "humantime_serde")]
    pub max_wait_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            enabled: defaults.enabled,
            max_batch_size: defaults.max_batch_size,
            max_queue_size: defaults.max_queue_size,
            max_wait_interval: defaults.max_wait_interval,
        }
    }
}

impl PipelineSettings {
    /// Validated pipeline configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` in the `pipeline` section for the
    /// first field `PipelineConfig` rejects.
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig> {
        let config = PipelineConfig::default()
            .with_enabled(self.enabled)
            .with_max_batch_size(self.max_batch_size)
            .with_max_queue_size(self.max_queue_size)
            .with_max_wait_interval(self.max_wait_interval);

        config.validate().map_err(|e| match e {
            PipelineError::InvalidConfig { field, message } => {
                ConfigError::invalid_value("pipeline", field, message)
            }
            other => ConfigError::invalid_value("pipeline", "pipeline", other.to_string()),
        })?;
        Ok(config)
    }
}
