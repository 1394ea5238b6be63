//! Pipeline tunables

use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Default maximum records per sink call
pub const DEFAULT_MAX_BATCH_SIZE: usize = 32;

/// Default queue capacity
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1024;

/// Default idle-flush period and shutdown grace period
pub const DEFAULT_MAX_WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// Batching configuration
///
/// Checked once by `BatchingPipeline::start`; invalid values fail
/// construction instead of being clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// When false the pipeline accepts records and discards them
    pub enabled: bool,

    /// Upper bound on records per `Sink::write_batch` call
    pub max_batch_size: usize,

    /// Queue capacity; producers wait once this many records are pending
    pub max_queue_size: usize,

    /// Idle-flush period, also the graceful shutdown budget
    pub max_wait_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_wait_interval: DEFAULT_MAX_WAIT_INTERVAL,
        }
    }
}

impl PipelineConfig {
    /// Build and validate a config in one step
    pub fn new(
        max_batch_size: usize,
        max_queue_size: usize,
        max_wait_interval: Duration,
    ) -> Result<Self> {
        let config = Self {
            enabled: true,
            max_batch_size,
            max_queue_size,
            max_wait_interval,
        };
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    #[must_use]
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    #[must_use]
    pub fn with_max_wait_interval(mut self, interval: Duration) -> Self {
        self.max_wait_interval = interval;
        self
    }

    /// Check all invariants
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(PipelineError::invalid_config(
                "max_batch_size",
                "must be greater than zero",
            ));
        }
        if self.max_queue_size <= self.max_batch_size {
            return Err(PipelineError::invalid_config(
                "max_queue_size",
                format!(
                    "must be greater than max_batch_size ({}), got {}",
                    self.max_batch_size, self.max_queue_size
                ),
            ));
        }
        if self.max_wait_interval.is_zero() {
            return Err(PipelineError::invalid_config(
                "max_wait_interval",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}
