//! Configuration validation
//!
//! Each section is checked by converting it into the runtime config it
//! feeds, so the config file and the library reject the same values.

use crate::Config;
use crate::error::Result;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    config.pipeline.to_pipeline_config()?;
    config.file.to_file_sink_config()?;
    Ok(())
}
