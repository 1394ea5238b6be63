//! Logbatch - Sinks
//!
//! Destinations for batches delivered by the logbatch pipeline.
//!
//! ```text
//! [Logger] --LogRecord--> [BatchingPipeline] --&[LogRecord]--> [FileSink] --> logs/app-*.log
//! ```
//!
//! # Available Sinks
//!
//! | Sink | Purpose | Uses Rotation |
//! |------|---------|---------------|
//! | `file` | Human-readable rotating log files | Yes |
//!
//! # Example
//!
//! ```ignore
//! use logbatch_pipeline::{BatchingPipeline, Level, PipelineConfig};
//! use logbatch_sinks::file::{FileSink, FileSinkConfig};
//!
//! let sink = FileSink::new(FileSinkConfig::default().with_file_name_root("app-"))?;
//! let pipeline = BatchingPipeline::start(PipelineConfig::default(), sink)?;
//!
//! pipeline.logger("api").log(Level::Info, 1001, "started").await;
//! pipeline.shutdown().await;
//! ```

/// Rotating plaintext file sink
pub mod file;

pub use file::{FileSink, FileSinkConfig, FileSinkError};
