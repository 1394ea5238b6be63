//! Pipeline error types
//!
//! Only construction errors reach the caller that builds a pipeline. Sink
//! errors are produced by sinks and consumed by the background worker, which
//! reports them and keeps going.

use std::io;

use thiserror::Error;

/// Errors raised while constructing a pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A tunable is out of range
    #[error("invalid pipeline configuration: {field} {message}")]
    InvalidConfig {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// `start` was called outside a tokio runtime
    #[error("pipeline must be started from within a tokio runtime")]
    NoRuntime,
}

impl PipelineError {
    /// Create an InvalidConfig error
    pub fn invalid_config(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            message: message.into(),
        }
    }
}

/// Result type for pipeline construction
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors a sink may return from a batch write
///
/// The pipeline never propagates these; they go to the fallback error
/// reporter and the batch is discarded.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Output directory could not be created
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Directory path
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// I/O failure while writing
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other sink-specific failure
    #[error("{0}")]
    Other(String),
}
