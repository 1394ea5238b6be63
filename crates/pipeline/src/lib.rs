//! logbatch - Pipeline
//!
//! In-process batching of diagnostic records. Any number of producers submit
//! records through `Logger` handles; one background task drains them in
//! batches (by size or by time) into a pluggable `Sink`.
//!
//! # Architecture
//!
//! ```text
//! [producers] ──→ Logger::add ──→ bounded queue ──→ [consumer task] ──→ Sink::write_batch
//!                   (waits when full)                 batch ≤ max_batch_size
//! ```
//!
//! # Key Design
//!
//! - **Backpressure**: producers wait while `max_queue_size` records are pending
//! - **Size or time**: a full batch flushes at once, a partial one after
//!   `max_wait_interval`
//! - **Failure isolation**: sink errors are reported through a rate-limited
//!   `tracing` logger and never reach producers
//! - **Graceful drain**: `shutdown` flushes everything queued before returning
//! - **Global FIFO**: a single consumer preserves enqueue order across batches
//!
//! # Example
//!
//! ```ignore
//! use logbatch_pipeline::{BatchingPipeline, Level, PipelineConfig};
//!
//! let pipeline = BatchingPipeline::start(PipelineConfig::default(), my_sink)?;
//! let logger = pipeline.logger("api.employees");
//!
//! logger.log(Level::Info, 1001, "fetched 3 records").await;
//!
//! pipeline.shutdown().await;
//! ```

mod config;
mod error;
mod logger;
mod metrics;
mod pipeline;
mod rate_limited_logger;
mod record;
mod sink;

pub use config::{
    DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_MAX_WAIT_INTERVAL, PipelineConfig,
};
pub use error::{PipelineError, Result, SinkError};
pub use logger::Logger;
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use pipeline::{BatchingPipeline, PipelineState};
pub use rate_limited_logger::{DEFAULT_LOG_INTERVAL, RateLimitedLogger};
pub use record::{EventId, ExceptionInfo, Level, LogRecord, ParseLevelError};
pub use sink::Sink;

#[cfg(test)]
mod test_util;
