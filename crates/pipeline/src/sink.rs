//! Sink capability
//!
//! A sink consumes completed batches. The pipeline owns its sink and calls it
//! only from the background consumer, so implementations need `&mut self`
//! access but no internal locking.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::record::LogRecord;

/// Destination for batches of log records
///
/// # Contract
///
/// - `write_batch` is called with at most `max_batch_size` records, in
///   enqueue order, and may be called any number of times.
/// - The slice is only borrowed; the pipeline clears and reuses the backing
///   buffer right after the call returns.
/// - Errors are reported by the pipeline and never retried.
#[async_trait]
pub trait Sink: Send + 'static {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Write one batch
    async fn write_batch(&mut self, records: &[LogRecord]) -> Result<(), SinkError>;

    /// Release resources after the final drain
    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[async_trait]
impl<S: Sink + ?Sized> Sink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn write_batch(&mut self, records: &[LogRecord]) -> Result<(), SinkError> {
        (**self).write_batch(records).await
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        (**self).close().await
    }
}
