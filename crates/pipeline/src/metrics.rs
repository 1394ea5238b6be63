//! Pipeline metrics
//!
//! Atomic counters shared between producers and the background consumer.
//! All operations use relaxed ordering; values are eventually consistent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one pipeline
///
/// # Thread Safety
///
/// All methods are safe to call from multiple threads concurrently.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Records accepted into the queue
    records_enqueued: AtomicU64,

    /// Records discarded (disabled, shutting down, or `try_add` on a full queue)
    records_dropped: AtomicU64,

    /// Successful `write_batch` calls
    batches_written: AtomicU64,

    /// Records handed to successful `write_batch` calls
    records_written: AtomicU64,

    /// Failed `write_batch` calls
    write_errors: AtomicU64,
}

impl PipelineMetrics {
    /// Create new metrics instance with all counters at zero
    #[inline]
    pub const fn new() -> Self {
        Self {
            records_enqueued: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            batches_written: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_enqueued(&self) {
        self.records_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch the sink accepted
    #[inline]
    pub fn record_batch(&self, records: u64) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.records_written.fetch_add(records, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_enqueued: self.records_enqueued.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of pipeline metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_enqueued: u64,
    pub records_dropped: u64,
    pub batches_written: u64,
    pub records_written: u64,
    pub write_errors: u64,
}

impl MetricsSnapshot {
    /// Average records per successful batch
    pub fn avg_batch_size(&self) -> Option<f64> {
        if self.batches_written == 0 {
            return None;
        }
        Some(self.records_written as f64 / self.batches_written as f64)
    }
}
