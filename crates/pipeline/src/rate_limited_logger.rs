//! Rate-limited fallback error reporting
//!
//! Sink failures cannot be logged through the pipeline that just failed, so
//! they go to the process diagnostics stream (`tracing`). A persistently
//! failing sink would otherwise emit one error per batch; this logger emits at
//! most one per interval and carries the count of suppressed errors.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval between reported errors
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Logs at most once per interval, counting what it suppressed
pub struct RateLimitedLogger {
    min_interval: Duration,
    last_log_time: Mutex<Option<Instant>>,
    /// Errors since the last emitted line
    pending: AtomicU64,
    total: AtomicU64,
}

impl RateLimitedLogger {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_log_time: Mutex::new(None),
            pending: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Report a failed batch write
    ///
    /// Returns true if a line was emitted, false if it was suppressed.
    pub fn sink_error(&self, sink: &str, records: usize, error: &dyn fmt::Display) -> bool {
        self.pending.fetch_add(1, Ordering::Relaxed);
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;

        if !self.should_log() {
            return false;
        }

        let suppressed = self.pending.swap(0, Ordering::Relaxed).saturating_sub(1);
        if suppressed > 0 {
            tracing::error!(
                sink = %sink,
                records,
                error = %error,
                suppressed_count = suppressed,
                total_errors = total,
                "sink write failed, batch dropped (rate-limited)"
            );
        } else {
            tracing::error!(
                sink = %sink,
                records,
                error = %error,
                total_errors = total,
                "sink write failed, batch dropped"
            );
        }
        true
    }

    /// Errors recorded since the last emitted line
    pub fn pending_error_count(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn total_error_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    fn should_log(&self) -> bool {
        let mut last = self.last_log_time.lock();
        let now = Instant::now();
        match *last {
            Some(prev) if now.duration_since(prev) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

impl Default for RateLimitedLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }
}

impl fmt::Debug for RateLimitedLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitedLogger")
            .field("min_interval", &self.min_interval)
            .field("pending", &self.pending_error_count())
            .field("total", &self.total_error_count())
            .finish()
    }
}
