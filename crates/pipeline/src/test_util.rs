//! Test sinks shared by the pipeline and logger tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, mpsc};

use crate::error::SinkError;
use crate::record::LogRecord;
use crate::sink::Sink;

/// Records every batch it accepts; can fail or block on demand
pub(crate) struct RecordingSink {
    batches: Arc<Mutex<Vec<Vec<String>>>>,
    delivered: mpsc::UnboundedSender<Vec<String>>,
    entered: mpsc::UnboundedSender<usize>,
    attempts: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
    fail_first: usize,
    gate: Option<Arc<Semaphore>>,
    delay: Option<Duration>,
}

/// Test-side view of a `RecordingSink`
pub(crate) struct SinkMonitor {
    batches: Arc<Mutex<Vec<Vec<String>>>>,
    delivered: mpsc::UnboundedReceiver<Vec<String>>,
    entered: mpsc::UnboundedReceiver<usize>,
    attempts: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl RecordingSink {
    pub(crate) fn new() -> (Self, SinkMonitor) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let attempts = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicBool::new(false));
        let (delivered_tx, delivered_rx) = mpsc::unbounded_channel();
        let (entered_tx, entered_rx) = mpsc::unbounded_channel();

        let sink = Self {
            batches: Arc::clone(&batches),
            delivered: delivered_tx,
            entered: entered_tx,
            attempts: Arc::clone(&attempts),
            closed: Arc::clone(&closed),
            fail_first: 0,
            gate: None,
            delay: None,
        };
        let monitor = SinkMonitor {
            batches,
            delivered: delivered_rx,
            entered: entered_rx,
            attempts,
            closed,
        };
        (sink, monitor)
    }

    /// Fail the first `n` writes
    pub(crate) fn failing(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    /// Take one permit from `gate` before every write
    pub(crate) fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Spend `delay` in every write, like a slow but healthy device
    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn write_batch(&mut self, records: &[LogRecord]) -> Result<(), SinkError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let _ = self.entered.send(records.len());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| SinkError::Other(e.to_string()))?
                .forget();
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if attempt < self.fail_first {
            return Err(SinkError::Other(format!("injected failure {attempt}")));
        }

        let messages: Vec<String> = records.iter().map(|r| r.message().to_string()).collect();
        self.batches.lock().push(messages.clone());
        let _ = self.delivered.send(messages);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl SinkMonitor {
    /// All accepted batches so far
    pub(crate) fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().clone()
    }

    /// All accepted messages in delivery order
    pub(crate) fn messages(&self) -> Vec<String> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    /// Wait for the next accepted batch
    pub(crate) async fn next_batch(&mut self, within: Duration) -> Option<Vec<String>> {
        tokio::time::timeout(within, self.delivered.recv())
            .await
            .ok()
            .flatten()
    }

    /// Wait until the sink is entered (before any gate)
    pub(crate) async fn next_entry(&mut self, within: Duration) -> Option<usize> {
        tokio::time::timeout(within, self.entered.recv())
            .await
            .ok()
            .flatten()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
