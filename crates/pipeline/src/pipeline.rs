//! Batching pipeline - bounded queue, background consumer, graceful drain
//!
//! ```text
//! [Logger]──┐
//! [Logger]──┼──→ mpsc (max_queue_size) ──→ [consumer task] ──→ Sink::write_batch
//! [Logger]──┘        ↑ backpressure            batch ≤ max_batch_size
//! ```
//!
//! # Consumer cycle
//!
//! 1. Move up to `max_batch_size` ready records into the scratch buffer.
//! 2. Hand a non-empty buffer to the sink; failures go to the rate-limited
//!    fallback logger and the buffer is cleared either way.
//! 3. On cancellation: close the queue, flush what is left one batch at a
//!    time, close the sink, exit.
//! 4. If a full batch is already queued, loop immediately.
//! 5. Otherwise wait for `max_wait_interval`, a full batch, or cancellation.
//!
//! Exactly one task reads the queue, so the sink observes records in global
//! enqueue order.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::logger::Logger;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::rate_limited_logger::RateLimitedLogger;
use crate::record::LogRecord;
use crate::sink::Sink;

/// Pipeline lifecycle; transitions are one-way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Accepting records
    Running,
    /// Shutdown began; queue closed, final drain in progress
    Draining,
    /// Drained (or abandoned) and the sink closed
    Stopped,
}

const STATE_RUNNING: u8 = 0;
const STATE_DRAINING: u8 = 1;
const STATE_STOPPED: u8 = 2;

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            STATE_RUNNING => Self::Running,
            STATE_DRAINING => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Producer side, shared by the pipeline and every `Logger`
pub(crate) struct Ingress {
    /// `None` when the pipeline is disabled
    sender: Option<mpsc::Sender<LogRecord>>,
    cancel: CancellationToken,
    /// Raised when a producer sees a full batch waiting
    batch_ready: Notify,
    max_batch_size: usize,
    metrics: Arc<PipelineMetrics>,
    /// Runtime the consumer lives on; drives `blocking_enqueue`
    runtime: Handle,
}

impl Ingress {
    #[inline]
    pub(crate) fn is_accepting(&self) -> bool {
        self.sender.is_some() && !self.cancel.is_cancelled()
    }

    /// Wait for queue space; abandon if shutdown begins first
    pub(crate) async fn enqueue(&self, record: LogRecord) {
        let Some(sender) = self.admit() else {
            return;
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => self.metrics.record_dropped(),
            result = sender.send(record) => self.after_send(sender, result.is_ok()),
        }
    }

    /// Same as `enqueue` for threads outside the runtime
    ///
    /// Runs the cancel-aware `enqueue` on the calling thread, so a blocked
    /// call is released as soon as shutdown begins.
    ///
    /// # Panics
    ///
    /// When called from a thread that is driving a tokio runtime.
    pub(crate) fn blocking_enqueue(&self, record: LogRecord) {
        self.runtime.block_on(self.enqueue(record));
    }

    /// Never waits; a full queue drops the record
    pub(crate) fn try_enqueue(&self, record: LogRecord) -> bool {
        let Some(sender) = self.admit() else {
            return false;
        };
        let sent = sender.try_send(record).is_ok();
        self.after_send(sender, sent);
        sent
    }

    /// Records currently waiting in the queue
    pub(crate) fn queued(&self) -> usize {
        self.sender
            .as_ref()
            .map_or(0, |sender| sender.max_capacity() - sender.capacity())
    }

    fn admit(&self) -> Option<&mpsc::Sender<LogRecord>> {
        match &self.sender {
            Some(sender) if !self.cancel.is_cancelled() => Some(sender),
            _ => {
                self.metrics.record_dropped();
                None
            }
        }
    }

    fn after_send(&self, sender: &mpsc::Sender<LogRecord>, sent: bool) {
        if !sent {
            self.metrics.record_dropped();
            return;
        }
        self.metrics.record_enqueued();
        if sender.max_capacity() - sender.capacity() >= self.max_batch_size {
            self.batch_ready.notify_one();
        }
    }
}

/// Consumer side: owned by the worker, borrowed by `shutdown` only when the
/// worker misses its grace period
struct Consumer {
    receiver: mpsc::Receiver<LogRecord>,
    sink: Box<dyn Sink>,
    /// Scratch buffer, empty between cycles
    batch: Vec<LogRecord>,
    max_batch_size: usize,
    metrics: Arc<PipelineMetrics>,
    error_logger: RateLimitedLogger,
    sink_closed: bool,
}

impl Consumer {
    /// Flush at most one batch of already-queued records
    ///
    /// Returns the number of records handed to the sink.
    async fn flush_once(&mut self) -> usize {
        while self.batch.len() < self.max_batch_size {
            match self.receiver.try_recv() {
                Ok(record) => self.batch.push(record),
                Err(_) => break,
            }
        }

        let count = self.batch.len();
        if count == 0 {
            return 0;
        }

        match self.sink.write_batch(&self.batch).await {
            Ok(()) => self.metrics.record_batch(count as u64),
            Err(e) => {
                self.metrics.record_write_error();
                self.error_logger.sink_error(self.sink.name(), count, &e);
            }
        }
        self.batch.clear();
        count
    }

    #[inline]
    fn queued(&self) -> usize {
        self.receiver.len()
    }

    /// Stop admissions and return the flush budget for what is left
    ///
    /// Once closed the queue cannot grow, so the budget covers every
    /// remaining record even when every write fails.
    fn close_queue(&mut self) -> usize {
        self.receiver.close();
        self.receiver.len().div_ceil(self.max_batch_size) + 1
    }

    async fn close_sink(&mut self) {
        if self.sink_closed {
            return;
        }
        self.sink_closed = true;
        if let Err(e) = self.sink.close().await {
            tracing::warn!(sink = %self.sink.name(), error = %e, "sink close failed");
        }
    }
}

/// Worker-side final drain, one batch per lock so `shutdown` can join in
async fn final_drain(consumer: &AsyncMutex<Consumer>) -> usize {
    let budget = consumer.lock().await.close_queue();

    let mut flushed = 0;
    for _ in 0..budget {
        let count = consumer.lock().await.flush_once().await;
        if count == 0 {
            break;
        }
        flushed += count;
    }

    consumer.lock().await.close_sink().await;
    flushed
}

/// In-process batching pipeline feeding one sink
///
/// # Example
///
/// ```ignore
/// let pipeline = BatchingPipeline::start(PipelineConfig::default(), sink)?;
/// let logger = pipeline.logger("api.employees");
/// logger.log(Level::Info, 1001, "fetched 3 records").await;
/// pipeline.shutdown().await;
/// ```
pub struct BatchingPipeline {
    ingress: Arc<Ingress>,
    /// `None` when the pipeline is disabled
    consumer: Option<Arc<AsyncMutex<Consumer>>>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
    state: AtomicU8,
    metrics: Arc<PipelineMetrics>,
    sink_name: String,
    max_wait_interval: Duration,
}

impl BatchingPipeline {
    /// Validate `config` and spawn the consumer on the current tokio runtime
    ///
    /// A disabled config spawns nothing; records are accepted and discarded.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for bad tunables, `NoRuntime` outside a runtime. No
    /// task is spawned in either case.
    pub fn start<S: Sink>(config: PipelineConfig, sink: S) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| PipelineError::NoRuntime)?;

        let metrics = Arc::new(PipelineMetrics::new());
        let cancel = CancellationToken::new();
        let sink_name = sink.name().to_string();

        if !config.enabled {
            tracing::info!(sink = %sink_name, "pipeline disabled, records will be discarded");
            return Ok(Self {
                ingress: Arc::new(Ingress {
                    sender: None,
                    cancel,
                    batch_ready: Notify::new(),
                    max_batch_size: config.max_batch_size,
                    metrics: Arc::clone(&metrics),
                    runtime,
                }),
                consumer: None,
                worker: parking_lot::Mutex::new(None),
                state: AtomicU8::new(STATE_RUNNING),
                metrics,
                sink_name,
                max_wait_interval: config.max_wait_interval,
            });
        }

        let (sender, receiver) = mpsc::channel(config.max_queue_size);

        let ingress = Arc::new(Ingress {
            sender: Some(sender),
            cancel,
            batch_ready: Notify::new(),
            max_batch_size: config.max_batch_size,
            metrics: Arc::clone(&metrics),
            runtime: runtime.clone(),
        });

        let consumer = Arc::new(AsyncMutex::new(Consumer {
            receiver,
            sink: Box::new(sink),
            batch: Vec::with_capacity(config.max_batch_size),
            max_batch_size: config.max_batch_size,
            metrics: Arc::clone(&metrics),
            error_logger: RateLimitedLogger::default(),
            sink_closed: false,
        }));

        tracing::info!(
            sink = %sink_name,
            max_batch_size = config.max_batch_size,
            max_queue_size = config.max_queue_size,
            max_wait_ms = config.max_wait_interval.as_millis() as u64,
            "pipeline starting"
        );

        let worker = runtime.spawn(run_consumer(
            Arc::clone(&consumer),
            Arc::clone(&ingress),
            config.max_wait_interval,
        ));

        Ok(Self {
            ingress,
            consumer: Some(consumer),
            worker: parking_lot::Mutex::new(Some(worker)),
            state: AtomicU8::new(STATE_RUNNING),
            metrics,
            sink_name,
            max_wait_interval: config.max_wait_interval,
        })
    }

    /// Front-end handle for one category
    pub fn logger(&self, category: impl Into<Arc<str>>) -> Logger {
        Logger::new(category.into(), Arc::clone(&self.ingress))
    }

    /// Append a record, waiting while the queue is full
    ///
    /// Silently dropped if the pipeline is disabled or shutting down.
    pub async fn enqueue(&self, record: LogRecord) {
        self.ingress.enqueue(record).await;
    }

    /// `enqueue` for plain threads; must not be called from async code
    pub fn blocking_enqueue(&self, record: LogRecord) {
        self.ingress.blocking_enqueue(record);
    }

    /// Append without waiting; returns false if the record was dropped
    pub fn try_enqueue(&self, record: LogRecord) -> bool {
        self.ingress.try_enqueue(record)
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True while records are being accepted
    pub fn is_accepting(&self) -> bool {
        self.ingress.is_accepting()
    }

    /// Records waiting in the queue
    pub fn queued(&self) -> usize {
        self.ingress.queued()
    }

    pub fn sink_name(&self) -> &str {
        &self.sink_name
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Stop accepting records and drain the queue into the sink
    ///
    /// Waits up to `max_wait_interval` for the consumer to finish its own
    /// drain, then drains alongside it batch by batch. Returns once the queue
    /// is empty and the sink closed, or once the sink is stuck in a single
    /// call for longer than `max_wait_interval`. Only the first call does
    /// anything.
    pub async fn shutdown(&self) {
        if self
            .state
            .compare_exchange(STATE_RUNNING, STATE_DRAINING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        tracing::info!(sink = %self.sink_name, queued = self.queued(), "pipeline shutting down");
        self.ingress.cancel.cancel();

        let worker = self.worker.lock().take();
        if let (Some(mut worker), Some(consumer)) = (worker, self.consumer.as_ref()) {
            match tokio::time::timeout(self.max_wait_interval, &mut worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(sink = %self.sink_name, error = %e, "pipeline worker failed");
                    self.force_drain(consumer, None).await;
                }
                Err(_) => {
                    tracing::warn!(
                        sink = %self.sink_name,
                        timeout_ms = self.max_wait_interval.as_millis() as u64,
                        "pipeline worker missed shutdown grace period, forcing drain"
                    );
                    self.force_drain(consumer, Some(worker)).await;
                }
            }
        }

        self.state.store(STATE_STOPPED, Ordering::Release);

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            sink = %self.sink_name,
            records_enqueued = snapshot.records_enqueued,
            records_written = snapshot.records_written,
            records_dropped = snapshot.records_dropped,
            write_errors = snapshot.write_errors,
            "pipeline stopped"
        );
    }

    /// Drain next to (or instead of) the worker, one batch per lock
    ///
    /// Bounded by the batches left when the queue closed. A lock wait or a
    /// write longer than `max_wait_interval` means the sink is stuck: the
    /// worker is aborted and the rest of the queue abandoned. The worker has
    /// exited and the sink is closed (or its close timed out) on return.
    async fn force_drain(&self, consumer: &AsyncMutex<Consumer>, worker: Option<JoinHandle<()>>) {
        let wait = self.max_wait_interval;
        let mut budget = None;
        let mut attempts = 0;
        let mut flushed = 0;

        let drained = loop {
            let Ok(mut guard) = tokio::time::timeout(wait, consumer.lock()).await else {
                break false;
            };
            let limit = *budget.get_or_insert_with(|| guard.close_queue());
            if attempts >= limit {
                break true;
            }
            attempts += 1;

            match tokio::time::timeout(wait, guard.flush_once()).await {
                Ok(0) => break true,
                Ok(count) => flushed += count,
                Err(_) => break false,
            }
        };

        if drained {
            tracing::debug!(sink = %self.sink_name, records = flushed, "forced drain complete");
        } else {
            tracing::error!(
                sink = %self.sink_name,
                queued = self.queued(),
                flushed,
                "sink stuck past grace period, abandoning queued records"
            );
        }

        if let Some(worker) = worker {
            if !drained {
                worker.abort();
            }
            self.join_worker(worker).await;
        }

        let close = async { consumer.lock().await.close_sink().await };
        if tokio::time::timeout(wait, close).await.is_err() {
            tracing::warn!(sink = %self.sink_name, "sink close timed out");
        }
    }

    /// Wait for the worker to exit, aborting it if it overstays
    async fn join_worker(&self, mut worker: JoinHandle<()>) {
        if tokio::time::timeout(self.max_wait_interval, &mut worker).await.is_err() {
            worker.abort();
            if tokio::time::timeout(self.max_wait_interval, worker).await.is_err() {
                tracing::error!(sink = %self.sink_name, "pipeline worker did not stop after abort");
            }
        }
    }
}

impl Drop for BatchingPipeline {
    /// Without `shutdown` the worker still drains on its own once cancelled
    fn drop(&mut self) {
        self.ingress.cancel.cancel();
    }
}

impl fmt::Debug for BatchingPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchingPipeline")
            .field("sink", &self.sink_name)
            .field("state", &self.state())
            .field("queued", &self.queued())
            .finish()
    }
}

async fn run_consumer(
    consumer: Arc<AsyncMutex<Consumer>>,
    ingress: Arc<Ingress>,
    max_wait_interval: Duration,
) {
    loop {
        if ingress.cancel.is_cancelled() {
            let flushed = final_drain(&consumer).await;
            tracing::debug!(records = flushed, "final drain complete");
            break;
        }

        let full_batch_waiting = {
            let mut consumer = consumer.lock().await;
            consumer.flush_once().await;
            consumer.queued() >= consumer.max_batch_size
        };

        if full_batch_waiting {
            continue;
        }

        tokio::select! {
            _ = ingress.cancel.cancelled() => {}
            _ = ingress.batch_ready.notified() => {}
            _ = tokio::time::sleep(max_wait_interval) => {}
        }
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
