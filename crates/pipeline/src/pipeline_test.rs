//! Pipeline tests
//!
//! Ordering, batch bounds, backpressure, idle flush, failure isolation and
//! shutdown behavior of the batching pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::time::timeout;

use super::*;
use crate::record::{EventId, Level};
use crate::test_util::RecordingSink;

const WAIT: Duration = Duration::from_secs(2);

fn record(message: impl Into<String>) -> LogRecord {
    LogRecord::new("test", Level::Info, EventId::new(0), message)
}

fn config(max_batch_size: usize, max_queue_size: usize, wait_ms: u64) -> PipelineConfig {
    PipelineConfig::new(
        max_batch_size,
        max_queue_size,
        Duration::from_millis(wait_ms),
    )
    .expect("valid config")
}

fn names(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i}")).collect()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_invalid_config_fails_before_spawning() {
    // No runtime here: validation must fail first, so nothing is spawned.
    let (sink, _monitor) = RecordingSink::new();
    let config = PipelineConfig::default()
        .with_max_batch_size(10)
        .with_max_queue_size(10);

    let err = BatchingPipeline::start(config, sink).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InvalidConfig {
            field: "max_queue_size",
            ..
        }
    ));
}

#[test]
fn test_start_outside_runtime() {
    let (sink, _monitor) = RecordingSink::new();
    let err = BatchingPipeline::start(PipelineConfig::default(), sink).unwrap_err();
    assert!(matches!(err, PipelineError::NoRuntime));
}

#[tokio::test]
async fn test_start_running() {
    let (sink, _monitor) = RecordingSink::new();
    let pipeline = BatchingPipeline::start(config(2, 5, 50), sink).unwrap();

    assert_eq!(pipeline.state(), PipelineState::Running);
    assert!(pipeline.is_accepting());
    assert_eq!(pipeline.sink_name(), "recording");
    assert_eq!(pipeline.queued(), 0);
    assert!(format!("{pipeline:?}").contains("recording"));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_start_with_boxed_sink() {
    let (sink, mut monitor) = RecordingSink::new();
    let boxed: Box<dyn Sink> = Box::new(sink);
    let pipeline = BatchingPipeline::start(config(2, 5, 20), boxed).unwrap();

    pipeline.enqueue(record("a")).await;
    assert_eq!(monitor.next_batch(WAIT).await, Some(vec!["a".to_string()]));

    pipeline.shutdown().await;
    assert!(monitor.is_closed());
}

// ============================================================================
// Batching
// ============================================================================

#[tokio::test]
async fn test_fifo_across_batches_and_batch_bound() {
    let (sink, monitor) = RecordingSink::new();
    let pipeline = BatchingPipeline::start(config(3, 10, 20), sink).unwrap();

    for name in names("r", 50) {
        pipeline.enqueue(record(name)).await;
    }
    pipeline.shutdown().await;

    assert_eq!(monitor.messages(), names("r", 50));
    assert!(monitor.batches().iter().all(|b| !b.is_empty() && b.len() <= 3));

    let metrics = pipeline.metrics();
    assert_eq!(metrics.records_enqueued, 50);
    assert_eq!(metrics.records_written, 50);
    assert_eq!(metrics.records_dropped, 0);
}

#[tokio::test]
async fn test_full_batch_then_idle_flush() {
    let (sink, mut monitor) = RecordingSink::new();
    let pipeline = BatchingPipeline::start(config(3, 10, 50), sink).unwrap();

    // Let the consumer reach its idle wait first.
    tokio::time::sleep(Duration::from_millis(10)).await;

    for name in ["A", "B", "C", "D", "E"] {
        pipeline.enqueue(record(name)).await;
    }

    let first = monitor.next_batch(WAIT).await.expect("first batch");
    assert_eq!(first, vec!["A", "B", "C"]);

    let second = monitor.next_batch(WAIT).await.expect("second batch");
    assert_eq!(second, vec!["D", "E"]);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_full_batch_does_not_wait_for_interval() {
    let (sink, mut monitor) = RecordingSink::new();
    let pipeline = BatchingPipeline::start(config(3, 10, 10_000), sink).unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let started = Instant::now();
    for name in ["a", "b", "c"] {
        pipeline.enqueue(record(name)).await;
    }

    let batch = monitor.next_batch(WAIT).await.expect("full batch flushed");
    assert_eq!(batch.len(), 3);
    assert!(started.elapsed() < Duration::from_secs(5));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_idle_flush_of_partial_batch() {
    let (sink, mut monitor) = RecordingSink::new();
    let pipeline = BatchingPipeline::start(config(10, 20, 50), sink).unwrap();

    pipeline.enqueue(record("x")).await;
    pipeline.enqueue(record("y")).await;

    let batch = monitor.next_batch(Duration::from_millis(500)).await;
    assert_eq!(batch, Some(vec!["x".to_string(), "y".to_string()]));
    assert_eq!(pipeline.state(), PipelineState::Running);

    pipeline.shutdown().await;
}

// ============================================================================
// Backpressure
// ============================================================================

#[tokio::test]
async fn test_backpressure_blocks_producer_until_slot_frees() {
    let gate = Arc::new(Semaphore::new(0));
    let (sink, mut monitor) = RecordingSink::new();
    let sink = sink.gated(Arc::clone(&gate));
    let pipeline = BatchingPipeline::start(config(2, 5, 10), sink).unwrap();

    // Consumer takes r0 and parks inside the sink.
    pipeline.enqueue(record("r0")).await;
    assert_eq!(monitor.next_entry(WAIT).await, Some(1));

    // Fill the queue to capacity.
    for i in 1..=5 {
        pipeline.enqueue(record(format!("r{i}"))).await;
    }
    assert_eq!(pipeline.queued(), 5);

    let logger = pipeline.logger("producer");
    let mut blocked = tokio::spawn(async move {
        logger.log(Level::Info, 0, "r6").await;
    });

    assert!(
        timeout(Duration::from_millis(100), &mut blocked).await.is_err(),
        "sixth enqueue should wait for space"
    );

    gate.add_permits(1000);
    timeout(WAIT, blocked)
        .await
        .expect("producer released")
        .unwrap();

    pipeline.shutdown().await;
    assert_eq!(monitor.messages(), names("r", 7));
}

#[tokio::test]
async fn test_try_enqueue_drops_when_full() {
    let gate = Arc::new(Semaphore::new(0));
    let (sink, mut monitor) = RecordingSink::new();
    let sink = sink.gated(Arc::clone(&gate));
    let pipeline = BatchingPipeline::start(config(2, 5, 10), sink).unwrap();

    pipeline.enqueue(record("r0")).await;
    assert_eq!(monitor.next_entry(WAIT).await, Some(1));

    for i in 1..=5 {
        assert!(pipeline.try_enqueue(record(format!("r{i}"))));
    }
    assert!(!pipeline.try_enqueue(record("overflow")));
    assert_eq!(pipeline.metrics().records_dropped, 1);

    gate.add_permits(1000);
    pipeline.shutdown().await;
    assert_eq!(monitor.messages(), names("r", 6));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_producers_from_threads() {
    let (sink, monitor) = RecordingSink::new();
    let pipeline = BatchingPipeline::start(config(8, 16, 10), sink).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|p| {
            let logger = pipeline.logger(format!("producer-{p}"));
            std::thread::spawn(move || {
                for i in 0..100 {
                    logger.blocking_log(Level::Info, i, format!("p{p}-{i}"));
                }
            })
        })
        .collect();

    tokio::task::spawn_blocking(move || {
        for handle in handles {
            handle.join().unwrap();
        }
    })
    .await
    .unwrap();

    pipeline.shutdown().await;

    let messages = monitor.messages();
    assert_eq!(messages.len(), 400);
    for p in 0..4 {
        let prefix = format!("p{p}-");
        let own: Vec<_> = messages.iter().filter(|m| m.starts_with(&prefix)).cloned().collect();
        assert_eq!(own, names(&prefix, 100), "producer {p} order");
    }
    assert!(monitor.batches().iter().all(|b| b.len() <= 8));
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_sink_errors_do_not_stop_consumer() {
    let (sink, monitor) = RecordingSink::new();
    let sink = sink.failing(2);
    let pipeline = BatchingPipeline::start(config(1, 8, 10), sink).unwrap();

    for name in ["a", "b", "c", "d"] {
        pipeline.enqueue(record(name)).await;
    }
    pipeline.shutdown().await;

    assert_eq!(monitor.messages(), vec!["c", "d"]);
    assert_eq!(monitor.attempts(), 4);

    let metrics = pipeline.metrics();
    assert_eq!(metrics.write_errors, 2);
    assert_eq!(metrics.records_written, 2);
    assert_eq!(metrics.batches_written, 2);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_drains_pending_records() {
    let (sink, monitor) = RecordingSink::new();
    let pipeline = BatchingPipeline::start(config(4, 100, 5_000), sink).unwrap();

    for name in names("late", 10) {
        pipeline.enqueue(record(name)).await;
    }
    pipeline.shutdown().await;

    assert_eq!(monitor.messages(), names("late", 10));
    assert!(monitor.batches().iter().all(|b| b.len() <= 4));
    assert!(monitor.is_closed());
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_later_enqueues_are_noops() {
    let (sink, monitor) = RecordingSink::new();
    let pipeline = BatchingPipeline::start(config(2, 5, 20), sink).unwrap();

    pipeline.enqueue(record("kept")).await;
    pipeline.shutdown().await;
    pipeline.shutdown().await;

    assert!(!pipeline.is_accepting());
    pipeline.enqueue(record("ignored")).await;
    assert!(!pipeline.try_enqueue(record("ignored")));

    assert_eq!(monitor.messages(), vec!["kept"]);
    assert_eq!(pipeline.metrics().records_dropped, 2);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[tokio::test]
async fn test_shutdown_is_bounded_when_sink_hangs() {
    let gate = Arc::new(Semaphore::new(0));
    let (sink, mut monitor) = RecordingSink::new();
    let sink = sink.gated(Arc::clone(&gate));
    let pipeline = BatchingPipeline::start(config(2, 5, 50), sink).unwrap();

    pipeline.enqueue(record("stuck")).await;
    assert_eq!(monitor.next_entry(WAIT).await, Some(1));
    for i in 0..5 {
        pipeline.enqueue(record(format!("q{i}"))).await;
    }

    let logger = pipeline.logger("producer");
    let blocked = tokio::spawn(async move {
        logger.log(Level::Info, 0, "abandoned").await;
    });

    // Worker never leaves the sink: both grace periods expire.
    timeout(WAIT, pipeline.shutdown())
        .await
        .expect("shutdown must not block indefinitely");

    timeout(WAIT, blocked)
        .await
        .expect("blocked producer released by shutdown")
        .unwrap();

    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert!(monitor.messages().is_empty());
    // The stuck write was aborted, so the sink could still be closed.
    assert!(monitor.is_closed());
}

#[tokio::test]
async fn test_shutdown_waits_for_slow_healthy_sink() {
    let (sink, monitor) = RecordingSink::new();
    let sink = sink.delayed(Duration::from_millis(20));
    let pipeline = BatchingPipeline::start(config(1, 20, 50), sink).unwrap();

    for name in names("slow", 10) {
        pipeline.enqueue(record(name)).await;
    }
    // Ten writes take four grace periods; none of them is stuck.
    pipeline.shutdown().await;

    assert_eq!(monitor.messages(), names("slow", 10));
    assert!(monitor.batches().iter().all(|b| b.len() == 1));
    assert!(monitor.is_closed());
    assert_eq!(pipeline.state(), PipelineState::Stopped);

    let metrics = pipeline.metrics();
    assert_eq!(metrics.records_written, 10);
    assert_eq!(metrics.write_errors, 0);
}

#[tokio::test]
async fn test_shutdown_releases_blocked_thread_producer() {
    let gate = Arc::new(Semaphore::new(0));
    let (sink, mut monitor) = RecordingSink::new();
    let sink = sink.gated(Arc::clone(&gate));
    let pipeline = BatchingPipeline::start(config(2, 5, 50), sink).unwrap();

    pipeline.enqueue(record("stuck")).await;
    assert_eq!(monitor.next_entry(WAIT).await, Some(1));
    for i in 0..5 {
        pipeline.enqueue(record(format!("q{i}"))).await;
    }

    let logger = pipeline.logger("thread");
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let producer = std::thread::spawn(move || {
        logger.blocking_log(Level::Info, 0, "abandoned");
        let _ = done_tx.send(());
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(done_rx.try_recv().is_err(), "producer should wait for space");

    timeout(WAIT, pipeline.shutdown())
        .await
        .expect("shutdown must not block indefinitely");

    let released = tokio::task::spawn_blocking(move || {
        done_rx.recv_timeout(Duration::from_secs(1)).is_ok()
    })
    .await
    .unwrap();
    assert!(released, "blocked thread producer released by shutdown");
    producer.join().unwrap();

    assert!(pipeline.metrics().records_dropped >= 1);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[tokio::test]
async fn test_drop_without_shutdown_still_drains() {
    let (sink, mut monitor) = RecordingSink::new();
    let pipeline = BatchingPipeline::start(config(10, 20, 5_000), sink).unwrap();

    for name in ["a", "b", "c"] {
        pipeline.enqueue(record(name)).await;
    }
    drop(pipeline);

    let batch = monitor.next_batch(WAIT).await;
    assert_eq!(batch, Some(vec!["a".into(), "b".into(), "c".into()]));
}

// ============================================================================
// Disabled
// ============================================================================

#[tokio::test]
async fn test_disabled_pipeline_discards() {
    let (sink, monitor) = RecordingSink::new();
    let pipeline =
        BatchingPipeline::start(config(2, 5, 20).with_enabled(false), sink).unwrap();

    assert!(!pipeline.is_accepting());
    let logger = pipeline.logger("api");
    assert!(!logger.is_enabled(Level::Error));

    logger.log(Level::Error, 1, "discarded").await;
    pipeline.enqueue(record("discarded")).await;
    assert!(!pipeline.try_enqueue(record("discarded")));

    pipeline.shutdown().await;

    assert_eq!(monitor.attempts(), 0);
    assert_eq!(pipeline.metrics().records_dropped, 3);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}
