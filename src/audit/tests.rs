use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, mpsc};

use super::debounce::DebounceMap;
use super::{AuditConfig, AuditPipeline, Flusher};

/// Captures flushed batches for assertions.
#[derive(Default)]
struct CapturingFlusher {
    batches: Mutex<Vec<Vec<u32>>>,
}

impl CapturingFlusher {
    fn batches(&self) -> Vec<Vec<u32>> {
        self.batches.lock().clone()
    }

    fn total_items(&self) -> usize {
        self.batches.lock().iter().map(|b| b.len()).sum()
    }
}

#[async_trait]
impl Flusher<u32> for CapturingFlusher {
    async fn flush(&self, batch: Vec<u32>) {
        self.batches.lock().push(batch);
    }
}

/// Signals when a flush starts, then blocks until released.
struct BlockingFlusher {
    started: mpsc::UnboundedSender<usize>,
    release: Semaphore,
}

#[async_trait]
impl Flusher<u32> for BlockingFlusher {
    async fn flush(&self, batch: Vec<u32>) {
        let _ = self.started.send(batch.len());
        let permit = self.release.acquire().await.expect("semaphore open");
        permit.forget();
    }
}

fn small_config() -> AuditConfig {
    AuditConfig {
        queue_capacity: 64,
        batch_interval: Duration::from_secs(5),
        max_batch_size: 100,
    }
}

async fn wait_until<F: Fn() -> bool>(cond: F) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn stop_flushes_buffered_items() {
    let flusher = Arc::new(CapturingFlusher::default());
    let pipeline = AuditPipeline::spawn("test", flusher.clone(), small_config());

    for i in 0..5 {
        assert!(pipeline.enqueue(i));
    }
    pipeline.stop().await;

    assert_eq!(flusher.total_items(), 5);
    assert_eq!(pipeline.dropped(), 0);
}

#[tokio::test]
async fn full_batch_flushes_early() {
    let flusher = Arc::new(CapturingFlusher::default());
    let config = AuditConfig {
        max_batch_size: 3,
        ..small_config()
    };
    let pipeline = AuditPipeline::spawn("test", flusher.clone(), config);

    for i in 0..3 {
        pipeline.enqueue(i);
    }

    // No timer involved: the batch-size trigger alone flushes.
    wait_until(|| flusher.total_items() == 3).await;
    assert_eq!(flusher.batches().len(), 1);

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn interval_tick_flushes_partial_batch() {
    let flusher = Arc::new(CapturingFlusher::default());
    let pipeline = AuditPipeline::spawn("test", flusher.clone(), small_config());

    pipeline.enqueue(1);
    pipeline.enqueue(2);

    // Let the worker absorb the items, then cross the batch interval.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(flusher.total_items(), 0);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(flusher.total_items(), 2);

    pipeline.stop().await;
}

#[tokio::test]
async fn overflow_drops_and_counts() {
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let flusher = Arc::new(BlockingFlusher {
        started: started_tx,
        release: Semaphore::new(0),
    });
    let config = AuditConfig {
        queue_capacity: 2,
        batch_interval: Duration::from_secs(3600),
        max_batch_size: 1,
    };
    let pipeline = AuditPipeline::spawn("test", flusher.clone(), config);

    // First item reaches the worker and blocks it mid-flush.
    assert!(pipeline.enqueue(0));
    started_rx.recv().await.expect("flush started");

    // Two more fill the queue; everything after that drops.
    assert!(pipeline.enqueue(1));
    assert!(pipeline.enqueue(2));
    assert!(!pipeline.enqueue(3));
    assert!(!pipeline.enqueue(4));
    assert_eq!(pipeline.dropped(), 2);

    // Unblock remaining flushes and shut down.
    flusher.release.add_permits(100);
    pipeline.stop().await;
}

#[tokio::test]
async fn enqueue_after_stop_is_dropped() {
    let flusher = Arc::new(CapturingFlusher::default());
    let pipeline = AuditPipeline::spawn("test", flusher.clone(), small_config());

    pipeline.stop().await;

    assert!(!pipeline.enqueue(1));
    assert_eq!(pipeline.dropped(), 1);
    assert_eq!(flusher.total_items(), 0);
}

#[tokio::test]
async fn drain_on_stop_respects_batch_size() {
    let flusher = Arc::new(CapturingFlusher::default());
    let config = AuditConfig {
        queue_capacity: 64,
        batch_interval: Duration::from_secs(3600),
        max_batch_size: 2,
    };
    let pipeline = AuditPipeline::spawn("test", flusher.clone(), config);

    for i in 0..5 {
        pipeline.enqueue(i);
    }
    pipeline.stop().await;

    assert_eq!(flusher.total_items(), 5);
    assert!(flusher.batches().iter().all(|b| b.len() <= 2));
}

#[test]
fn debounce_suppresses_within_interval() {
    let map: DebounceMap<u32> = DebounceMap::new(Duration::from_secs(60));

    assert!(map.should_emit(7));
    assert!(!map.should_emit(7));
    assert!(map.should_emit(8));
    assert_eq!(map.len(), 2);
}

#[test]
fn debounce_reemits_after_interval() {
    let map: DebounceMap<u32> = DebounceMap::new(Duration::from_millis(20));

    assert!(map.should_emit(7));
    assert!(!map.should_emit(7));

    std::thread::sleep(Duration::from_millis(30));
    assert!(map.should_emit(7));
}

#[test]
fn debounce_sweep_evicts_stale_entries() {
    let map: DebounceMap<u32> = DebounceMap::new(Duration::from_millis(10));

    map.should_emit(1);
    map.should_emit(2);
    assert_eq!(map.len(), 2);

    // Entries become eligible once older than twice the interval.
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(map.sweep(), 2);
    assert!(map.is_empty());
}

#[test]
fn debounce_sweep_keeps_fresh_entries() {
    let map: DebounceMap<u32> = DebounceMap::new(Duration::from_secs(60));

    map.should_emit(1);
    assert_eq!(map.sweep(), 0);
    assert_eq!(map.len(), 1);
}
