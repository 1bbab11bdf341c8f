//! Fire-and-forget audit pipelines.
//!
//! One shape, three uses: search audits, API-key `last_used_at` touches and
//! provider events. A bounded channel feeds a single background worker that
//! flushes on a timer or when a batch fills, whichever comes first. Enqueue
//! never blocks the request path; when the queue is full the item is
//! dropped and counted. These signals are hints, not truth.

pub mod debounce;
pub mod keytouch;
pub mod provider_events;
pub mod search;

#[cfg(test)]
mod tests;

pub use debounce::DebounceMap;
pub use keytouch::{KeyTouch, KeyTouchWriter, PgKeyTouchFlusher};
pub use provider_events::ProviderEventWriter;
pub use search::SearchAuditWriter;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Tuning for one pipeline instance.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Bounded queue capacity; overflow drops.
    pub queue_capacity: usize,
    /// Worker wake cadence.
    pub batch_interval: Duration,
    /// Flush early once this many items are buffered.
    pub max_batch_size: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            batch_interval: Duration::from_secs(5),
            max_batch_size: 100,
        }
    }
}

/// Consumes flushed batches. Failures are the flusher's to log; nothing is
/// retried (at-most-once).
#[async_trait]
pub trait Flusher<T>: Send + Sync + 'static {
    /// Persists one batch.
    async fn flush(&self, batch: Vec<T>);
}

enum Envelope<T> {
    Item(T),
    Stop(oneshot::Sender<()>),
}

/// Bounded single-producer-many-consumer queue with one background worker.
pub struct AuditPipeline<T> {
    name: &'static str,
    tx: mpsc::Sender<Envelope<T>>,
    dropped: Arc<AtomicU64>,
    worker: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<T: Send + 'static> AuditPipeline<T> {
    /// Starts the worker and returns the handle used to enqueue.
    pub fn spawn(name: &'static str, flusher: Arc<dyn Flusher<T>>, config: AuditConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let worker = tokio::spawn(run_worker(name, rx, flusher, config));

        Self {
            name,
            tx,
            dropped,
            worker: parking_lot::Mutex::new(Some(worker)),
        }
    }

    /// Non-blocking enqueue. Returns `false` when the item was dropped
    /// (queue full or pipeline stopped).
    pub fn enqueue(&self, item: T) -> bool {
        match self.tx.try_send(Envelope::Item(item)) {
            Ok(()) => true,
            Err(_) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(pipeline = self.name, dropped_total = total, "audit item dropped");
                false
            }
        }
    }

    /// Number of items dropped since start.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stops accepting, drains and flushes what is buffered, then returns.
    pub async fn stop(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Envelope::Stop(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run_worker<T: Send + 'static>(
    name: &'static str,
    mut rx: mpsc::Receiver<Envelope<T>>,
    flusher: Arc<dyn Flusher<T>>,
    config: AuditConfig,
) {
    let max_batch = config.max_batch_size.max(1);
    let mut buffer: Vec<T> = Vec::with_capacity(max_batch);
    let mut tick = tokio::time::interval(config.batch_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick of a tokio interval fires immediately; swallow it so
    // the first flush waits a full interval.
    tick.tick().await;

    loop {
        tokio::select! {
            envelope = rx.recv() => match envelope {
                Some(Envelope::Item(item)) => {
                    buffer.push(item);
                    if buffer.len() >= max_batch {
                        flusher.flush(std::mem::take(&mut buffer)).await;
                    }
                }
                Some(Envelope::Stop(ack)) => {
                    while let Ok(envelope) = rx.try_recv() {
                        if let Envelope::Item(item) = envelope {
                            buffer.push(item);
                        }
                    }
                    flush_in_batches(&*flusher, &mut buffer, max_batch).await;
                    debug!(pipeline = name, "audit pipeline stopped");
                    let _ = ack.send(());
                    return;
                }
                None => {
                    flush_in_batches(&*flusher, &mut buffer, max_batch).await;
                    return;
                }
            },
            _ = tick.tick() => {
                if !buffer.is_empty() {
                    flusher.flush(std::mem::take(&mut buffer)).await;
                }
            }
        }
    }
}

async fn flush_in_batches<T: 'static>(flusher: &dyn Flusher<T>, buffer: &mut Vec<T>, max_batch: usize) {
    while !buffer.is_empty() {
        let rest = if buffer.len() > max_batch {
            buffer.split_off(max_batch)
        } else {
            Vec::new()
        };
        let batch = std::mem::replace(buffer, rest);
        flusher.flush(batch).await;
    }
}
