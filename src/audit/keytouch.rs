//! Debounced API-key `last_used_at` tracking.
//!
//! Key usage is an eventually consistent hint. Touches for the same key
//! within the debounce interval collapse to one; surviving touches batch
//! through the shared pipeline into a single UPDATE.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use super::debounce::DebounceMap;
use super::{AuditConfig, AuditPipeline, Flusher};

/// Default suppression interval for repeated touches of one key.
pub const DEFAULT_DEBOUNCE_INTERVAL: Duration = Duration::from_secs(60);

/// One key-usage observation.
#[derive(Debug, Clone)]
pub struct KeyTouch {
    /// The key that authenticated.
    pub api_key_id: Uuid,
    /// When it was observed.
    pub observed_at: DateTime<Utc>,
}

/// Fire-and-forget, debounced writer for `api_keys.last_used_at`.
pub struct KeyTouchWriter {
    pipeline: AuditPipeline<KeyTouch>,
    debounce: DebounceMap<Uuid>,
}

impl KeyTouchWriter {
    /// Starts the writer with the default debounce interval.
    pub fn spawn(flusher: Arc<dyn Flusher<KeyTouch>>, config: AuditConfig) -> Self {
        Self::spawn_with_debounce(flusher, config, DEFAULT_DEBOUNCE_INTERVAL)
    }

    /// Starts the writer with an explicit debounce interval.
    pub fn spawn_with_debounce(
        flusher: Arc<dyn Flusher<KeyTouch>>,
        config: AuditConfig,
        debounce_interval: Duration,
    ) -> Self {
        Self {
            pipeline: AuditPipeline::spawn("key_touch", flusher, config),
            debounce: DebounceMap::new(debounce_interval),
        }
    }

    /// Records a key use. Returns `false` when suppressed or dropped.
    pub fn touch(&self, api_key_id: Uuid) -> bool {
        if !self.debounce.should_emit(api_key_id) {
            return false;
        }
        self.pipeline.enqueue(KeyTouch {
            api_key_id,
            observed_at: Utc::now(),
        })
    }

    /// Evicts stale debounce entries. Run on a longer cadence than the
    /// debounce interval.
    pub fn sweep_debounce(&self) -> usize {
        self.debounce.sweep()
    }

    /// Touches dropped since start (excluding debounce suppression).
    pub fn dropped(&self) -> u64 {
        self.pipeline.dropped()
    }

    /// Drains and stops the worker.
    pub async fn stop(&self) {
        self.pipeline.stop().await;
    }
}

/// Flushes touches as one batched UPDATE.
pub struct PgKeyTouchFlusher {
    pool: PgPool,
}

impl PgKeyTouchFlusher {
    /// Creates a flusher over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Flusher<KeyTouch> for PgKeyTouchFlusher {
    async fn flush(&self, batch: Vec<KeyTouch>) {
        let ids: Vec<Uuid> = batch.iter().map(|t| t.api_key_id).collect();
        let result = sqlx::query("UPDATE api_keys SET last_used_at = now() WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&self.pool)
            .await;

        if let Err(e) = result {
            warn!(error = %e, count = ids.len(), "failed to persist key touches");
        }
    }
}
