//! Async search-audit writer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{AuditConfig, AuditPipeline, Flusher};
use crate::store::{FaceStore, SearchAuditRecord};

/// Fire-and-forget writer for 1:N search audit rows.
pub struct SearchAuditWriter {
    pipeline: AuditPipeline<SearchAuditRecord>,
}

struct StoreFlusher {
    store: Arc<dyn FaceStore>,
}

#[async_trait]
impl Flusher<SearchAuditRecord> for StoreFlusher {
    async fn flush(&self, batch: Vec<SearchAuditRecord>) {
        let count = batch.len();
        if let Err(e) = self.store.insert_search_audits(batch).await {
            // At-most-once: the batch is gone.
            warn!(error = %e, count, "failed to persist search audit batch");
        }
    }
}

impl SearchAuditWriter {
    /// Starts the writer against the given store.
    pub fn spawn(store: Arc<dyn FaceStore>, config: AuditConfig) -> Self {
        Self {
            pipeline: AuditPipeline::spawn(
                "search_audit",
                Arc::new(StoreFlusher { store }),
                config,
            ),
        }
    }

    /// Non-blocking enqueue; `false` means the record was dropped.
    pub fn enqueue(&self, record: SearchAuditRecord) -> bool {
        self.pipeline.enqueue(record)
    }

    /// Records dropped since start.
    pub fn dropped(&self) -> u64 {
        self.pipeline.dropped()
    }

    /// Drains and stops the worker.
    pub async fn stop(&self) {
        self.pipeline.stop().await;
    }
}
