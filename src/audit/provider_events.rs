//! Provider event pipeline.
//!
//! Provider operations emit audit events into this writer through the
//! [`AuditSink`] seam; the worker turns batches into structured log lines.
//! The sink is handed to providers at construction so the provider never
//! reaches back into the service layer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{AuditConfig, AuditPipeline, Flusher};
use crate::provider::{AuditSink, ProviderEvent};

/// Fire-and-forget writer for provider audit events.
pub struct ProviderEventWriter {
    pipeline: AuditPipeline<ProviderEvent>,
}

struct LogFlusher;

#[async_trait]
impl Flusher<ProviderEvent> for LogFlusher {
    async fn flush(&self, batch: Vec<ProviderEvent>) {
        for event in batch {
            info!(
                target: "visage::provider_audit",
                provider = event.provider_name,
                event = event.event_type,
                tenant_id = ?event.tenant_id,
                success = event.success,
                error = ?event.error,
                metadata = %event.metadata,
                "provider operation"
            );
        }
    }
}

impl ProviderEventWriter {
    /// Starts the writer.
    pub fn spawn(config: AuditConfig) -> Self {
        Self {
            pipeline: AuditPipeline::spawn("provider_events", Arc::new(LogFlusher), config),
        }
    }

    /// Events dropped since start.
    pub fn dropped(&self) -> u64 {
        self.pipeline.dropped()
    }

    /// Drains and stops the worker.
    pub async fn stop(&self) {
        self.pipeline.stop().await;
    }
}

impl AuditSink for ProviderEventWriter {
    fn emit(&self, event: ProviderEvent) {
        self.pipeline.enqueue(event);
    }
}
