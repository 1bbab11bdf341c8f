//! Audit hook contract for provider operations.
//!
//! The sink is handed to a provider at construction and never calls back
//! into the service layer, which keeps the provider → audit → store edge
//! acyclic.

use std::sync::Arc;

use super::model::ProviderEvent;

/// Non-blocking consumer of provider audit events.
pub trait AuditSink: Send + Sync {
    /// Accepts an event. Must not block the calling task.
    fn emit(&self, event: ProviderEvent);
}

/// Sink that discards every event. Used in tests and as a safe default.
#[derive(Debug, Default, Clone)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn emit(&self, _event: ProviderEvent) {}
}

/// Shared handle to an [`AuditSink`].
pub type SharedAuditSink = Arc<dyn AuditSink>;

#[cfg(any(test, feature = "mock"))]
pub use capture::CapturingAuditSink;

#[cfg(any(test, feature = "mock"))]
mod capture {
    use super::*;
    use parking_lot::Mutex;

    /// Records every emitted event for assertion in tests.
    #[derive(Debug, Default)]
    pub struct CapturingAuditSink {
        events: Mutex<Vec<ProviderEvent>>,
    }

    impl CapturingAuditSink {
        /// Creates an empty capturing sink.
        pub fn new() -> Self {
            Self::default()
        }

        /// Returns a snapshot of the captured events.
        pub fn events(&self) -> Vec<ProviderEvent> {
            self.events.lock().clone()
        }
    }

    impl AuditSink for CapturingAuditSink {
        fn emit(&self, event: ProviderEvent) {
            self.events.lock().push(event);
        }
    }
}
