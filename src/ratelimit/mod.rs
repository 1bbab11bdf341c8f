//! Per-tenant sliding-window rate limiting.
//!
//! Counters are keyed by `tenant:purpose` and live in storage so every
//! replica sees the same window. The increment is a single conditional
//! upsert; two concurrent checks never lose a count. Enforcement prefers
//! availability: a storage failure allows the request and logs a warning.

pub mod pg;

#[cfg(any(test, feature = "mock"))]
pub mod memory;


#[cfg(any(test, feature = "mock"))]
pub use memory::MemoryRateLimiter;
pub use pg::PgRateLimiter;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// How long an expired window lingers before cleanup may collect it.
pub const CLEANUP_GRACE: Duration = Duration::from_secs(60 * 60);

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    /// Under the limit (or limiting disabled); proceed.
    Allowed,
    /// Over the limit for this window.
    Denied {
        /// Observed count in the current window.
        count: i64,
        /// Configured limit.
        limit: i64,
        /// Window length.
        window_secs: u64,
    },
}

impl RateDecision {
    /// Returns `true` for [`RateDecision::Allowed`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

#[derive(Debug, Error)]
/// Errors from the monitoring/admin operations.
///
/// The hot-path [`RateLimiter::check`] never surfaces storage errors; it
/// fails open instead.
pub enum RateLimitError {
    /// Underlying storage failure.
    #[error("rate limiter storage error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage key for a tenant + purpose counter.
pub(crate) fn counter_key(tenant_id: Uuid, purpose: &str) -> String {
    format!("{tenant_id}:{purpose}")
}

/// Async interface over sliding-window counters.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Atomically counts this request against the tenant's window and
    /// compares against `limit`.
    ///
    /// A `limit` of zero or less disables limiting: the call allows without
    /// incrementing. Storage failures allow (fail open) and are logged.
    async fn check(
        &self,
        tenant_id: Uuid,
        purpose: &str,
        limit: i64,
        window: Duration,
    ) -> RateDecision;

    /// Removes counters whose window ended more than [`CLEANUP_GRACE`] ago.
    /// Returns how many were removed.
    async fn cleanup_expired(&self) -> Result<u64, RateLimitError>;

    /// Current count for a tenant + purpose, for monitoring. Zero when the
    /// window has already ended.
    async fn current(&self, tenant_id: Uuid, purpose: &str) -> Result<i64, RateLimitError>;

    /// Drops the counter for a tenant + purpose. Admin operation.
    async fn reset(&self, tenant_id: Uuid, purpose: &str) -> Result<(), RateLimitError>;
}
