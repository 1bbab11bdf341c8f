//! In-memory sliding-window counters for tests.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{CLEANUP_GRACE, RateDecision, RateLimitError, RateLimiter, counter_key};

#[derive(Debug, Clone)]
struct Bucket {
    count: i64,
    window_end: DateTime<Utc>,
}

/// In-memory [`RateLimiter`] with the same window semantics as the
/// Postgres implementation. The per-entry lock of the map shard gives the
/// same no-lost-counts guarantee.
#[derive(Default)]
pub struct MemoryRateLimiter {
    buckets: DashMap<String, Bucket>,
}

impl MemoryRateLimiter {
    /// Creates an empty limiter.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check(
        &self,
        tenant_id: Uuid,
        purpose: &str,
        limit: i64,
        window: Duration,
    ) -> RateDecision {
        if limit <= 0 {
            return RateDecision::Allowed;
        }

        let now = Utc::now();
        let window_end = now
            + chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::seconds(60));

        let mut entry = self
            .buckets
            .entry(counter_key(tenant_id, purpose))
            .or_insert_with(|| Bucket {
                count: 0,
                window_end,
            });

        if entry.window_end < now {
            entry.count = 1;
            entry.window_end = window_end;
        } else {
            entry.count += 1;
        }

        let count = entry.count;
        drop(entry);

        if count <= limit {
            RateDecision::Allowed
        } else {
            RateDecision::Denied {
                count,
                limit,
                window_secs: window.as_secs(),
            }
        }
    }

    async fn cleanup_expired(&self) -> Result<u64, RateLimitError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(CLEANUP_GRACE)
                .unwrap_or_else(|_| chrono::Duration::hours(1));

        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| bucket.window_end >= cutoff);
        Ok((before - self.buckets.len()) as u64)
    }

    async fn current(&self, tenant_id: Uuid, purpose: &str) -> Result<i64, RateLimitError> {
        let now = Utc::now();
        Ok(self
            .buckets
            .get(&counter_key(tenant_id, purpose))
            .filter(|bucket| bucket.window_end >= now)
            .map(|bucket| bucket.count)
            .unwrap_or(0))
    }

    async fn reset(&self, tenant_id: Uuid, purpose: &str) -> Result<(), RateLimitError> {
        self.buckets.remove(&counter_key(tenant_id, purpose));
        Ok(())
    }
}
