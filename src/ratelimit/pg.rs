//! Postgres-backed sliding-window counters.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::Row;
use tracing::warn;
use uuid::Uuid;

use super::{CLEANUP_GRACE, RateDecision, RateLimitError, RateLimiter, counter_key};

/// Rate limiter over a shared connection pool.
#[derive(Clone)]
pub struct PgRateLimiter {
    pool: PgPool,
}

impl PgRateLimiter {
    /// Creates a limiter over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn increment(
        &self,
        tenant_id: Uuid,
        purpose: &str,
        window: Duration,
    ) -> Result<i64, sqlx::Error> {
        let now = Utc::now();
        let window_end = now
            + chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::seconds(60));

        // Single upsert: expired window resets to 1 and advances; a live
        // window increments. The row lock makes concurrent checks serialize
        // without losing counts.
        let row = sqlx::query(
            "INSERT INTO rate_limit_counters (key, tenant_id, count, window_start, window_end) \
             VALUES ($1, $2, 1, $3, $4) \
             ON CONFLICT (key) DO UPDATE SET \
                count = CASE WHEN rate_limit_counters.window_end < $3 \
                             THEN 1 ELSE rate_limit_counters.count + 1 END, \
                window_start = CASE WHEN rate_limit_counters.window_end < $3 \
                                    THEN $3 ELSE rate_limit_counters.window_start END, \
                window_end = CASE WHEN rate_limit_counters.window_end < $3 \
                                  THEN $4 ELSE rate_limit_counters.window_end END \
             RETURNING count",
        )
        .bind(counter_key(tenant_id, purpose))
        .bind(tenant_id)
        .bind(now)
        .bind(window_end)
        .fetch_one(&self.pool)
        .await?;

        row.try_get::<i64, _>(0)
    }
}

#[async_trait]
impl RateLimiter for PgRateLimiter {
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

        match self.increment(tenant_id, purpose, window).await {
            Ok(count) if count <= limit => RateDecision::Allowed,
            Ok(count) => RateDecision::Denied {
                count,
                limit,
                window_secs: window.as_secs(),
            },
            Err(e) => {
                // Availability over strict enforcement.
                warn!(
                    tenant_id = %tenant_id,
                    purpose,
                    error = %e,
                    "rate limiter storage failed; allowing request"
                );
                RateDecision::Allowed
            }
        }
    }

    async fn cleanup_expired(&self) -> Result<u64, RateLimitError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(CLEANUP_GRACE)
                .unwrap_or_else(|_| chrono::Duration::hours(1));

        let result = sqlx::query("DELETE FROM rate_limit_counters WHERE window_end < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn current(&self, tenant_id: Uuid, purpose: &str) -> Result<i64, RateLimitError> {
        let row = sqlx::query(
            "SELECT count FROM rate_limit_counters WHERE key = $1 AND window_end >= $2",
        )
        .bind(counter_key(tenant_id, purpose))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|r| r.try_get::<i64, _>(0))
            .transpose()?
            .unwrap_or(0))
    }

    async fn reset(&self, tenant_id: Uuid, purpose: &str) -> Result<(), RateLimitError> {
        sqlx::query("DELETE FROM rate_limit_counters WHERE key = $1")
            .bind(counter_key(tenant_id, purpose))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
