//! Tenant-scoped face persistence with cosine vector search.
//!
//! The store exclusively owns the `faces`, `verifications` and
//! `search_audits` tables. Every read goes through the tenant-scoped query
//! builder; there is no code path that can return another tenant's rows.

pub mod error;
pub mod model;
pub mod pg;
pub mod query;

#[cfg(any(test, feature = "mock"))]
pub mod mock;


pub use error::StoreError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockFaceStore;
pub use model::{FaceMatch, FaceRecord, NewFace, NewVerification, SearchAuditRecord};
pub use pg::PgFaceStore;
pub use query::TenantScopedSelect;

use async_trait::async_trait;
use uuid::Uuid;

use crate::constants::MAX_SEARCH_RESULTS;

/// Async interface over face persistence.
#[async_trait]
pub trait FaceStore: Send + Sync {
    /// Inserts a face; fails with [`StoreError::FaceExists`] on an
    /// `(tenant_id, external_id)` collision.
    async fn create(&self, face: NewFace) -> Result<FaceRecord, StoreError>;

    /// Replaces embedding, provider reference, metadata and quality of an
    /// existing face and bumps `updated_at`.
    async fn update(&self, face: NewFace) -> Result<FaceRecord, StoreError>;

    /// Fetches a face by its tenant-scoped external id.
    async fn get_by_external_id(
        &self,
        tenant_id: Uuid,
        external_id: &str,
    ) -> Result<FaceRecord, StoreError>;

    /// Deletes a face; [`StoreError::FaceNotFound`] when absent.
    async fn delete(&self, tenant_id: Uuid, external_id: &str) -> Result<(), StoreError>;

    /// Cosine-similarity search within one tenant.
    ///
    /// Returns up to `limit` matches with similarity at or above
    /// `threshold`, ordered by similarity descending with ties broken by
    /// face id. `limit` is capped at [`MAX_SEARCH_RESULTS`].
    async fn search_by_embedding(
        &self,
        tenant_id: Uuid,
        query: &[f32],
        threshold: f32,
        limit: u32,
    ) -> Result<Vec<FaceMatch>, StoreError>;

    /// Number of faces registered for a tenant. Off the hot path.
    async fn count_by_tenant(&self, tenant_id: Uuid) -> Result<i64, StoreError>;

    /// Appends a verification record.
    async fn record_verification(&self, record: NewVerification) -> Result<(), StoreError>;

    /// Appends a batch of search audits in one transaction.
    async fn insert_search_audits(
        &self,
        records: Vec<SearchAuditRecord>,
    ) -> Result<(), StoreError>;
}

/// Validates a search limit against the hard cap.
pub(crate) fn validate_limit(limit: u32) -> Result<(), StoreError> {
    if limit == 0 || limit > MAX_SEARCH_RESULTS {
        return Err(StoreError::InvalidLimit { limit });
    }
    Ok(())
}
