use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
/// Errors returned by the face store.
pub enum StoreError {
    /// A face with this `(tenant_id, external_id)` already exists.
    #[error("face already exists for tenant {tenant_id}: {external_id}")]
    FaceExists {
        /// Owning tenant.
        tenant_id: Uuid,
        /// Colliding external id.
        external_id: String,
    },

    /// No face with this `(tenant_id, external_id)`.
    #[error("face not found for tenant {tenant_id}: {external_id}")]
    FaceNotFound {
        /// Owning tenant.
        tenant_id: Uuid,
        /// Missing external id.
        external_id: String,
    },

    /// A query was built without a tenant predicate.
    #[error("refusing to build query against '{table}' without a tenant scope")]
    MissingTenantScope {
        /// Target table.
        table: &'static str,
    },

    /// Requested result limit is outside `[1, 50]`.
    #[error("invalid search limit: {limit} (must be 1..=50)")]
    InvalidLimit {
        /// Offending limit.
        limit: u32,
    },

    /// A stored embedding could not be decoded.
    #[error("corrupt embedding for face {face_id}")]
    CorruptEmbedding {
        /// Affected face.
        face_id: Uuid,
    },

    /// Query embedding dimensionality did not match the deployment.
    #[error(transparent)]
    DimMismatch(#[from] crate::constants::DimMismatch),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
