//! Domain error taxonomy for face operations.
//!
//! The service recognizes domain outcomes and re-returns them unwrapped
//! except for tenant tagging; provider and storage failures are wrapped
//! with a short contextual prefix. Only the gateway converts these to wire
//! form.

use thiserror::Error;
use uuid::Uuid;

use crate::provider::ProviderError;
use crate::store::StoreError;

#[derive(Debug, Error)]
/// Errors surfaced by the face service.
pub enum ServiceError {
    /// Caller-supplied threshold outside `[0,1]`.
    #[error("invalid threshold: {value} (must be within [0,1])")]
    InvalidThreshold {
        /// Offending value.
        value: f32,
    },

    /// Caller-supplied or tenant-default result cap outside `[1,50]`.
    #[error("invalid max_results: {value} (must be within [1,50])")]
    InvalidMaxResults {
        /// Offending value.
        value: u32,
    },

    /// Image bytes failed provider validation.
    #[error("invalid image: {reason}")]
    InvalidImage {
        /// Rejection reason.
        reason: String,
    },

    /// The image contained no face.
    #[error("no face detected in image")]
    NoFaceDetected,

    /// The image contained more than one face.
    #[error("multiple faces detected in image: {count}")]
    MultipleFaces {
        /// Number of faces found.
        count: u32,
    },

    /// Liveness score missed the required threshold.
    #[error("liveness check failed: score {score:.2} below threshold {threshold:.2}")]
    LivenessFailed {
        /// Measured score.
        score: f32,
        /// Required threshold.
        threshold: f32,
    },

    /// No face registered under this external id.
    #[error("face not found: {external_id}")]
    FaceNotFound {
        /// Missing external id.
        external_id: String,
    },

    /// A face already exists under this external id.
    #[error("face already exists: {external_id}")]
    FaceExists {
        /// Colliding external id.
        external_id: String,
    },

    /// The tenant has 1:N search disabled.
    #[error("search is not enabled for this tenant")]
    SearchNotEnabled,

    /// The tenant's per-minute search budget is exhausted.
    #[error("search rate limit exceeded: {count} of {limit} per minute")]
    SearchRateLimitExceeded {
        /// Observed count.
        count: i64,
        /// Configured limit.
        limit: i64,
    },

    /// The tenant's registered-face quota is exhausted.
    #[error("face quota exceeded: {count} of {max_faces}")]
    QuotaExceeded {
        /// Current registered count.
        count: i64,
        /// Configured quota.
        max_faces: i64,
    },

    /// Face engine failure, tagged with the tenant it ran for.
    #[error("face engine failed for tenant {tenant_id}: {source}")]
    Provider {
        /// Tenant context.
        tenant_id: Uuid,
        /// Underlying engine error.
        #[source]
        source: ProviderError,
    },

    /// Storage failure, tagged with the tenant it ran for.
    #[error("face store failed for tenant {tenant_id}: {source}")]
    Store {
        /// Tenant context.
        tenant_id: Uuid,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// Invariant violation inside the service.
    #[error("internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

impl ServiceError {
    /// Lifts a provider error into the domain vocabulary, tagging
    /// infrastructure failures with the tenant.
    pub fn from_provider(tenant_id: Uuid, source: ProviderError) -> Self {
        match source {
            ProviderError::NoFaceDetected => Self::NoFaceDetected,
            ProviderError::MultipleFaces { count } => Self::MultipleFaces { count },
            ProviderError::InvalidImage { reason } => Self::InvalidImage { reason },
            ProviderError::QualityTooLow { score, reason } => Self::InvalidImage {
                reason: format!("face quality too low: {score:.2} ({reason})"),
            },
            other => Self::Provider {
                tenant_id,
                source: other,
            },
        }
    }

    /// Lifts a store error into the domain vocabulary, tagging
    /// infrastructure failures with the tenant.
    pub fn from_store(tenant_id: Uuid, source: StoreError) -> Self {
        match source {
            StoreError::FaceNotFound { external_id, .. } => Self::FaceNotFound { external_id },
            StoreError::FaceExists { external_id, .. } => Self::FaceExists { external_id },
            StoreError::InvalidLimit { limit } => Self::InvalidMaxResults { value: limit },
            other => Self::Store {
                tenant_id,
                source: other,
            },
        }
    }
}
