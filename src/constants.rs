//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants from primary ones to avoid drift.

/// Face embedding dimensionality. Fixed per deployment; every provider that
/// exposes embeddings must emit vectors of this size.
pub const EMBEDDING_DIM: usize = 512;

/// Smallest acceptable image payload, in bytes.
pub const MIN_IMAGE_BYTES: usize = 100;

/// Largest acceptable image payload, in bytes (5 MB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Hard cap on 1:N search result count, regardless of tenant settings.
pub const MAX_SEARCH_RESULTS: u32 = 50;

/// Longest accepted `external_id`.
pub const MAX_EXTERNAL_ID_LEN: usize = 255;

/// Widget session lifetime.
pub const WIDGET_SESSION_TTL_SECS: i64 = 10 * 60;

/// Liveness floor applied when a tenant runs at `maximum` security.
pub const MAXIMUM_SECURITY_LIVENESS_THRESHOLD: f32 = 0.9;

/// Validation error for embedding slices crossing a module boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid embedding dimension: expected {expected}, got {actual}")]
pub struct DimMismatch {
    /// Expected dimension.
    pub expected: usize,
    /// Actual dimension.
    pub actual: usize,
}

/// Checks that `embedding` has the deployment dimensionality.
#[inline]
pub fn validate_embedding_dim(embedding: &[f32]) -> Result<(), DimMismatch> {
    if embedding.len() != EMBEDDING_DIM {
        return Err(DimMismatch {
            expected: EMBEDDING_DIM,
            actual: embedding.len(),
        });
    }
    Ok(())
}
