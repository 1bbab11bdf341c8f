//! Face engine adapters.
//!
//! One uniform interface over face engines: a local inference sidecar, a
//! cloud recognition API, and an in-process mock. The service layer talks
//! to [`FaceProvider`] only and picks comparison paths from the declared
//! [`Capabilities`], never from the engine name.

pub mod audit;
pub mod cloud;
pub mod error;
pub mod local;
pub mod model;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

pub use audit::{AuditSink, NullAuditSink, SharedAuditSink};
#[cfg(any(test, feature = "mock"))]
pub use audit::CapturingAuditSink;
pub use cloud::CloudProvider;
pub use error::ProviderError;
pub use local::LocalProvider;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockProvider;
pub use model::{
    BoundingBox, Capabilities, DetectedFace, FaceAnalysis, IndexedFace, LivenessCheck,
    LivenessResult, ProviderEvent,
};

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{Config, ProviderType};
use crate::constants::{MAX_IMAGE_BYTES, MIN_IMAGE_BYTES};

/// Uniform async interface over face engines.
///
/// Implementations must be safe to call concurrently from many tasks, and
/// must emit a [`ProviderEvent`] for every operation through the sink they
/// were constructed with.
#[async_trait]
pub trait FaceProvider: Send + Sync {
    /// Stable engine name for logs and audit events.
    fn name(&self) -> &'static str;

    /// Declared capability set.
    fn capabilities(&self) -> Capabilities;

    /// Geometric face detection. Not used on the hot path.
    async fn detect_faces(&self, image: &[u8]) -> Result<Vec<DetectedFace>, ProviderError>;

    /// Fused detect + embed + liveness, the canonical hot-path call.
    ///
    /// Returns `face_count = 0` without error when the image has no face,
    /// and `face_count > 1` when it has several.
    async fn analyze_face(&self, image: &[u8]) -> Result<FaceAnalysis, ProviderError>;

    /// Enrolls a face, returning the engine-side reference and the
    /// embedding when exposed. Fails with `NoFaceDetected`,
    /// `MultipleFaces` or `QualityTooLow` when it cannot enroll.
    async fn index_face(
        &self,
        tenant_id: Uuid,
        external_id: &str,
        image: &[u8],
    ) -> Result<IndexedFace, ProviderError>;

    /// Similarity of two embeddings, `[0,1]`. Returns 0 rather than failing
    /// when nothing matches.
    async fn compare_embeddings(&self, a: &[f32], b: &[f32]) -> Result<f32, ProviderError>;

    /// Similarity of the primary faces in two images, `[0,1]`. The path for
    /// embedding-opaque engines.
    async fn compare_face_images(
        &self,
        image_a: &[u8],
        image_b: &[u8],
        threshold: f32,
    ) -> Result<f32, ProviderError>;

    /// Engine-native 1:1 verify of an image against an enrolled face.
    ///
    /// This is how embedding-opaque engines serve verification: the stored
    /// face is re-referenced by `provider_face_id` and the fresh image is
    /// re-submitted.
    async fn verify_indexed(
        &self,
        tenant_id: Uuid,
        provider_face_id: &str,
        image: &[u8],
        threshold: f32,
    ) -> Result<f32, ProviderError>;

    /// Removes an enrolled face from the engine.
    async fn delete_face(
        &self,
        tenant_id: Uuid,
        provider_face_id: &str,
    ) -> Result<(), ProviderError>;

    /// Idempotently creates the tenant's engine-side collection.
    async fn ensure_collection(&self, tenant_id: Uuid) -> Result<(), ProviderError>;

    /// Idempotently removes the tenant's engine-side collection.
    async fn delete_collection(&self, tenant_id: Uuid) -> Result<(), ProviderError>;

    /// Explicit passive-liveness check.
    async fn check_liveness(
        &self,
        image: &[u8],
        threshold: f32,
    ) -> Result<LivenessResult, ProviderError>;
}

/// Validates image bytes against the provider's inclusive size bounds.
pub fn validate_image(image: &[u8]) -> Result<(), ProviderError> {
    if image.is_empty() {
        return Err(ProviderError::InvalidImage {
            reason: "image is empty".to_string(),
        });
    }
    if image.len() < MIN_IMAGE_BYTES {
        return Err(ProviderError::InvalidImage {
            reason: format!(
                "image too small: {} bytes (minimum {})",
                image.len(),
                MIN_IMAGE_BYTES
            ),
        });
    }
    if image.len() > MAX_IMAGE_BYTES {
        return Err(ProviderError::InvalidImage {
            reason: format!(
                "image too large: {} bytes (maximum {})",
                image.len(),
                MAX_IMAGE_BYTES
            ),
        });
    }
    Ok(())
}

/// Builds the configured engine behind a shared trait object.
pub fn build_provider(
    config: &Config,
    sink: SharedAuditSink,
) -> Result<Arc<dyn FaceProvider>, ProviderError> {
    match config.provider_type {
        ProviderType::Local => {
            let base_url = config.provider_base_url.clone().ok_or_else(|| {
                ProviderError::RequestFailed {
                    provider: "local",
                    message: "PROVIDER_BASE_URL is not configured".to_string(),
                }
            })?;
            Ok(Arc::new(LocalProvider::new(
                base_url,
                config.provider_timeout,
                sink,
            )?))
        }
        ProviderType::Cloud => {
            let base_url = config.provider_base_url.clone().ok_or_else(|| {
                ProviderError::RequestFailed {
                    provider: "cloud",
                    message: "PROVIDER_BASE_URL is not configured".to_string(),
                }
            })?;
            Ok(Arc::new(CloudProvider::new(
                base_url,
                config.provider_region.clone(),
                config.provider_collection_prefix.clone(),
                config.provider_timeout,
                sink,
            )?))
        }
        ProviderType::Mock => {
            #[cfg(any(test, feature = "mock"))]
            {
                Ok(Arc::new(MockProvider::new(sink)))
            }
            #[cfg(not(any(test, feature = "mock")))]
            {
                Err(ProviderError::Unsupported {
                    operation: "mock provider (build with the `mock` feature)",
                    provider: "mock",
                })
            }
        }
    }
}
