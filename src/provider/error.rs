use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by face engine operations.
pub enum ProviderError {
    /// Image bytes were empty or outside the provider's size bounds.
    #[error("invalid image: {reason}")]
    InvalidImage {
        /// Human-readable rejection reason.
        reason: String,
    },

    /// The image contained no detectable face.
    #[error("no face detected in image")]
    NoFaceDetected,

    /// The image contained more than one face.
    #[error("multiple faces detected in image: {count}")]
    MultipleFaces {
        /// Number of faces found.
        count: u32,
    },

    /// The face was detected but does not meet the enrollment quality bar.
    #[error("face quality too low for enrollment: {score:.2} ({reason})")]
    QualityTooLow {
        /// Measured quality score.
        score: f32,
        /// Which check failed (blur, pose, occlusion, ...).
        reason: String,
    },

    /// The operation is not supported by this engine's capability set.
    #[error("operation '{operation}' not supported by provider '{provider}'")]
    Unsupported {
        /// Operation name.
        operation: &'static str,
        /// Provider name.
        provider: &'static str,
    },

    /// A provider-side reference was not found.
    #[error("provider face not found: {provider_face_id}")]
    FaceNotFound {
        /// The missing reference.
        provider_face_id: String,
    },

    /// The engine round trip failed (transport, non-2xx, decode).
    #[error("provider '{provider}' request failed: {message}")]
    RequestFailed {
        /// Provider name.
        provider: &'static str,
        /// Error message.
        message: String,
    },

    /// Embedding dimensionality did not match the deployment.
    #[error(transparent)]
    DimMismatch(#[from] crate::constants::DimMismatch),
}
