use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Axis-aligned face bounding box, pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

/// One detected face with geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedFace {
    /// Where the face sits in the image.
    pub bounding_box: BoundingBox,
    /// Detection confidence in `[0,1]`.
    pub confidence: f32,
    /// Enrollment quality in `[0,1]`.
    pub quality_score: f32,
}

/// Result of the fused detect + embed + liveness hot-path call.
#[derive(Debug, Clone)]
pub struct FaceAnalysis {
    /// Embedding, when the engine exposes one.
    pub embedding: Option<Vec<f32>>,
    /// Number of faces found. Zero and >1 are data, not errors.
    pub face_count: u32,
    /// Detection confidence of the primary face, `[0,1]`.
    pub confidence: f32,
    /// Enrollment quality of the primary face, `[0,1]`.
    pub quality_score: f32,
    /// Passive liveness score of the primary face, `[0,1]`.
    pub liveness_score: f32,
}

/// Result of enrolling a face in the engine.
#[derive(Debug, Clone)]
pub struct IndexedFace {
    /// Engine-side reference to the enrolled face.
    pub provider_face_id: String,
    /// Embedding, when the engine exposes one.
    pub embedding: Option<Vec<f32>>,
    /// Enrollment quality, `[0,1]`.
    pub quality_score: f32,
}

/// Result of an explicit passive-liveness check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResult {
    /// Verdict at the requested threshold.
    pub is_live: bool,
    /// Aggregate confidence, `[0,1]`.
    pub confidence: f32,
    /// Reasons for a negative verdict.
    pub reasons: Vec<String>,
    /// Per-check verdicts (moire, screen_replay, print_attack, ...).
    pub checks: Vec<LivenessCheck>,
}

/// One named liveness check verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessCheck {
    /// Check name.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Check-level score, `[0,1]`.
    pub score: f32,
}

/// Capability tags a provider declares at construction.
///
/// The service layer chooses its comparison path from these, never from the
/// provider name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Engine returns raw 512-dim embeddings.
    pub exposes_embeddings: bool,
    /// Engine maintains a per-tenant server-side collection.
    pub server_side_collections: bool,
    /// Engine can score passive liveness.
    pub supports_liveness: bool,
}

/// Audit event emitted by every provider operation.
///
/// Emission is fire-and-forget: an audit failure never masks the operation
/// result.
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    /// Tenant the operation ran for, when tenant-scoped.
    pub tenant_id: Option<Uuid>,
    /// Operation name (`analyze_face`, `index_face`, ...).
    pub event_type: &'static str,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error display string on failure.
    pub error: Option<String>,
    /// Engine name.
    pub provider_name: &'static str,
    /// Operation-specific context (image fingerprint, face count, ...).
    pub metadata: serde_json::Value,
}
