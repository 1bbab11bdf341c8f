use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A stored face row.
#[derive(Debug, Clone)]
pub struct FaceRecord {
    /// Row id.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Tenant-supplied stable subject identifier.
    pub external_id: String,
    /// 512-dim embedding; absent for embedding-opaque engines.
    pub embedding: Option<Vec<f32>>,
    /// Engine-side reference; used when the embedding is absent.
    pub provider_face_id: Option<String>,
    /// Opaque tenant metadata.
    pub metadata: serde_json::Value,
    /// Enrollment quality, `[0,1]`.
    pub quality_score: f32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting or replacing a face.
#[derive(Debug, Clone)]
pub struct NewFace {
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Tenant-supplied stable subject identifier.
    pub external_id: String,
    /// 512-dim embedding, when the engine exposes one.
    pub embedding: Option<Vec<f32>>,
    /// Engine-side reference.
    pub provider_face_id: Option<String>,
    /// Opaque tenant metadata.
    pub metadata: serde_json::Value,
    /// Enrollment quality, `[0,1]`.
    pub quality_score: f32,
}

/// One 1:N search hit.
#[derive(Debug, Clone, Serialize)]
pub struct FaceMatch {
    /// Matched face row id.
    pub face_id: Uuid,
    /// Matched subject identifier.
    pub external_id: String,
    /// Opaque tenant metadata of the match.
    pub metadata: serde_json::Value,
    /// Cosine similarity to the query, `[0,1]`.
    pub similarity: f32,
}

/// Append-only record of one 1:1 verification.
#[derive(Debug, Clone)]
pub struct NewVerification {
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Verified face, when it still existed.
    pub face_id: Option<Uuid>,
    /// Subject identifier the caller verified against.
    pub external_id: String,
    /// Verdict at the tenant threshold.
    pub verified: bool,
    /// Measured similarity, `[0,1]`.
    pub confidence: f32,
    /// End-to-end verify latency.
    pub latency_ms: i64,
}

/// Append-only record of one 1:N search, written asynchronously.
#[derive(Debug, Clone)]
pub struct SearchAuditRecord {
    /// Search id returned to the caller.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Number of matches returned.
    pub results_count: i32,
    /// Best match subject, if any.
    pub top_match_external_id: Option<String>,
    /// Best match similarity, if any.
    pub top_match_similarity: Option<f32>,
    /// Effective threshold used.
    pub threshold: f32,
    /// Effective result cap used.
    pub max_results: i32,
    /// End-to-end search latency.
    pub latency_ms: i64,
    /// Caller network address.
    pub client_ip: String,
    /// When the search ran.
    pub created_at: DateTime<Utc>,
}
