//! Request and response envelopes for the `/v1` surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::service::{RegisteredFace, SearchOutcome, Verification};
use crate::store::{FaceMatch, FaceRecord};
use crate::widget::{RegistrationStatus, WidgetIdentification, WidgetSession};

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub face_id: Uuid,
    pub external_id: String,
    pub quality_score: f32,
    pub created_at: DateTime<Utc>,
}

impl From<RegisteredFace> for RegisterResponse {
    fn from(face: RegisteredFace) -> Self {
        Self {
            face_id: face.face_id,
            external_id: face.external_id,
            quality_score: face.quality_score,
            created_at: face.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
    pub confidence: f32,
    pub external_id: String,
    pub latency_ms: i64,
}

impl From<Verification> for VerifyResponse {
    fn from(v: Verification) -> Self {
        Self {
            verified: v.verified,
            confidence: v.confidence,
            external_id: v.external_id,
            latency_ms: v.latency_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub matches: Vec<FaceMatch>,
    pub search_id: Uuid,
    pub latency_ms: i64,
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            matches: outcome.matches,
            search_id: outcome.search_id,
            latency_ms: outcome.latency_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FaceResponse {
    pub face_id: Uuid,
    pub external_id: String,
    pub quality_score: f32,
    pub metadata: serde_json::Value,
    pub has_embedding: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FaceRecord> for FaceResponse {
    fn from(face: FaceRecord) -> Self {
        Self {
            face_id: face.id,
            external_id: face.external_id,
            quality_score: face.quality_score,
            metadata: face.metadata,
            has_embedding: face.embedding.is_some(),
            created_at: face.created_at,
            updated_at: face.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub threshold: Option<f32>,
    pub max_results: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub public_key: String,
    pub origin: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl From<WidgetSession> for SessionResponse {
    fn from(session: WidgetSession) -> Self {
        Self {
            session_id: session.id,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WidgetSearchResponse {
    pub identified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl From<WidgetIdentification> for WidgetSearchResponse {
    fn from(id: WidgetIdentification) -> Self {
        Self {
            identified: id.identified,
            external_id: id.external_id,
            confidence: id.confidence,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WidgetCheckResponse {
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
}

impl From<RegistrationStatus> for WidgetCheckResponse {
    fn from(status: RegistrationStatus) -> Self {
        Self {
            registered: status.registered,
            registered_at: status.registered_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WidgetCheckQuery {
    pub session_id: String,
    pub external_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitQuery {
    pub purpose: String,
}

#[derive(Debug, Serialize)]
pub struct RateLimitStatusResponse {
    pub tenant_id: Uuid,
    pub purpose: String,
    pub count: i64,
}
