//! Local inference sidecar adapter.
//!
//! Talks to a co-deployed face inference server over HTTP. The sidecar
//! exposes raw embeddings, so comparison happens in-process; it keeps no
//! per-tenant state, so collection lifecycle calls are no-ops.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::audit::SharedAuditSink;
use super::error::ProviderError;
use super::model::{
    BoundingBox, Capabilities, DetectedFace, FaceAnalysis, IndexedFace, LivenessCheck,
    LivenessResult, ProviderEvent,
};
use super::{FaceProvider, validate_image};
use crate::constants::validate_embedding_dim;
use crate::embedding::cosine_similarity;
use crate::hashing::fingerprint;

const PROVIDER_NAME: &str = "local";

/// Quality floor below which the sidecar's face is not enrollable.
const MIN_ENROLLMENT_QUALITY: f32 = 0.4;

/// Adapter over the local inference sidecar.
pub struct LocalProvider {
    client: reqwest::Client,
    base_url: String,
    sink: SharedAuditSink,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    embedding: Option<Vec<f32>>,
    face_count: u32,
    confidence: f32,
    quality_score: f32,
    liveness_score: f32,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    faces: Vec<DetectedFaceDto>,
}

#[derive(Debug, Deserialize)]
struct DetectedFaceDto {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    confidence: f32,
    quality_score: f32,
}

#[derive(Debug, Deserialize)]
struct LivenessResponse {
    is_live: bool,
    confidence: f32,
    #[serde(default)]
    reasons: Vec<String>,
    #[serde(default)]
    checks: Vec<LivenessCheckDto>,
}

#[derive(Debug, Deserialize)]
struct LivenessCheckDto {
    name: String,
    passed: bool,
    score: f32,
}

impl LocalProvider {
    /// Creates an adapter for the sidecar at `base_url`.
    pub fn new(
        base_url: String,
        timeout: Duration,
        sink: SharedAuditSink,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER_NAME,
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            sink,
        })
    }

    fn emit(
        &self,
        tenant_id: Option<Uuid>,
        event_type: &'static str,
        error: Option<&ProviderError>,
        metadata: serde_json::Value,
    ) {
        self.sink.emit(ProviderEvent {
            tenant_id,
            event_type,
            success: error.is_none(),
            error: error.map(|e| e.to_string()),
            provider_name: PROVIDER_NAME,
            metadata,
        });
    }

    async fn post_image<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        image: &[u8],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER_NAME,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                provider: PROVIDER_NAME,
                message: format!("{} returned {}: {}", path, status, body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER_NAME,
                message: format!("failed to decode {} response: {}", path, e),
            })
    }

    async fn analyze_inner(&self, image: &[u8]) -> Result<FaceAnalysis, ProviderError> {
        validate_image(image)?;
        let resp: AnalyzeResponse = self.post_image("/v1/analyze", image).await?;

        if let Some(embedding) = &resp.embedding {
            validate_embedding_dim(embedding)?;
        }

        Ok(FaceAnalysis {
            embedding: resp.embedding,
            face_count: resp.face_count,
            confidence: resp.confidence,
            quality_score: resp.quality_score,
            liveness_score: resp.liveness_score,
        })
    }
}

#[async_trait]
impl FaceProvider for LocalProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            exposes_embeddings: true,
            server_side_collections: false,
            supports_liveness: true,
        }
    }

    async fn detect_faces(&self, image: &[u8]) -> Result<Vec<DetectedFace>, ProviderError> {
        let result = async {
            validate_image(image)?;
            let resp: DetectResponse = self.post_image("/v1/detect", image).await?;
            Ok(resp
                .faces
                .into_iter()
                .map(|f| DetectedFace {
                    bounding_box: BoundingBox {
                        x: f.x,
                        y: f.y,
                        width: f.width,
                        height: f.height,
                    },
                    confidence: f.confidence,
                    quality_score: f.quality_score,
                })
                .collect())
        }
        .await;

        self.emit(
            None,
            "detect_faces",
            result.as_ref().err(),
            json!({ "image_fp": fingerprint(image) }),
        );
        result
    }

    async fn analyze_face(&self, image: &[u8]) -> Result<FaceAnalysis, ProviderError> {
        let result = self.analyze_inner(image).await;

        self.emit(
            None,
            "analyze_face",
            result.as_ref().err(),
            json!({
                "image_fp": fingerprint(image),
                "face_count": result.as_ref().map(|a| a.face_count).ok(),
            }),
        );
        result
    }

    async fn index_face(
        &self,
        tenant_id: Uuid,
        external_id: &str,
        image: &[u8],
    ) -> Result<IndexedFace, ProviderError> {
        let result = async {
            let analysis = self.analyze_inner(image).await?;

            if analysis.face_count == 0 {
                return Err(ProviderError::NoFaceDetected);
            }
            if analysis.face_count > 1 {
                return Err(ProviderError::MultipleFaces {
                    count: analysis.face_count,
                });
            }
            if analysis.quality_score < MIN_ENROLLMENT_QUALITY {
                return Err(ProviderError::QualityTooLow {
                    score: analysis.quality_score,
                    reason: "below enrollment floor".to_string(),
                });
            }

            // The sidecar keeps no state; the reference only names the
            // enrollment event for audit symmetry with collection engines.
            Ok(IndexedFace {
                provider_face_id: Uuid::new_v4().to_string(),
                embedding: analysis.embedding,
                quality_score: analysis.quality_score,
            })
        }
        .await;

        self.emit(
            Some(tenant_id),
            "index_face",
            result.as_ref().err(),
            json!({ "external_id": external_id, "image_fp": fingerprint(image) }),
        );
        result
    }

    async fn compare_embeddings(&self, a: &[f32], b: &[f32]) -> Result<f32, ProviderError> {
        let result = (|| {
            validate_embedding_dim(a)?;
            validate_embedding_dim(b)?;
            Ok(cosine_similarity(a, b).clamp(0.0, 1.0))
        })();

        self.emit(None, "compare_embeddings", result.as_ref().err(), json!({}));
        result
    }

    async fn compare_face_images(
        &self,
        image_a: &[u8],
        image_b: &[u8],
        _threshold: f32,
    ) -> Result<f32, ProviderError> {
        let result = async {
            let a = self.analyze_inner(image_a).await?;
            let b = self.analyze_inner(image_b).await?;

            match (a.embedding, b.embedding) {
                (Some(ea), Some(eb)) => Ok(cosine_similarity(&ea, &eb).clamp(0.0, 1.0)),
                _ => Ok(0.0),
            }
        }
        .await;

        self.emit(
            None,
            "compare_face_images",
            result.as_ref().err(),
            json!({
                "image_a_fp": fingerprint(image_a),
                "image_b_fp": fingerprint(image_b),
            }),
        );
        result
    }

    async fn verify_indexed(
        &self,
        tenant_id: Uuid,
        provider_face_id: &str,
        _image: &[u8],
        _threshold: f32,
    ) -> Result<f32, ProviderError> {
        let err = ProviderError::Unsupported {
            operation: "verify_indexed",
            provider: PROVIDER_NAME,
        };
        self.emit(
            Some(tenant_id),
            "verify_indexed",
            Some(&err),
            json!({ "provider_face_id": provider_face_id }),
        );
        Err(err)
    }

    async fn delete_face(
        &self,
        tenant_id: Uuid,
        provider_face_id: &str,
    ) -> Result<(), ProviderError> {
        // Nothing enrolled engine-side; deletion is a store concern.
        self.emit(
            Some(tenant_id),
            "delete_face",
            None,
            json!({ "provider_face_id": provider_face_id }),
        );
        Ok(())
    }

    async fn ensure_collection(&self, tenant_id: Uuid) -> Result<(), ProviderError> {
        self.emit(Some(tenant_id), "ensure_collection", None, json!({}));
        Ok(())
    }

    async fn delete_collection(&self, tenant_id: Uuid) -> Result<(), ProviderError> {
        self.emit(Some(tenant_id), "delete_collection", None, json!({}));
        Ok(())
    }

    async fn check_liveness(
        &self,
        image: &[u8],
        threshold: f32,
    ) -> Result<LivenessResult, ProviderError> {
        let result = async {
            validate_image(image)?;
            let resp: LivenessResponse = self
                .post_image(&format!("/v1/liveness?threshold={threshold}"), image)
                .await?;

            Ok(LivenessResult {
                is_live: resp.is_live,
                confidence: resp.confidence,
                reasons: resp.reasons,
                checks: resp
                    .checks
                    .into_iter()
                    .map(|c| LivenessCheck {
                        name: c.name,
                        passed: c.passed,
                        score: c.score,
                    })
                    .collect(),
            })
        }
        .await;

        self.emit(
            None,
            "check_liveness",
            result.as_ref().err(),
            json!({ "image_fp": fingerprint(image), "threshold": threshold }),
        );
        result
    }
}
