//! Cloud recognition API adapter.
//!
//! The cloud engine never exposes raw embeddings: faces live in per-tenant
//! server-side collections and 1:1 verification re-submits the image
//! against the stored reference. [`Capabilities`] advertises exactly that,
//! and `compare_embeddings` refuses.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
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
use crate::hashing::fingerprint;

const PROVIDER_NAME: &str = "cloud";

/// Adapter over the hosted recognition API.
pub struct CloudProvider {
    client: reqwest::Client,
    base_url: String,
    region: Option<String>,
    collection_prefix: String,
    sink: SharedAuditSink,
}

#[derive(Debug, Deserialize)]
struct CloudErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct CloudAnalyzeResponse {
    face_count: u32,
    confidence: f32,
    quality_score: f32,
    liveness_score: f32,
}

#[derive(Debug, Deserialize)]
struct CloudDetectResponse {
    faces: Vec<CloudDetectedFace>,
}

#[derive(Debug, Deserialize)]
struct CloudDetectedFace {
    bounding_box: CloudBoundingBox,
    confidence: f32,
    quality_score: f32,
}

#[derive(Debug, Deserialize)]
struct CloudBoundingBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

#[derive(Debug, Deserialize)]
struct CloudIndexResponse {
    face_id: String,
    quality_score: f32,
}

#[derive(Debug, Deserialize)]
struct CloudSimilarityResponse {
    similarity: f32,
}

#[derive(Debug, Deserialize)]
struct CloudLivenessResponse {
    is_live: bool,
    confidence: f32,
    #[serde(default)]
    reasons: Vec<String>,
    #[serde(default)]
    checks: Vec<CloudLivenessCheck>,
}

#[derive(Debug, Deserialize)]
struct CloudLivenessCheck {
    name: String,
    passed: bool,
    score: f32,
}

impl CloudProvider {
    /// Creates an adapter for the hosted API at `base_url`.
    pub fn new(
        base_url: String,
        region: Option<String>,
        collection_prefix: String,
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
            region,
            collection_prefix,
            sink,
        })
    }

    /// Name of the tenant's server-side collection.
    pub fn collection_name(&self, tenant_id: Uuid) -> String {
        format!("{}-{}", self.collection_prefix, tenant_id)
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

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(region) = &self.region {
            builder = builder.header("x-region", region);
        }
        builder
    }

    /// Maps the API's structured error body onto the adapter vocabulary.
    fn map_error_body(status: reqwest::StatusCode, body: &str) -> ProviderError {
        if let Ok(parsed) = serde_json::from_str::<CloudErrorBody>(body) {
            return match parsed.code.as_str() {
                "NO_FACE_DETECTED" => ProviderError::NoFaceDetected,
                "MULTIPLE_FACES" => ProviderError::MultipleFaces { count: 2 },
                "LOW_QUALITY" => ProviderError::QualityTooLow {
                    score: 0.0,
                    reason: parsed.message,
                },
                "FACE_NOT_FOUND" => ProviderError::FaceNotFound {
                    provider_face_id: parsed.message,
                },
                "INVALID_IMAGE" => ProviderError::InvalidImage {
                    reason: parsed.message,
                },
                _ => ProviderError::RequestFailed {
                    provider: PROVIDER_NAME,
                    message: format!("{}: {}", parsed.code, parsed.message),
                },
            };
        }
        ProviderError::RequestFailed {
            provider: PROVIDER_NAME,
            message: format!("unexpected status {status}: {body}"),
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_error_body(status, &body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER_NAME,
                message: format!("failed to decode response: {e}"),
            })
    }

    async fn post_image<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        image: &[u8],
    ) -> Result<T, ProviderError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER_NAME,
                message: e.to_string(),
            })?;
        Self::decode(response).await
    }
}

#[async_trait]
impl FaceProvider for CloudProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            exposes_embeddings: false,
            server_side_collections: true,
            supports_liveness: true,
        }
    }

    async fn detect_faces(&self, image: &[u8]) -> Result<Vec<DetectedFace>, ProviderError> {
        let result = async {
            validate_image(image)?;
            let resp: CloudDetectResponse = self.post_image("/v1/detect", image).await?;
            Ok(resp
                .faces
                .into_iter()
                .map(|f| DetectedFace {
                    bounding_box: BoundingBox {
                        x: f.bounding_box.x,
                        y: f.bounding_box.y,
                        width: f.bounding_box.width,
                        height: f.bounding_box.height,
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
        let result = async {
            validate_image(image)?;
            let resp: CloudAnalyzeResponse = self.post_image("/v1/analyze", image).await?;
            Ok(FaceAnalysis {
                embedding: None,
                face_count: resp.face_count,
                confidence: resp.confidence,
                quality_score: resp.quality_score,
                liveness_score: resp.liveness_score,
            })
        }
        .await;

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
        let collection = self.collection_name(tenant_id);
        let result = async {
            validate_image(image)?;
            let response = self
                .request(
                    reqwest::Method::POST,
                    &format!("/v1/collections/{collection}/faces"),
                )
                .header("x-external-id", external_id)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(image.to_vec())
                .send()
                .await
                .map_err(|e| ProviderError::RequestFailed {
                    provider: PROVIDER_NAME,
                    message: e.to_string(),
                })?;
            let resp: CloudIndexResponse = Self::decode(response).await?;
            Ok(IndexedFace {
                provider_face_id: resp.face_id,
                embedding: None,
                quality_score: resp.quality_score,
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

    async fn compare_embeddings(&self, _a: &[f32], _b: &[f32]) -> Result<f32, ProviderError> {
        let err = ProviderError::Unsupported {
            operation: "compare_embeddings",
            provider: PROVIDER_NAME,
        };
        self.emit(None, "compare_embeddings", Some(&err), json!({}));
        Err(err)
    }

    async fn compare_face_images(
        &self,
        image_a: &[u8],
        image_b: &[u8],
        threshold: f32,
    ) -> Result<f32, ProviderError> {
        let result = async {
            validate_image(image_a)?;
            validate_image(image_b)?;
            let response = self
                .request(reqwest::Method::POST, "/v1/compare")
                .json(&json!({
                    "image_a": BASE64.encode(image_a),
                    "image_b": BASE64.encode(image_b),
                    "threshold": threshold,
                }))
                .send()
                .await
                .map_err(|e| ProviderError::RequestFailed {
                    provider: PROVIDER_NAME,
                    message: e.to_string(),
                })?;
            let resp: CloudSimilarityResponse = Self::decode(response).await?;
            Ok(resp.similarity.clamp(0.0, 1.0))
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
        image: &[u8],
        threshold: f32,
    ) -> Result<f32, ProviderError> {
        let collection = self.collection_name(tenant_id);
        let result = async {
            validate_image(image)?;
            let resp: CloudSimilarityResponse = self
                .post_image(
                    &format!(
                        "/v1/collections/{collection}/faces/{provider_face_id}/verify?threshold={threshold}"
                    ),
                    image,
                )
                .await?;
            Ok(resp.similarity.clamp(0.0, 1.0))
        }
        .await;

        self.emit(
            Some(tenant_id),
            "verify_indexed",
            result.as_ref().err(),
            json!({ "provider_face_id": provider_face_id, "image_fp": fingerprint(image) }),
        );
        result
    }

    async fn delete_face(
        &self,
        tenant_id: Uuid,
        provider_face_id: &str,
    ) -> Result<(), ProviderError> {
        let collection = self.collection_name(tenant_id);
        let result = async {
            let response = self
                .request(
                    reqwest::Method::DELETE,
                    &format!("/v1/collections/{collection}/faces/{provider_face_id}"),
                )
                .send()
                .await
                .map_err(|e| ProviderError::RequestFailed {
                    provider: PROVIDER_NAME,
                    message: e.to_string(),
                })?;

            let status = response.status();
            if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
                return Ok(());
            }
            let body = response.text().await.unwrap_or_default();
            Err(Self::map_error_body(status, &body))
        }
        .await;

        self.emit(
            Some(tenant_id),
            "delete_face",
            result.as_ref().err(),
            json!({ "provider_face_id": provider_face_id }),
        );
        result
    }

    async fn ensure_collection(&self, tenant_id: Uuid) -> Result<(), ProviderError> {
        let collection = self.collection_name(tenant_id);
        let result = async {
            let response = self
                .request(
                    reqwest::Method::PUT,
                    &format!("/v1/collections/{collection}"),
                )
                .send()
                .await
                .map_err(|e| ProviderError::RequestFailed {
                    provider: PROVIDER_NAME,
                    message: e.to_string(),
                })?;

            let status = response.status();
            // 409 means the collection already exists, which satisfies "ensure".
            if status.is_success() || status == reqwest::StatusCode::CONFLICT {
                return Ok(());
            }
            let body = response.text().await.unwrap_or_default();
            Err(Self::map_error_body(status, &body))
        }
        .await;

        self.emit(Some(tenant_id), "ensure_collection", result.as_ref().err(), json!({}));
        result
    }

    async fn delete_collection(&self, tenant_id: Uuid) -> Result<(), ProviderError> {
        let collection = self.collection_name(tenant_id);
        let result = async {
            let response = self
                .request(
                    reqwest::Method::DELETE,
                    &format!("/v1/collections/{collection}"),
                )
                .send()
                .await
                .map_err(|e| ProviderError::RequestFailed {
                    provider: PROVIDER_NAME,
                    message: e.to_string(),
                })?;

            let status = response.status();
            if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
                return Ok(());
            }
            let body = response.text().await.unwrap_or_default();
            Err(Self::map_error_body(status, &body))
        }
        .await;

        self.emit(Some(tenant_id), "delete_collection", result.as_ref().err(), json!({}));
        result
    }

    async fn check_liveness(
        &self,
        image: &[u8],
        threshold: f32,
    ) -> Result<LivenessResult, ProviderError> {
        let result = async {
            validate_image(image)?;
            let resp: CloudLivenessResponse = self
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
