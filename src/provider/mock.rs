//! Deterministic in-process engine for tests and demos.
//!
//! Embeddings are derived from the image bytes, so the same image always
//! produces the same vector and two different images are as good as
//! orthogonal in 512 dimensions. A handful of byte prefixes script the
//! detector:
//!
//! | Prefix     | Behavior |
//! |------------|----------|
//! | `noface`   | `face_count = 0` |
//! | `twofaces` | `face_count = 2` |
//! | `spoof`    | liveness fails (score 0.2) |
//! | `blurry`   | quality 0.2 (below the enrollment floor) |

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;
use uuid::Uuid;

use super::audit::SharedAuditSink;
use super::error::ProviderError;
use super::model::{
    BoundingBox, Capabilities, DetectedFace, FaceAnalysis, IndexedFace, LivenessCheck,
    LivenessResult, ProviderEvent,
};
use super::{FaceProvider, validate_image};
use crate::constants::EMBEDDING_DIM;
use crate::embedding::{cosine_similarity, l2_normalize};
use crate::hashing::fingerprint;

const PROVIDER_NAME: &str = "mock";

const MIN_ENROLLMENT_QUALITY: f32 = 0.4;

/// In-process mock engine with per-tenant collections.
pub struct MockProvider {
    collections: RwLock<HashMap<Uuid, HashMap<String, Vec<f32>>>>,
    sink: SharedAuditSink,
}

impl MockProvider {
    /// Creates an empty mock engine.
    pub fn new(sink: SharedAuditSink) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            sink,
        }
    }

    /// Number of faces enrolled in a tenant's collection, if it exists.
    pub fn collection_size(&self, tenant_id: Uuid) -> Option<usize> {
        self.collections.read().get(&tenant_id).map(|c| c.len())
    }

    /// Derives the deterministic embedding for an image.
    pub fn embedding_for(image: &[u8]) -> Vec<f32> {
        let mut state = fingerprint(image) | 1;
        let mut v = Vec::with_capacity(EMBEDDING_DIM);
        for _ in 0..EMBEDDING_DIM {
            // xorshift64
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let unit = (state >> 11) as f32 / (1u64 << 53) as f32;
            v.push(unit * 2.0 - 1.0);
        }
        l2_normalize(&mut v);
        v
    }

    fn scripted(image: &[u8], prefix: &[u8]) -> bool {
        image.starts_with(prefix)
    }

    fn analysis_of(image: &[u8]) -> FaceAnalysis {
        let face_count = if Self::scripted(image, b"noface") {
            0
        } else if Self::scripted(image, b"twofaces") {
            2
        } else {
            1
        };
        let quality_score = if Self::scripted(image, b"blurry") { 0.2 } else { 0.92 };
        let liveness_score = if Self::scripted(image, b"spoof") { 0.2 } else { 0.95 };

        FaceAnalysis {
            embedding: (face_count == 1).then(|| Self::embedding_for(image)),
            face_count,
            confidence: if face_count == 0 { 0.0 } else { 0.98 },
            quality_score,
            liveness_score,
        }
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
}

#[async_trait]
impl FaceProvider for MockProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            exposes_embeddings: true,
            server_side_collections: true,
            supports_liveness: true,
        }
    }

    async fn detect_faces(&self, image: &[u8]) -> Result<Vec<DetectedFace>, ProviderError> {
        let result = (|| {
            validate_image(image)?;
            let analysis = Self::analysis_of(image);
            Ok((0..analysis.face_count)
                .map(|i| DetectedFace {
                    bounding_box: BoundingBox {
                        x: 10.0 + 120.0 * i as f32,
                        y: 10.0,
                        width: 100.0,
                        height: 100.0,
                    },
                    confidence: analysis.confidence,
                    quality_score: analysis.quality_score,
                })
                .collect())
        })();

        self.emit(
            None,
            "detect_faces",
            result.as_ref().err(),
            json!({ "image_fp": fingerprint(image) }),
        );
        result
    }

    async fn analyze_face(&self, image: &[u8]) -> Result<FaceAnalysis, ProviderError> {
        let result = (|| {
            validate_image(image)?;
            Ok(Self::analysis_of(image))
        })();

        self.emit(
            None,
            "analyze_face",
            result.as_ref().err(),
            json!({
                "image_fp": fingerprint(image),
                "face_count": result.as_ref().map(|a: &FaceAnalysis| a.face_count).ok(),
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
        let result = (|| {
            validate_image(image)?;
            let analysis = Self::analysis_of(image);

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

            let embedding = analysis.embedding.expect("single face always has embedding");
            let provider_face_id = Uuid::new_v4().to_string();
            self.collections
                .write()
                .entry(tenant_id)
                .or_default()
                .insert(provider_face_id.clone(), embedding.clone());

            Ok(IndexedFace {
                provider_face_id,
                embedding: Some(embedding),
                quality_score: analysis.quality_score,
            })
        })();

        self.emit(
            Some(tenant_id),
            "index_face",
            result.as_ref().err(),
            json!({ "external_id": external_id, "image_fp": fingerprint(image) }),
        );
        result
    }

    async fn compare_embeddings(&self, a: &[f32], b: &[f32]) -> Result<f32, ProviderError> {
        let result = Ok(cosine_similarity(a, b).clamp(0.0, 1.0));
        self.emit(None, "compare_embeddings", None, json!({}));
        result
    }

    async fn compare_face_images(
        &self,
        image_a: &[u8],
        image_b: &[u8],
        _threshold: f32,
    ) -> Result<f32, ProviderError> {
        let result = (|| {
            validate_image(image_a)?;
            validate_image(image_b)?;
            let a = Self::analysis_of(image_a);
            let b = Self::analysis_of(image_b);
            match (a.embedding, b.embedding) {
                (Some(ea), Some(eb)) => Ok(cosine_similarity(&ea, &eb).clamp(0.0, 1.0)),
                _ => Ok(0.0),
            }
        })();

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
        _threshold: f32,
    ) -> Result<f32, ProviderError> {
        let result = (|| {
            validate_image(image)?;
            let collections = self.collections.read();
            let stored = collections
                .get(&tenant_id)
                .and_then(|c| c.get(provider_face_id))
                .ok_or_else(|| ProviderError::FaceNotFound {
                    provider_face_id: provider_face_id.to_string(),
                })?;

            match Self::analysis_of(image).embedding {
                Some(fresh) => Ok(cosine_similarity(stored, &fresh).clamp(0.0, 1.0)),
                None => Ok(0.0),
            }
        })();

        self.emit(
            Some(tenant_id),
            "verify_indexed",
            result.as_ref().err(),
            json!({ "provider_face_id": provider_face_id }),
        );
        result
    }

    async fn delete_face(
        &self,
        tenant_id: Uuid,
        provider_face_id: &str,
    ) -> Result<(), ProviderError> {
        if let Some(collection) = self.collections.write().get_mut(&tenant_id) {
            collection.remove(provider_face_id);
        }
        self.emit(
            Some(tenant_id),
            "delete_face",
            None,
            json!({ "provider_face_id": provider_face_id }),
        );
        Ok(())
    }

    async fn ensure_collection(&self, tenant_id: Uuid) -> Result<(), ProviderError> {
        self.collections.write().entry(tenant_id).or_default();
        self.emit(Some(tenant_id), "ensure_collection", None, json!({}));
        Ok(())
    }

    async fn delete_collection(&self, tenant_id: Uuid) -> Result<(), ProviderError> {
        self.collections.write().remove(&tenant_id);
        self.emit(Some(tenant_id), "delete_collection", None, json!({}));
        Ok(())
    }

    async fn check_liveness(
        &self,
        image: &[u8],
        threshold: f32,
    ) -> Result<LivenessResult, ProviderError> {
        let result = (|| {
            validate_image(image)?;
            let analysis = Self::analysis_of(image);
            let is_live = analysis.liveness_score >= threshold;
            let mut reasons = Vec::new();
            if !is_live {
                reasons.push("screen replay pattern detected".to_string());
            }
            Ok(LivenessResult {
                is_live,
                confidence: analysis.liveness_score,
                reasons,
                checks: vec![
                    LivenessCheck {
                        name: "moire".to_string(),
                        passed: is_live,
                        score: analysis.liveness_score,
                    },
                    LivenessCheck {
                        name: "screen_replay".to_string(),
                        passed: is_live,
                        score: analysis.liveness_score,
                    },
                ],
            })
        })();

        self.emit(
            None,
            "check_liveness",
            result.as_ref().err(),
            json!({ "image_fp": fingerprint(image), "threshold": threshold }),
        );
        result
    }
}
