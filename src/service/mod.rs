//! Face service: the hot-path orchestration under tenant policy.
//!
//! Register, verify, search, liveness and delete compose the provider
//! adapter, the face store, the rate limiter and the async audit writers.
//! Tenant policy is extracted once per operation; every downstream failure
//! is tagged with the tenant it ran for.

pub mod error;


pub use error::ServiceError;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::audit::SearchAuditWriter;
use crate::constants::{MAX_SEARCH_RESULTS, MAXIMUM_SECURITY_LIVENESS_THRESHOLD};
use crate::provider::{FaceAnalysis, FaceProvider, LivenessResult};
use crate::ratelimit::{RateDecision, RateLimiter};
use crate::store::{FaceMatch, FaceStore, NewFace, NewVerification, SearchAuditRecord, StoreError};
use crate::tenant::{SecurityLevel, Tenant, TenantSettings};

/// Rate-limit purpose tag for 1:N search.
pub const SEARCH_RATE_PURPOSE: &str = "search";

/// Window for the per-tenant search budget.
pub const SEARCH_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Outcome of a register call.
#[derive(Debug, Clone)]
pub struct RegisteredFace {
    /// Face row id.
    pub face_id: Uuid,
    /// Registered external id.
    pub external_id: String,
    /// Enrollment quality, `[0,1]`.
    pub quality_score: f32,
    /// Row creation time.
    pub created_at: chrono::DateTime<Utc>,
    /// `true` when this call created the row, `false` when it updated.
    pub created: bool,
}

/// Outcome of a verify call.
#[derive(Debug, Clone)]
pub struct Verification {
    /// Verdict at the tenant threshold.
    pub verified: bool,
    /// Measured similarity, `[0,1]`.
    pub confidence: f32,
    /// Subject identifier verified against.
    pub external_id: String,
    /// End-to-end latency.
    pub latency_ms: i64,
}

/// Outcome of a search call.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Matches ordered by similarity descending.
    pub matches: Vec<FaceMatch>,
    /// Identifier of this search, also keyed in the audit log.
    pub search_id: Uuid,
    /// End-to-end latency.
    pub latency_ms: i64,
}

/// Orchestrates face operations for authenticated tenants.
pub struct FaceService {
    provider: Arc<dyn FaceProvider>,
    store: Arc<dyn FaceStore>,
    limiter: Arc<dyn RateLimiter>,
    search_audit: Arc<SearchAuditWriter>,
}

impl FaceService {
    /// Wires the service to its collaborators.
    pub fn new(
        provider: Arc<dyn FaceProvider>,
        store: Arc<dyn FaceStore>,
        limiter: Arc<dyn RateLimiter>,
        search_audit: Arc<SearchAuditWriter>,
    ) -> Self {
        Self {
            provider,
            store,
            limiter,
            search_audit,
        }
    }

    /// Registers or updates a face under `(tenant, external_id)`.
    ///
    /// The same external id always resolves to one face: a second register
    /// replaces the stored embedding, quality and provider reference in
    /// place.
    #[instrument(skip(self, tenant, image), fields(tenant_id = %tenant.id))]
    pub async fn register(
        &self,
        tenant: &Tenant,
        external_id: &str,
        image: &[u8],
        require_liveness: bool,
        liveness_threshold: f32,
    ) -> Result<RegisteredFace, ServiceError> {
        let analysis = self.analyze_single_face(tenant.id, image).await?;

        if require_liveness && analysis.liveness_score < liveness_threshold {
            return Err(ServiceError::LivenessFailed {
                score: analysis.liveness_score,
                threshold: liveness_threshold,
            });
        }

        let existing = match self.store.get_by_external_id(tenant.id, external_id).await {
            Ok(face) => Some(face),
            Err(StoreError::FaceNotFound { .. }) => None,
            Err(e) => return Err(ServiceError::from_store(tenant.id, e)),
        };

        // Quota applies to new enrollments only; updates never grow the set.
        if existing.is_none() {
            let settings = TenantSettings::from_json(&tenant.settings);
            if settings.max_faces > 0 {
                let count = self
                    .store
                    .count_by_tenant(tenant.id)
                    .await
                    .map_err(|e| ServiceError::from_store(tenant.id, e))?;
                if count >= settings.max_faces {
                    return Err(ServiceError::QuotaExceeded {
                        count,
                        max_faces: settings.max_faces,
                    });
                }
            }
        }

        let indexed = self
            .provider
            .index_face(tenant.id, external_id, image)
            .await
            .map_err(|e| ServiceError::from_provider(tenant.id, e))?;

        let new_face = NewFace {
            tenant_id: tenant.id,
            external_id: external_id.to_string(),
            embedding: indexed.embedding.clone(),
            provider_face_id: Some(indexed.provider_face_id.clone()),
            metadata: existing
                .as_ref()
                .map(|f| f.metadata.clone())
                .unwrap_or_else(|| serde_json::json!({})),
            quality_score: indexed.quality_score,
        };

        let write = if existing.is_some() {
            self.store.update(new_face).await
        } else {
            self.store.create(new_face).await
        };

        let record = match write {
            Ok(record) => record,
            Err(e) => {
                // The engine now holds a face the store never saw; undo it
                // best-effort so collections do not accumulate orphans.
                if let Err(del) = self
                    .provider
                    .delete_face(tenant.id, &indexed.provider_face_id)
                    .await
                {
                    warn!(
                        tenant_id = %tenant.id,
                        provider_face_id = %indexed.provider_face_id,
                        error = %del,
                        "failed to undo provider enrollment after store failure"
                    );
                }
                return Err(ServiceError::from_store(tenant.id, e));
            }
        };

        Ok(RegisteredFace {
            face_id: record.id,
            external_id: record.external_id,
            quality_score: record.quality_score,
            created_at: record.created_at,
            created: existing.is_none(),
        })
    }

    /// 1:1 verification of an image against a registered face.
    #[instrument(skip(self, tenant, image), fields(tenant_id = %tenant.id))]
    pub async fn verify(
        &self,
        tenant: &Tenant,
        external_id: &str,
        image: &[u8],
    ) -> Result<Verification, ServiceError> {
        let started = Instant::now();
        let settings = TenantSettings::from_json(&tenant.settings);

        let face = self
            .store
            .get_by_external_id(tenant.id, external_id)
            .await
            .map_err(|e| ServiceError::from_store(tenant.id, e))?;

        let analysis = self.analyze_single_face(tenant.id, image).await?;

        let confidence = self
            .similarity_to_stored(tenant.id, &face, &analysis, image, &settings)
            .await?;

        let verified = confidence >= settings.verification_threshold;
        let latency_ms = started.elapsed().as_millis() as i64;

        // The verification log is best-effort; losing a row never fails
        // the verify itself.
        if let Err(e) = self
            .store
            .record_verification(NewVerification {
                tenant_id: tenant.id,
                face_id: Some(face.id),
                external_id: external_id.to_string(),
                verified,
                confidence,
                latency_ms,
            })
            .await
        {
            warn!(tenant_id = %tenant.id, error = %e, "failed to append verification record");
        }

        Ok(Verification {
            verified,
            confidence,
            external_id: external_id.to_string(),
            latency_ms,
        })
    }

    /// 1:N search within the tenant's registered faces.
    #[instrument(skip(self, tenant, image), fields(tenant_id = %tenant.id))]
    pub async fn search(
        &self,
        tenant: &Tenant,
        image: &[u8],
        threshold: Option<f32>,
        max_results: Option<u32>,
        client_ip: &str,
    ) -> Result<SearchOutcome, ServiceError> {
        let started = Instant::now();
        let settings = TenantSettings::from_json(&tenant.settings);

        if !settings.search_enabled {
            return Err(ServiceError::SearchNotEnabled);
        }

        let threshold = match threshold {
            Some(value) if (0.0..=1.0).contains(&value) => value,
            Some(value) => return Err(ServiceError::InvalidThreshold { value }),
            None => settings.search_threshold,
        };

        let max_results = match max_results {
            Some(value) if (1..=MAX_SEARCH_RESULTS).contains(&value) => value,
            Some(value) => return Err(ServiceError::InvalidMaxResults { value }),
            None if (1..=MAX_SEARCH_RESULTS).contains(&settings.search_max_results) => {
                settings.search_max_results
            }
            None => {
                return Err(ServiceError::InvalidMaxResults {
                    value: settings.search_max_results,
                });
            }
        };

        // The budget burns before any engine work happens.
        if let RateDecision::Denied { count, limit, .. } = self
            .limiter
            .check(
                tenant.id,
                SEARCH_RATE_PURPOSE,
                settings.search_rate_limit,
                SEARCH_RATE_WINDOW,
            )
            .await
        {
            return Err(ServiceError::SearchRateLimitExceeded { count, limit });
        }

        let analysis = self.analyze_single_face(tenant.id, image).await?;

        if settings.security_level == SecurityLevel::Maximum {
            let floor = settings
                .liveness_threshold
                .max(MAXIMUM_SECURITY_LIVENESS_THRESHOLD);
            if analysis.liveness_score < floor {
                return Err(ServiceError::LivenessFailed {
                    score: analysis.liveness_score,
                    threshold: floor,
                });
            }
        }

        let Some(embedding) = analysis.embedding else {
            return Err(ServiceError::Provider {
                tenant_id: tenant.id,
                source: crate::provider::ProviderError::Unsupported {
                    operation: "embedding search",
                    provider: self.provider.name(),
                },
            });
        };

        let matches = self
            .store
            .search_by_embedding(tenant.id, &embedding, threshold, max_results)
            .await
            .map_err(|e| ServiceError::from_store(tenant.id, e))?;

        let search_id = Uuid::new_v4();
        let latency_ms = started.elapsed().as_millis() as i64;

        self.search_audit.enqueue(SearchAuditRecord {
            id: search_id,
            tenant_id: tenant.id,
            results_count: matches.len() as i32,
            top_match_external_id: matches.first().map(|m| m.external_id.clone()),
            top_match_similarity: matches.first().map(|m| m.similarity),
            threshold,
            max_results: max_results as i32,
            latency_ms,
            client_ip: client_ip.to_string(),
            created_at: Utc::now(),
        });

        Ok(SearchOutcome {
            matches,
            search_id,
            latency_ms,
        })
    }

    /// Explicit passive-liveness check. No tenant state changes.
    #[instrument(skip(self, tenant, image), fields(tenant_id = %tenant.id))]
    pub async fn liveness(
        &self,
        tenant: &Tenant,
        image: &[u8],
        threshold: f32,
    ) -> Result<LivenessResult, ServiceError> {
        self.provider
            .check_liveness(image, threshold)
            .await
            .map_err(|e| ServiceError::from_provider(tenant.id, e))
    }

    /// Deletes a face. The store row is authoritative; the provider-side
    /// cleanup is best-effort once the row is gone.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id))]
    pub async fn delete(&self, tenant: &Tenant, external_id: &str) -> Result<(), ServiceError> {
        let face = self
            .store
            .get_by_external_id(tenant.id, external_id)
            .await
            .map_err(|e| ServiceError::from_store(tenant.id, e))?;

        self.store
            .delete(tenant.id, external_id)
            .await
            .map_err(|e| ServiceError::from_store(tenant.id, e))?;

        if let Some(provider_face_id) = face.provider_face_id {
            if let Err(e) = self.provider.delete_face(tenant.id, &provider_face_id).await {
                warn!(
                    tenant_id = %tenant.id,
                    provider_face_id = %provider_face_id,
                    error = %e,
                    "provider-side face cleanup failed after store delete"
                );
            }
        }
        Ok(())
    }

    /// Fetches face metadata by external id.
    pub async fn get_face(
        &self,
        tenant: &Tenant,
        external_id: &str,
    ) -> Result<crate::store::FaceRecord, ServiceError> {
        self.store
            .get_by_external_id(tenant.id, external_id)
            .await
            .map_err(|e| ServiceError::from_store(tenant.id, e))
    }

    async fn analyze_single_face(
        &self,
        tenant_id: Uuid,
        image: &[u8],
    ) -> Result<FaceAnalysis, ServiceError> {
        let analysis = self
            .provider
            .analyze_face(image)
            .await
            .map_err(|e| ServiceError::from_provider(tenant_id, e))?;

        if analysis.face_count == 0 {
            return Err(ServiceError::NoFaceDetected);
        }
        if analysis.face_count > 1 {
            return Err(ServiceError::MultipleFaces {
                count: analysis.face_count,
            });
        }
        Ok(analysis)
    }

    /// Similarity of a fresh capture to a stored face, choosing the path
    /// from declared capabilities: embedding comparison when both sides
    /// have vectors, engine-native verify against the stored reference
    /// otherwise.
    async fn similarity_to_stored(
        &self,
        tenant_id: Uuid,
        face: &crate::store::FaceRecord,
        analysis: &FaceAnalysis,
        image: &[u8],
        settings: &TenantSettings,
    ) -> Result<f32, ServiceError> {
        if self.provider.capabilities().exposes_embeddings {
            if let (Some(stored), Some(fresh)) =
                (face.embedding.as_deref(), analysis.embedding.as_deref())
            {
                return self
                    .provider
                    .compare_embeddings(stored, fresh)
                    .await
                    .map_err(|e| ServiceError::from_provider(tenant_id, e));
            }
        }

        let Some(provider_face_id) = face.provider_face_id.as_deref() else {
            return Err(ServiceError::Internal {
                message: format!(
                    "face {} has neither embedding nor provider reference",
                    face.id
                ),
            });
        };

        self.provider
            .verify_indexed(
                tenant_id,
                provider_face_id,
                image,
                settings.verification_threshold,
            )
            .await
            .map_err(|e| ServiceError::from_provider(tenant_id, e))
    }
}
