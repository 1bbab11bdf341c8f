//! In-memory face store for tests.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::error::StoreError;
use super::model::{FaceMatch, FaceRecord, NewFace, NewVerification, SearchAuditRecord};
use super::{FaceStore, validate_limit};
use crate::embedding::cosine_similarity;

use async_trait::async_trait;

/// Verification row as the mock persists it.
#[derive(Debug, Clone)]
pub struct StoredVerification {
    /// The appended record.
    pub record: NewVerification,
    /// Assigned row id.
    pub id: Uuid,
}

#[derive(Default)]
struct MockState {
    faces: HashMap<(Uuid, String), FaceRecord>,
    verifications: Vec<StoredVerification>,
    search_audits: Vec<SearchAuditRecord>,
    fail_writes: bool,
}

/// In-memory [`FaceStore`] with the same visible semantics as the Postgres
/// implementation.
#[derive(Default)]
pub struct MockFaceStore {
    state: RwLock<MockState>,
}

impl MockFaceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail, for error-path tests.
    pub fn fail_writes(&self, fail: bool) {
        self.state.write().fail_writes = fail;
    }

    /// Snapshot of persisted verifications.
    pub fn verifications(&self) -> Vec<StoredVerification> {
        self.state.read().verifications.clone()
    }

    /// Snapshot of persisted search audits.
    pub fn search_audits(&self) -> Vec<SearchAuditRecord> {
        self.state.read().search_audits.clone()
    }

    fn write_guard(state: &MockState) -> Result<(), StoreError> {
        if state.fail_writes {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

#[async_trait]
impl FaceStore for MockFaceStore {
    async fn create(&self, face: NewFace) -> Result<FaceRecord, StoreError> {
        let mut state = self.state.write();
        Self::write_guard(&state)?;

        let key = (face.tenant_id, face.external_id.clone());
        if state.faces.contains_key(&key) {
            return Err(StoreError::FaceExists {
                tenant_id: face.tenant_id,
                external_id: face.external_id,
            });
        }

        let now = Utc::now();
        let record = FaceRecord {
            id: Uuid::new_v4(),
            tenant_id: face.tenant_id,
            external_id: face.external_id,
            embedding: face.embedding,
            provider_face_id: face.provider_face_id,
            metadata: face.metadata,
            quality_score: face.quality_score,
            created_at: now,
            updated_at: now,
        };
        state.faces.insert(key, record.clone());
        Ok(record)
    }

    async fn update(&self, face: NewFace) -> Result<FaceRecord, StoreError> {
        let mut state = self.state.write();
        Self::write_guard(&state)?;

        let key = (face.tenant_id, face.external_id.clone());
        let existing = state
            .faces
            .get_mut(&key)
            .ok_or_else(|| StoreError::FaceNotFound {
                tenant_id: face.tenant_id,
                external_id: face.external_id.clone(),
            })?;

        existing.embedding = face.embedding;
        existing.provider_face_id = face.provider_face_id;
        existing.metadata = face.metadata;
        existing.quality_score = face.quality_score;
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn get_by_external_id(
        &self,
        tenant_id: Uuid,
        external_id: &str,
    ) -> Result<FaceRecord, StoreError> {
        self.state
            .read()
            .faces
            .get(&(tenant_id, external_id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::FaceNotFound {
                tenant_id,
                external_id: external_id.to_string(),
            })
    }

    async fn delete(&self, tenant_id: Uuid, external_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write();
        Self::write_guard(&state)?;

        state
            .faces
            .remove(&(tenant_id, external_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::FaceNotFound {
                tenant_id,
                external_id: external_id.to_string(),
            })
    }

    async fn search_by_embedding(
        &self,
        tenant_id: Uuid,
        query: &[f32],
        threshold: f32,
        limit: u32,
    ) -> Result<Vec<FaceMatch>, StoreError> {
        crate::constants::validate_embedding_dim(query)?;
        validate_limit(limit)?;

        let state = self.state.read();
        let mut matches: Vec<FaceMatch> = state
            .faces
            .values()
            .filter(|f| f.tenant_id == tenant_id)
            .filter_map(|f| {
                let embedding = f.embedding.as_ref()?;
                let similarity = cosine_similarity(query, embedding);
                (similarity >= threshold).then(|| FaceMatch {
                    face_id: f.id,
                    external_id: f.external_id.clone(),
                    metadata: f.metadata.clone(),
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.face_id.to_string().cmp(&b.face_id.to_string()))
        });
        matches.truncate(limit as usize);
        Ok(matches)
    }

    async fn count_by_tenant(&self, tenant_id: Uuid) -> Result<i64, StoreError> {
        Ok(self
            .state
            .read()
            .faces
            .values()
            .filter(|f| f.tenant_id == tenant_id)
            .count() as i64)
    }

    async fn record_verification(&self, record: NewVerification) -> Result<(), StoreError> {
        let mut state = self.state.write();
        Self::write_guard(&state)?;

        state.verifications.push(StoredVerification {
            record,
            id: Uuid::new_v4(),
        });
        Ok(())
    }

    async fn insert_search_audits(
        &self,
        records: Vec<SearchAuditRecord>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        Self::write_guard(&state)?;

        state.search_audits.extend(records);
        Ok(())
    }
}
