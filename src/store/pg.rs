//! Postgres + pgvector face store.
//!
//! Runtime queries only; embeddings cross the wire as pgvector text
//! literals and are cast with `::vector` in SQL. The HNSW index on
//! `faces.embedding` serves the ANN search; the `tenant_id` predicate is
//! always first and always present via [`TenantScopedSelect`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::Row;
use uuid::Uuid;

use super::error::StoreError;
use super::model::{FaceMatch, FaceRecord, NewFace, NewVerification, SearchAuditRecord};
use super::query::TenantScopedSelect;
use super::{FaceStore, validate_limit};
use crate::constants::validate_embedding_dim;
use crate::embedding::{from_pgvector_literal, to_pgvector_literal};

/// Column list for face reads; the vector column travels as text.
const FACE_COLUMNS: &str = "id, tenant_id, external_id, embedding::text AS embedding_text, \
     provider_face_id, metadata, quality_score, created_at, updated_at";

/// Face store over a shared connection pool.
#[derive(Clone)]
pub struct PgFaceStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct FaceRow {
    id: Uuid,
    tenant_id: Uuid,
    external_id: String,
    embedding_text: Option<String>,
    provider_face_id: Option<String>,
    metadata: serde_json::Value,
    quality_score: f32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FaceRow {
    fn into_record(self) -> Result<FaceRecord, StoreError> {
        let embedding = match self.embedding_text {
            Some(text) => Some(
                from_pgvector_literal(&text)
                    .ok_or(StoreError::CorruptEmbedding { face_id: self.id })?,
            ),
            None => None,
        };
        Ok(FaceRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            external_id: self.external_id,
            embedding,
            provider_face_id: self.provider_face_id,
            metadata: self.metadata,
            quality_score: self.quality_score,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MatchRow {
    face_id: Uuid,
    external_id: String,
    metadata: serde_json::Value,
    similarity: f64,
}

impl PgFaceStore {
    /// Creates a store over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn embedding_literal(face: &NewFace) -> Result<Option<String>, StoreError> {
        match &face.embedding {
            Some(embedding) => {
                validate_embedding_dim(embedding)?;
                Ok(Some(to_pgvector_literal(embedding)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl FaceStore for PgFaceStore {
    async fn create(&self, face: NewFace) -> Result<FaceRecord, StoreError> {
        let embedding = Self::embedding_literal(&face)?;
        let sql = format!(
            "INSERT INTO faces \
                (id, tenant_id, external_id, embedding, provider_face_id, metadata, quality_score) \
             VALUES ($1, $2, $3, $4::vector, $5, $6, $7) \
             RETURNING {FACE_COLUMNS}"
        );

        let row = sqlx::query_as::<_, FaceRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(face.tenant_id)
            .bind(&face.external_id)
            .bind(embedding)
            .bind(&face.provider_face_id)
            .bind(&face.metadata)
            .bind(face.quality_score)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::FaceExists {
                    tenant_id: face.tenant_id,
                    external_id: face.external_id.clone(),
                },
                _ => StoreError::Database(e),
            })?;

        row.into_record()
    }

    async fn update(&self, face: NewFace) -> Result<FaceRecord, StoreError> {
        let embedding = Self::embedding_literal(&face)?;
        let sql = format!(
            "UPDATE faces SET \
                embedding = $3::vector, \
                provider_face_id = $4, \
                metadata = $5, \
                quality_score = $6, \
                updated_at = now() \
             WHERE tenant_id = $1 AND external_id = $2 \
             RETURNING {FACE_COLUMNS}"
        );

        let row = sqlx::query_as::<_, FaceRow>(&sql)
            .bind(face.tenant_id)
            .bind(&face.external_id)
            .bind(embedding)
            .bind(&face.provider_face_id)
            .bind(&face.metadata)
            .bind(face.quality_score)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::FaceNotFound {
                tenant_id: face.tenant_id,
                external_id: face.external_id.clone(),
            })?;

        row.into_record()
    }

    async fn get_by_external_id(
        &self,
        tenant_id: Uuid,
        external_id: &str,
    ) -> Result<FaceRecord, StoreError> {
        let (sql, tenant) = TenantScopedSelect::new("faces", FACE_COLUMNS)
            .for_tenant(tenant_id)
            .and_where("external_id = $2")
            .build()?;

        let row = sqlx::query_as::<_, FaceRow>(&sql)
            .bind(tenant)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::FaceNotFound {
                tenant_id,
                external_id: external_id.to_string(),
            })?;

        row.into_record()
    }

    async fn delete(&self, tenant_id: Uuid, external_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM faces WHERE tenant_id = $1 AND external_id = $2")
            .bind(tenant_id)
            .bind(external_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::FaceNotFound {
                tenant_id,
                external_id: external_id.to_string(),
            });
        }
        Ok(())
    }

    async fn search_by_embedding(
        &self,
        tenant_id: Uuid,
        query: &[f32],
        threshold: f32,
        limit: u32,
    ) -> Result<Vec<FaceMatch>, StoreError> {
        validate_embedding_dim(query)?;
        validate_limit(limit)?;

        let (sql, tenant) = TenantScopedSelect::new(
            "faces",
            "id AS face_id, external_id, metadata, \
             1 - (embedding <=> $2::vector) AS similarity",
        )
        .for_tenant(tenant_id)
        .and_where("embedding IS NOT NULL")
        .and_where("1 - (embedding <=> $2::vector) >= $3")
        .order_by("embedding <=> $2::vector ASC, id::text ASC")
        .limit("$4")
        .build()?;

        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(tenant)
            .bind(to_pgvector_literal(query))
            .bind(threshold as f64)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| FaceMatch {
                face_id: r.face_id,
                external_id: r.external_id,
                metadata: r.metadata,
                similarity: r.similarity as f32,
            })
            .collect())
    }

    async fn count_by_tenant(&self, tenant_id: Uuid) -> Result<i64, StoreError> {
        let (sql, tenant) = TenantScopedSelect::new("faces", "COUNT(*)")
            .for_tenant(tenant_id)
            .build()?;

        let row = sqlx::query(&sql).bind(tenant).fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn record_verification(&self, record: NewVerification) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO verifications \
                (id, tenant_id, face_id, external_id, verified, confidence, latency_ms) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(record.tenant_id)
        .bind(record.face_id)
        .bind(&record.external_id)
        .bind(record.verified)
        .bind(record.confidence)
        .bind(record.latency_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_search_audits(
        &self,
        records: Vec<SearchAuditRecord>,
    ) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in &records {
            sqlx::query(
                "INSERT INTO search_audits \
                    (id, tenant_id, results_count, top_match_external_id, \
                     top_match_similarity, threshold, max_results, latency_ms, \
                     client_ip, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(record.id)
            .bind(record.tenant_id)
            .bind(record.results_count)
            .bind(&record.top_match_external_id)
            .bind(record.top_match_similarity)
            .bind(record.threshold)
            .bind(record.max_results)
            .bind(record.latency_ms)
            .bind(&record.client_ip)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
