//! Tenant and API-key lookups.
//!
//! The directory is read-only from the service's point of view; only
//! administrative flows mutate tenants and keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::error::DirectoryError;
use super::model::{ApiKey, Tenant};

/// Async read interface over `tenants` and `api_keys`.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Fetches a tenant by id.
    async fn tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DirectoryError>;

    /// Fetches a tenant by its widget public key.
    async fn tenant_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<Tenant>, DirectoryError>;

    /// Fetches an API key (with its tenant) by key hash.
    async fn api_key_by_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<(ApiKey, Tenant)>, DirectoryError>;
}

const TENANT_COLUMNS: &str =
    "id, name, slug, is_active, settings, public_key, allowed_domains, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct TenantRow {
    id: Uuid,
    name: String,
    slug: String,
    is_active: bool,
    settings: serde_json::Value,
    public_key: String,
    allowed_domains: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            id: row.id,
            name: row.name,
            slug: row.slug,
            is_active: row.is_active,
            settings: row.settings,
            public_key: row.public_key,
            allowed_domains: row.allowed_domains,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    id: Uuid,
    tenant_id: Uuid,
    key_hash: String,
    name: String,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<ApiKeyRow> for ApiKey {
    fn from(row: ApiKeyRow) -> Self {
        ApiKey {
            id: row.id,
            tenant_id: row.tenant_id,
            key_hash: row.key_hash,
            name: row.name,
            last_used_at: row.last_used_at,
            created_at: row.created_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
        }
    }
}

/// Postgres-backed directory.
#[derive(Clone)]
pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    /// Creates a directory over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DirectoryError> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1");
        let row = sqlx::query_as::<_, TenantRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Tenant::from))
    }

    async fn tenant_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<Tenant>, DirectoryError> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE public_key = $1");
        let row = sqlx::query_as::<_, TenantRow>(&sql)
            .bind(public_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Tenant::from))
    }

    async fn api_key_by_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<(ApiKey, Tenant)>, DirectoryError> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            "SELECT id, tenant_id, key_hash, name, last_used_at, created_at, \
                    expires_at, revoked_at \
             FROM api_keys WHERE key_hash = $1",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some(key_row) = row else {
            return Ok(None);
        };
        let api_key = ApiKey::from(key_row);

        let Some(tenant) = self.tenant_by_id(api_key.tenant_id).await? else {
            return Ok(None);
        };
        Ok(Some((api_key, tenant)))
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockTenantDirectory;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use super::*;
    use parking_lot::RwLock;
    use std::collections::HashMap;

    /// In-memory directory for tests.
    #[derive(Default)]
    pub struct MockTenantDirectory {
        tenants: RwLock<HashMap<Uuid, Tenant>>,
        api_keys: RwLock<Vec<ApiKey>>,
    }

    impl MockTenantDirectory {
        /// Creates an empty directory.
        pub fn new() -> Self {
            Self::default()
        }

        /// Adds or replaces a tenant.
        pub fn put_tenant(&self, tenant: Tenant) {
            self.tenants.write().insert(tenant.id, tenant);
        }

        /// Adds an API key.
        pub fn put_api_key(&self, api_key: ApiKey) {
            self.api_keys.write().push(api_key);
        }

        /// Flips a tenant's active flag.
        pub fn set_active(&self, tenant_id: Uuid, is_active: bool) {
            if let Some(tenant) = self.tenants.write().get_mut(&tenant_id) {
                tenant.is_active = is_active;
            }
        }
    }

    #[async_trait]
    impl TenantDirectory for MockTenantDirectory {
        async fn tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DirectoryError> {
            Ok(self.tenants.read().get(&id).cloned())
        }

        async fn tenant_by_public_key(
            &self,
            public_key: &str,
        ) -> Result<Option<Tenant>, DirectoryError> {
            Ok(self
                .tenants
                .read()
                .values()
                .find(|t| t.public_key == public_key)
                .cloned())
        }

        async fn api_key_by_hash(
            &self,
            key_hash: &str,
        ) -> Result<Option<(ApiKey, Tenant)>, DirectoryError> {
            let api_key = self
                .api_keys
                .read()
                .iter()
                .find(|k| k.key_hash == key_hash)
                .cloned();

            let Some(api_key) = api_key else {
                return Ok(None);
            };
            Ok(self
                .tenants
                .read()
                .get(&api_key.tenant_id)
                .cloned()
                .map(|tenant| (api_key, tenant)))
        }
    }
}
