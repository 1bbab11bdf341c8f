//! Tenant resolution and authentication.
//!
//! A request arrives unauthenticated and transitions to exactly one of:
//! API-key authenticated (hashed `X-API-Key` lookup), widget-session
//! authenticated (validated by the widget service) or super-admin
//! authenticated (deployment bearer token). Disabled tenants fail closed
//! on every path.

pub mod directory;
pub mod error;
pub mod model;
pub mod settings;

#[cfg(test)]
mod tests;

pub use directory::{PgTenantDirectory, TenantDirectory};
#[cfg(any(test, feature = "mock"))]
pub use directory::MockTenantDirectory;
pub use error::{AuthError, DirectoryError};
pub use model::{ApiKey, Tenant};
pub use settings::{SecurityLevel, TenantSettings};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::sync::Cache;
use uuid::Uuid;

use crate::audit::KeyTouchWriter;
use crate::hashing::hash_api_key;

/// How long a resolved key stays cached. Tenant mutation becomes visible
/// within this bound (or immediately via [`TenantResolver::invalidate`]).
pub const RESOLVER_CACHE_TTL: Duration = Duration::from_secs(60);

const RESOLVER_CACHE_CAPACITY: u64 = 10_000;

#[derive(Clone)]
struct CachedAuth {
    tenant: Tenant,
    api_key_id: Uuid,
}

/// Resolves inbound credentials to tenants.
pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
    cache: Cache<String, CachedAuth>,
    api_key_secret: String,
    admin_token: Option<String>,
    key_touch: Arc<KeyTouchWriter>,
}

impl TenantResolver {
    /// Creates a resolver with the default cache TTL.
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        api_key_secret: String,
        admin_token: Option<String>,
        key_touch: Arc<KeyTouchWriter>,
    ) -> Self {
        Self {
            directory,
            cache: Cache::builder()
                .max_capacity(RESOLVER_CACHE_CAPACITY)
                .time_to_live(RESOLVER_CACHE_TTL)
                .build(),
            api_key_secret,
            admin_token,
            key_touch,
        }
    }

    /// Authenticates a plaintext API key and returns its tenant.
    ///
    /// The key is hashed under the deployment secret and looked up by hash
    /// only. Every successful resolution enqueues a debounced
    /// `last_used_at` touch off the request path.
    pub async fn resolve_api_key(&self, plaintext: &str) -> Result<Tenant, AuthError> {
        if plaintext.is_empty() {
            return Err(AuthError::Unauthorized);
        }
        let key_hash = hash_api_key(&self.api_key_secret, plaintext);

        if let Some(cached) = self.cache.get(&key_hash) {
            if !cached.tenant.is_active {
                return Err(AuthError::Forbidden);
            }
            self.key_touch.touch(cached.api_key_id);
            return Ok(cached.tenant);
        }

        let Some((api_key, tenant)) = self.directory.api_key_by_hash(&key_hash).await? else {
            return Err(AuthError::Unauthorized);
        };
        if !api_key.is_valid_at(Utc::now()) {
            return Err(AuthError::Unauthorized);
        }
        if !tenant.is_active {
            return Err(AuthError::Forbidden);
        }

        self.cache.insert(
            key_hash,
            CachedAuth {
                tenant: tenant.clone(),
                api_key_id: api_key.id,
            },
        );
        self.key_touch.touch(api_key.id);
        Ok(tenant)
    }

    /// Resolves a widget public key to its tenant. The widget service maps
    /// a miss to its own error vocabulary.
    pub async fn resolve_public_key(&self, public_key: &str) -> Result<Option<Tenant>, AuthError> {
        if public_key.is_empty() {
            return Ok(None);
        }
        Ok(self.directory.tenant_by_public_key(public_key).await?)
    }

    /// Fetches a tenant by id (widget sessions carry only the id).
    pub async fn tenant_by_id(&self, tenant_id: Uuid) -> Result<Option<Tenant>, AuthError> {
        Ok(self.directory.tenant_by_id(tenant_id).await?)
    }

    /// Checks the super-admin bearer token. Always `false` when no token is
    /// configured.
    pub fn is_super_admin(&self, bearer: &str) -> bool {
        self.admin_token
            .as_deref()
            .is_some_and(|configured| !bearer.is_empty() && bearer == configured)
    }

    /// Drops every cached entry for a tenant, making mutations visible
    /// before TTL expiry.
    pub fn invalidate(&self, tenant_id: Uuid) {
        // Cache keys are key hashes, so scan-and-drop by tenant.
        let stale: Vec<String> = self
            .cache
            .iter()
            .filter(|(_, cached)| cached.tenant.id == tenant_id)
            .map(|(key, _)| key.as_ref().clone())
            .collect();
        for key in stale {
            self.cache.invalidate(&key);
        }
    }
}
