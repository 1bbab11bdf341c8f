use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A tenant row.
#[derive(Debug, Clone)]
pub struct Tenant {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Unique short name.
    pub slug: String,
    /// Soft-disable flag; disabled tenants fail closed.
    pub is_active: bool,
    /// Typed configuration, parsed per request by
    /// [`TenantSettings::from_json`](crate::tenant::TenantSettings::from_json).
    pub settings: serde_json::Value,
    /// Widget public key.
    pub public_key: String,
    /// Widget origin allowlist (hosts, `*.` wildcards allowed).
    pub allowed_domains: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// An API key row. The plaintext never exists server-side; lookup is by
/// keyed hash only.
#[derive(Debug, Clone)]
pub struct ApiKey {
    /// Row id.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Keyed BLAKE3 hash of the plaintext, hex.
    pub key_hash: String,
    /// Display name.
    pub name: String,
    /// Last observed use; eventually consistent.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Revocation time, if revoked.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// A key is valid iff it is not revoked and not expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.is_none_or(|expires| expires > now)
    }
}
