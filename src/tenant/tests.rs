use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde_json::json;
use uuid::Uuid;

use super::directory::MockTenantDirectory;
use super::model::{ApiKey, Tenant};
use super::settings::{SecurityLevel, TenantSettings};
use super::{AuthError, TenantResolver};
use crate::audit::{AuditConfig, Flusher, KeyTouch, KeyTouchWriter};
use crate::hashing::hash_api_key;

const SECRET: &str = "unit-test-secret";

#[derive(Default)]
struct CapturingTouchFlusher {
    touches: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl Flusher<KeyTouch> for CapturingTouchFlusher {
    async fn flush(&self, batch: Vec<KeyTouch>) {
        self.touches
            .lock()
            .extend(batch.into_iter().map(|t| t.api_key_id));
    }
}

fn make_tenant(settings: serde_json::Value) -> Tenant {
    let id = Uuid::new_v4();
    Tenant {
        id,
        name: "Acme".to_string(),
        slug: format!("acme-{id}"),
        is_active: true,
        settings,
        public_key: format!("pk_{id}"),
        allowed_domains: vec!["app.acme.test".to_string()],
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn make_api_key(tenant_id: Uuid, plaintext: &str) -> ApiKey {
    ApiKey {
        id: Uuid::new_v4(),
        tenant_id,
        key_hash: hash_api_key(SECRET, plaintext),
        name: "default".to_string(),
        last_used_at: None,
        created_at: Utc::now(),
        expires_at: None,
        revoked_at: None,
    }
}

struct Harness {
    directory: Arc<MockTenantDirectory>,
    resolver: TenantResolver,
    touch_flusher: Arc<CapturingTouchFlusher>,
    key_touch: Arc<KeyTouchWriter>,
}

fn harness(admin_token: Option<&str>) -> Harness {
    let directory = Arc::new(MockTenantDirectory::new());
    let touch_flusher = Arc::new(CapturingTouchFlusher::default());
    let key_touch = Arc::new(KeyTouchWriter::spawn(
        touch_flusher.clone(),
        AuditConfig::default(),
    ));
    let resolver = TenantResolver::new(
        directory.clone(),
        SECRET.to_string(),
        admin_token.map(str::to_string),
        key_touch.clone(),
    );
    Harness {
        directory,
        resolver,
        touch_flusher,
        key_touch,
    }
}

#[tokio::test]
async fn resolves_valid_api_key() {
    let h = harness(None);
    let tenant = make_tenant(json!({}));
    let api_key = make_api_key(tenant.id, "vk_live_1");
    h.directory.put_tenant(tenant.clone());
    h.directory.put_api_key(api_key.clone());

    let resolved = h.resolver.resolve_api_key("vk_live_1").await.unwrap();
    assert_eq!(resolved.id, tenant.id);

    // The touch lands in the background pipeline; stop() drains it.
    h.key_touch.stop().await;
    assert_eq!(h.touch_flusher.touches.lock().as_slice(), &[api_key.id]);
}

#[tokio::test]
async fn unknown_key_is_unauthorized() {
    let h = harness(None);
    let err = h.resolver.resolve_api_key("vk_unknown").await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized));
}

#[tokio::test]
async fn empty_key_is_unauthorized() {
    let h = harness(None);
    let err = h.resolver.resolve_api_key("").await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized));
}

#[tokio::test]
async fn revoked_key_is_unauthorized() {
    let h = harness(None);
    let tenant = make_tenant(json!({}));
    let mut api_key = make_api_key(tenant.id, "vk_revoked");
    api_key.revoked_at = Some(Utc::now());
    h.directory.put_tenant(tenant);
    h.directory.put_api_key(api_key);

    let err = h.resolver.resolve_api_key("vk_revoked").await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized));
}

#[tokio::test]
async fn expired_key_is_unauthorized() {
    let h = harness(None);
    let tenant = make_tenant(json!({}));
    let mut api_key = make_api_key(tenant.id, "vk_expired");
    api_key.expires_at = Some(Utc::now() - ChronoDuration::minutes(1));
    h.directory.put_tenant(tenant);
    h.directory.put_api_key(api_key);

    let err = h.resolver.resolve_api_key("vk_expired").await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized));
}

#[tokio::test]
async fn unexpired_key_still_resolves() {
    let h = harness(None);
    let tenant = make_tenant(json!({}));
    let mut api_key = make_api_key(tenant.id, "vk_fresh");
    api_key.expires_at = Some(Utc::now() + ChronoDuration::hours(1));
    h.directory.put_tenant(tenant.clone());
    h.directory.put_api_key(api_key);

    let resolved = h.resolver.resolve_api_key("vk_fresh").await.unwrap();
    assert_eq!(resolved.id, tenant.id);
}

#[tokio::test]
async fn inactive_tenant_fails_closed() {
    let h = harness(None);
    let mut tenant = make_tenant(json!({}));
    tenant.is_active = false;
    let api_key = make_api_key(tenant.id, "vk_disabled");
    h.directory.put_tenant(tenant);
    h.directory.put_api_key(api_key);

    let err = h.resolver.resolve_api_key("vk_disabled").await.unwrap_err();
    assert!(matches!(err, AuthError::Forbidden));
}

#[tokio::test]
async fn invalidate_makes_disable_visible_before_ttl() {
    let h = harness(None);
    let tenant = make_tenant(json!({}));
    let api_key = make_api_key(tenant.id, "vk_cached");
    h.directory.put_tenant(tenant.clone());
    h.directory.put_api_key(api_key);

    // Populate the cache, then disable the tenant out of band.
    h.resolver.resolve_api_key("vk_cached").await.unwrap();
    h.directory.set_active(tenant.id, false);

    // Cached copy still authenticates within the TTL.
    assert!(h.resolver.resolve_api_key("vk_cached").await.is_ok());

    h.resolver.invalidate(tenant.id);
    let err = h.resolver.resolve_api_key("vk_cached").await.unwrap_err();
    assert!(matches!(err, AuthError::Forbidden));
}

#[tokio::test]
async fn public_key_resolution() {
    let h = harness(None);
    let tenant = make_tenant(json!({}));
    h.directory.put_tenant(tenant.clone());

    let found = h
        .resolver
        .resolve_public_key(&tenant.public_key)
        .await
        .unwrap();
    assert_eq!(found.map(|t| t.id), Some(tenant.id));

    let missing = h.resolver.resolve_public_key("pk_unknown").await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn super_admin_requires_configured_token() {
    let without = harness(None);
    assert!(!without.resolver.is_super_admin("anything"));

    let with = harness(Some("sekrit"));
    assert!(with.resolver.is_super_admin("sekrit"));
    assert!(!with.resolver.is_super_admin("wrong"));
    assert!(!with.resolver.is_super_admin(""));
}

#[test]
fn settings_defaults() {
    let settings = TenantSettings::from_json(&json!({}));
    assert_eq!(settings, TenantSettings::default());
    assert_eq!(settings.verification_threshold, 0.8);
    assert_eq!(settings.search_max_results, 10);
    assert_eq!(settings.search_rate_limit, 30);
    assert!(settings.search_enabled);
    assert!(!settings.require_liveness);
    assert_eq!(settings.security_level, SecurityLevel::Standard);
    assert_eq!(settings.max_faces, 0);
}

#[test]
fn settings_overrides() {
    let settings = TenantSettings::from_json(&json!({
        "verification_threshold": 0.92,
        "search_threshold": 0.85,
        "search_max_results": 25,
        "search_rate_limit": 120,
        "search_enabled": false,
        "require_liveness": true,
        "liveness_threshold": 0.7,
        "security_level": "maximum",
        "max_faces": 50000,
    }));

    assert_eq!(settings.verification_threshold, 0.92);
    assert_eq!(settings.search_threshold, 0.85);
    assert_eq!(settings.search_max_results, 25);
    assert_eq!(settings.search_rate_limit, 120);
    assert!(!settings.search_enabled);
    assert!(settings.require_liveness);
    assert_eq!(settings.liveness_threshold, 0.7);
    assert_eq!(settings.security_level, SecurityLevel::Maximum);
    assert_eq!(settings.max_faces, 50000);
}

#[test]
fn settings_clamp_thresholds() {
    let settings = TenantSettings::from_json(&json!({
        "verification_threshold": 1.7,
        "search_threshold": -0.3,
    }));

    assert_eq!(settings.verification_threshold, 1.0);
    assert_eq!(settings.search_threshold, 0.0);
}

#[test]
fn settings_ignore_malformed_fields() {
    let settings = TenantSettings::from_json(&json!({
        "search_max_results": "lots",
        "security_level": "galactic",
    }));

    assert_eq!(settings.search_max_results, 10);
    assert_eq!(settings.security_level, SecurityLevel::Standard);
}
