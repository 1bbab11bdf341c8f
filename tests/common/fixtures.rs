//! Shared fixtures for integration tests: a fully wired app over mock
//! backends, plus multipart helpers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use visage::audit::{AuditConfig, Flusher, KeyTouch, KeyTouchWriter, SearchAuditWriter};
use visage::gateway::{AppState, create_router_with_state};
use visage::hashing::hash_api_key;
use visage::provider::{MockProvider, NullAuditSink};
use visage::ratelimit::MemoryRateLimiter;
use visage::service::FaceService;
use visage::store::MockFaceStore;
use visage::tenant::{ApiKey, MockTenantDirectory, Tenant, TenantResolver};
use visage::widget::{MockSessionStore, WidgetService};

pub const SECRET: &str = "integration-secret";
pub const BOUNDARY: &str = "integration-boundary";

struct NullTouchFlusher;

#[async_trait]
impl Flusher<KeyTouch> for NullTouchFlusher {
    async fn flush(&self, _batch: Vec<KeyTouch>) {}
}

/// Everything a test needs to drive the app and inspect its state.
pub struct TestApp {
    pub router: Router,
    pub directory: Arc<MockTenantDirectory>,
    pub store: Arc<MockFaceStore>,
    pub sessions: Arc<MockSessionStore>,
    pub search_audit: Arc<SearchAuditWriter>,
}

pub fn test_app() -> TestApp {
    let directory = Arc::new(MockTenantDirectory::new());
    let key_touch = Arc::new(KeyTouchWriter::spawn(
        Arc::new(NullTouchFlusher),
        AuditConfig::default(),
    ));
    let resolver = Arc::new(TenantResolver::new(
        directory.clone(),
        SECRET.to_string(),
        None,
        key_touch,
    ));

    let store = Arc::new(MockFaceStore::new());
    let limiter = Arc::new(MemoryRateLimiter::new());
    let search_audit = Arc::new(SearchAuditWriter::spawn(
        store.clone(),
        AuditConfig::default(),
    ));
    let faces = Arc::new(FaceService::new(
        Arc::new(MockProvider::new(Arc::new(NullAuditSink))),
        store.clone(),
        limiter.clone(),
        search_audit.clone(),
    ));
    let sessions = Arc::new(MockSessionStore::new());
    let widget = Arc::new(WidgetService::new(
        sessions.clone(),
        resolver.clone(),
        faces.clone(),
    ));

    let state = AppState::new(faces, widget, resolver, limiter, None);
    TestApp {
        router: create_router_with_state(state),
        directory,
        store,
        sessions,
        search_audit,
    }
}

/// Seeds an active tenant with an API key; returns the tenant and the
/// plaintext key.
pub fn seed_tenant(app: &TestApp, settings: Value) -> (Tenant, String) {
    let id = Uuid::new_v4();
    let tenant = Tenant {
        id,
        name: "Acme".to_string(),
        slug: format!("acme-{id}"),
        is_active: true,
        settings,
        public_key: format!("pk_{id}"),
        allowed_domains: vec!["*.example.com".to_string()],
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let plaintext = format!("vk_live_{id}");
    app.directory.put_tenant(tenant.clone());
    app.directory.put_api_key(ApiKey {
        id: Uuid::new_v4(),
        tenant_id: tenant.id,
        key_hash: hash_api_key(SECRET, &plaintext),
        name: "integration".to_string(),
        last_used_at: None,
        created_at: Utc::now(),
        expires_at: None,
        revoked_at: None,
    });
    (tenant, plaintext)
}

/// A deterministic fake image; the tag scripts the mock engine.
pub fn img(tag: &str) -> Vec<u8> {
    let mut bytes = tag.as_bytes().to_vec();
    bytes.resize(256, 0);
    bytes
}

pub fn multipart_body(texts: &[(&str, &str)], files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in texts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    for (name, bytes) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"face.jpg\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, api_key: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header(
        "content-type",
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
