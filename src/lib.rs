//! # Visage
//!
//! Multi-tenant Face Recognition as a Service backend.
//!
//! Visage sits between tenant applications (or the browser widget) and a
//! pluggable face engine.
//!
//! ```text
//! Request → Tenant auth → Rate limit → Face engine → Vector store → Audit (async)
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use visage::Config;
//!
//! # fn run() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Listening on {}", config.socket_addr());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Purpose |
//! |---------|---------|
//! | `mock` | In-memory backends for tests/demos |
//!
//! ## Modules
//!
//! - [`provider`] - Face engine adapters (local sidecar, cloud API)
//! - [`store`] - Tenant-scoped face persistence + cosine vector search
//! - [`ratelimit`] - Per-tenant sliding-window counters
//! - [`audit`] - Fire-and-forget audit pipelines
//! - [`service`] - Register / verify / search / liveness orchestration
//! - [`widget`] - Short-lived browser sessions
//! - [`tenant`] - Tenant resolution, API-key auth, policy extraction
//! - [`gateway`] - Axum HTTP surface
//! - [`config`] - Environment-backed configuration
//!
//! Links: repo/issues at the crate `repository` URL.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod audit;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod gateway;
pub mod hashing;
pub mod provider;
pub mod ratelimit;
pub mod service;
pub mod store;
pub mod tenant;
pub mod widget;

pub use audit::{
    AuditConfig, AuditPipeline, DebounceMap, Flusher, KeyTouch, KeyTouchWriter,
    PgKeyTouchFlusher, ProviderEventWriter, SearchAuditWriter,
};
pub use config::{Config, ConfigError, Environment, ProviderType};
pub use constants::{
    EMBEDDING_DIM, MAX_EXTERNAL_ID_LEN, MAX_IMAGE_BYTES, MAX_SEARCH_RESULTS, MIN_IMAGE_BYTES,
    WIDGET_SESSION_TTL_SECS, validate_embedding_dim,
};
pub use gateway::{AppState, GatewayError, create_router_with_state};
pub use hashing::{fingerprint, hash_api_key};
pub use provider::{
    AuditSink, Capabilities, CloudProvider, FaceAnalysis, FaceProvider, IndexedFace,
    LivenessResult, LocalProvider, NullAuditSink, ProviderError, ProviderEvent, build_provider,
    validate_image,
};
#[cfg(any(test, feature = "mock"))]
pub use provider::{CapturingAuditSink, MockProvider};
pub use ratelimit::{PgRateLimiter, RateDecision, RateLimitError, RateLimiter};
#[cfg(any(test, feature = "mock"))]
pub use ratelimit::MemoryRateLimiter;
pub use service::{FaceService, RegisteredFace, SearchOutcome, ServiceError, Verification};
pub use store::{
    FaceMatch, FaceRecord, FaceStore, NewFace, NewVerification, PgFaceStore, SearchAuditRecord,
    StoreError, TenantScopedSelect,
};
#[cfg(any(test, feature = "mock"))]
pub use store::MockFaceStore;
pub use tenant::{
    ApiKey, AuthError, PgTenantDirectory, SecurityLevel, Tenant, TenantDirectory, TenantResolver,
    TenantSettings,
};
#[cfg(any(test, feature = "mock"))]
pub use tenant::MockTenantDirectory;
pub use widget::{
    PgSessionStore, SessionStore, WidgetError, WidgetService, WidgetSession, domain_matches,
    normalize_origin,
};
#[cfg(any(test, feature = "mock"))]
pub use widget::MockSessionStore;
