//! Widget sessions: browser-side face operations without tenant API keys.
//!
//! A widget session is a short-lived token bound to `(tenant, origin)`,
//! minted from the tenant's public key against its origin allowlist and
//! validated on every widget request. Face operations delegate to the face
//! service under the session's tenant.

pub mod error;
pub mod origin;
pub mod session;


pub use error::{SessionStoreError, WidgetError};
pub use origin::{NormalizedOrigin, domain_matches, normalize_origin};
#[cfg(any(test, feature = "mock"))]
pub use session::MockSessionStore;
pub use session::{PgSessionStore, SessionStore, WidgetSession};

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::instrument;
use uuid::Uuid;

use crate::constants::WIDGET_SESSION_TTL_SECS;
use crate::provider::LivenessResult;
use crate::service::{FaceService, RegisteredFace, ServiceError};
use crate::tenant::{Tenant, TenantResolver, TenantSettings};

/// Result of a widget 1:N identification.
#[derive(Debug, Clone)]
pub struct WidgetIdentification {
    /// Whether a match cleared the tenant's search threshold.
    pub identified: bool,
    /// Best match subject, when identified.
    pub external_id: Option<String>,
    /// Best match similarity, when identified.
    pub confidence: Option<f32>,
}

/// Result of a widget registration-status check.
#[derive(Debug, Clone)]
pub struct RegistrationStatus {
    /// Whether the subject has a registered face.
    pub registered: bool,
    /// When it was registered, if it is.
    pub registered_at: Option<chrono::DateTime<Utc>>,
}

/// Issues, validates and spends widget sessions.
pub struct WidgetService {
    sessions: Arc<dyn SessionStore>,
    resolver: Arc<TenantResolver>,
    faces: Arc<FaceService>,
}

impl WidgetService {
    /// Wires the widget surface to its collaborators.
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        resolver: Arc<TenantResolver>,
        faces: Arc<FaceService>,
    ) -> Self {
        Self {
            sessions,
            resolver,
            faces,
        }
    }

    /// Mints a session for a widget embedded at `origin`.
    #[instrument(skip(self, public_key))]
    pub async fn create_session(
        &self,
        public_key: &str,
        origin: &str,
    ) -> Result<WidgetSession, WidgetError> {
        if public_key.trim().is_empty() {
            return Err(WidgetError::InvalidPublicKey);
        }
        let parsed = normalize_origin(origin)?;

        let tenant = self
            .resolver
            .resolve_public_key(public_key.trim())
            .await?
            .ok_or(WidgetError::InvalidPublicKey)?;
        if !tenant.is_active {
            return Err(WidgetError::TenantDisabled);
        }

        // An empty allowlist admits nothing.
        let allowed = tenant
            .allowed_domains
            .iter()
            .any(|entry| domain_matches(entry, &parsed.host));
        if !allowed {
            return Err(WidgetError::OriginNotAllowed {
                origin: parsed.origin,
            });
        }

        let now = Utc::now();
        let session = WidgetSession {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            origin: parsed.origin,
            expires_at: now + ChronoDuration::seconds(WIDGET_SESSION_TTL_SECS),
            created_at: now,
        };
        self.sessions.create(session.clone()).await?;
        Ok(session)
    }

    /// Validates a session and loads its tenant. Every widget face
    /// operation starts here; `public_key` is never re-checked.
    pub async fn authenticate(
        &self,
        session_id: Uuid,
    ) -> Result<(WidgetSession, Tenant), WidgetError> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(WidgetError::SessionNotFound)?;

        if session.is_expired_at(Utc::now()) {
            return Err(WidgetError::SessionExpired);
        }

        let tenant = self
            .resolver
            .tenant_by_id(session.tenant_id)
            .await?
            .ok_or(WidgetError::SessionNotFound)?;
        if !tenant.is_active {
            return Err(WidgetError::TenantDisabled);
        }

        Ok((session, tenant))
    }

    /// Session-scoped register. Liveness is off by default for widget
    /// enrollments unless the tenant mandates it.
    pub async fn register(
        &self,
        session_id: Uuid,
        external_id: &str,
        image: &[u8],
    ) -> Result<RegisteredFace, WidgetError> {
        let (_, tenant) = self.authenticate(session_id).await?;
        let settings = TenantSettings::from_json(&tenant.settings);

        Ok(self
            .faces
            .register(
                &tenant,
                external_id,
                image,
                settings.require_liveness,
                settings.liveness_threshold,
            )
            .await?)
    }

    /// Session-scoped liveness check.
    pub async fn validate(
        &self,
        session_id: Uuid,
        image: &[u8],
    ) -> Result<LivenessResult, WidgetError> {
        let (_, tenant) = self.authenticate(session_id).await?;
        let settings = TenantSettings::from_json(&tenant.settings);
        Ok(self
            .faces
            .liveness(&tenant, image, settings.liveness_threshold)
            .await?)
    }

    /// Session-scoped 1:N identification: the widget only learns the top
    /// match, if any.
    pub async fn search(
        &self,
        session_id: Uuid,
        image: &[u8],
        client_ip: &str,
    ) -> Result<WidgetIdentification, WidgetError> {
        let (_, tenant) = self.authenticate(session_id).await?;

        let outcome = self
            .faces
            .search(&tenant, image, None, Some(1), client_ip)
            .await?;

        Ok(match outcome.matches.first() {
            Some(top) => WidgetIdentification {
                identified: true,
                external_id: Some(top.external_id.clone()),
                confidence: Some(top.similarity),
            },
            None => WidgetIdentification {
                identified: false,
                external_id: None,
                confidence: None,
            },
        })
    }

    /// Session-scoped registration-status check.
    pub async fn check(
        &self,
        session_id: Uuid,
        external_id: &str,
    ) -> Result<RegistrationStatus, WidgetError> {
        let (_, tenant) = self.authenticate(session_id).await?;

        match self.faces.get_face(&tenant, external_id).await {
            Ok(face) => Ok(RegistrationStatus {
                registered: true,
                registered_at: Some(face.created_at),
            }),
            Err(ServiceError::FaceNotFound { .. }) => Ok(RegistrationStatus {
                registered: false,
                registered_at: None,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes expired sessions. Run periodically.
    pub async fn cleanup_expired(&self) -> Result<u64, WidgetError> {
        Ok(self.sessions.delete_expired().await?)
    }
}
