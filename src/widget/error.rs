use thiserror::Error;

use crate::service::ServiceError;
use crate::tenant::AuthError;

#[derive(Debug, Error)]
/// Errors surfaced by the widget surface.
pub enum WidgetError {
    /// Origin was missing, unparseable, or not http(s) with a host.
    #[error("invalid origin: {reason}")]
    InvalidOrigin {
        /// Rejection reason.
        reason: String,
    },

    /// Public key was missing or matched no tenant.
    #[error("invalid widget public key")]
    InvalidPublicKey,

    /// The origin is not on the tenant's allowlist (or the allowlist is
    /// empty, which refuses everything).
    #[error("origin not allowed: {origin}")]
    OriginNotAllowed {
        /// The refused origin.
        origin: String,
    },

    /// Session id matched no session.
    #[error("unknown widget session")]
    SessionNotFound,

    /// Session exists but its lifetime has passed.
    #[error("widget session expired")]
    SessionExpired,

    /// The session's tenant has been disabled since issuance.
    #[error("tenant is disabled")]
    TenantDisabled,

    /// Session storage failure.
    #[error(transparent)]
    Store(#[from] SessionStoreError),

    /// Tenant resolution failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Failure in the delegated face operation.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Debug, Error)]
/// Errors from widget session storage.
pub enum SessionStoreError {
    /// Underlying database failure.
    #[error("session store error: {0}")]
    Database(#[from] sqlx::Error),
}
