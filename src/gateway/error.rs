//! Wire-code mapping.
//!
//! Only this module turns domain errors into HTTP form. The envelope is
//! always `{code, message}` with the stable codes consumers key on.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::ratelimit::RateLimitError;
use crate::service::ServiceError;
use crate::tenant::AuthError;
use crate::widget::WidgetError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{message}")]
    Validation { message: String },

    #[error("missing or invalid credentials")]
    MissingCredentials,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Widget(#[from] WidgetError),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error("request body could not be read: {message}")]
    Body { message: String },
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

impl GatewayError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            GatewayError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
            GatewayError::Body { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
            GatewayError::MissingCredentials => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            GatewayError::Auth(e) => auth_status_and_code(e),
            GatewayError::Service(e) => service_status_and_code(e),
            GatewayError::Widget(e) => widget_status_and_code(e),
            GatewayError::RateLimit(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        }
    }
}

fn auth_status_and_code(error: &AuthError) -> (StatusCode, &'static str) {
    match error {
        AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        AuthError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        AuthError::Directory(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
    }
}

fn service_status_and_code(error: &ServiceError) -> (StatusCode, &'static str) {
    match error {
        ServiceError::InvalidThreshold { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_THRESHOLD")
        }
        ServiceError::InvalidMaxResults { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_MAX_RESULTS")
        }
        ServiceError::InvalidImage { .. } => (StatusCode::BAD_REQUEST, "INVALID_IMAGE"),
        ServiceError::NoFaceDetected => (StatusCode::UNPROCESSABLE_ENTITY, "NO_FACE_DETECTED"),
        ServiceError::MultipleFaces { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "MULTIPLE_FACES"),
        ServiceError::LivenessFailed { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "LIVENESS_FAILED"),
        ServiceError::FaceNotFound { .. } => (StatusCode::NOT_FOUND, "FACE_NOT_FOUND"),
        ServiceError::FaceExists { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "FACE_ALREADY_EXISTS")
        }
        ServiceError::SearchNotEnabled => (StatusCode::FORBIDDEN, "SEARCH_NOT_ENABLED"),
        ServiceError::SearchRateLimitExceeded { .. } => {
            (StatusCode::TOO_MANY_REQUESTS, "SEARCH_RATE_LIMIT_EXCEEDED")
        }
        ServiceError::QuotaExceeded { .. } => (StatusCode::FORBIDDEN, "QUOTA_EXCEEDED"),
        ServiceError::Provider { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "PROVIDER_ERROR"),
        ServiceError::Store { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        ServiceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

fn widget_status_and_code(error: &WidgetError) -> (StatusCode, &'static str) {
    match error {
        WidgetError::InvalidOrigin { .. } => (StatusCode::BAD_REQUEST, "INVALID_ORIGIN"),
        WidgetError::InvalidPublicKey => (StatusCode::UNAUTHORIZED, "INVALID_PUBLIC_KEY"),
        WidgetError::OriginNotAllowed { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        WidgetError::SessionNotFound => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        WidgetError::SessionExpired => (StatusCode::UNAUTHORIZED, "SESSION_EXPIRED"),
        WidgetError::TenantDisabled => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        WidgetError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        WidgetError::Auth(e) => auth_status_and_code(e),
        WidgetError::Service(e) => service_status_and_code(e),
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // 5xx details stay in the logs; the wire gets a stable summary.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { code, message })).into_response()
    }
}
