//! HTTP gateway (Axum) for the face and widget surfaces.
//!
//! The dispatcher validates inputs, applies tenant defaults, converts
//! domain errors to stable wire codes and surfaces latency. No business
//! logic lives here.

#![allow(missing_docs)]

pub mod admin;
pub mod error;
pub mod extract;
pub mod faces;
pub mod payload;
pub mod state;
pub mod widget;


pub use error::{ErrorResponse, GatewayError};
pub use state::AppState;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::constants::MAX_IMAGE_BYTES;

/// Headroom above the raw image size for multipart framing and text parts.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Builds the `/v1` application router.
pub fn create_router_with_state(state: AppState) -> Router {
    let faces = Router::new()
        .route("/faces/register", post(faces::register))
        .route("/faces/verify", post(faces::verify))
        .route("/faces/search", post(faces::search))
        .route("/faces/liveness", post(faces::liveness))
        .route(
            "/faces/{external_id}",
            get(faces::get_face).delete(faces::delete_face),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            faces::require_api_key,
        ));

    // The widget surface is called from third-party pages; origins are
    // enforced at session creation, so CORS stays permissive here.
    let widget_routes = Router::new()
        .route("/widget/session", post(widget::create_session))
        .route("/widget/register", post(widget::register))
        .route("/widget/validate", post(widget::validate))
        .route("/widget/search", post(widget::search))
        .route("/widget/check", get(widget::check))
        .layer(CorsLayer::permissive());

    let admin_routes = Router::new().route(
        "/admin/tenants/{tenant_id}/rate-limit",
        get(admin::rate_limit_status).delete(admin::rate_limit_reset),
    );

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .nest("/v1", faces.merge(widget_routes).merge(admin_routes))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + BODY_LIMIT_SLACK))
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub database: &'static str,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    (StatusCode::OK, Json(HealthResponse { status: "ok" })).into_response()
}

#[tracing::instrument(skip(state))]
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let database = match &state.db {
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => "ready",
            Err(_) => "error",
        },
        None => "ready",
    };

    let is_ready = database == "ready";
    let status_code = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let status = if is_ready { "ok" } else { "pending" };

    (
        status_code,
        Json(ReadyResponse {
            status,
            components: ComponentStatus {
                http: "ready",
                database,
            },
        }),
    )
        .into_response()
}
