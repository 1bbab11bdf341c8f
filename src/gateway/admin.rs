//! Super-admin operations. Scope is strictly separate from the tenant
//! surface: a deployment bearer token, never an API key.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use tracing::instrument;
use uuid::Uuid;

use super::error::GatewayError;
use super::payload::{RateLimitQuery, RateLimitStatusResponse};
use super::state::AppState;

fn require_super_admin(state: &AppState, headers: &HeaderMap) -> Result<(), GatewayError> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();

    if !state.resolver.is_super_admin(bearer) {
        return Err(GatewayError::MissingCredentials);
    }
    Ok(())
}

#[instrument(skip(state, headers))]
pub async fn rate_limit_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<RateLimitQuery>,
) -> Result<Json<RateLimitStatusResponse>, GatewayError> {
    require_super_admin(&state, &headers)?;

    let count = state.limiter.current(tenant_id, &query.purpose).await?;
    Ok(Json(RateLimitStatusResponse {
        tenant_id,
        purpose: query.purpose,
        count,
    }))
}

#[instrument(skip(state, headers))]
pub async fn rate_limit_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<RateLimitQuery>,
) -> Result<StatusCode, GatewayError> {
    require_super_admin(&state, &headers)?;

    state.limiter.reset(tenant_id, &query.purpose).await?;
    Ok(StatusCode::NO_CONTENT)
}
