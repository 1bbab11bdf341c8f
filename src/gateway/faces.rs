//! Tenant-API-key-authenticated face handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::instrument;

use super::error::GatewayError;
use super::extract::{FormFields, client_ip, validate_external_id};
use super::payload::{
    FaceResponse, RegisterResponse, SearchQuery, SearchResponse, VerifyResponse,
};
use super::state::AppState;
use crate::tenant::{Tenant, TenantSettings};

/// Tenant resolved by the API-key middleware, available as an extension.
#[derive(Clone)]
pub struct AuthedTenant(pub Arc<Tenant>);

/// Middleware: hash `X-API-Key`, resolve the tenant, fail closed.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let api_key = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();

    if api_key.is_empty() {
        return Err(GatewayError::MissingCredentials);
    }

    let tenant = state.resolver.resolve_api_key(api_key).await?;
    request
        .extensions_mut()
        .insert(AuthedTenant(Arc::new(tenant)));
    Ok(next.run(request).await)
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    axum::Extension(AuthedTenant(tenant)): axum::Extension<AuthedTenant>,
    multipart: Multipart,
) -> Result<Response, GatewayError> {
    let form = FormFields::collect(multipart).await?;
    let external_id = form.require_text("external_id")?;
    validate_external_id(&external_id)?;
    let image = form.require_image("image")?;

    let settings = TenantSettings::from_json(&tenant.settings);
    let registered = state
        .faces
        .register(
            &tenant,
            &external_id,
            image,
            settings.require_liveness,
            settings.liveness_threshold,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse::from(registered))).into_response())
}

#[instrument(skip_all)]
pub async fn verify(
    State(state): State<AppState>,
    axum::Extension(AuthedTenant(tenant)): axum::Extension<AuthedTenant>,
    multipart: Multipart,
) -> Result<Json<VerifyResponse>, GatewayError> {
    let form = FormFields::collect(multipart).await?;
    let external_id = form.require_text("external_id")?;
    validate_external_id(&external_id)?;
    let image = form.require_image("image")?;

    let verification = state.faces.verify(&tenant, &external_id, image).await?;
    Ok(Json(VerifyResponse::from(verification)))
}

#[instrument(skip_all)]
pub async fn search(
    State(state): State<AppState>,
    axum::Extension(AuthedTenant(tenant)): axum::Extension<AuthedTenant>,
    Query(query): Query<SearchQuery>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<SearchResponse>, GatewayError> {
    let form = FormFields::collect(multipart).await?;
    let image = form.require_image("image")?;

    let outcome = state
        .faces
        .search(
            &tenant,
            image,
            query.threshold,
            query.max_results,
            &client_ip(&headers),
        )
        .await?;

    Ok(Json(SearchResponse::from(outcome)))
}

#[instrument(skip_all, fields(external_id = %external_id))]
pub async fn get_face(
    State(state): State<AppState>,
    axum::Extension(AuthedTenant(tenant)): axum::Extension<AuthedTenant>,
    Path(external_id): Path<String>,
) -> Result<Json<FaceResponse>, GatewayError> {
    validate_external_id(&external_id)?;
    let face = state.faces.get_face(&tenant, &external_id).await?;
    Ok(Json(FaceResponse::from(face)))
}

#[instrument(skip_all, fields(external_id = %external_id))]
pub async fn delete_face(
    State(state): State<AppState>,
    axum::Extension(AuthedTenant(tenant)): axum::Extension<AuthedTenant>,
    Path(external_id): Path<String>,
) -> Result<StatusCode, GatewayError> {
    validate_external_id(&external_id)?;
    state.faces.delete(&tenant, &external_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all)]
pub async fn liveness(
    State(state): State<AppState>,
    axum::Extension(AuthedTenant(tenant)): axum::Extension<AuthedTenant>,
    multipart: Multipart,
) -> Result<Response, GatewayError> {
    let form = FormFields::collect(multipart).await?;
    let image = form.require_image("image")?;

    let settings = TenantSettings::from_json(&tenant.settings);
    let result = state
        .faces
        .liveness(&tenant, image, settings.liveness_threshold)
        .await?;

    Ok(Json(result).into_response())
}
