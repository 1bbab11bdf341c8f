//! Public widget handlers. Session-authenticated except session creation.

use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use super::error::GatewayError;
use super::extract::{FormFields, client_ip, parse_session_id, validate_external_id};
use super::payload::{
    CreateSessionRequest, RegisterResponse, SessionResponse, WidgetCheckQuery,
    WidgetCheckResponse, WidgetSearchResponse,
};
use super::state::AppState;

#[instrument(skip_all)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Response, GatewayError> {
    let session = state
        .widget
        .create_session(&request.public_key, &request.origin)
        .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))).into_response())
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, GatewayError> {
    let form = FormFields::collect(multipart).await?;
    let session_id = parse_session_id(&form.require_text("session_id")?)?;
    let external_id = form.require_text("external_id")?;
    validate_external_id(&external_id)?;
    let image = form.require_image("image")?;

    let registered = state.widget.register(session_id, &external_id, image).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse::from(registered))).into_response())
}

#[instrument(skip_all)]
pub async fn validate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, GatewayError> {
    let form = FormFields::collect(multipart).await?;
    let session_id = parse_session_id(&form.require_text("session_id")?)?;
    let image = form.require_image("image")?;

    let result = state.widget.validate(session_id, image).await?;
    Ok(Json(result).into_response())
}

#[instrument(skip_all)]
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<WidgetSearchResponse>, GatewayError> {
    let form = FormFields::collect(multipart).await?;
    let session_id = parse_session_id(&form.require_text("session_id")?)?;
    let image = form.require_image("image")?;

    let identification = state
        .widget
        .search(session_id, image, &client_ip(&headers))
        .await?;
    Ok(Json(WidgetSearchResponse::from(identification)))
}

#[instrument(skip_all)]
pub async fn check(
    State(state): State<AppState>,
    Query(query): Query<WidgetCheckQuery>,
) -> Result<Json<WidgetCheckResponse>, GatewayError> {
    let session_id = parse_session_id(&query.session_id)?;
    validate_external_id(&query.external_id)?;

    let status = state.widget.check(session_id, &query.external_id).await?;
    Ok(Json(WidgetCheckResponse::from(status)))
}
