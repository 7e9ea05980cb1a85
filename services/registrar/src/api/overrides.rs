//! Admin override API handlers.
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use std::collections::HashMap;
use uuid::Uuid;

use crate::api::error::{api_internal, api_internal_message, api_validation_error, ApiError};
use crate::api::types::{
    OverrideCreateRequest, OverrideCreateResponse, OverrideListResponse, OverrideProcessRequest,
};
use crate::api::{require_context, require_permission};
use crate::app::AppState;
use crate::auth::permissions::{OVERRIDE_PROCESS, OVERRIDE_REQUEST};
use crate::enrollment::overrides::{create_request, process_request};
use crate::enrollment::OverrideDecision;
use crate::model::{OverrideRequest, OverrideState};

#[utoipa::path(
    post,
    path = "/v1/admin/overrides",
    tag = "overrides",
    request_body = OverrideCreateRequest,
    responses(
        (status = 201, description = "Pending request created", body = OverrideCreateResponse),
        (status = 404, description = "Student or course not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_override(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<OverrideCreateRequest>,
) -> Result<(axum::http::StatusCode, Json<OverrideCreateResponse>), ApiError> {
    let ctx = require_context(&state, &headers).await?;
    let target = HashMap::from([("course_id".to_string(), body.course_id.clone())]);
    require_permission(&state, &ctx, OVERRIDE_REQUEST, &target).await?;

    let request = create_request(
        state.store.as_ref(),
        &ctx.user_id,
        &body.student_id,
        &body.course_id,
        body.kind,
        body.reason,
    )
    .await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(OverrideCreateResponse {
            request_id: request.request_id,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/admin/overrides/{request_id}/process",
    tag = "overrides",
    params(("request_id" = Uuid, Path, description = "Override request identifier")),
    request_body = OverrideProcessRequest,
    responses(
        (status = 200, description = "Processed request", body = OverrideRequest),
        (status = 409, description = "Already processed", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn process_override(
    Path(request_id): Path<Uuid>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<OverrideProcessRequest>,
) -> Result<Json<OverrideRequest>, ApiError> {
    let ctx = require_context(&state, &headers).await?;
    require_permission(&state, &ctx, OVERRIDE_PROCESS, &HashMap::new()).await?;
    let decision = OverrideDecision::parse(&body.action)
        .ok_or_else(|| api_validation_error("action must be approve or reject"))?;

    // Run detached: approval invokes the enrollment engine, and a client
    // disconnect must not abort that transaction once the course lock is held.
    let store = state.store.clone();
    let engine = state.engine.clone();
    let actor = ctx.user_id.clone();
    let notes = body.notes;
    let processed = tokio::spawn(async move {
        process_request(
            store.as_ref(),
            engine.as_ref(),
            &actor,
            request_id,
            decision,
            notes,
        )
        .await
    })
    .await
    .map_err(|_| api_internal_message("override processing task failed"))??;
    Ok(Json(processed))
}

#[utoipa::path(
    get,
    path = "/v1/admin/overrides",
    tag = "overrides",
    params(("state" = Option<String>, Query, description = "Filter by request state")),
    responses(
        (status = 200, description = "Override requests", body = OverrideListResponse)
    )
)]
pub(crate) async fn list_overrides(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<OverrideListResponse>, ApiError> {
    let ctx = require_context(&state, &headers).await?;
    require_permission(&state, &ctx, OVERRIDE_PROCESS, &HashMap::new()).await?;

    let filter = match params.get("state") {
        Some(raw) => Some(
            OverrideState::parse(raw)
                .ok_or_else(|| api_validation_error("unknown override state"))?,
        ),
        None => None,
    };
    let items = state
        .store
        .list_overrides(filter)
        .await
        .map_err(|err| api_internal("failed to list override requests", &err))?;
    Ok(Json(OverrideListResponse { items }))
}
