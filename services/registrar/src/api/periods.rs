//! Enrollment period API handlers.
//!
//! # Purpose
//! Admin CRUD for enrollment windows with structural validation (start before
//! end, priority end inside the window) applied before persisting.
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use std::collections::HashMap;
use uuid::Uuid;

use crate::api::error::{api_internal, api_not_found, api_validation_error, ApiError};
use crate::api::types::{PeriodListResponse, PeriodUpsertRequest};
use crate::api::{require_context, require_permission};
use crate::app::AppState;
use crate::auth::permissions::PERIOD_MANAGE;
use crate::model::EnrollmentPeriod;
use crate::store::StoreError;

fn period_from_request(period_id: Uuid, body: PeriodUpsertRequest) -> Result<EnrollmentPeriod, ApiError> {
    let period = EnrollmentPeriod {
        period_id,
        name: body.name,
        group: body.group.unwrap_or_default(),
        start: body.start,
        end: body.end,
        priority_end: body.priority_end,
        active: body.active,
    };
    period
        .validate()
        .map_err(|reason| api_validation_error(&reason))?;
    Ok(period)
}

#[utoipa::path(
    get,
    path = "/v1/admin/enrollment-periods",
    tag = "periods",
    responses((status = 200, description = "All enrollment periods", body = PeriodListResponse))
)]
pub(crate) async fn list_periods(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PeriodListResponse>, ApiError> {
    let ctx = require_context(&state, &headers).await?;
    require_permission(&state, &ctx, PERIOD_MANAGE, &HashMap::new()).await?;
    let items = state
        .store
        .list_periods()
        .await
        .map_err(|err| api_internal("failed to list enrollment periods", &err))?;
    Ok(Json(PeriodListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/v1/admin/enrollment-periods",
    tag = "periods",
    request_body = PeriodUpsertRequest,
    responses(
        (status = 201, description = "Period created", body = EnrollmentPeriod),
        (status = 400, description = "Invalid window", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_period(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PeriodUpsertRequest>,
) -> Result<(StatusCode, Json<EnrollmentPeriod>), ApiError> {
    let ctx = require_context(&state, &headers).await?;
    require_permission(&state, &ctx, PERIOD_MANAGE, &HashMap::new()).await?;
    let period = period_from_request(Uuid::new_v4(), body)?;
    let created = state
        .store
        .create_period(period)
        .await
        .map_err(|err| api_internal("failed to create enrollment period", &err))?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/admin/enrollment-periods/{period_id}",
    tag = "periods",
    params(("period_id" = Uuid, Path, description = "Period identifier")),
    responses(
        (status = 200, description = "Enrollment period", body = EnrollmentPeriod),
        (status = 404, description = "Period not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_period(
    Path(period_id): Path<Uuid>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<EnrollmentPeriod>, ApiError> {
    let ctx = require_context(&state, &headers).await?;
    require_permission(&state, &ctx, PERIOD_MANAGE, &HashMap::new()).await?;
    match state.store.get_period(period_id).await {
        Ok(period) => Ok(Json(period)),
        Err(StoreError::NotFound(_)) => Err(api_not_found("enrollment period not found")),
        Err(err) => Err(api_internal("failed to load enrollment period", &err)),
    }
}

#[utoipa::path(
    put,
    path = "/v1/admin/enrollment-periods/{period_id}",
    tag = "periods",
    params(("period_id" = Uuid, Path, description = "Period identifier")),
    request_body = PeriodUpsertRequest,
    responses(
        (status = 200, description = "Updated period", body = EnrollmentPeriod),
        (status = 404, description = "Period not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_period(
    Path(period_id): Path<Uuid>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PeriodUpsertRequest>,
) -> Result<Json<EnrollmentPeriod>, ApiError> {
    let ctx = require_context(&state, &headers).await?;
    require_permission(&state, &ctx, PERIOD_MANAGE, &HashMap::new()).await?;
    let period = period_from_request(period_id, body)?;
    match state.store.update_period(period).await {
        Ok(updated) => Ok(Json(updated)),
        Err(StoreError::NotFound(_)) => Err(api_not_found("enrollment period not found")),
        Err(err) => Err(api_internal("failed to update enrollment period", &err)),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/admin/enrollment-periods/{period_id}",
    tag = "periods",
    params(("period_id" = Uuid, Path, description = "Period identifier")),
    responses(
        (status = 204, description = "Period deleted"),
        (status = 404, description = "Period not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_period(
    Path(period_id): Path<Uuid>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let ctx = require_context(&state, &headers).await?;
    require_permission(&state, &ctx, PERIOD_MANAGE, &HashMap::new()).await?;
    match state.store.delete_period(period_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(StoreError::NotFound(_)) => Err(api_not_found("enrollment period not found")),
        Err(err) => Err(api_internal("failed to delete enrollment period", &err)),
    }
}
