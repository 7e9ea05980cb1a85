//! Enrollment API handlers.
//!
//! # Purpose
//! The student/admin-facing enrollment surface: enroll, drop, bulk enroll,
//! and the roster view. Handlers resolve the caller, authorize the action,
//! then delegate to the enrollment engine; all roster and waitlist mutation
//! happens inside the engine under the course lock.
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use std::collections::HashMap;

use crate::api::error::{
    api_forbidden, api_internal, api_internal_message, api_validation_error, ApiError,
};
use crate::api::types::{
    BulkEnrollRequest, BulkEnrollResponse, BulkEnrolledItem, BulkErroredItem, BulkWaitlistedItem,
    DropRequest, DropResponse, EnrollRequest, EnrollResponse, RosterResponse, SectionRoster,
};
use crate::api::{require_context, require_permission};
use crate::app::AppState;
use crate::auth::permissions::{ENROLLMENT_DROP, ENROLLMENT_ENROLL, ROSTER_VIEW};
use crate::auth::CallContext;
use crate::enrollment::{EnrollOutcome, EnrollmentEngine, OverrideSet};
use crate::model::Role;
use crate::store::StoreError;

/// Pick the student the operation targets: the body's student id when given,
/// otherwise the caller's own. Student callers may only act on themselves.
fn resolve_target_student(
    ctx: &CallContext,
    requested: Option<String>,
) -> Result<String, ApiError> {
    let own = ctx.student_id().map(str::to_string);
    let target = match requested {
        Some(student_id) => student_id,
        None => own
            .clone()
            .ok_or_else(|| api_validation_error("student_id is required for this caller"))?,
    };
    if ctx.role == Role::Student && own.as_deref() != Some(target.as_str()) {
        return Err(api_forbidden("students may only act on their own enrollment"));
    }
    Ok(target)
}

#[utoipa::path(
    post,
    path = "/v1/enroll",
    tag = "enrollment",
    request_body = EnrollRequest,
    responses(
        (status = 200, description = "Enrolled or waitlisted", body = EnrollResponse),
        (status = 409, description = "Enrollment conflict", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn enroll(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EnrollRequest>,
) -> Result<Json<EnrollResponse>, ApiError> {
    let ctx = require_context(&state, &headers).await?;
    let target = HashMap::from([("course_id".to_string(), body.course_id.clone())]);
    require_permission(&state, &ctx, ENROLLMENT_ENROLL, &target).await?;
    let student_id = resolve_target_student(&ctx, body.student_id)?;

    // Run detached: a client disconnect must not abort the transaction once
    // the course lock is held.
    let engine = state.engine.clone();
    let actor = ctx.user_id.clone();
    let course_id = body.course_id.clone();
    let outcome = tokio::spawn(async move {
        engine
            .enroll(&actor, &student_id, &course_id, &OverrideSet::new())
            .await
    })
    .await
    .map_err(|_| api_internal_message("enrollment task failed"))??;
    Ok(Json(match outcome {
        EnrollOutcome::Enrolled { section_id, .. } => EnrollResponse {
            status: "enrolled".to_string(),
            section_id: Some(section_id),
            waitlist_position: None,
        },
        EnrollOutcome::Waitlisted { position } => EnrollResponse {
            status: "waitlisted".to_string(),
            section_id: None,
            waitlist_position: Some(position),
        },
    }))
}

#[utoipa::path(
    post,
    path = "/v1/drop",
    tag = "enrollment",
    request_body = DropRequest,
    responses(
        (status = 200, description = "Dropped", body = DropResponse),
        (status = 409, description = "Not enrolled", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn drop(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DropRequest>,
) -> Result<Json<DropResponse>, ApiError> {
    let ctx = require_context(&state, &headers).await?;
    let target = HashMap::from([("course_id".to_string(), body.course_id.clone())]);
    require_permission(&state, &ctx, ENROLLMENT_DROP, &target).await?;
    let student_id = resolve_target_student(&ctx, body.student_id)?;

    // Run detached: a client disconnect must not abort the transaction once
    // the course lock is held.
    let engine = state.engine.clone();
    let actor = ctx.user_id.clone();
    let course_id = body.course_id.clone();
    tokio::spawn(
        async move { EnrollmentEngine::drop(&engine, &actor, &student_id, &course_id).await },
    )
    .await
    .map_err(|_| api_internal_message("drop task failed"))??;
    Ok(Json(DropResponse {
        status: "dropped".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/enroll/bulk",
    tag = "enrollment",
    request_body = BulkEnrollRequest,
    responses(
        (status = 200, description = "Per-student outcomes", body = BulkEnrollResponse),
        (status = 403, description = "Administrator required", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn bulk_enroll(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BulkEnrollRequest>,
) -> Result<Json<BulkEnrollResponse>, ApiError> {
    let ctx = require_context(&state, &headers).await?;
    if ctx.role != Role::Admin {
        return Err(api_forbidden("bulk enrollment requires an administrator"));
    }
    let target = HashMap::from([("course_id".to_string(), body.course_id.clone())]);
    require_permission(&state, &ctx, ENROLLMENT_ENROLL, &target).await?;

    let engine = state.engine.clone();
    let actor = ctx.user_id.clone();
    let course_id = body.course_id.clone();
    let student_ids = body.student_ids.clone();
    let outcome = tokio::spawn(async move {
        engine
            .bulk_enroll(&actor, &course_id, &student_ids, &OverrideSet::new())
            .await
    })
    .await
    .map_err(|_| api_internal_message("bulk enrollment task failed"))?;
    Ok(Json(BulkEnrollResponse {
        enrolled: outcome
            .enrolled
            .into_iter()
            .map(|(student_id, section_id)| BulkEnrolledItem {
                student_id,
                section_id,
            })
            .collect(),
        waitlisted: outcome
            .waitlisted
            .into_iter()
            .map(|(student_id, waitlist_position)| BulkWaitlistedItem {
                student_id,
                waitlist_position,
            })
            .collect(),
        errored: outcome
            .errored
            .into_iter()
            .map(|(student_id, code)| BulkErroredItem {
                student_id,
                code: code.to_string(),
            })
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/courses/{course_id}/roster",
    tag = "enrollment",
    params(("course_id" = String, Path, description = "Course identifier")),
    responses(
        (status = 200, description = "Ordered roster per section and course waitlist", body = RosterResponse),
        (status = 404, description = "Course not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn course_roster(
    Path(course_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RosterResponse>, ApiError> {
    let ctx = require_context(&state, &headers).await?;
    let course = match state.store.get_course(&course_id).await {
        Ok(course) => course,
        Err(StoreError::NotFound(_)) => {
            return Err(crate::api::error::api_not_found("course not found"))
        }
        Err(err) => return Err(api_internal("failed to load course", &err)),
    };
    // Roster visibility is department-scoped for faculty callers.
    let target = HashMap::from([
        ("course_id".to_string(), course_id.clone()),
        ("department".to_string(), course.department.clone()),
    ]);
    require_permission(&state, &ctx, ROSTER_VIEW, &target).await?;

    let sections = state
        .store
        .list_sections(&course_id)
        .await
        .map_err(|err| api_internal("failed to list sections", &err))?;
    let waitlist = state
        .store
        .course_waitlist(&course_id)
        .await
        .map_err(|err| api_internal("failed to load waitlist", &err))?;
    Ok(Json(RosterResponse {
        course_id,
        sections: sections
            .into_iter()
            .map(|section| SectionRoster {
                section_id: section.section_id,
                section_number: section.section_number,
                enrollment_limit: section.enrollment_limit,
                roster: section.roster,
            })
            .collect(),
        waitlist,
    }))
}
