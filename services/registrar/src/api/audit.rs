//! Audit log API handlers.
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::api::error::{api_internal, api_validation_error, ApiError};
use crate::api::types::AuditListResponse;
use crate::api::{require_context, require_permission};
use crate::app::AppState;
use crate::auth::permissions::AUDIT_VIEW;
use crate::model::AuditQuery;

fn parse_instant(params: &HashMap<String, String>, key: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
    match params.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<DateTime<Utc>>()
            .map(Some)
            .map_err(|_| api_validation_error(&format!("{key} must be an RFC 3339 timestamp"))),
    }
}

#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    tag = "audit",
    params(
        ("course_id" = Option<String>, Query, description = "Filter by course"),
        ("student_id" = Option<String>, Query, description = "Filter by student"),
        ("from" = Option<String>, Query, description = "Inclusive lower bound (RFC 3339)"),
        ("to" = Option<String>, Query, description = "Exclusive upper bound (RFC 3339)")
    ),
    responses((status = 200, description = "Matching audit entries in sequence order", body = AuditListResponse))
)]
pub(crate) async fn query_audit(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AuditListResponse>, ApiError> {
    let ctx = require_context(&state, &headers).await?;
    require_permission(&state, &ctx, AUDIT_VIEW, &HashMap::new()).await?;

    let query = AuditQuery {
        course_id: params.get("course_id").cloned(),
        student_id: params.get("student_id").cloned(),
        from: parse_instant(&params, "from")?,
        to: parse_instant(&params, "to")?,
    };
    let items = state
        .store
        .query_audit(query)
        .await
        .map_err(|err| api_internal("failed to query audit log", &err))?;
    Ok(Json(AuditListResponse { items }))
}
