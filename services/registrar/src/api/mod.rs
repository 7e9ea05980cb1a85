//! Registrar HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules and the shared helpers every authenticated
//! endpoint uses: bearer-token resolution into a call context and capability
//! checks against the permission evaluator.
pub mod audit;
pub mod enrollment;
pub mod error;
pub mod openapi;
pub mod overrides;
pub mod periods;
pub mod system;
pub mod types;

use axum::http::HeaderMap;
use chrono::Utc;
use std::collections::HashMap;

use crate::api::error::{api_forbidden_missing, api_internal, ApiError};
use crate::app::AppState;
use crate::auth::permissions::evaluate;
use crate::auth::{resolve_context, CallContext};
use crate::model::Decision;

/// Resolve the caller or fail with the mapped authentication error.
pub(crate) async fn require_context(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<CallContext, ApiError> {
    resolve_context(
        state.store.as_ref(),
        state.sessions.as_ref(),
        &state.public_key_pem,
        headers,
    )
    .await
    .map_err(ApiError::from)
}

/// Check that the caller holds `codename` for the target attributes.
pub(crate) async fn require_permission(
    state: &AppState,
    ctx: &CallContext,
    codename: &str,
    target: &HashMap<String, String>,
) -> Result<(), ApiError> {
    let user_grants = state
        .store
        .user_permissions(&ctx.user_id)
        .await
        .map_err(|err| api_internal("failed to load user permissions", &err))?;
    let role_grants = state
        .store
        .role_permissions(ctx.role)
        .await
        .map_err(|err| api_internal("failed to load role permissions", &err))?;
    match evaluate(&user_grants, &role_grants, codename, target, Utc::now()) {
        Decision::Allow => Ok(()),
        Decision::Deny { missing } => Err(api_forbidden_missing(&missing)),
    }
}
