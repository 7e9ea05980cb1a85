//! System/health API handlers.
//!
//! # Purpose
//! Lightweight endpoints for service metadata and health checks; used by
//! probes and automation.
use axum::extract::State;
use axum::Json;

use crate::api::error::{api_internal, ApiError};
use crate::api::types::{HealthStatus, ServiceInfo};
use crate::app::AppState;

#[utoipa::path(
    get,
    path = "/v1/system/info",
    tag = "system",
    responses((status = 200, description = "Service identity and capabilities", body = ServiceInfo))
)]
pub(crate) async fn system_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        api_version: state.api_version.clone(),
        storage_backend: state.store.backend_name().to_string(),
        durable_storage: state.store.is_durable(),
        session_kv: state.session_kv_backend.to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/v1/system/health",
    tag = "system",
    responses((status = 200, description = "Service health", body = HealthStatus))
)]
pub(crate) async fn system_health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, ApiError> {
    // Probe the backing store so dependency failures surface here.
    if let Err(err) = state.store.health_check().await {
        return Err(api_internal("storage unavailable", &err));
    }
    Ok(Json(HealthStatus {
        status: "ok".to_string(),
    }))
}
