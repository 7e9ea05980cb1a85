//! Registrar HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! This module centralizes route composition to keep `main` small and
//! testable. There is no ambient request state: handlers resolve an explicit
//! call context per request and thread it into the core.
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api;
use crate::api::openapi::ApiDoc;
use crate::auth::SessionKv;
use crate::enrollment::EnrollmentEngine;
use crate::store::RegistrarStore;

#[derive(Clone)]
pub struct AppState {
    pub api_version: String,
    pub store: Arc<dyn RegistrarStore>,
    pub sessions: Arc<dyn SessionKv>,
    pub engine: Arc<EnrollmentEngine>,
    /// PEM-encoded Ed25519 public key used to verify bearer tokens.
    pub public_key_pem: Arc<str>,
    pub session_kv_backend: &'static str,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/system/info",
            axum::routing::get(api::system::system_info),
        )
        .route(
            "/v1/system/health",
            axum::routing::get(api::system::system_health),
        )
        .route("/v1/enroll", axum::routing::post(api::enrollment::enroll))
        .route("/v1/drop", axum::routing::post(api::enrollment::drop))
        .route(
            "/v1/enroll/bulk",
            axum::routing::post(api::enrollment::bulk_enroll),
        )
        .route(
            "/v1/courses/:course_id/roster",
            axum::routing::get(api::enrollment::course_roster),
        )
        .route(
            "/v1/admin/overrides",
            axum::routing::get(api::overrides::list_overrides)
                .post(api::overrides::create_override),
        )
        .route(
            "/v1/admin/overrides/:request_id/process",
            axum::routing::post(api::overrides::process_override),
        )
        .route(
            "/v1/admin/enrollment-periods",
            axum::routing::get(api::periods::list_periods).post(api::periods::create_period),
        )
        .route(
            "/v1/admin/enrollment-periods/:period_id",
            axum::routing::get(api::periods::get_period)
                .put(api::periods::update_period)
                .delete(api::periods::delete_period),
        )
        .route("/v1/admin/audit", axum::routing::get(api::audit::query_audit))
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/v1/openapi.json", ApiDoc::openapi()),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
