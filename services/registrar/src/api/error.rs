//! API error types and helpers.
//!
//! # Purpose
//! Centralizes HTTP error response construction so every endpoint returns the
//! same envelope: `{success: false, code, message}` with a status code that
//! matches the error category.
//!
//! # Status mapping
//! Authentication failures map to 401, permission failures to 403, validation
//! failures to 400, state conflicts (already enrolled, window closed) to 409,
//! missing targets to 404, and transient lock timeouts to 503. Internal
//! errors log details server-side and return a generic message.
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::api::types::ErrorResponse;
use crate::auth::AuthError;
use crate::enrollment::{EnrollError, OverrideError};
use crate::store::StoreError;

/// Structured API error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn envelope(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            success: false,
            code: code.to_string(),
            message: message.to_string(),
        },
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    envelope(StatusCode::NOT_FOUND, "not_found", message)
}

pub fn api_conflict(code: &str, message: &str) -> ApiError {
    envelope(StatusCode::CONFLICT, code, message)
}

pub fn api_validation_error(message: &str) -> ApiError {
    envelope(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    envelope(StatusCode::FORBIDDEN, "forbidden", message)
}

/// Permission denial carrying the missing capability codename.
pub fn api_forbidden_missing(codename: &str) -> ApiError {
    envelope(
        StatusCode::FORBIDDEN,
        "forbidden",
        &format!("missing permission: {codename}"),
    )
}

pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    // Log internal details server-side; return a generic message.
    tracing::error!(error = ?err, "registrar storage error");
    envelope(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

pub fn api_internal_message(message: &str) -> ApiError {
    envelope(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::Internal(inner) => {
                tracing::error!(error = ?inner, "authentication failed internally");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        };
        envelope(status, err.code(), &err.to_string())
    }
}

impl From<EnrollError> for ApiError {
    fn from(err: EnrollError) -> Self {
        let status = match &err {
            EnrollError::UnknownStudent | EnrollError::UnknownCourse => StatusCode::NOT_FOUND,
            EnrollError::AlreadyEnrolled
            | EnrollError::NotEnrolled
            | EnrollError::WindowClosed
            | EnrollError::PrerequisiteMissing(_)
            | EnrollError::CapacityExceeded
            | EnrollError::CourseArchived
            | EnrollError::StudentSuspended => StatusCode::CONFLICT,
            EnrollError::ServiceBusy => StatusCode::SERVICE_UNAVAILABLE,
            EnrollError::Internal(inner) => {
                tracing::error!(error = ?inner, "enrollment engine error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match &err {
            EnrollError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        envelope(status, err.code(), &message)
    }
}

impl From<OverrideError> for ApiError {
    fn from(err: OverrideError) -> Self {
        match err {
            OverrideError::NotFound => api_not_found("override request not found"),
            OverrideError::UnknownStudent => api_not_found("student not found"),
            OverrideError::UnknownCourse => api_not_found("course not found"),
            OverrideError::AlreadyProcessed => api_conflict(
                "already_processed",
                "override request was already processed",
            ),
            OverrideError::Internal(inner) => {
                tracing::error!(error = ?inner, "override workflow error");
                api_internal_message("internal error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_stable_codes() {
        let not_found = api_not_found("missing");
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.body.code, "not_found");
        assert!(!not_found.body.success);

        let conflict = api_conflict("already_enrolled", "duplicate");
        assert_eq!(conflict.status, StatusCode::CONFLICT);
        assert_eq!(conflict.body.code, "already_enrolled");

        let forbidden = api_forbidden_missing("roster:view");
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
        assert!(forbidden.body.message.contains("roster:view"));
    }

    #[test]
    fn enroll_errors_map_to_spec_statuses() {
        let cases: Vec<(EnrollError, StatusCode)> = vec![
            (EnrollError::UnknownCourse, StatusCode::NOT_FOUND),
            (EnrollError::AlreadyEnrolled, StatusCode::CONFLICT),
            (EnrollError::WindowClosed, StatusCode::CONFLICT),
            (
                EnrollError::PrerequisiteMissing(vec!["c1".to_string()]),
                StatusCode::CONFLICT,
            ),
            (EnrollError::ServiceBusy, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, expected) in cases {
            let code = err.code();
            let api: ApiError = err.into();
            assert_eq!(api.status, expected);
            assert_eq!(api.body.code, code);
        }
    }

    #[test]
    fn auth_errors_are_unauthorized() {
        let api: ApiError = AuthError::TokenExpired.into();
        assert_eq!(api.status, StatusCode::UNAUTHORIZED);
        assert_eq!(api.body.code, "token_expired");
    }
}
