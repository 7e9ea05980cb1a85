//! Caller identity resolution.
//!
//! # Purpose
//! Turns the bearer credential on a request into a `CallContext` or a typed
//! authentication failure. Resolution consults the revocation set and session
//! bookkeeping through the KV capability, degrading with a warning (never
//! blocking) when the KV is unreachable.
use anyhow::anyhow;
use axum::http::HeaderMap;
use chrono::Utc;
use thiserror::Error;

use crate::auth::context::CallContext;
use crate::auth::session::SessionKv;
use crate::auth::token;
use crate::store::{RegistrarStore, StoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or invalid credentials")]
    Unauthenticated,
    #[error("token has expired")]
    TokenExpired,
    #[error("token has been revoked")]
    TokenRevoked,
    #[error("account is not permitted to authenticate")]
    Unauthorized,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenRevoked => "token_revoked",
            AuthError::Unauthorized => "unauthorized",
            AuthError::Internal(_) => "internal",
        }
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve the request's bearer token to the caller's identity.
///
/// Order matters: signature and expiry first, then the revocation set, then
/// the account's lifecycle status. The stored account record is authoritative
/// for role and attributes; the token's role claim is informational only.
pub async fn resolve_context(
    store: &dyn RegistrarStore,
    sessions: &dyn SessionKv,
    public_key_pem: &str,
    headers: &HeaderMap,
) -> Result<CallContext, AuthError> {
    let bearer = extract_bearer(headers).ok_or(AuthError::Unauthenticated)?;
    let claims = token::decode_access_token(bearer, public_key_pem)?;

    match sessions.is_revoked(&claims.jti).await {
        Ok(true) => return Err(AuthError::TokenRevoked),
        Ok(false) => {}
        Err(err) => {
            // Degraded mode: accept the otherwise-valid token.
            tracing::warn!(error = %err, "revocation check unavailable");
        }
    }

    let user = match store.get_user(&claims.sub).await {
        Ok(user) => user,
        Err(StoreError::NotFound(_)) => return Err(AuthError::Unauthorized),
        Err(err) => return Err(AuthError::Internal(anyhow!(err))),
    };
    if !user.status.may_authenticate() {
        return Err(AuthError::Unauthorized);
    }

    if let Err(err) = sessions
        .touch_session(&user.user_id, &claims.jti, Utc::now())
        .await
    {
        tracing::warn!(error = %err, "session tracking unavailable");
    }

    Ok(CallContext::from_user(&user))
}
