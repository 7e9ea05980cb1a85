//! JWT access token issuance and verification.
//!
//! # Purpose
//! Defines the claim structure carried by bearer tokens and the EdDSA
//! (Ed25519) signing/verification helpers. Keys are PEM-configured; the
//! private key is only needed where tokens are minted (provisioning tooling
//! and tests), the service itself verifies with the public key.
//!
//! # Key invariants
//! - Tokens are always EdDSA; no RSA/HS fallback is accepted.
//! - `sub`, `role`, `exp`, `iat`, and `iss` are mandatory and validated.
//! - An expired signature maps to `TokenExpired`, every other decode failure
//!   to `Unauthenticated`.
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::auth::resolver::AuthError;

/// Issuer pinned into every registrar token.
pub const TOKEN_ISSUER: &str = "campus-registrar";

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: the account's user id.
    pub sub: String,
    /// Primary role tag; the stored account record remains authoritative.
    pub role: String,
    pub iss: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Unique token id; the revocation set is keyed on it.
    pub jti: String,
}

/// Issue a signed EdDSA access token for an account.
pub fn issue_access_token(
    user_id: &str,
    role: &str,
    private_key_pem: &str,
    ttl: Duration,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = AccessTokenClaims {
        sub: user_id.to_string(),
        role: role.to_string(),
        iss: TOKEN_ISSUER.to_string(),
        iat: now,
        exp: now + ttl.as_secs() as i64,
        jti: Uuid::new_v4().to_string(),
    };
    let key = EncodingKey::from_ed_pem(private_key_pem.as_bytes())
        .map_err(|err| AuthError::Internal(anyhow::anyhow!("bad signing key: {err}")))?;
    jsonwebtoken::encode(&Header::new(Algorithm::EdDSA), &claims, &key)
        .map_err(|err| AuthError::Internal(anyhow::anyhow!("encode token: {err}")))
}

/// Decode and verify an EdDSA access token against the configured public key.
pub fn decode_access_token(
    token: &str,
    public_key_pem: &str,
) -> Result<AccessTokenClaims, AuthError> {
    let key = DecodingKey::from_ed_pem(public_key_pem.as_bytes())
        .map_err(|err| AuthError::Internal(anyhow::anyhow!("bad verification key: {err}")))?;

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

    jsonwebtoken::decode::<AccessTokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::Unauthenticated,
        })
}
