use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access token claims the client relies on.
///
/// Only `exp` is required; the client never trusts the token for identity
/// (the profile endpoint is the authority), it only needs to know when to
/// renew it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject, as issued by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Expiration timestamp (Unix seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Reads claims out of an access token.
pub trait ClaimReader: Send + Sync {
    fn decode(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

/// Decodes JWT payloads without verifying the signature.
///
/// The signing key stays on the server; the client reads `exp` for scheduling
/// only and every API call is still verified server-side.
#[derive(Debug, Clone)]
pub struct JwtClaimReader {
    validation: Validation,
}

impl JwtClaimReader {
    pub fn new() -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);
        Self { validation }
    }
}

impl Default for JwtClaimReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimReader for JwtClaimReader {
    fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = jsonwebtoken::decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(&[]),
            &self.validation,
        )
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
        Ok(data.claims)
    }
}

/// Delay until the next silent refresh: `exp - now - lead`.
///
/// Returns `None` when that is not strictly positive, i.e. the token is
/// already inside the lead window (or past expiry).
pub fn refresh_delay(
    claims: &TokenClaims,
    now: DateTime<Utc>,
    lead: Duration,
) -> Option<std::time::Duration> {
    let expires_at = claims.expires_at()?;
    let delay = expires_at - now - lead;
    if delay <= Duration::zero() {
        return None;
    }
    delay.to_std().ok()
}
