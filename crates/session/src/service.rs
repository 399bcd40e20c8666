//! Authentication collaborator contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use almacen_auth::UserProfile;
use almacen_core::{DomainResult, Email, Secret};

use crate::error::AuthError;

/// Validated login input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: Email,
    pub password: Secret,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> DomainResult<Self> {
        Ok(Self {
            email: Email::parse(email)?,
            password: Secret::parse(password)?,
        })
    }
}

/// Token issued by login or refresh.
///
/// The refresh credential itself never reaches this process; it lives in an
/// HTTP-only cookie handled by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Self-registration request (`POST /auth/registro`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub email: Email,
    pub password: Secret,
}

/// Backend operations the session manager depends on.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchange credentials for an access token (and a server-side session).
    async fn authenticate(&self, credentials: &Credentials) -> Result<AccessGrant, AuthError>;

    /// Silent refresh through the ambient server-side credential.
    async fn refresh(&self) -> Result<AccessGrant, AuthError>;

    /// Ask the server to drop its session. Callers treat failure as best-effort.
    async fn invalidate_session(&self) -> Result<(), AuthError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, AuthError>;
}
