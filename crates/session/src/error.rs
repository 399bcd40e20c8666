//! Session error model.

use almacen_core::DomainError;
use thiserror::Error;

/// Failures reported by the authentication collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The backend rejected the email/password pair. Carries the server's reason.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// No usable server-side session (refresh cookie missing or expired).
    #[error("no valid session")]
    NoValidSession,

    /// The access token was rejected.
    #[error("unauthorized")]
    Unauthorized,

    #[error("network error: {0}")]
    Network(String),

    #[error("API error ({0}): {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Errors surfaced by user-initiated session operations (`login`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    InvalidInput(#[from] DomainError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A logout (local or from another tab) happened while the login was in flight.
    #[error("session changed while signing in")]
    Superseded,
}

impl SessionError {
    /// Short reason suitable for an inline message on the login view.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(DomainError::Validation(msg)) => msg.clone(),
            Self::InvalidInput(other) => other.to_string(),
            Self::Auth(AuthError::InvalidCredentials(reason)) => reason.clone(),
            Self::Auth(AuthError::Network(_)) => {
                "could not reach the server, check your connection".to_string()
            }
            Self::Auth(AuthError::Api(_, detail)) if !detail.is_empty() => detail.clone(),
            Self::Auth(_) => "could not sign in, try again".to_string(),
            Self::Superseded => "signed out while signing in, try again".to_string(),
        }
    }

    pub fn is_invalid_credentials(&self) -> bool {
        matches!(self, Self::Auth(AuthError::InvalidCredentials(_)))
    }
}
