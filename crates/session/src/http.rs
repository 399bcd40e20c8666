//! HTTP implementation of [`AuthService`] against the Almacen REST API.
//!
//! The refresh credential is an HTTP-only cookie set by `/auth/login`; the
//! client keeps it in its cookie store and never reads it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use almacen_auth::{ProfileResponse, UserProfile};

use crate::config::SessionConfig;
use crate::error::AuthError;
use crate::service::{AccessGrant, AuthService, Credentials, NewAccount};

#[derive(Debug, Clone)]
pub struct HttpAuthService {
    api_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

impl HttpAuthService {
    /// Client for `api_url` with the default request timeout.
    pub fn new(api_url: impl Into<String>) -> Result<Self, AuthError> {
        Self::with_timeout(api_url, SessionConfig::default().request_timeout)
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, AuthError> {
        Self::with_timeout(config.api_url.clone(), config.request_timeout)
    }

    /// Every request fails with [`AuthError::Network`] once `timeout` elapses.
    pub fn with_timeout(api_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Network(e.to_string()))?;
        Ok(Self::with_client(api_url, client))
    }

    /// Use a preconfigured client. It must keep cookies for refresh to work.
    pub fn with_client(api_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Create an account (`POST /auth/registro`).
    pub async fn register(&self, account: &NewAccount) -> Result<UserProfile, AuthError> {
        let resp = self
            .client
            .post(self.url("/auth/registro"))
            .json(&json!({
                "nombre": account.name,
                "email": account.email.as_str(),
                "passwd": account.password.expose(),
            }))
            .send()
            .await
            .map_err(network)?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        let profile: ProfileResponse = resp.json().await.map_err(parse)?;
        Ok(profile.into())
    }

    /// Re-check the current user's password (`POST /auth/verify-password`).
    pub async fn verify_password(&self, password: &str, access_token: &str) -> Result<(), AuthError> {
        let resp = self
            .client
            .post(self.url("/auth/verify-password"))
            .bearer_auth(access_token)
            .json(&json!({ "password": password }))
            .send()
            .await
            .map_err(network)?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let reason = detail(resp).await;
                Err(AuthError::InvalidCredentials(
                    reason.unwrap_or_else(|| "incorrect password".to_string()),
                ))
            }
            _ => Err(api_error(resp).await),
        }
    }
}

#[async_trait]
impl AuthService for HttpAuthService {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AccessGrant, AuthError> {
        // OAuth2 password form: the email goes in `username`.
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .form(&[
                ("username", credentials.email.as_str()),
                ("password", credentials.password.expose()),
            ])
            .send()
            .await
            .map_err(network)?;

        match resp.status() {
            s if s.is_success() => resp.json().await.map_err(parse),
            StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::UNPROCESSABLE_ENTITY => {
                let reason = detail(resp).await;
                Err(AuthError::InvalidCredentials(
                    reason.unwrap_or_else(|| "could not sign in".to_string()),
                ))
            }
            _ => Err(api_error(resp).await),
        }
    }

    async fn refresh(&self) -> Result<AccessGrant, AuthError> {
        let resp = self
            .client
            .post(self.url("/auth/refresh"))
            .send()
            .await
            .map_err(network)?;

        match resp.status() {
            s if s.is_success() => resp.json().await.map_err(parse),
            s if s.is_server_error() => Err(api_error(resp).await),
            _ => Err(AuthError::NoValidSession),
        }
    }

    async fn invalidate_session(&self) -> Result<(), AuthError> {
        let resp = self
            .client
            .post(self.url("/auth/logout"))
            .send()
            .await
            .map_err(network)?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(api_error(resp).await)
        }
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        let resp = self
            .client
            .get(self.url("/auth/perfil"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(network)?;

        match resp.status() {
            s if s.is_success() => {
                let profile: ProfileResponse = resp.json().await.map_err(parse)?;
                Ok(profile.into())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::Unauthorized),
            _ => Err(api_error(resp).await),
        }
    }
}

fn network(e: reqwest::Error) -> AuthError {
    AuthError::Network(e.to_string())
}

fn parse(e: reqwest::Error) -> AuthError {
    AuthError::Parse(e.to_string())
}

/// `detail` from a FastAPI-style error body. Validation errors carry a list.
async fn detail(resp: reqwest::Response) -> Option<String> {
    let body: ErrorBody = resp.json().await.ok()?;
    match body.detail? {
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

async fn api_error(resp: reqwest::Response) -> AuthError {
    let status = resp.status().as_u16();
    let reason = detail(resp).await.unwrap_or_default();
    AuthError::Api(status, reason)
}
