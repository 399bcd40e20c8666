//! Session configuration.

use std::time::Duration;

use almacen_auth::guard::{DASHBOARD_PATH, LOGIN_PATH};

pub const API_URL_ENV: &str = "ALMACEN_API_URL";
pub const REFRESH_LEAD_ENV: &str = "ALMACEN_REFRESH_LEAD_SECS";
pub const REQUEST_TIMEOUT_ENV: &str = "ALMACEN_REQUEST_TIMEOUT_SECS";

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_REFRESH_LEAD: Duration = Duration::from_secs(5 * 60);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_RERESOLVE_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_RERESOLVE_BACKOFF_MAX: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Base URL of the backend REST API (no trailing slash).
    pub api_url: String,
    /// How long before token expiry the silent refresh runs.
    pub refresh_lead: Duration,
    /// Upper bound on every backend request.
    pub request_timeout: Duration,
    /// First wait before re-resolving a token that arrived inside the lead.
    pub reresolve_backoff: Duration,
    /// Cap for the doubling re-resolve wait.
    pub reresolve_backoff_max: Duration,
    /// Where to go after logout or a forced sign-out.
    pub login_path: String,
    /// Where to go after a successful login.
    pub landing_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            refresh_lead: DEFAULT_REFRESH_LEAD,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reresolve_backoff: DEFAULT_RERESOLVE_BACKOFF,
            reresolve_backoff_max: DEFAULT_RERESOLVE_BACKOFF_MAX,
            login_path: LOGIN_PATH.to_string(),
            landing_path: DASHBOARD_PATH.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_refresh_lead(mut self, lead: Duration) -> Self {
        self.refresh_lead = lead;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_reresolve_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.reresolve_backoff = initial;
        self.reresolve_backoff_max = max.max(initial);
        self
    }

    /// Load from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        match lookup(API_URL_ENV) {
            Some(url) if !url.trim().is_empty() => config = config.with_api_url(url.trim()),
            _ => tracing::warn!("{API_URL_ENV} not set; using {DEFAULT_API_URL}"),
        }

        if let Some(lead) = secs(&lookup, REFRESH_LEAD_ENV) {
            config.refresh_lead = lead;
        }
        match secs(&lookup, REQUEST_TIMEOUT_ENV) {
            Some(timeout) if !timeout.is_zero() => config.request_timeout = timeout,
            Some(_) => tracing::warn!("{REQUEST_TIMEOUT_ENV} must be positive; using default"),
            None => {}
        }

        config
    }
}

fn secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(e) => {
            tracing::warn!(value = %raw, error = %e, "invalid {key}; using default");
            None
        }
    }
}
