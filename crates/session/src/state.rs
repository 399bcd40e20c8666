//! Session state and its read-only snapshot.

use serde::Serialize;

use almacen_auth::{Role, SessionView, UserProfile};

use crate::timer::RefreshTimer;

/// Lifecycle state derived from the session fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Resolving,
    Authenticated,
    Unauthenticated,
    LoggingOut,
}

/// Token and profile, always held together.
#[derive(Debug, Clone)]
pub(crate) struct ActiveSession {
    pub(crate) access_token: String,
    pub(crate) user: UserProfile,
}

/// Mutable session state. Only the session manager writes it.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) active: Option<ActiveSession>,
    pub(crate) is_loading: bool,
    pub(crate) logouts_in_flight: u32,
    /// Set when the last token arrived inside the refresh lead window.
    pub(crate) needs_refresh: bool,
    /// Bumped by login commits, logout and forced sign-out. In-flight
    /// requests commit only if the generation they started with is current.
    pub(crate) generation: u64,
    pub(crate) timer: RefreshTimer,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            active: None,
            is_loading: true,
            logouts_in_flight: 0,
            needs_refresh: false,
            generation: 0,
            timer: RefreshTimer::new(),
        }
    }

    /// Drop token and profile and cancel the pending refresh.
    pub(crate) fn clear(&mut self) {
        self.active = None;
        self.needs_refresh = false;
        self.timer.cancel();
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        let (access_token, user) = match &self.active {
            Some(active) => (Some(active.access_token.clone()), Some(active.user.clone())),
            None => (None, None),
        };
        SessionSnapshot {
            access_token,
            user,
            is_loading: self.is_loading,
            is_logging_out: self.logouts_in_flight > 0,
            needs_refresh: self.needs_refresh,
            refresh_pending: self.timer.is_pending(),
        }
    }
}

/// Point-in-time copy of session state handed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub user: Option<UserProfile>,
    pub is_loading: bool,
    pub is_logging_out: bool,
    pub needs_refresh: bool,
    pub refresh_pending: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_logging_out {
            SessionStatus::LoggingOut
        } else if self.is_authenticated() {
            SessionStatus::Authenticated
        } else if self.is_loading {
            SessionStatus::Resolving
        } else {
            SessionStatus::Unauthenticated
        }
    }
}

impl SessionView for SessionSnapshot {
    fn is_loading(&self) -> bool {
        self.is_loading
    }

    fn is_authenticated(&self) -> bool {
        SessionSnapshot::is_authenticated(self)
    }

    fn is_logging_out(&self) -> bool {
        self.is_logging_out
    }

    fn role(&self) -> Option<&Role> {
        self.user.as_ref().map(|u| &u.role)
    }
}
