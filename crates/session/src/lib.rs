//! `almacen-session`
//!
//! **Responsibility:** keep a valid access token for as long as the user's
//! server-side session is valid, across every open tab.
//!
//! This crate provides:
//! - The [`SessionManager`] (login, logout, silent refresh, cross-tab sync)
//! - The collaborators it is built from (auth service, broadcast, navigation, clock)
//! - An HTTP implementation of the auth service
//!
//! Consumers (route guards, API wrappers) only read session state.

pub mod broadcast;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod manager;
pub mod navigation;
pub mod service;
pub mod state;
pub mod timer;

pub use broadcast::{
    BroadcastError, CrossTabChannel, InMemoryBroadcast, SessionSignal, SignalKey,
    SignalSubscription, TabChannel, TabId,
};
pub use clock::{Clock, SystemClock};
pub use config::SessionConfig;
pub use error::{AuthError, SessionError};
pub use http::HttpAuthService;
pub use manager::{RefreshOutcome, RefreshTrigger, ScheduleOutcome, SessionManager, SessionManagerBuilder};
pub use navigation::{Navigator, RecordingNavigator, TracingNavigator};
pub use service::{AccessGrant, AuthService, Credentials, NewAccount};
pub use state::{SessionSnapshot, SessionStatus};
pub use timer::RefreshTimer;
