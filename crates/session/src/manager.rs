//! Session manager: the single writer of session state.
//!
//! Owns the access token, the user profile and the refresh timer, and keeps
//! them valid for as long as the server-side session is valid:
//! - `resolve_session` once at startup (silent refresh)
//! - `login` / `logout` on user request
//! - a scheduled silent refresh `refresh_lead` before each token expires
//! - cross-tab signals (logout elsewhere, login elsewhere)
//!
//! State lives behind one mutex that is never held across an `.await`. Every
//! network call is made outside the lock; its result is committed only if the
//! session generation is still the one observed when the call started, so a
//! stale response can never resurrect a session that logout already cleared.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use almacen_auth::{ClaimReader, JwtClaimReader, UserProfile, refresh_delay};
use almacen_core::Entity;

use crate::broadcast::{BroadcastError, CrossTabChannel, SignalKey};
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{AuthError, SessionError};
use crate::navigation::{Navigator, TracingNavigator};
use crate::service::{AccessGrant, AuthService, Credentials};
use crate::state::{ActiveSession, SessionSnapshot, SessionState, SessionStatus};

/// Why a silent refresh ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    Startup,
    Scheduled,
    CrossTab,
    /// The last token arrived inside the refresh lead.
    Reresolve,
    Manual,
}

/// Result of trying to schedule the next refresh for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled(Duration),
    /// Token expires within the refresh lead; no timer was set.
    Expiring,
    /// Token claims could not be read; no timer was set.
    Undecodable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Renewed(ScheduleOutcome),
    /// Refresh failed; the session was cleared.
    SignedOut,
    /// The session changed while the request was in flight; result ignored.
    Discarded,
}

/// Injectable session store. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

struct Shared {
    auth: Arc<dyn AuthService>,
    claims: Arc<dyn ClaimReader>,
    channel: Arc<dyn CrossTabChannel>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    snapshots: watch::Sender<SessionSnapshot>,
    resolve_started: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Composition-root builder for [`SessionManager`].
pub struct SessionManagerBuilder {
    auth: Arc<dyn AuthService>,
    channel: Arc<dyn CrossTabChannel>,
    claims: Arc<dyn ClaimReader>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl SessionManagerBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn claim_reader(mut self, claims: Arc<dyn ClaimReader>) -> Self {
        self.claims = claims;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> SessionManager {
        let state = SessionState::new();
        let (snapshots, _) = watch::channel(state.snapshot());
        SessionManager {
            shared: Arc::new(Shared {
                auth: self.auth,
                claims: self.claims,
                channel: self.channel,
                navigator: self.navigator,
                clock: self.clock,
                config: self.config,
                state: Mutex::new(state),
                snapshots,
                resolve_started: AtomicBool::new(false),
            }),
        }
    }
}

impl SessionManager {
    pub fn builder(
        auth: Arc<dyn AuthService>,
        channel: Arc<dyn CrossTabChannel>,
    ) -> SessionManagerBuilder {
        SessionManagerBuilder {
            auth,
            channel,
            claims: Arc::new(JwtClaimReader::new()),
            navigator: Arc::new(TracingNavigator),
            clock: Arc::new(SystemClock),
            config: SessionConfig::default(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Read access
    // ─────────────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock().snapshot()
    }

    /// Receiver that observes every committed transition.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshots.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot().status()
    }

    pub fn access_token(&self) -> Option<String> {
        self.shared
            .lock()
            .active
            .as_ref()
            .map(|a| a.access_token.clone())
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.shared.lock().active.as_ref().map(|a| a.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.shared.lock().active.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock().is_loading
    }

    pub fn is_logging_out(&self) -> bool {
        self.shared.lock().logouts_in_flight > 0
    }

    /// When the pending silent refresh will fire, if one is scheduled.
    pub fn refresh_deadline(&self) -> Option<Instant> {
        self.shared.lock().timer.deadline()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    // ─────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Resolve the session once at startup via silent refresh.
    ///
    /// Never fails; a missing server-side session ends in `Unauthenticated`.
    /// Later calls are no-ops.
    pub async fn resolve_session(&self) {
        if self.shared.resolve_started.swap(true, Ordering::SeqCst) {
            tracing::debug!("session already resolved; ignoring");
            return;
        }
        let outcome = self.refresh(RefreshTrigger::Startup).await;
        tracing::info!(?outcome, status = ?self.status(), "session resolved");
    }

    /// Run a silent refresh now.
    pub async fn refresh_access_token(&self) -> RefreshOutcome {
        self.refresh(RefreshTrigger::Manual).await
    }

    /// Sign in with email and password.
    ///
    /// On success the session is stored, the next refresh scheduled, other
    /// tabs notified and the app sent to the landing view. On failure the
    /// session is left as it was.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, SessionError> {
        let credentials = Credentials::new(email, password)?;
        let generation = self.shared.lock().generation;

        tracing::info!(email = %credentials.email, "logging in");
        let grant = self
            .shared
            .auth
            .authenticate(&credentials)
            .await
            .inspect_err(|e| tracing::warn!(email = %credentials.email, error = %e, "login rejected"))?;
        let session = self
            .with_profile(grant)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "profile fetch after login failed"))?;
        let user = session.user.clone();

        {
            let mut state = self.shared.lock();
            if state.generation != generation {
                tracing::info!("logout happened while logging in; discarding login");
                return Err(SessionError::Superseded);
            }
            state.generation += 1;
            self.install(&mut state, session);
        }
        self.publish_snapshot();

        self.shared.channel.publish(SignalKey::Login);
        self.shared.navigator.go_to(&self.shared.config.landing_path);
        tracing::info!(user_id = %user.id, role = %user.role, "logged in");
        Ok(user)
    }

    /// Sign out. Always ends `Unauthenticated`, even if the server is unreachable.
    pub async fn logout(&self) {
        {
            let mut state = self.shared.lock();
            state.logouts_in_flight += 1;
            state.generation += 1;
        }
        self.publish_snapshot();

        if let Err(e) = self.shared.auth.invalidate_session().await {
            tracing::warn!(error = %e, "server-side logout failed; clearing local session anyway");
        }

        {
            let mut state = self.shared.lock();
            // Anything that started during the server call is stale too.
            state.generation += 1;
            state.clear();
            state.logouts_in_flight = state.logouts_in_flight.saturating_sub(1);
        }
        self.shared.channel.publish(SignalKey::Logout);
        self.publish_snapshot();
        self.shared.navigator.go_to(&self.shared.config.login_path);
        tracing::info!("logged out");
    }

    /// Replace the stored profile (e.g. after the user edited their own data).
    ///
    /// Refused when no session is held, so a profile never exists without a
    /// token, and when `user` is someone other than the signed-in user.
    pub fn update_profile(&self, user: UserProfile) -> bool {
        let updated = {
            let mut state = self.shared.lock();
            match state.active.as_mut() {
                Some(active) if active.user.same_identity(&user) => {
                    active.user = user;
                    true
                }
                Some(active) => {
                    tracing::warn!(
                        current = %active.user.id,
                        offered = %user.id,
                        "profile update for a different user ignored"
                    );
                    false
                }
                None => {
                    tracing::debug!("profile update ignored; no active session");
                    false
                }
            }
        };
        if updated {
            self.publish_snapshot();
        }
        updated
    }

    /// Spawn the task that applies signals written by other tabs.
    ///
    /// The task holds only a weak reference and ends once the manager is
    /// dropped or the broadcast closes.
    pub fn spawn_sync_listener(&self) -> JoinHandle<()> {
        let mut subscription = self.shared.channel.subscribe();
        let weak = Arc::downgrade(&self.shared);

        tokio::spawn(async move {
            loop {
                let signal = match subscription.recv().await {
                    Ok(signal) => signal,
                    Err(BroadcastError::Lagged(missed)) => {
                        tracing::warn!(missed, "cross-tab listener lagged");
                        continue;
                    }
                    Err(BroadcastError::Closed) => break,
                };
                let Some(shared) = weak.upgrade() else { break };
                let manager = SessionManager { shared };

                tracing::debug!(key = %signal.key, origin = %signal.origin, "cross-tab signal");
                match signal.key {
                    SignalKey::Logout => manager.force_sign_out(),
                    // Off the receive loop: a logout signal must not queue
                    // behind this request. Its generation bump discards it.
                    SignalKey::Login => {
                        tokio::spawn(async move {
                            manager.refresh(RefreshTrigger::CrossTab).await;
                        });
                    }
                }
            }
            tracing::debug!("cross-tab listener stopped");
        })
    }

    /// Spawn the task that re-resolves a session whose token arrived inside
    /// the refresh lead (`needs_refresh`).
    ///
    /// Waits `reresolve_backoff` before each attempt, doubling up to
    /// `reresolve_backoff_max` while the flag stays set and resetting once it
    /// clears. Ends when the manager is dropped.
    pub fn spawn_reresolver(&self) -> JoinHandle<()> {
        let mut snapshots = self.watch();
        let weak = Arc::downgrade(&self.shared);
        let initial = self.shared.config.reresolve_backoff;
        let max = self.shared.config.reresolve_backoff_max;

        tokio::spawn(async move {
            let mut backoff = initial;
            loop {
                let flagged = snapshots
                    .wait_for(|s| s.needs_refresh && s.is_authenticated())
                    .await
                    .is_ok();
                if !flagged {
                    break;
                }

                tracing::debug!(backoff_ms = backoff.as_millis() as u64, "token expiring; re-resolving");
                tokio::time::sleep(backoff).await;

                let Some(shared) = weak.upgrade() else { break };
                let manager = SessionManager { shared };
                let snapshot = manager.snapshot();
                if !(snapshot.needs_refresh && snapshot.is_authenticated()) {
                    backoff = initial;
                    continue;
                }

                let outcome = manager.refresh(RefreshTrigger::Reresolve).await;
                backoff = match outcome {
                    RefreshOutcome::Renewed(ScheduleOutcome::Expiring) => (backoff * 2).min(max),
                    _ => initial,
                };
            }
            tracing::debug!("re-resolver stopped");
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    /// Another tab logged out: clear locally, no network, no refresh.
    fn force_sign_out(&self) {
        {
            let mut state = self.shared.lock();
            state.generation += 1;
            state.clear();
        }
        self.publish_snapshot();
        self.shared.navigator.go_to(&self.shared.config.login_path);
        tracing::info!("signed out by another tab");
    }

    async fn refresh(&self, trigger: RefreshTrigger) -> RefreshOutcome {
        let generation = self.shared.lock().generation;

        let result = match self.shared.auth.refresh().await {
            Ok(grant) => self.with_profile(grant).await,
            Err(e) => Err(e),
        };

        let outcome = {
            let mut state = self.shared.lock();
            if trigger == RefreshTrigger::Startup {
                state.is_loading = false;
            }

            if state.generation != generation {
                tracing::debug!(?trigger, "session changed during refresh; ignoring response");
                RefreshOutcome::Discarded
            } else {
                match result {
                    Ok(session) => RefreshOutcome::Renewed(self.install(&mut state, session)),
                    Err(e) => {
                        if trigger == RefreshTrigger::Startup {
                            tracing::info!(error = %e, "no server-side session to resume");
                        } else {
                            tracing::warn!(?trigger, error = %e, "silent refresh failed; signing out");
                        }
                        state.clear();
                        RefreshOutcome::SignedOut
                    }
                }
            }
        };

        self.publish_snapshot();
        outcome
    }

    async fn with_profile(&self, grant: AccessGrant) -> Result<ActiveSession, AuthError> {
        let user = self.shared.auth.fetch_profile(&grant.access_token).await?;
        Ok(ActiveSession {
            access_token: grant.access_token,
            user,
        })
    }

    /// Store token+profile and reschedule. Caller holds the lock.
    fn install(&self, state: &mut SessionState, session: ActiveSession) -> ScheduleOutcome {
        let outcome = self.schedule_refresh(state, &session.access_token);
        state.needs_refresh = outcome == ScheduleOutcome::Expiring;
        state.active = Some(session);
        outcome
    }

    /// Cancel any pending refresh, then schedule one for `token`.
    fn schedule_refresh(&self, state: &mut SessionState, token: &str) -> ScheduleOutcome {
        state.timer.cancel();

        let claims = match self.shared.claims.decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read token expiry; refresh not scheduled");
                return ScheduleOutcome::Undecodable;
            }
        };

        let lead = chrono::Duration::from_std(self.shared.config.refresh_lead)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let Some(delay) = refresh_delay(&claims, self.shared.clock.now(), lead) else {
            tracing::warn!(exp = claims.exp, "token expires within the refresh lead; not scheduling");
            return ScheduleOutcome::Expiring;
        };

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        state.timer.schedule(delay, move |ticket| async move {
            let Some(shared) = weak.upgrade() else { return };
            let manager = SessionManager { shared };
            let armed = manager.shared.lock().timer.disarm(ticket);
            if armed {
                manager.refresh(RefreshTrigger::Scheduled).await;
            }
        });
        tracing::debug!(delay_secs = delay.as_secs(), "silent refresh scheduled");
        ScheduleOutcome::Scheduled(delay)
    }

    fn publish_snapshot(&self) {
        let snapshot = self.shared.lock().snapshot();
        self.shared.snapshots.send_replace(snapshot);
    }
}

impl core::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .field("config", &self.shared.config)
            .finish()
    }
}
