#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use tokio::sync::{Notify, oneshot};

use almacen_auth::{Role, UserProfile};
use almacen_core::UserId;
use almacen_session::{
    AccessGrant, AuthError, AuthService, Credentials, CrossTabChannel, RecordingNavigator,
    SessionManager, SessionSnapshot,
};

pub const EMAIL: &str = "a@b.com";
pub const PASSWORD: &str = "x";

pub fn mint_token(ttl: ChronoDuration) -> String {
    let now = Utc::now();
    let claims = serde_json::json!({
        "sub": EMAIL,
        "iat": now.timestamp(),
        "exp": (now + ttl).timestamp(),
    });
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .expect("failed to encode jwt")
}

pub fn profile(role: Role) -> UserProfile {
    UserProfile {
        id: UserId::new(7),
        name: "Ana".to_string(),
        email: EMAIL.to_string(),
        role,
    }
}

/// Server side of the fake: one cookie-backed session shared by every tab.
#[derive(Debug)]
pub struct FakeBackend {
    pub session_valid: Mutex<bool>,
    pub token_ttl: Mutex<ChronoDuration>,
    pub role: Mutex<Role>,
    pub profile_fails: Mutex<bool>,
    pub logout_fails: Mutex<bool>,
    pub raw_token: Mutex<Option<String>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            session_valid: Mutex::new(false),
            token_ttl: Mutex::new(ChronoDuration::minutes(10)),
            role: Mutex::new(Role::Admin),
            profile_fails: Mutex::new(false),
            logout_fails: Mutex::new(false),
            raw_token: Mutex::new(None),
        })
    }

    pub fn with_session() -> Arc<Self> {
        let backend = Self::new();
        backend.set_session_valid(true);
        backend
    }

    pub fn set_session_valid(&self, valid: bool) {
        *self.session_valid.lock().unwrap() = valid;
    }

    pub fn set_token_ttl(&self, ttl: ChronoDuration) {
        *self.token_ttl.lock().unwrap() = ttl;
    }

    pub fn set_role(&self, role: Role) {
        *self.role.lock().unwrap() = role;
    }

    pub fn set_logout_fails(&self, fails: bool) {
        *self.logout_fails.lock().unwrap() = fails;
    }

    pub fn set_profile_fails(&self, fails: bool) {
        *self.profile_fails.lock().unwrap() = fails;
    }

    /// Issue this literal string instead of a JWT.
    pub fn issue_raw_token(&self, token: &str) {
        *self.raw_token.lock().unwrap() = Some(token.to_string());
    }

    fn issue(&self) -> AccessGrant {
        let access_token = match self.raw_token.lock().unwrap().clone() {
            Some(raw) => raw,
            None => mint_token(*self.token_ttl.lock().unwrap()),
        };
        AccessGrant {
            access_token,
            token_type: Some("bearer".to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct Calls {
    pub authenticate: AtomicUsize,
    pub refresh: AtomicUsize,
    pub invalidate: AtomicUsize,
    pub profile: AtomicUsize,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.authenticate.load(Ordering::SeqCst)
            + self.refresh.load(Ordering::SeqCst)
            + self.invalidate.load(Ordering::SeqCst)
            + self.profile.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refresh.load(Ordering::SeqCst)
    }
}

/// One tab's view of the backend, with its own call counters.
#[derive(Debug)]
pub struct FakeAuthService {
    pub backend: Arc<FakeBackend>,
    pub calls: Calls,
    pub refresh_entered: Notify,
    pub invalidate_entered: Notify,
    hold_refresh: Mutex<Option<oneshot::Receiver<()>>>,
    hold_invalidate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeAuthService {
    pub fn new(backend: Arc<FakeBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            calls: Calls::default(),
            refresh_entered: Notify::new(),
            invalidate_entered: Notify::new(),
            hold_refresh: Mutex::new(None),
            hold_invalidate: Mutex::new(None),
        })
    }

    /// Make the next refresh wait until the returned sender fires.
    /// `refresh_entered` is notified once that refresh is parked.
    pub fn hold_next_refresh(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.hold_refresh.lock().unwrap() = Some(rx);
        tx
    }

    /// Make the next server-side logout wait until the returned sender fires.
    pub fn hold_next_invalidate(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.hold_invalidate.lock().unwrap() = Some(rx);
        tx
    }
}

#[async_trait]
impl AuthService for FakeAuthService {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AccessGrant, AuthError> {
        self.calls.authenticate.fetch_add(1, Ordering::SeqCst);
        if credentials.email.as_str() != EMAIL || credentials.password.expose() != PASSWORD {
            return Err(AuthError::InvalidCredentials("Credenciales incorrectas".to_string()));
        }
        self.backend.set_session_valid(true);
        Ok(self.backend.issue())
    }

    async fn refresh(&self) -> Result<AccessGrant, AuthError> {
        self.calls.refresh.fetch_add(1, Ordering::SeqCst);

        let hold = self.hold_refresh.lock().unwrap().take();
        if let Some(rx) = hold {
            self.refresh_entered.notify_one();
            let _ = rx.await;
        }

        if *self.backend.session_valid.lock().unwrap() {
            Ok(self.backend.issue())
        } else {
            Err(AuthError::NoValidSession)
        }
    }

    async fn invalidate_session(&self) -> Result<(), AuthError> {
        self.calls.invalidate.fetch_add(1, Ordering::SeqCst);

        let hold = self.hold_invalidate.lock().unwrap().take();
        if let Some(rx) = hold {
            self.invalidate_entered.notify_one();
            let _ = rx.await;
        }

        if *self.backend.logout_fails.lock().unwrap() {
            return Err(AuthError::Network("connection reset".to_string()));
        }
        self.backend.set_session_valid(false);
        Ok(())
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<UserProfile, AuthError> {
        self.calls.profile.fetch_add(1, Ordering::SeqCst);
        if *self.backend.profile_fails.lock().unwrap() {
            return Err(AuthError::Unauthorized);
        }
        Ok(profile(self.backend.role.lock().unwrap().clone()))
    }
}

pub struct Tab {
    pub manager: SessionManager,
    pub auth: Arc<FakeAuthService>,
    pub navigator: Arc<RecordingNavigator>,
}

pub fn open_tab(backend: &Arc<FakeBackend>, channel: impl CrossTabChannel + 'static) -> Tab {
    let auth = FakeAuthService::new(Arc::clone(backend));
    let navigator = Arc::new(RecordingNavigator::new());
    let manager = SessionManager::builder(auth.clone(), Arc::new(channel))
        .navigator(navigator.clone())
        .build();
    Tab {
        manager,
        auth,
        navigator,
    }
}

/// Wait (bounded) until the tab's session satisfies `pred`.
pub async fn wait_until(manager: &SessionManager, pred: impl FnMut(&SessionSnapshot) -> bool) {
    let mut rx = manager.watch();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for session state")
        .expect("session manager dropped");
}
