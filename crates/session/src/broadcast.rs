//! Same-origin broadcast between tabs (mechanics only).
//!
//! Mirrors browser storage events: a tab writes a key with a fresh value and
//! every *other* tab observes the change. The writer never observes its own
//! write; it applies the effect locally instead.
//!
//! Values are strictly increasing millisecond timestamps so that writing the
//! same key twice in a row is still seen as a change.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Buffered signals per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKey {
    #[serde(rename = "login-event")]
    Login,
    #[serde(rename = "logout-event")]
    Logout,
}

impl SignalKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login-event",
            Self::Logout => "logout-event",
        }
    }
}

impl core::fmt::Display for SignalKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one tab on the broadcast.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(u64);

impl core::fmt::Display for TabId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSignal {
    pub key: SignalKey,
    /// Millisecond timestamp, strictly increasing per key.
    pub value: i64,
    pub origin: TabId,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// The subscriber fell behind and missed signals.
    #[error("subscriber lagged, {0} signal(s) dropped")]
    Lagged(u64),

    #[error("broadcast closed")]
    Closed,
}

/// Cross-tab channel as seen from one tab.
pub trait CrossTabChannel: Send + Sync {
    /// Write `key` with a fresh value. Other tabs observe it; this tab does not.
    fn publish(&self, key: SignalKey) -> SessionSignal;

    /// Observe writes made by other tabs.
    fn subscribe(&self) -> SignalSubscription;
}

/// Receives signals written by other tabs.
#[derive(Debug)]
pub struct SignalSubscription {
    tab: TabId,
    receiver: broadcast::Receiver<SessionSignal>,
}

impl SignalSubscription {
    /// Wait for the next signal from another tab.
    pub async fn recv(&mut self) -> Result<SessionSignal, BroadcastError> {
        loop {
            match self.receiver.recv().await {
                Ok(signal) if signal.origin == self.tab => continue,
                Ok(signal) => return Ok(signal),
                Err(broadcast::error::RecvError::Lagged(n)) => return Err(BroadcastError::Lagged(n)),
                Err(broadcast::error::RecvError::Closed) => return Err(BroadcastError::Closed),
            }
        }
    }

    /// Take the next pending signal from another tab, if any.
    pub fn try_recv(&mut self) -> Option<SessionSignal> {
        loop {
            match self.receiver.try_recv() {
                Ok(signal) if signal.origin == self.tab => continue,
                Ok(signal) => return Some(signal),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// In-process broadcast shared by every tab of one origin.
///
/// - No IO
/// - Best-effort fan-out (a tab with no live subscription simply misses signals)
/// - Last-write-wins per key
#[derive(Debug)]
pub struct InMemoryBroadcast {
    sender: broadcast::Sender<SessionSignal>,
    last_values: Mutex<HashMap<SignalKey, i64>>,
    next_tab: AtomicU64,
}

impl InMemoryBroadcast {
    pub fn new() -> Arc<Self> {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            sender,
            last_values: Mutex::new(HashMap::new()),
            next_tab: AtomicU64::new(1),
        })
    }

    /// Attach a new tab to this origin.
    pub fn open_tab(self: &Arc<Self>) -> TabChannel {
        let tab = TabId(self.next_tab.fetch_add(1, Ordering::Relaxed));
        TabChannel {
            tab,
            bus: Arc::clone(self),
        }
    }

    /// Last value written for `key`, if any.
    pub fn last_value(&self, key: SignalKey) -> Option<i64> {
        self.last_values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied()
    }

    fn write(&self, key: SignalKey, origin: TabId) -> SessionSignal {
        let value = {
            let mut last = self.last_values.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Utc::now().timestamp_millis();
            let value = match last.get(&key) {
                Some(&prev) if prev >= now => prev + 1,
                _ => now,
            };
            last.insert(key, value);
            value
        };

        let signal = SessionSignal { key, value, origin };
        // No live receivers is not an error: nobody is listening yet.
        let _ = self.sender.send(signal.clone());
        tracing::debug!(key = %key, value, origin = %origin, "cross-tab signal written");
        signal
    }
}

/// One tab's handle on an [`InMemoryBroadcast`].
#[derive(Debug, Clone)]
pub struct TabChannel {
    tab: TabId,
    bus: Arc<InMemoryBroadcast>,
}

impl TabChannel {
    pub fn tab_id(&self) -> TabId {
        self.tab
    }
}

impl CrossTabChannel for TabChannel {
    fn publish(&self, key: SignalKey) -> SessionSignal {
        self.bus.write(key, self.tab)
    }

    fn subscribe(&self) -> SignalSubscription {
        SignalSubscription {
            tab: self.tab,
            receiver: self.bus.sender.subscribe(),
        }
    }
}
