//! Authorization gate
//!
//! Wraps the external permission oracle and caches its last answer. The
//! cache is the only state written from outside the lifecycle task, so it is
//! an atomic, and every change is also published on a `watch` channel that
//! later decision points consult.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::observability::metrics;

/// Capabilities requested from the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Permission to present alerts
    pub alert: bool,
    /// Permission to set the badge indicator
    pub badge: bool,
    /// Permission to play sounds
    pub sound: bool,
}

impl Capabilities {
    /// Alert, badge, and sound.
    pub const ALL: Self = Self {
        alert: true,
        badge: true,
        sound: true,
    };
}

/// Last known answer from the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
    /// Not asked yet, or the answer is still in flight.
    #[default]
    Undetermined,
    /// The user allowed alerts and badges.
    Granted,
    /// The user refused.
    Denied,
}

impl AuthorizationState {
    /// Returns `true` only for [`AuthorizationState::Granted`].
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Undetermined => 0,
            Self::Granted => 1,
            Self::Denied => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Granted,
            2 => Self::Denied,
            _ => Self::Undetermined,
        }
    }

    const fn from_answer(granted: bool) -> Self {
        if granted { Self::Granted } else { Self::Denied }
    }
}

/// How the controller consumes authorization requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationMode {
    /// Wait for the oracle's real answer.
    #[default]
    Resolved,
    /// Answer immediately (optimistically `true` when nothing is cached) and
    /// reconcile when the oracle's answer lands.
    Provisional,
}

/// External permission oracle.
///
/// The answer may take arbitrarily long (the user is looking at a dialog).
#[async_trait::async_trait]
pub trait AuthorizationOracle: Send + Sync {
    /// Asks for the given capabilities; resolves to whether they were granted.
    async fn request(&self, capabilities: Capabilities) -> bool;
}

struct Cache {
    state: AtomicU8,
    updates: watch::Sender<AuthorizationState>,
}

impl Cache {
    fn load(&self) -> AuthorizationState {
        AuthorizationState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn store(&self, granted: bool) -> AuthorizationState {
        let state = AuthorizationState::from_answer(granted);
        self.state.store(state.to_u8(), Ordering::SeqCst);
        self.updates.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        metrics::record_authorization(granted);
        state
    }
}

/// Caching wrapper around an [`AuthorizationOracle`].
pub struct AuthorizationGate {
    oracle: Arc<dyn AuthorizationOracle>,
    cache: Arc<Cache>,
}

impl AuthorizationGate {
    /// Creates a gate in the [`AuthorizationState::Undetermined`] state.
    #[must_use]
    pub fn new(oracle: Arc<dyn AuthorizationOracle>) -> Self {
        let (updates, _) = watch::channel(AuthorizationState::Undetermined);
        Self {
            oracle,
            cache: Arc::new(Cache {
                state: AtomicU8::new(AuthorizationState::Undetermined.to_u8()),
                updates,
            }),
        }
    }

    /// Returns the cached state.
    #[must_use]
    pub fn state(&self) -> AuthorizationState {
        self.cache.load()
    }

    /// Returns whether the cached state is granted.
    #[must_use]
    pub fn granted(&self) -> bool {
        self.state().is_granted()
    }

    /// Subscribes to authorization changes.
    ///
    /// The receiver observes every change of the cached state, including
    /// answers that land after [`request_provisional`](Self::request_provisional)
    /// has already returned.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthorizationState> {
        self.cache.updates.subscribe()
    }

    /// Asks the oracle and waits for its answer.
    ///
    /// The cache and subscribers are updated before this returns.
    pub async fn request_authorization(&self) -> bool {
        debug!("requesting authorization");
        let granted = self.oracle.request(Capabilities::ALL).await;
        let state = self.cache.store(granted);
        if granted {
            info!(?state, "authorization resolved");
        } else {
            warn!(?state, "authorization denied");
        }
        granted
    }

    /// Asks the oracle without waiting.
    ///
    /// Returns the cached answer when one is known and `true` otherwise. The
    /// real answer is stored when the oracle resolves; callers must re-read
    /// [`state`](Self::state) or watch [`subscribe`](Self::subscribe) at each
    /// later decision point.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_provisional(&self) -> bool {
        let cached = self.state();
        let oracle = Arc::clone(&self.oracle);
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            let granted = oracle.request(Capabilities::ALL).await;
            let state = cache.store(granted);
            debug!(?state, "provisional authorization reconciled");
        });
        match cached {
            AuthorizationState::Undetermined => true,
            known => known.is_granted(),
        }
    }
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
