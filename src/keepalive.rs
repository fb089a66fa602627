//! Keepalive session
//!
//! A location-style service that keeps the process scheduled while
//! backgrounded. The session is started at most once and never stopped.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{KeepaliveIssue, LifecycleError};
use crate::observability::metrics;

/// Authorization status the keepalive service reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepaliveAuthorization {
    /// Always-on use was granted.
    Granted,
    /// The user refused.
    Denied,
    /// The user has not been asked.
    #[default]
    Undetermined,
}

/// Requested session accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    /// Highest available accuracy.
    Best,
    /// Coarse accuracy.
    Reduced,
}

/// Options a session is started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveOptions {
    /// Requested accuracy
    pub accuracy: Accuracy,
    /// Whether the platform may pause the session on its own
    pub pause_automatically: bool,
    /// Whether updates continue while backgrounded
    pub allow_in_background: bool,
}

impl KeepaliveOptions {
    /// Best accuracy, never paused, allowed in the background.
    pub const CONTINUOUS: Self = Self {
        accuracy: Accuracy::Best,
        pause_automatically: false,
        allow_in_background: true,
    };
}

/// External keepalive service.
pub trait KeepaliveService: Send + Sync {
    /// Whether the service is switched on at the platform level.
    fn enabled(&self) -> bool;

    /// Current authorization of the service.
    fn current_authorization(&self) -> KeepaliveAuthorization;

    /// Asks for always-on authorization.
    fn request_always_authorization(&self);

    /// Starts a session.
    fn start(&self, options: KeepaliveOptions);
}

/// Outcome of [`KeepaliveHandle::ensure_started`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveStatus {
    /// A session was started by this call.
    Started,
    /// A session was already running.
    AlreadyActive,
}

/// Starts the keepalive session once.
pub struct KeepaliveHandle {
    service: Arc<dyn KeepaliveService>,
    active: bool,
}

impl KeepaliveHandle {
    /// Wraps a service; no session is started yet.
    #[must_use]
    pub fn new(service: Arc<dyn KeepaliveService>) -> Self {
        Self {
            service,
            active: false,
        }
    }

    /// Whether a session has been started.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Starts the session unless one is already running.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::KeepaliveUnavailable`] when the service is
    /// switched off or its authorization was denied. Nothing is retried.
    pub fn ensure_started(&mut self) -> Result<KeepaliveStatus, LifecycleError> {
        if self.active {
            return Ok(KeepaliveStatus::AlreadyActive);
        }

        let issue = if !self.service.enabled() {
            Some(KeepaliveIssue::ServiceDisabled)
        } else if self.service.current_authorization() == KeepaliveAuthorization::Denied {
            Some(KeepaliveIssue::AuthorizationDenied)
        } else {
            None
        };
        if let Some(issue) = issue {
            warn!(%issue, "keepalive unavailable");
            metrics::record_keepalive_failure(issue);
            return Err(LifecycleError::KeepaliveUnavailable(issue));
        }

        self.service.request_always_authorization();
        self.service.start(KeepaliveOptions::CONTINUOUS);
        self.active = true;
        info!("keepalive session started");
        Ok(KeepaliveStatus::Started)
    }
}

impl std::fmt::Debug for KeepaliveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepaliveHandle")
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
