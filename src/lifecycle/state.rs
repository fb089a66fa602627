//! Lifecycle state representation
//!
//! Phase, user settings, and the event vocabulary the runtime serializes
//! onto the controller.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::alerts::{AlertId, AlertResponse, Completion};
use crate::authorization::AuthorizationState;

/// Coarse execution state of the host process.
///
/// Set only by external lifecycle events. The process starts in
/// [`Phase::Foreground`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The host is active and visible.
    #[default]
    Foreground,
    /// The host has been suspended; a counting session may be running.
    Backgrounding,
    /// The host is going away. Absorbing.
    Terminated,
}

impl Phase {
    /// Returns the lowercase name used in logs and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Foreground => "foreground",
            Self::Backgrounding => "backgrounding",
            Self::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-controlled toggles.
///
/// Counting starts disabled and alerts start enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Whether the counter ticks while backgrounded.
    pub counting_enabled: bool,
    /// Whether a one-shot alert is scheduled on entering the background.
    pub alerts_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            counting_enabled: false,
            alerts_enabled: true,
        }
    }
}

impl Settings {
    /// Label for the control that toggles alerts.
    ///
    /// The label names the action the control performs, so it reads
    /// "Disable Alerts" while alerts are on.
    #[must_use]
    pub const fn control_label(&self) -> &'static str {
        if self.alerts_enabled {
            "Disable Alerts"
        } else {
            "Enable Alerts"
        }
    }
}

/// External phase-transition events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseEvent {
    /// The host is about to be suspended.
    Backgrounding,
    /// The host is returning to the foreground.
    Foreground,
    /// The host is about to terminate.
    Terminate,
}

impl PhaseEvent {
    /// Returns the handler name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Backgrounding => "on_backgrounding",
            Self::Foreground => "on_foreground",
            Self::Terminate => "on_terminate",
        }
    }
}

/// Record of a handled phase event.
///
/// `from == to` when the event was accepted as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    /// Phase before the event
    pub from: Phase,
    /// Phase after the event
    pub to: Phase,
    /// The event that was handled
    pub event: PhaseEvent,
}

impl PhaseTransition {
    /// Returns whether the phase actually changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Read-only view of the controller, returned by snapshot requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleSnapshot {
    /// Current phase
    pub phase: Phase,
    /// Current user settings
    pub settings: Settings,
    /// Last known authorization state
    pub authorization: AuthorizationState,
    /// Current counter value
    pub counter: u64,
    /// Whether a ticker is currently armed
    pub ticking: bool,
    /// The alert currently attributable to the dispatcher, if any
    pub pending_alert: Option<AlertId>,
    /// Whether the keepalive session has been started
    pub keepalive_active: bool,
}

/// Everything the host can post to the lifecycle runtime.
#[derive(Debug)]
pub enum LifecycleEvent {
    /// A phase-transition event from the host.
    Phase(PhaseEvent),
    /// Developer aid: suspend immediately. Handled as backgrounding.
    SuspendRequested,
    /// The counting switch was flipped.
    SetCountingEnabled(bool),
    /// The alerts control was used.
    SetAlertsEnabled(bool),
    /// The user acted on a delivered alert.
    AlertResponse {
        /// What the delivery system reported
        response: AlertResponse,
        /// Acknowledgement owed to the delivery system
        completion: Completion,
    },
    /// Request a snapshot of the controller.
    Snapshot(oneshot::Sender<LifecycleSnapshot>),
}
