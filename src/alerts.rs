//! One-shot alert dispatch
//!
//! The dispatcher owns the only record of which alert it last scheduled.
//! Every [`AlertDispatcher::notify`] cancels that alert (pending or already
//! delivered) before anything else, so at most one alert attributable to
//! this process is ever visible.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

use crate::lifecycle::Settings;
use crate::observability::metrics;

/// Category identifier registered for our alerts.
pub const ALERT_CATEGORY: &str = "alert";

/// Origin tag carried by every alert this process schedules.
pub const ALERT_ORIGIN: &str = "badgewatch";

/// Action identifier that brings the host to the foreground.
pub const OPEN_ACTION: &str = "open";

/// Action identifier that turns alerts off.
pub const DISABLE_ACTION: &str = "disable";

/// Action identifier reported for a plain tap on the alert.
pub const DEFAULT_ACTION: &str = "default";

// ============================================================================
// Identity
// ============================================================================

/// Unique identifier of a scheduled alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(Uuid);

impl AlertId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AlertId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AlertId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The alert currently attributable to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAlert {
    /// Identifier handed to the delivery system
    pub id: AlertId,
    /// When the alert was submitted
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Actions
// ============================================================================

/// What the user did with a delivered alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertAction {
    /// Plain tap on the alert body.
    Default,
    /// The "open" action.
    Open,
    /// The "disable" action.
    Disable,
    /// Anything else the delivery system reported.
    Unknown(String),
}

impl AlertAction {
    /// Parses a delivery-system action identifier.
    #[must_use]
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier {
            DEFAULT_ACTION => Self::Default,
            OPEN_ACTION => Self::Open,
            DISABLE_ACTION => Self::Disable,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

/// Presentation style of an alert action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStyle {
    /// Brings the host to the foreground.
    Foreground,
    /// Shown as destructive.
    Destructive,
}

/// One user-selectable action of a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertActionDef {
    /// Identifier reported back on selection
    pub identifier: String,
    /// Button title
    pub title: String,
    /// Presentation style
    pub style: ActionStyle,
}

/// Action set registered with the delivery system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertCategory {
    /// Category identifier referenced by requests
    pub identifier: String,
    /// Actions offered on alerts of this category
    pub actions: Vec<AlertActionDef>,
}

impl AlertCategory {
    /// The category with the "open" and "disable" actions.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            identifier: ALERT_CATEGORY.to_owned(),
            actions: vec![
                AlertActionDef {
                    identifier: OPEN_ACTION.to_owned(),
                    title: "Open the app\u{2026}".to_owned(),
                    style: ActionStyle::Foreground,
                },
                AlertActionDef {
                    identifier: DISABLE_ACTION.to_owned(),
                    title: "Disable This Alert".to_owned(),
                    style: ActionStyle::Destructive,
                },
            ],
        }
    }
}

/// Image shown with an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertAttachment {
    /// Attachment identifier
    pub identifier: String,
    /// Image file on disk
    pub path: PathBuf,
}

/// A fully built alert, ready for the delivery system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    /// Alert identifier
    pub id: AlertId,
    /// Alert title
    pub title: String,
    /// Alert body
    pub body: String,
    /// Category identifier
    pub category: String,
    /// Origin tag echoed back in responses
    pub origin: String,
    /// Optional image
    pub attachment: Option<AlertAttachment>,
    /// Badge value to apply on delivery, if any
    pub badge_override: Option<u64>,
    /// Delay before delivery
    pub delay: Duration,
    /// Whether the alert repeats
    pub repeats: bool,
}

/// User response reported by the delivery system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertResponse {
    /// Alert the user acted on
    pub alert_id: AlertId,
    /// Origin tag of that alert, when it carried one
    pub origin: Option<String>,
    /// Raw action identifier
    pub action_id: String,
}

// ============================================================================
// Completion
// ============================================================================

/// Acknowledgement owed to the delivery system for one response.
///
/// The callback runs exactly once: on [`complete`](Self::complete), or on
/// drop if nobody completed it.
pub struct Completion {
    callback: Option<Box<dyn FnOnce() + Send>>,
}

impl Completion {
    /// Wraps a callback.
    pub fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// Creates a completion together with a receiver that resolves once it
    /// has run.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self::new(move || {
            let _ = tx.send(());
        });
        (completion, rx)
    }

    /// A completion nobody waits for.
    #[must_use]
    pub fn noop() -> Self {
        Self { callback: None }
    }

    /// Acknowledges the response.
    pub fn complete(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback();
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

// ============================================================================
// Delivery System
// ============================================================================

/// External alert delivery system.
pub trait AlertCenter: Send + Sync {
    /// Registers (or replaces) an action category.
    fn register_category(&self, category: &AlertCategory);

    /// Removes the given alerts, whether still pending or already delivered.
    fn cancel(&self, ids: &[AlertId]);

    /// Submits an alert for delayed delivery.
    fn schedule(&self, request: AlertRequest);
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Preconditions checked before an alert is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertGate {
    /// Whether the authorization gate reports a grant
    pub authorized: bool,
    /// Whether the user has alerts switched on
    pub alerts_enabled: bool,
}

impl AlertGate {
    const fn is_open(self) -> bool {
        self.authorized && self.alerts_enabled
    }
}

/// Static content of every alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertTemplate {
    /// Alert title
    pub title: String,
    /// Delivery delay
    pub delay: Duration,
    /// Optional image file
    pub attachment: Option<PathBuf>,
}

impl Default for AlertTemplate {
    fn default() -> Self {
        Self {
            title: "I am in the background...".to_owned(),
            delay: Duration::from_secs(1),
            attachment: None,
        }
    }
}

/// Result of handling a user response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Parsed action, `None` when the response was not ours
    pub action: Option<AlertAction>,
    /// Whether this response switched alerts off
    pub alerts_disabled: bool,
}

/// Schedules at most one outstanding alert.
pub struct AlertDispatcher {
    center: Arc<dyn AlertCenter>,
    template: AlertTemplate,
    pending: Option<PendingAlert>,
    category_registered: bool,
}

impl AlertDispatcher {
    /// Creates a dispatcher with nothing pending.
    #[must_use]
    pub fn new(center: Arc<dyn AlertCenter>, template: AlertTemplate) -> Self {
        Self {
            center,
            template,
            pending: None,
            category_registered: false,
        }
    }

    /// The alert currently attributable to this dispatcher.
    #[must_use]
    pub const fn pending(&self) -> Option<&PendingAlert> {
        self.pending.as_ref()
    }

    /// Cancels the outstanding alert, if any. Returns what was cancelled.
    pub fn cancel_pending(&mut self) -> Vec<AlertId> {
        let Some(pending) = self.pending.take() else {
            return Vec::new();
        };
        let ids = vec![pending.id];
        self.center.cancel(&ids);
        metrics::record_alerts_cancelled(ids.len());
        debug!(alert_id = %pending.id, "cancelled outstanding alert");
        ids
    }

    /// Replaces any outstanding alert with a fresh one.
    ///
    /// The outstanding alert is always cancelled first. A new alert is
    /// scheduled only when `gate` is open; its body reflects `counting_on`.
    pub fn notify(&mut self, gate: AlertGate, counting_on: bool) -> Option<AlertId> {
        self.cancel_pending();

        if !gate.is_open() {
            debug!(
                authorized = gate.authorized,
                alerts_enabled = gate.alerts_enabled,
                "alert suppressed"
            );
            return None;
        }

        if !self.category_registered {
            self.center.register_category(&AlertCategory::standard());
            self.category_registered = true;
        }

        let request = self.build(counting_on);
        let id = request.id;
        self.center.schedule(request);
        self.pending = Some(PendingAlert {
            id,
            created_at: Utc::now(),
        });
        metrics::record_alert_scheduled();
        info!(alert_id = %id, counting_on, "alert scheduled");
        Some(id)
    }

    fn build(&self, counting_on: bool) -> AlertRequest {
        let state = if counting_on { "On" } else { "Off" };
        AlertRequest {
            id: AlertId::new(),
            title: self.template.title.clone(),
            body: format!("Counting is {state}"),
            category: ALERT_CATEGORY.to_owned(),
            origin: ALERT_ORIGIN.to_owned(),
            attachment: self.template.attachment.as_ref().map(|path| AlertAttachment {
                identifier: format!("{ALERT_ORIGIN}-image"),
                path: path.clone(),
            }),
            badge_override: (!counting_on).then_some(0),
            delay: self.template.delay,
            repeats: false,
        }
    }

    /// Applies a user response to `settings`.
    ///
    /// Responses without our origin tag are ignored. `completion` is
    /// acknowledged on every path.
    pub fn handle_user_action(
        &mut self,
        response: &AlertResponse,
        settings: &mut Settings,
        completion: Completion,
    ) -> ActionOutcome {
        let outcome = self.apply(response, settings);
        completion.complete();
        outcome
    }

    fn apply(&mut self, response: &AlertResponse, settings: &mut Settings) -> ActionOutcome {
        if response.origin.as_deref() != Some(ALERT_ORIGIN) {
            debug!(alert_id = %response.alert_id, "ignoring response from foreign alert");
            return ActionOutcome {
                action: None,
                alerts_disabled: false,
            };
        }

        // Acting on an alert dismisses it.
        if self.pending.is_some_and(|p| p.id == response.alert_id) {
            self.pending = None;
        }

        let action = AlertAction::from_identifier(&response.action_id);
        let alerts_disabled = match &action {
            AlertAction::Disable => {
                let was_enabled = settings.alerts_enabled;
                settings.alerts_enabled = false;
                info!(alert_id = %response.alert_id, "alerts disabled from alert action");
                was_enabled
            }
            AlertAction::Default | AlertAction::Open => {
                debug!(alert_id = %response.alert_id, ?action, "alert acknowledged");
                false
            }
            AlertAction::Unknown(id) => {
                debug!(alert_id = %response.alert_id, action_id = %id, "unknown alert action");
                false
            }
        };

        ActionOutcome {
            action: Some(action),
            alerts_disabled,
        }
    }
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field("template", &self.template)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
