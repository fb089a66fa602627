//! Lifecycle controller
//!
//! The state machine. It owns the phase, the user settings, and every
//! collaborator; nothing else mutates them. All methods are expected to run
//! on the single lifecycle task (see [`super::runtime`]).
//!
//! | Phase         | Event            | Next          |
//! |---------------|------------------|---------------|
//! | Foreground    | on_backgrounding | Backgrounding |
//! | Backgrounding | on_backgrounding | Backgrounding |
//! | Backgrounding | on_foreground    | Foreground    |
//! | Foreground    | on_foreground    | Foreground    |
//! | not terminal  | on_terminate     | Terminated    |
//! | Terminated    | any              | rejected      |

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::alerts::{
    ActionOutcome, AlertCenter, AlertDispatcher, AlertGate, AlertId, AlertResponse,
    AlertTemplate, Completion,
};
use crate::authorization::{
    AuthorizationGate, AuthorizationMode, AuthorizationOracle, AuthorizationState,
};
use crate::config::AppConfig;
use crate::counter::{CounterEngine, TickSignal};
use crate::display::{DisplaySurface, UserMessage};
use crate::error::LifecycleError;
use crate::keepalive::{KeepaliveHandle, KeepaliveService, KeepaliveStatus};
use crate::observability::metrics;
use crate::observability::{DisarmReason, Event, EventEmitter};

use super::state::{LifecycleSnapshot, Phase, PhaseEvent, PhaseTransition, Settings};

/// The external systems the controller drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Badge indicator and on-screen label
    pub display: Arc<dyn DisplaySurface>,
    /// Alert/badge permission oracle
    pub oracle: Arc<dyn AuthorizationOracle>,
    /// Stay-alive service
    pub keepalive: Arc<dyn KeepaliveService>,
    /// Alert delivery system
    pub alerts: Arc<dyn AlertCenter>,
}

/// Static controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Name used in explanatory messages
    pub app_name: String,
    /// Counter tick interval
    pub tick_interval: Duration,
    /// Content of scheduled alerts
    pub alert_template: AlertTemplate,
    /// How authorization answers are consumed
    pub authorization_mode: AuthorizationMode,
    /// Settings at process start
    pub initial_settings: Settings,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            app_name: "Badgewatch".to_owned(),
            tick_interval: Duration::from_secs(1),
            alert_template: AlertTemplate::default(),
            authorization_mode: AuthorizationMode::default(),
            initial_settings: Settings::default(),
        }
    }
}

impl ControllerOptions {
    /// Builds options from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            app_name: config.app.name.clone(),
            tick_interval: config.counter.tick_interval,
            alert_template: AlertTemplate {
                title: config.alerts.title.clone(),
                delay: config.alerts.delay,
                attachment: config.alerts.attachment.clone(),
            },
            authorization_mode: config.authorization.mode,
            initial_settings: config.settings,
        }
    }
}

/// Phase and settings plus the components they drive.
pub struct LifecycleController {
    phase: Phase,
    settings: Settings,
    app_name: String,
    mode: AuthorizationMode,
    display: Arc<dyn DisplaySurface>,
    gate: AuthorizationGate,
    keepalive: KeepaliveHandle,
    counter: CounterEngine,
    alerts: AlertDispatcher,
    events: Arc<EventEmitter>,
}

impl LifecycleController {
    /// Builds a controller in [`Phase::Foreground`].
    ///
    /// Ticks of every counting session are sent on `ticks`; the owner must
    /// feed them back through [`on_tick`](Self::on_tick).
    #[must_use]
    pub fn new(
        options: ControllerOptions,
        collaborators: Collaborators,
        ticks: mpsc::UnboundedSender<TickSignal>,
        events: Arc<EventEmitter>,
    ) -> Self {
        let Collaborators {
            display,
            oracle,
            keepalive,
            alerts,
        } = collaborators;

        Self {
            phase: Phase::Foreground,
            settings: options.initial_settings,
            app_name: options.app_name,
            mode: options.authorization_mode,
            counter: CounterEngine::new(options.tick_interval, Arc::clone(&display), ticks),
            display,
            gate: AuthorizationGate::new(oracle),
            keepalive: KeepaliveHandle::new(keepalive),
            alerts: AlertDispatcher::new(alerts, options.alert_template),
            events,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> Settings {
        self.settings
    }

    /// Current counter value.
    #[must_use]
    pub const fn counter(&self) -> u64 {
        self.counter.value()
    }

    /// Whether a ticker is armed.
    #[must_use]
    pub const fn is_ticking(&self) -> bool {
        self.counter.is_ticking()
    }

    /// Identifier of the outstanding alert, if any.
    #[must_use]
    pub fn pending_alert(&self) -> Option<AlertId> {
        self.alerts.pending().map(|p| p.id)
    }

    /// Subscribes to authorization changes.
    #[must_use]
    pub fn subscribe_authorization(&self) -> watch::Receiver<AuthorizationState> {
        self.gate.subscribe()
    }

    /// Read-only view of the controller.
    #[must_use]
    pub fn snapshot(&self) -> LifecycleSnapshot {
        LifecycleSnapshot {
            phase: self.phase,
            settings: self.settings,
            authorization: self.gate.state(),
            counter: self.counter.value(),
            ticking: self.counter.is_ticking(),
            pending_alert: self.alerts.pending().map(|p| p.id),
            keepalive_active: self.keepalive.is_active(),
        }
    }

    /// Initial display refresh and authorization request.
    ///
    /// On denial the explanatory message is shown and counting is forced
    /// off.
    pub async fn start(&mut self) {
        self.refresh_display();
        self.display.set_badge(0);

        if let Err(err) = self.authorize().await {
            debug!(%err, "starting without authorization");
            self.settings.counting_enabled = false;
            self.present(UserMessage::AuthorizationDenied);
            self.refresh_display();
        }
        info!(
            authorization = ?self.gate.state(),
            counting_enabled = self.settings.counting_enabled,
            "lifecycle controller started"
        );
    }

    // ------------------------------------------------------------------
    // Phase events
    // ------------------------------------------------------------------

    /// Handles one phase event.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] once terminated.
    pub fn handle_phase(&mut self, event: PhaseEvent) -> Result<PhaseTransition, LifecycleError> {
        match event {
            PhaseEvent::Backgrounding => self.on_backgrounding(),
            PhaseEvent::Foreground => self.on_foreground(),
            PhaseEvent::Terminate => self.on_terminate(),
        }
    }

    /// The host is being suspended: start a counting session.
    ///
    /// The counter restarts at zero. The keepalive session is started if
    /// possible, and an alert replaces any outstanding one. The ticker runs
    /// only while counting is enabled and authorization holds.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] once terminated.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub fn on_backgrounding(&mut self) -> Result<PhaseTransition, LifecycleError> {
        let from = self.guard(PhaseEvent::Backgrounding)?;
        self.phase = Phase::Backgrounding;

        let authorized = self.authorized();
        let ticking = self
            .counter
            .arm(self.settings.counting_enabled && authorized);
        self.events.emit(Event::CounterArmed {
            timestamp: Utc::now(),
            ticking,
            session: self.counter.session(),
        });

        match self.keepalive.ensure_started() {
            Ok(KeepaliveStatus::Started) => self.events.emit(Event::KeepaliveStarted {
                timestamp: Utc::now(),
            }),
            Ok(KeepaliveStatus::AlreadyActive) => {}
            Err(err) => {
                debug!(%err, "continuing without keepalive");
                self.present(UserMessage::KeepaliveUnavailable);
            }
        }

        self.notify(authorized);

        Ok(self.entered(from, PhaseEvent::Backgrounding))
    }

    /// The host is returning: end the counting session and reset the label.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] once terminated.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub fn on_foreground(&mut self) -> Result<PhaseTransition, LifecycleError> {
        let from = self.guard(PhaseEvent::Foreground)?;
        if from == Phase::Backgrounding {
            self.disarm(DisarmReason::Foreground, true);
            self.phase = Phase::Foreground;
        } else {
            debug!("already in foreground");
        }
        Ok(self.entered(from, PhaseEvent::Foreground))
    }

    /// The host is going away: switch alerts off and clear the badge.
    ///
    /// The on-screen label is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] once terminated.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub fn on_terminate(&mut self) -> Result<PhaseTransition, LifecycleError> {
        let from = self.guard(PhaseEvent::Terminate)?;
        if self.settings.alerts_enabled {
            self.settings.alerts_enabled = false;
            self.settings_changed();
        }
        self.disarm(DisarmReason::Terminated, false);
        self.phase = Phase::Terminated;
        Ok(self.entered(from, PhaseEvent::Terminate))
    }

    // ------------------------------------------------------------------
    // User toggles
    // ------------------------------------------------------------------

    /// Flips the counting switch.
    ///
    /// Turning counting on asks for authorization first; on denial the
    /// switch is forced off and the explanatory message is shown. The
    /// counter is reset either way. While backgrounded the ticker follows
    /// the new setting.
    ///
    /// Returns the setting actually applied.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] once terminated.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub async fn set_counting_enabled(&mut self, on: bool) -> Result<bool, LifecycleError> {
        self.reject_if_terminated("set_counting_enabled")?;

        let mut enabled = on;
        if on && let Err(err) = self.authorize().await {
            warn!(%err, "counting stays off");
            enabled = false;
            self.present(UserMessage::AuthorizationDenied);
        }

        self.settings.counting_enabled = enabled;
        self.settings_changed();
        self.counter.reset();
        self.refresh_display();

        if self.phase == Phase::Backgrounding {
            if enabled && self.authorized() {
                let ticking = self.counter.arm(true);
                self.events.emit(Event::CounterArmed {
                    timestamp: Utc::now(),
                    ticking,
                    session: self.counter.session(),
                });
            } else {
                self.counter.stop_ticking();
            }
        }

        info!(requested = on, applied = enabled, "counting toggled");
        Ok(enabled)
    }

    /// Flips the alerts setting and refreshes the control label.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] once terminated.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub fn set_alerts_enabled(&mut self, on: bool) -> Result<(), LifecycleError> {
        self.reject_if_terminated("set_alerts_enabled")?;
        if self.settings.alerts_enabled != on {
            self.settings.alerts_enabled = on;
            self.settings_changed();
        }
        self.display.set_control_label(self.settings.control_label());
        info!(alerts_enabled = on, "alerts toggled");
        Ok(())
    }

    /// Applies a user response to a delivered alert.
    ///
    /// The control label is refreshed only while in the foreground.
    /// `completion` is always acknowledged.
    pub fn handle_alert_response(
        &mut self,
        response: &AlertResponse,
        completion: Completion,
    ) -> ActionOutcome {
        let outcome = self
            .alerts
            .handle_user_action(response, &mut self.settings, completion);

        if outcome.action.is_some() {
            self.events.emit(Event::AlertActionHandled {
                timestamp: Utc::now(),
                alert_id: response.alert_id,
                action_id: response.action_id.clone(),
            });
        }
        if outcome.alerts_disabled {
            self.settings_changed();
            if self.phase == Phase::Foreground {
                self.display.set_control_label(self.settings.control_label());
            }
        }
        outcome
    }

    // ------------------------------------------------------------------
    // Runtime inputs
    // ------------------------------------------------------------------

    /// Applies one tick.
    ///
    /// A tick outside a live session, or one that arrives after counting or
    /// authorization was withdrawn, stops the ticker instead.
    pub fn on_tick(&mut self, signal: TickSignal) -> Option<u64> {
        if self.phase != Phase::Backgrounding
            || !self.settings.counting_enabled
            || !self.authorized()
        {
            if self.counter.is_ticking() {
                debug!(session = signal.session, "tick outside counting session; stopping");
                self.counter.stop_ticking();
            }
            return None;
        }
        let value = self.counter.tick(signal)?;
        debug!(value, session = signal.session, "tick");
        Some(value)
    }

    /// Reacts to a change of the cached authorization state.
    ///
    /// A denial stops the ticker; if counting was on it is forced off and
    /// the explanatory message is shown.
    pub fn on_authorization_changed(&mut self, state: AuthorizationState) {
        self.events.emit(Event::AuthorizationUpdated {
            timestamp: Utc::now(),
            state,
        });
        if state != AuthorizationState::Denied {
            debug!(?state, "authorization updated");
            return;
        }

        warn!("authorization revoked");
        self.counter.stop_ticking();
        if self.settings.counting_enabled {
            self.settings.counting_enabled = false;
            self.settings_changed();
            self.present(UserMessage::AuthorizationDenied);
            self.refresh_display();
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn authorize(&self) -> Result<(), LifecycleError> {
        let granted = match self.mode {
            AuthorizationMode::Resolved => self.gate.request_authorization().await,
            AuthorizationMode::Provisional => self.gate.request_provisional(),
        };
        if granted {
            Ok(())
        } else {
            Err(LifecycleError::AuthorizationDenied)
        }
    }

    /// Whether authorization currently permits counting and alerting.
    ///
    /// In provisional mode an unanswered request counts as a grant until the
    /// oracle says otherwise.
    fn authorized(&self) -> bool {
        match self.gate.state() {
            AuthorizationState::Granted => true,
            AuthorizationState::Denied => false,
            AuthorizationState::Undetermined => self.mode == AuthorizationMode::Provisional,
        }
    }

    fn notify(&mut self, authorized: bool) {
        let previous = self.alerts.pending().map(|p| p.id);
        let gate = AlertGate {
            authorized,
            alerts_enabled: self.settings.alerts_enabled,
        };
        let scheduled = self.alerts.notify(gate, self.settings.counting_enabled);

        if let Some(id) = previous {
            self.events.emit(Event::AlertsCancelled {
                timestamp: Utc::now(),
                alert_ids: vec![id],
            });
        }
        if let Some(alert_id) = scheduled {
            self.events.emit(Event::AlertScheduled {
                timestamp: Utc::now(),
                alert_id,
                counting_on: self.settings.counting_enabled,
            });
        }
    }

    fn disarm(&mut self, reason: DisarmReason, reset_display: bool) {
        let final_value = self.counter.value();
        self.counter.disarm(reset_display);
        self.events.emit(Event::CounterDisarmed {
            timestamp: Utc::now(),
            reason,
            final_value,
        });
    }

    fn guard(&self, event: PhaseEvent) -> Result<Phase, LifecycleError> {
        if self.phase == Phase::Terminated {
            warn!(event = event.name(), "phase event after termination");
            return Err(LifecycleError::InvalidTransition {
                phase: self.phase,
                event: event.name(),
            });
        }
        Ok(self.phase)
    }

    fn reject_if_terminated(&self, event: &'static str) -> Result<(), LifecycleError> {
        if self.phase == Phase::Terminated {
            return Err(LifecycleError::InvalidTransition {
                phase: self.phase,
                event,
            });
        }
        Ok(())
    }

    fn entered(&self, from: Phase, event: PhaseEvent) -> PhaseTransition {
        let transition = PhaseTransition {
            from,
            to: self.phase,
            event,
        };
        if transition.changed() {
            metrics::record_phase_transition(from, self.phase);
        }
        self.events.emit(Event::PhaseEntered {
            timestamp: Utc::now(),
            from,
            phase: self.phase,
            event: event.name().to_owned(),
        });
        info!(from = %from, to = %self.phase, event = event.name(), "phase event handled");
        transition
    }

    fn present(&self, message: UserMessage) {
        self.display.present_message(&message.render(&self.app_name));
        metrics::record_user_message(message.kind());
        self.events.emit(Event::MessagePresented {
            timestamp: Utc::now(),
            kind: message.kind().to_owned(),
        });
    }

    fn settings_changed(&self) {
        self.events.emit(Event::SettingsChanged {
            timestamp: Utc::now(),
            settings: self.settings,
        });
    }

    fn refresh_display(&self) {
        self.display.set_control_label(self.settings.control_label());
        self.display.set_counting_switch(self.settings.counting_enabled);
        self.counter.render_label();
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("phase", &self.phase)
            .field("settings", &self.settings)
            .field("counter", &self.counter)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}
