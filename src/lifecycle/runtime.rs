//! Lifecycle runtime
//!
//! Serializes host events, ticker signals, and authorization updates onto a
//! single task that owns the [`LifecycleController`]. No two transitions
//! ever run concurrently. Cancellation is honored even while the task waits
//! on the authorization oracle.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alerts::{AlertResponse, Completion};
use crate::authorization::AuthorizationState;
use crate::counter::TickSignal;
use crate::error::LifecycleError;
use crate::observability::{Event, EventEmitter};

use super::controller::{Collaborators, ControllerOptions, LifecycleController};
use super::state::{LifecycleEvent, LifecycleSnapshot, PhaseEvent};

/// Cloneable sender side of the runtime.
#[derive(Debug, Clone)]
pub struct LifecycleHandle {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl LifecycleHandle {
    /// Posts a raw event.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RuntimeClosed`] once the runtime has exited.
    pub fn send(&self, event: LifecycleEvent) -> Result<(), LifecycleError> {
        self.tx
            .send(event)
            .map_err(|_| LifecycleError::RuntimeClosed)
    }

    /// The host is about to be suspended.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RuntimeClosed`] once the runtime has exited.
    pub fn backgrounding(&self) -> Result<(), LifecycleError> {
        self.send(LifecycleEvent::Phase(PhaseEvent::Backgrounding))
    }

    /// The host is returning to the foreground.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RuntimeClosed`] once the runtime has exited.
    pub fn foreground(&self) -> Result<(), LifecycleError> {
        self.send(LifecycleEvent::Phase(PhaseEvent::Foreground))
    }

    /// The host is about to terminate.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RuntimeClosed`] once the runtime has exited.
    pub fn terminate(&self) -> Result<(), LifecycleError> {
        self.send(LifecycleEvent::Phase(PhaseEvent::Terminate))
    }

    /// Developer aid: suspend now.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RuntimeClosed`] once the runtime has exited.
    pub fn request_suspend(&self) -> Result<(), LifecycleError> {
        self.send(LifecycleEvent::SuspendRequested)
    }

    /// Flips the counting switch.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RuntimeClosed`] once the runtime has exited.
    pub fn set_counting_enabled(&self, on: bool) -> Result<(), LifecycleError> {
        self.send(LifecycleEvent::SetCountingEnabled(on))
    }

    /// Flips the alerts setting.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RuntimeClosed`] once the runtime has exited.
    pub fn set_alerts_enabled(&self, on: bool) -> Result<(), LifecycleError> {
        self.send(LifecycleEvent::SetAlertsEnabled(on))
    }

    /// Delivers a user response and waits until it has been acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RuntimeClosed`] once the runtime has exited.
    pub async fn respond_to_alert(&self, response: AlertResponse) -> Result<(), LifecycleError> {
        let (completion, done) = Completion::channel();
        self.send(LifecycleEvent::AlertResponse {
            response,
            completion,
        })?;
        done.await.map_err(|_| LifecycleError::RuntimeClosed)
    }

    /// Reads a snapshot of the controller.
    ///
    /// The snapshot reflects every event posted before this call.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RuntimeClosed`] once the runtime has exited.
    pub async fn snapshot(&self) -> Result<LifecycleSnapshot, LifecycleError> {
        let (tx, rx) = oneshot::channel();
        self.send(LifecycleEvent::Snapshot(tx))?;
        rx.await.map_err(|_| LifecycleError::RuntimeClosed)
    }
}

/// The single task that owns the controller.
pub struct LifecycleRuntime {
    controller: LifecycleController,
    events_rx: mpsc::UnboundedReceiver<LifecycleEvent>,
    ticks_rx: mpsc::UnboundedReceiver<TickSignal>,
    emitter: Arc<EventEmitter>,
    cancel: CancellationToken,
}

impl LifecycleRuntime {
    /// Builds the controller and the channels that feed it.
    #[must_use]
    pub fn new(
        options: ControllerOptions,
        collaborators: Collaborators,
        emitter: Arc<EventEmitter>,
        cancel: CancellationToken,
    ) -> (Self, LifecycleHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (ticks_tx, ticks_rx) = mpsc::unbounded_channel();
        let controller =
            LifecycleController::new(options, collaborators, ticks_tx, Arc::clone(&emitter));

        (
            Self {
                controller,
                events_rx,
                ticks_rx,
                emitter,
                cancel,
            },
            LifecycleHandle { tx: events_tx },
        )
    }

    /// Runs until cancelled or until every [`LifecycleHandle`] is dropped.
    ///
    /// Returns the controller so its final state can be inspected.
    pub async fn run(mut self) -> LifecycleController {
        let mut auth = self.controller.subscribe_authorization();

        let started = tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = self.controller.start() => true,
        };
        if started {
            self.serve(&mut auth).await;
        } else {
            debug!("lifecycle runtime cancelled during startup authorization");
        }

        let snapshot = self.controller.snapshot();
        self.emitter.emit(Event::RuntimeStopped {
            timestamp: Utc::now(),
            phase: snapshot.phase,
            counter: snapshot.counter,
        });
        self.emitter.flush();
        info!(phase = %snapshot.phase, counter = snapshot.counter, "lifecycle runtime stopped");
        self.controller
    }

    async fn serve(&mut self, auth: &mut watch::Receiver<AuthorizationState>) {
        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    debug!("lifecycle runtime cancelled");
                    break;
                }

                maybe_event = self.events_rx.recv() => {
                    let Some(event) = maybe_event else {
                        debug!("all lifecycle handles dropped");
                        break;
                    };
                    if !self.dispatch(event).await {
                        debug!("lifecycle runtime cancelled during dispatch");
                        break;
                    }
                }

                Ok(()) = auth.changed() => {
                    let state = *auth.borrow_and_update();
                    self.controller.on_authorization_changed(state);
                }

                Some(tick) = self.ticks_rx.recv() => {
                    self.controller.on_tick(tick);
                }
            }
        }
    }

    /// Applies one event. Returns `false` when cancelled before it finished.
    async fn dispatch(&mut self, event: LifecycleEvent) -> bool {
        match event {
            LifecycleEvent::Phase(phase_event) => {
                if let Err(err) = self.controller.handle_phase(phase_event) {
                    warn!(%err, "phase event rejected");
                }
            }
            LifecycleEvent::SuspendRequested => {
                debug!("suspend requested");
                if let Err(err) = self.controller.on_backgrounding() {
                    warn!(%err, "suspend rejected");
                }
            }
            LifecycleEvent::SetCountingEnabled(on) => {
                let result = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return false,
                    result = self.controller.set_counting_enabled(on) => result,
                };
                if let Err(err) = result {
                    warn!(%err, "counting toggle rejected");
                }
            }
            LifecycleEvent::SetAlertsEnabled(on) => {
                if let Err(err) = self.controller.set_alerts_enabled(on) {
                    warn!(%err, "alerts toggle rejected");
                }
            }
            LifecycleEvent::AlertResponse {
                response,
                completion,
            } => {
                self.controller.handle_alert_response(&response, completion);
            }
            LifecycleEvent::Snapshot(reply) => {
                let _ = reply.send(self.controller.snapshot());
            }
        }
        true
    }
}

impl std::fmt::Debug for LifecycleRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleRuntime")
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}
