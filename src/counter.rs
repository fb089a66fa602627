//! Counter engine
//!
//! Owns the counter value and the periodic ticker of a counting session.
//! The ticker never touches the counter directly: it posts [`TickSignal`]s
//! into the lifecycle task, which feeds them back through
//! [`CounterEngine::tick`]. Every signal carries a session number and a
//! signal from any other session is dropped, so a tick already queued when
//! the session was disarmed has no effect. Restarting the count on a running
//! ticker moves it to a new session for the same reason.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::display::{DisplaySurface, counter_text};
use crate::observability::metrics;

/// Shortest accepted tick interval. A zero interval is raised to this.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// One fire of a session's ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSignal {
    /// Session that produced the tick
    pub session: u64,
}

/// A running periodic task. Dropping it stops the task.
///
/// The session tag is read at every fire, so retagging takes effect for the
/// next signal while anything already queued keeps the old tag.
struct Ticker {
    session: Arc<AtomicU64>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Ticker {
    fn spawn(session: u64, period: Duration, ticks: mpsc::UnboundedSender<TickSignal>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tag = Arc::new(AtomicU64::new(session));
        let current = Arc::clone(&tag);
        let handle = tokio::spawn(async move {
            // First fire is one full period after arming.
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        trace!(session = current.load(Ordering::SeqCst), "ticker cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        let session = current.load(Ordering::SeqCst);
                        if ticks.send(TickSignal { session }).is_err() {
                            debug!(session, "tick receiver gone; stopping ticker");
                            break;
                        }
                    }
                }
            }
        });

        Self {
            session: tag,
            cancel,
            handle,
        }
    }

    fn session(&self) -> u64 {
        self.session.load(Ordering::SeqCst)
    }

    fn retag(&self, session: u64) {
        self.session.store(session, Ordering::SeqCst);
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Counter value plus the ticker of the current counting session.
pub struct CounterEngine {
    value: u64,
    period: Duration,
    display: Arc<dyn DisplaySurface>,
    ticks: mpsc::UnboundedSender<TickSignal>,
    ticker: Option<Ticker>,
    next_session: u64,
}

impl CounterEngine {
    /// Creates a stopped engine at zero.
    ///
    /// Ticks of every future session are sent on `ticks`. A `period` below
    /// [`MIN_TICK_INTERVAL`] is raised to it.
    #[must_use]
    pub fn new(
        period: Duration,
        display: Arc<dyn DisplaySurface>,
        ticks: mpsc::UnboundedSender<TickSignal>,
    ) -> Self {
        let period = if period < MIN_TICK_INTERVAL {
            warn!(requested = ?period, used = ?MIN_TICK_INTERVAL, "tick interval too short");
            MIN_TICK_INTERVAL
        } else {
            period
        };
        Self {
            value: 0,
            period,
            display,
            ticks,
            ticker: None,
            next_session: 1,
        }
    }

    /// Current counter value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Whether a ticker is armed.
    #[must_use]
    pub const fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    /// Session number of the armed ticker, if any.
    #[must_use]
    pub fn session(&self) -> Option<u64> {
        self.ticker.as_ref().map(Ticker::session)
    }

    /// Tick interval.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Starts a counting session.
    ///
    /// Always resets the value to zero and pushes it to the badge and the
    /// label. A ticker is started when `ticking` is set and none is running.
    /// A running ticker is kept but moves to a new session, so ticks it
    /// queued before the restart are dropped. When `ticking` is not set any
    /// running ticker is stopped.
    ///
    /// Returns whether a ticker is armed afterwards.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self, ticking: bool) -> bool {
        self.value = 0;
        self.push_badge();
        self.render_label();

        if ticking {
            if let Some(session) = self.restart_session() {
                debug!(session, "ticker already running; count restarted");
            } else {
                let session = self.next_session;
                self.next_session += 1;
                self.ticker = Some(Ticker::spawn(session, self.period, self.ticks.clone()));
                debug!(session, period = ?self.period, "ticker armed");
            }
        } else {
            self.stop_ticking();
        }

        self.is_ticking()
    }

    /// Applies one tick.
    ///
    /// Returns the new value, or `None` when the signal belongs to a session
    /// that is no longer armed.
    pub fn tick(&mut self, signal: TickSignal) -> Option<u64> {
        if self.session() != Some(signal.session) {
            trace!(session = signal.session, "dropping stale tick");
            return None;
        }
        self.value = self.value.saturating_add(1);
        self.push_badge();
        self.render_label();
        metrics::record_tick();
        Some(self.value)
    }

    /// Ends the counting session.
    ///
    /// The value is reset and the badge is always cleared. The on-screen
    /// label is refreshed only when `reset_display` is set.
    pub fn disarm(&mut self, reset_display: bool) {
        self.stop_ticking();
        self.value = 0;
        self.push_badge();
        if reset_display {
            self.render_label();
        }
    }

    /// Cancels the ticker, keeping the value.
    pub fn stop_ticking(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            debug!(session = ticker.session(), "ticker stopped");
        }
    }

    /// Resets the value to zero and refreshes both badge and label.
    ///
    /// A running ticker moves to a new session; ticks queued before the
    /// reset are dropped.
    pub fn reset(&mut self) {
        self.value = 0;
        if let Some(session) = self.restart_session() {
            trace!(session, "count reset on running ticker");
        }
        self.push_badge();
        self.render_label();
    }

    /// Pushes the current value to the on-screen label.
    pub fn render_label(&self) {
        self.display.set_visible(self.value > 0);
        self.display.set_text(&counter_text(self.value));
    }

    fn restart_session(&mut self) -> Option<u64> {
        let ticker = self.ticker.as_ref()?;
        let session = self.next_session;
        ticker.retag(session);
        self.next_session += 1;
        Some(session)
    }

    fn push_badge(&self) {
        self.display.set_badge(self.value);
        metrics::set_counter_value(self.value);
    }
}

impl std::fmt::Debug for CounterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterEngine")
            .field("value", &self.value)
            .field("period", &self.period)
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}
