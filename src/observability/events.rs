//! Structured event stream for `badgewatch`.
//!
//! Every state-machine decision is emitted as one typed event, serialized
//! as newline-delimited JSON with a monotonically increasing sequence
//! number.

use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alerts::AlertId;
use crate::authorization::AuthorizationState;
use crate::lifecycle::{Phase, Settings};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// Why a counting session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisarmReason {
    /// The host returned to the foreground.
    Foreground,
    /// The host is terminating.
    Terminated,
}

/// A discrete event emitted by the lifecycle runtime.
///
/// Each variant is tagged with `"type"` when serialized to JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A phase event was accepted.
    PhaseEntered {
        /// When the transition occurred.
        timestamp: DateTime<Utc>,
        /// Phase before the event.
        from: Phase,
        /// Phase after the event.
        phase: Phase,
        /// Handler that ran.
        event: String,
    },

    /// A counting session started (or restarted) at zero.
    CounterArmed {
        /// When the counter was armed.
        timestamp: DateTime<Utc>,
        /// Whether a ticker is running.
        ticking: bool,
        /// Ticker session, when ticking.
        session: Option<u64>,
    },

    /// A counting session ended.
    CounterDisarmed {
        /// When the counter was disarmed.
        timestamp: DateTime<Utc>,
        /// Why the session ended.
        reason: DisarmReason,
        /// Counter value just before the reset.
        final_value: u64,
    },

    /// An alert was handed to the delivery system.
    AlertScheduled {
        /// When the alert was scheduled.
        timestamp: DateTime<Utc>,
        /// Alert identifier.
        alert_id: AlertId,
        /// Whether the body announces counting as on.
        counting_on: bool,
    },

    /// Outstanding alerts were cancelled.
    AlertsCancelled {
        /// When the alerts were cancelled.
        timestamp: DateTime<Utc>,
        /// Cancelled identifiers.
        alert_ids: Vec<AlertId>,
    },

    /// The user acted on one of our alerts.
    AlertActionHandled {
        /// When the response was handled.
        timestamp: DateTime<Utc>,
        /// Alert the user acted on.
        alert_id: AlertId,
        /// Raw action identifier.
        action_id: String,
    },

    /// The authorization cache changed.
    AuthorizationUpdated {
        /// When the change was observed.
        timestamp: DateTime<Utc>,
        /// New state.
        state: AuthorizationState,
    },

    /// The keepalive session was started.
    KeepaliveStarted {
        /// When the session started.
        timestamp: DateTime<Utc>,
    },

    /// A user-visible explanatory message was presented.
    MessagePresented {
        /// When the message was presented.
        timestamp: DateTime<Utc>,
        /// Message kind.
        kind: String,
    },

    /// User settings changed.
    SettingsChanged {
        /// When the settings changed.
        timestamp: DateTime<Utc>,
        /// Settings after the change.
        settings: Settings,
    },

    /// The runtime task exited.
    RuntimeStopped {
        /// When the runtime stopped.
        timestamp: DateTime<Utc>,
        /// Phase at exit.
        phase: Phase,
        /// Counter value at exit.
        counter: u64,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Where the event stream goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSink {
    /// Drop every event.
    Discard,
    /// Interleave with the logs on stderr.
    Stderr,
    /// Truncate and write to a file.
    File(PathBuf),
}

/// Buffered JSONL event writer shared by the lifecycle task.
///
/// Write failures are swallowed; the event stream never interrupts the
/// lifecycle.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("emitted", &self.emitted())
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Wraps an arbitrary writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Opens the given sink.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file sink cannot be created.
    pub fn open(sink: &EventSink) -> std::io::Result<Self> {
        Ok(match sink {
            EventSink::Discard => Self::noop(),
            EventSink::Stderr => Self::new(Box::new(std::io::stderr())),
            EventSink::File(path) => Self::new(Box::new(std::fs::File::create(path)?)),
        })
    }

    /// An emitter that counts events and writes nothing.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Writes `event` as one line. Sequence numbers follow line order.
    pub fn emit(&self, event: Event) {
        let Ok(mut w) = self.writer.lock() else {
            return;
        };
        let envelope = EventEnvelope {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            event,
        };
        if let Ok(line) = serde_json::to_string(&envelope) {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Flushes the underlying writer.
    pub fn flush(&self) {
        if let Ok(mut w) = self.writer.lock() {
            let _ = w.flush();
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
