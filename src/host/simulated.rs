//! Simulated collaborators.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::alerts::{AlertCategory, AlertCenter, AlertId, AlertRequest};
use crate::authorization::{AuthorizationOracle, Capabilities};
use crate::display::DisplaySurface;
use crate::keepalive::{KeepaliveAuthorization, KeepaliveOptions, KeepaliveService};

// ============================================================================
// Display
// ============================================================================

/// Display that prints one line per update.
pub struct ConsoleDisplay {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleDisplay {
    /// Prints to the given writer.
    #[must_use]
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Prints to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Writes one line; output errors are ignored.
    pub fn line(&self, text: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{text}");
            let _ = out.flush();
        }
    }
}

impl DisplaySurface for ConsoleDisplay {
    fn set_badge(&self, value: u64) {
        self.line(&format!("badge {value}"));
    }

    fn set_visible(&self, visible: bool) {
        self.line(if visible { "label shown" } else { "label hidden" });
    }

    fn set_text(&self, text: &str) {
        self.line(&format!("label [{text}]"));
    }

    fn set_control_label(&self, label: &str) {
        self.line(&format!("control \"{label}\""));
    }

    fn set_counting_switch(&self, on: bool) {
        self.line(&format!("counting switch {}", if on { "on" } else { "off" }));
    }

    fn present_message(&self, message: &str) {
        self.line(&format!("message: {message}"));
    }
}

impl std::fmt::Debug for ConsoleDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleDisplay").finish_non_exhaustive()
    }
}

// ============================================================================
// Authorization
// ============================================================================

/// Oracle with a fixed answer and latency.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedOracle {
    answer: bool,
    latency: Duration,
}

impl SimulatedOracle {
    /// Answers `answer` after `latency`.
    #[must_use]
    pub const fn new(answer: bool, latency: Duration) -> Self {
        Self { answer, latency }
    }
}

#[async_trait::async_trait]
impl AuthorizationOracle for SimulatedOracle {
    async fn request(&self, capabilities: Capabilities) -> bool {
        debug!(?capabilities, latency = ?self.latency, "simulated authorization prompt");
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.answer
    }
}

// ============================================================================
// Keepalive
// ============================================================================

/// Keepalive service that records its session.
#[derive(Debug)]
pub struct SimulatedKeepalive {
    enabled: bool,
    authorization: Mutex<KeepaliveAuthorization>,
    running: AtomicBool,
}

impl SimulatedKeepalive {
    /// A service that is switched on or off with the given authorization.
    #[must_use]
    pub const fn new(enabled: bool, authorization: KeepaliveAuthorization) -> Self {
        Self {
            enabled,
            authorization: Mutex::new(authorization),
            running: AtomicBool::new(false),
        }
    }

    /// Whether a session was started.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl KeepaliveService for SimulatedKeepalive {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn current_authorization(&self) -> KeepaliveAuthorization {
        self.authorization
            .lock()
            .map_or(KeepaliveAuthorization::Undetermined, |a| *a)
    }

    fn request_always_authorization(&self) {
        if let Ok(mut authorization) = self.authorization.lock() {
            if *authorization == KeepaliveAuthorization::Undetermined {
                *authorization = KeepaliveAuthorization::Granted;
            }
        }
    }

    fn start(&self, options: KeepaliveOptions) {
        info!(?options, "simulated keepalive session started");
        self.running.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Default)]
struct AlertBook {
    categories: Vec<String>,
    pending: HashMap<AlertId, JoinHandle<()>>,
    delivered: HashSet<AlertId>,
    last_delivered: Option<AlertId>,
}

/// Alert center that delivers each alert after its delay.
pub struct SimulatedAlertCenter {
    display: Arc<ConsoleDisplay>,
    book: Arc<Mutex<AlertBook>>,
}

impl SimulatedAlertCenter {
    /// Prints deliveries on `display`.
    #[must_use]
    pub fn new(display: Arc<ConsoleDisplay>) -> Self {
        Self {
            display,
            book: Arc::new(Mutex::new(AlertBook::default())),
        }
    }

    /// Alerts scheduled but not yet delivered.
    #[must_use]
    pub fn pending(&self) -> Vec<AlertId> {
        self.book
            .lock()
            .map(|b| b.pending.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Delivered alerts still visible.
    #[must_use]
    pub fn delivered(&self) -> Vec<AlertId> {
        self.book
            .lock()
            .map(|b| b.delivered.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Most recently delivered alert that is still visible.
    #[must_use]
    pub fn last_delivered(&self) -> Option<AlertId> {
        self.book
            .lock()
            .ok()
            .and_then(|b| b.last_delivered.filter(|id| b.delivered.contains(id)))
    }

    /// Registered category identifiers.
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        self.book
            .lock()
            .map(|b| b.categories.clone())
            .unwrap_or_default()
    }

    /// Removes an alert the user acted on.
    pub fn dismiss(&self, id: AlertId) {
        if let Ok(mut book) = self.book.lock() {
            book.delivered.remove(&id);
        }
    }
}

impl AlertCenter for SimulatedAlertCenter {
    fn register_category(&self, category: &AlertCategory) {
        if let Ok(mut book) = self.book.lock() {
            if !book.categories.contains(&category.identifier) {
                book.categories.push(category.identifier.clone());
            }
        }
    }

    fn cancel(&self, ids: &[AlertId]) {
        if let Ok(mut book) = self.book.lock() {
            for id in ids {
                if let Some(task) = book.pending.remove(id) {
                    task.abort();
                }
                book.delivered.remove(id);
            }
        }
    }

    fn schedule(&self, request: AlertRequest) {
        let id = request.id;
        let display = Arc::clone(&self.display);
        let shared = Arc::clone(&self.book);

        // Recorded as pending before the delivery task can run.
        let Ok(mut book) = self.book.lock() else {
            return;
        };
        let task = tokio::spawn(async move {
            tokio::time::sleep(request.delay).await;
            if let Ok(mut book) = shared.lock() {
                book.pending.remove(&id);
                book.delivered.insert(id);
                book.last_delivered = Some(id);
            }
            if let Some(badge) = request.badge_override {
                display.set_badge(badge);
            }
            display.line(&format!("alert {id}: {} | {}", request.title, request.body));
        });
        book.pending.insert(id, task);
    }
}

impl std::fmt::Debug for SimulatedAlertCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedAlertCenter")
            .field("pending", &self.pending().len())
            .field("delivered", &self.delivered().len())
            .finish_non_exhaustive()
    }
}
