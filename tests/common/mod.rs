//! Shared integration-test harness: recording fakes for every collaborator,
//! a runtime launcher, and helpers for spawning the `badgewatch` binary.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use badgewatch::alerts::{AlertCategory, AlertCenter, AlertId, AlertRequest};
use badgewatch::authorization::{AuthorizationMode, AuthorizationOracle, Capabilities};
use badgewatch::display::DisplaySurface;
use badgewatch::keepalive::{KeepaliveAuthorization, KeepaliveOptions, KeepaliveService};
use badgewatch::lifecycle::{
    Collaborators, ControllerOptions, LifecycleController, LifecycleHandle, LifecycleRuntime,
    Settings,
};
use badgewatch::observability::EventEmitter;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Display
// ============================================================================

/// One call on the display surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    Badge(u64),
    Visible(bool),
    Text(String),
    ControlLabel(String),
    CountingSwitch(bool),
    Message(String),
}

/// Display that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    calls: Mutex<Vec<DisplayCall>>,
}

impl RecordingDisplay {
    pub fn calls(&self) -> Vec<DisplayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn badges(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DisplayCall::Badge(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DisplayCall::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn control_labels(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DisplayCall::ControlLabel(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DisplayCall::Message(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn last_badge(&self) -> Option<u64> {
        self.badges().last().copied()
    }

    fn push(&self, call: DisplayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl DisplaySurface for RecordingDisplay {
    fn set_badge(&self, value: u64) {
        self.push(DisplayCall::Badge(value));
    }
    fn set_visible(&self, visible: bool) {
        self.push(DisplayCall::Visible(visible));
    }
    fn set_text(&self, text: &str) {
        self.push(DisplayCall::Text(text.to_owned()));
    }
    fn set_control_label(&self, label: &str) {
        self.push(DisplayCall::ControlLabel(label.to_owned()));
    }
    fn set_counting_switch(&self, on: bool) {
        self.push(DisplayCall::CountingSwitch(on));
    }
    fn present_message(&self, message: &str) {
        self.push(DisplayCall::Message(message.to_owned()));
    }
}

// ============================================================================
// Oracle
// ============================================================================

/// Oracle with a fixed answer, optional latency, and a call counter.
#[derive(Debug)]
pub struct FakeOracle {
    pub answer: bool,
    pub latency: Duration,
    pub calls: AtomicUsize,
}

impl FakeOracle {
    pub fn new(answer: bool, latency: Duration) -> Self {
        Self {
            answer,
            latency,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AuthorizationOracle for FakeOracle {
    async fn request(&self, _capabilities: Capabilities) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.answer
    }
}

// ============================================================================
// Keepalive
// ============================================================================

#[derive(Debug)]
pub struct FakeKeepalive {
    pub enabled: bool,
    pub authorization: KeepaliveAuthorization,
    pub starts: AtomicUsize,
    pub always_requested: AtomicBool,
}

impl FakeKeepalive {
    pub fn new(enabled: bool, authorization: KeepaliveAuthorization) -> Self {
        Self {
            enabled,
            authorization,
            starts: AtomicUsize::new(0),
            always_requested: AtomicBool::new(false),
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl KeepaliveService for FakeKeepalive {
    fn enabled(&self) -> bool {
        self.enabled
    }
    fn current_authorization(&self) -> KeepaliveAuthorization {
        self.authorization
    }
    fn request_always_authorization(&self) {
        self.always_requested.store(true, Ordering::SeqCst);
    }
    fn start(&self, options: KeepaliveOptions) {
        assert_eq!(options, KeepaliveOptions::CONTINUOUS);
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Alert center
// ============================================================================

/// Alert center that treats every scheduled alert as immediately visible.
#[derive(Debug, Default)]
pub struct RecordingCenter {
    visible: Mutex<HashSet<AlertId>>,
    scheduled: Mutex<Vec<AlertRequest>>,
    cancelled: Mutex<Vec<AlertId>>,
    categories: Mutex<Vec<AlertCategory>>,
}

impl RecordingCenter {
    pub fn visible(&self) -> HashSet<AlertId> {
        self.visible.lock().unwrap().clone()
    }

    pub fn scheduled(&self) -> Vec<AlertRequest> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<AlertId> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn categories(&self) -> Vec<AlertCategory> {
        self.categories.lock().unwrap().clone()
    }

    /// Removes an alert the user acted on.
    pub fn dismiss(&self, id: AlertId) {
        self.visible.lock().unwrap().remove(&id);
    }
}

impl AlertCenter for RecordingCenter {
    fn register_category(&self, category: &AlertCategory) {
        self.categories.lock().unwrap().push(category.clone());
    }

    fn cancel(&self, ids: &[AlertId]) {
        let mut visible = self.visible.lock().unwrap();
        for id in ids {
            visible.remove(id);
        }
        self.cancelled.lock().unwrap().extend_from_slice(ids);
    }

    fn schedule(&self, request: AlertRequest) {
        self.visible.lock().unwrap().insert(request.id);
        self.scheduled.lock().unwrap().push(request);
    }
}

// ============================================================================
// Runtime harness
// ============================================================================

/// How a [`Harness`] is configured.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub granted: bool,
    pub oracle_latency: Duration,
    pub keepalive_enabled: bool,
    pub keepalive_authorization: KeepaliveAuthorization,
    pub mode: AuthorizationMode,
    pub settings: Settings,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            granted: true,
            oracle_latency: Duration::ZERO,
            keepalive_enabled: true,
            keepalive_authorization: KeepaliveAuthorization::Undetermined,
            mode: AuthorizationMode::Resolved,
            settings: Settings::default(),
        }
    }
}

/// A running lifecycle runtime plus handles on every fake.
pub struct Harness {
    pub handle: LifecycleHandle,
    pub display: Arc<RecordingDisplay>,
    pub oracle: Arc<FakeOracle>,
    pub keepalive: Arc<FakeKeepalive>,
    pub center: Arc<RecordingCenter>,
    pub cancel: CancellationToken,
    task: JoinHandle<LifecycleController>,
}

impl Harness {
    /// Spawns a runtime with default options (granted, resolved mode).
    pub fn start() -> Self {
        Self::with(HarnessOptions::default())
    }

    /// Spawns a runtime with the given options.
    pub fn with(options: HarnessOptions) -> Self {
        let display = Arc::new(RecordingDisplay::default());
        let oracle = Arc::new(FakeOracle::new(options.granted, options.oracle_latency));
        let keepalive = Arc::new(FakeKeepalive::new(
            options.keepalive_enabled,
            options.keepalive_authorization,
        ));
        let center = Arc::new(RecordingCenter::default());
        let cancel = CancellationToken::new();

        let (runtime, handle) = LifecycleRuntime::new(
            ControllerOptions {
                authorization_mode: options.mode,
                initial_settings: options.settings,
                ..ControllerOptions::default()
            },
            Collaborators {
                display: display.clone(),
                oracle: oracle.clone(),
                keepalive: keepalive.clone(),
                alerts: center.clone(),
            },
            Arc::new(EventEmitter::noop()),
            cancel.clone(),
        );
        let task = tokio::spawn(runtime.run());

        Self {
            handle,
            display,
            oracle,
            keepalive,
            center,
            cancel,
            task,
        }
    }

    /// Waits until every event posted so far has been handled.
    pub async fn settle(&self) -> badgewatch::lifecycle::LifecycleSnapshot {
        self.handle.snapshot().await.expect("runtime closed")
    }

    /// Stops the runtime and returns the controller.
    pub async fn stop(self) -> LifecycleController {
        self.cancel.cancel();
        self.task.await.expect("runtime panicked")
    }
}

// ============================================================================
// Process helpers
// ============================================================================

/// Path to the compiled binary.
pub fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_badgewatch")
}

/// Path to a test fixture.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Runs the binary to completion with no stdin.
pub fn spawn_command(args: &[&str]) -> Output {
    Command::new(bin())
        .args(args)
        .env_remove("BADGEWATCH_CONFIG")
        .env_remove("BADGEWATCH_LOG_LEVEL")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run badgewatch")
}

/// Runs the binary with `script` written to its stdin.
pub fn run_script(args: &[&str], script: &str) -> Output {
    let mut child = Command::new(bin())
        .args(args)
        .env_remove("BADGEWATCH_CONFIG")
        .env_remove("BADGEWATCH_TICK_INTERVAL")
        .env_remove("BADGEWATCH_ALERT_DELAY")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn badgewatch");

    child
        .stdin
        .take()
        .expect("stdin not captured")
        .write_all(script.as_bytes())
        .expect("failed to write script");

    child.wait_with_output().expect("failed to wait for badgewatch")
}

/// Extracts the JSON payloads of every `status` line.
pub fn status_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter_map(|l| l.strip_prefix("status "))
        .map(|l| serde_json::from_str(l).expect("status line should be JSON"))
        .collect()
}
