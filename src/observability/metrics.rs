//! Metrics for `badgewatch`.
//!
//! Thin typed wrappers over the `metrics` facade. Every label value comes
//! from a closed enum, so label cardinality is bounded by construction.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{BadgewatchError, KeepaliveIssue};
use crate::lifecycle::Phase;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `BadgewatchError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), BadgewatchError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| BadgewatchError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "badgewatch_phase_transitions_total",
        "Total number of phase transitions"
    );
    describe_gauge!(
        "badgewatch_current_phase",
        "Currently active phase (1 = active)"
    );
    describe_counter!("badgewatch_ticks_total", "Counter ticks applied");
    describe_gauge!("badgewatch_counter_value", "Current counter value");
    describe_counter!("badgewatch_alerts_scheduled_total", "Alerts scheduled");
    describe_counter!("badgewatch_alerts_cancelled_total", "Alerts cancelled");
    describe_counter!(
        "badgewatch_authorization_results_total",
        "Authorization answers by result"
    );
    describe_counter!(
        "badgewatch_keepalive_failures_total",
        "Keepalive start failures by reason"
    );
    describe_counter!(
        "badgewatch_user_messages_total",
        "Explanatory messages presented by kind"
    );
}

/// Records a phase transition and moves the current-phase gauge.
pub fn record_phase_transition(from: Phase, to: Phase) {
    counter!(
        "badgewatch_phase_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    gauge!("badgewatch_current_phase", "phase" => from.as_str()).set(0.0);
    gauge!("badgewatch_current_phase", "phase" => to.as_str()).set(1.0);
}

/// Records one applied tick.
pub fn record_tick() {
    counter!("badgewatch_ticks_total").increment(1);
}

/// Sets the counter value gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_counter_value(value: u64) {
    gauge!("badgewatch_counter_value").set(value as f64);
}

/// Records a scheduled alert.
pub fn record_alert_scheduled() {
    counter!("badgewatch_alerts_scheduled_total").increment(1);
}

/// Records cancelled alerts.
pub fn record_alerts_cancelled(count: usize) {
    counter!("badgewatch_alerts_cancelled_total").increment(count as u64);
}

/// Records an answer from the authorization oracle.
pub fn record_authorization(granted: bool) {
    let result = if granted { "granted" } else { "denied" };
    counter!("badgewatch_authorization_results_total", "result" => result).increment(1);
}

/// Records a keepalive start failure.
pub fn record_keepalive_failure(issue: KeepaliveIssue) {
    let reason = match issue {
        KeepaliveIssue::ServiceDisabled => "service_disabled",
        KeepaliveIssue::AuthorizationDenied => "authorization_denied",
    };
    counter!("badgewatch_keepalive_failures_total", "reason" => reason).increment(1);
}

/// Records a presented explanatory message.
pub fn record_user_message(kind: &'static str) {
    counter!("badgewatch_user_messages_total", "kind" => kind).increment(1);
}
