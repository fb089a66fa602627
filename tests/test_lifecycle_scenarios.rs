//! End-to-end lifecycle scenarios driven through the runtime with fake
//! collaborators and paused time.

mod common;

use std::time::Duration;

use badgewatch::lifecycle::{Phase, Settings};
use common::{DisplayCall, Harness, HarnessOptions};

fn counting_on() -> HarnessOptions {
    HarnessOptions {
        settings: Settings {
            counting_enabled: true,
            alerts_enabled: true,
        },
        ..HarnessOptions::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_background_with_counting_ticks_every_period() {
    let h = Harness::with(counting_on());
    h.settle().await;
    h.handle.backgrounding().unwrap();

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    let snapshot = h.settle().await;

    assert_eq!(snapshot.phase, Phase::Backgrounding);
    assert_eq!(snapshot.counter, 3);
    assert!(snapshot.ticking);
    assert!(h.display.badges().ends_with(&[0, 1, 2, 3]));
    assert_eq!(
        h.display.texts().last().map(String::as_str),
        Some("  3  ")
    );

    let scheduled = h.center.scheduled();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].body, "Counting is On");
    assert_eq!(scheduled[0].badge_override, None);
    assert_eq!(snapshot.pending_alert, Some(scheduled[0].id));
    assert_eq!(h.keepalive.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_background_without_counting_schedules_off_alert() {
    let h = Harness::start();
    h.settle().await;
    h.handle.backgrounding().unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    let snapshot = h.settle().await;

    assert_eq!(snapshot.counter, 0);
    assert!(!snapshot.ticking);
    assert!(h.display.badges().iter().all(|&b| b == 0));

    let scheduled = h.center.scheduled();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].body, "Counting is Off");
    assert_eq!(scheduled[0].badge_override, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_foreground_stops_ticker_and_resets_display() {
    let h = Harness::with(counting_on());
    h.settle().await;
    h.handle.backgrounding().unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(h.settle().await.counter, 2);

    h.handle.foreground().unwrap();
    let snapshot = h.settle().await;
    assert_eq!(snapshot.phase, Phase::Foreground);
    assert_eq!(snapshot.counter, 0);
    assert!(!snapshot.ticking);
    assert_eq!(h.display.last_badge(), Some(0));
    assert_eq!(h.display.texts().last().map(String::as_str), Some("  0  "));

    // Nothing keeps counting once returned.
    h.display.clear();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.settle().await.counter, 0);
    assert!(h.display.badges().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_terminate_clears_badge_and_keeps_label() {
    let h = Harness::with(counting_on());
    h.settle().await;
    h.handle.backgrounding().unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    h.settle().await;

    h.display.clear();
    h.handle.terminate().unwrap();
    let snapshot = h.settle().await;

    assert_eq!(snapshot.phase, Phase::Terminated);
    assert!(!snapshot.settings.alerts_enabled);
    assert!(!snapshot.ticking);
    assert_eq!(h.display.calls(), vec![DisplayCall::Badge(0)]);

    // Later events are rejected and change nothing.
    h.handle.backgrounding().unwrap();
    h.handle.set_counting_enabled(false).unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    let after = h.settle().await;
    assert_eq!(after.phase, Phase::Terminated);
    assert!(after.settings.counting_enabled);
    assert_eq!(h.center.scheduled().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disable_action_suppresses_next_alert() {
    let h = Harness::start();
    h.settle().await;
    h.handle.backgrounding().unwrap();
    let first = h.settle().await.pending_alert.expect("alert scheduled");

    h.handle
        .respond_to_alert(badgewatch::alerts::AlertResponse {
            alert_id: first,
            origin: Some(badgewatch::alerts::ALERT_ORIGIN.to_owned()),
            action_id: badgewatch::alerts::DISABLE_ACTION.to_owned(),
        })
        .await
        .unwrap();

    h.handle.foreground().unwrap();
    h.handle.backgrounding().unwrap();
    let snapshot = h.settle().await;

    assert!(!snapshot.settings.alerts_enabled);
    assert_eq!(snapshot.pending_alert, None);
    assert_eq!(h.center.scheduled().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_counting_toggle_while_backgrounded_follows_switch() {
    let h = Harness::start();
    h.settle().await;
    h.handle.backgrounding().unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.settle().await.counter, 0);

    h.handle.set_counting_enabled(true).unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    let on = h.settle().await;
    assert!(on.ticking);
    assert_eq!(on.counter, 2);

    h.handle.set_counting_enabled(false).unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    let off = h.settle().await;
    assert!(!off.ticking);
    assert_eq!(off.counter, 0);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_backgrounding_restarts_count() {
    let h = Harness::with(counting_on());
    h.settle().await;
    h.handle.backgrounding().unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(h.settle().await.counter, 2);

    h.handle.request_suspend().unwrap();
    let snapshot = h.settle().await;
    assert_eq!(snapshot.counter, 0);
    assert!(snapshot.ticking);
    assert_eq!(h.keepalive.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_runtime_and_returns_controller() {
    let h = Harness::with(counting_on());
    h.settle().await;
    h.handle.backgrounding().unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    h.settle().await;

    let controller = h.stop().await;
    assert_eq!(controller.phase(), Phase::Backgrounding);
    assert_eq!(controller.counter(), 1);
}
