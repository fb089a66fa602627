//! Alert dispatch and user-action handling through the runtime.

mod common;

use std::time::Duration;

use badgewatch::alerts::{
    ALERT_CATEGORY, ALERT_ORIGIN, AlertResponse, DEFAULT_ACTION, DISABLE_ACTION, OPEN_ACTION,
};
use common::Harness;
use tokio_test::{assert_pending, assert_ready_ok};

fn ours(alert_id: badgewatch::alerts::AlertId, action: &str) -> AlertResponse {
    AlertResponse {
        alert_id,
        origin: Some(ALERT_ORIGIN.to_owned()),
        action_id: action.to_owned(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_alert_visible_across_cycles() {
    let h = Harness::start();
    h.settle().await;

    for _ in 0..5 {
        h.handle.backgrounding().unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        h.handle.foreground().unwrap();
        h.settle().await;
        assert!(h.center.visible().len() <= 1);
    }

    let scheduled = h.center.scheduled();
    assert_eq!(scheduled.len(), 5);
    assert_eq!(h.center.cancelled().len(), 4);
    assert_eq!(h.center.visible().len(), 1);
    assert!(h.center.visible().contains(&scheduled[4].id));
}

#[tokio::test(start_paused = true)]
async fn test_category_registered_once_with_both_actions() {
    let h = Harness::start();
    h.settle().await;
    h.handle.backgrounding().unwrap();
    h.handle.backgrounding().unwrap();
    h.settle().await;

    let categories = h.center.categories();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].identifier, ALERT_CATEGORY);
    let actions: Vec<&str> = categories[0]
        .actions
        .iter()
        .map(|a| a.identifier.as_str())
        .collect();
    assert_eq!(actions, vec![OPEN_ACTION, DISABLE_ACTION]);
}

#[tokio::test(start_paused = true)]
async fn test_alert_request_carries_template() {
    let h = Harness::start();
    h.settle().await;
    h.handle.backgrounding().unwrap();
    h.settle().await;

    let request = &h.center.scheduled()[0];
    assert_eq!(request.title, "I am in the background...");
    assert_eq!(request.category, ALERT_CATEGORY);
    assert_eq!(request.origin, ALERT_ORIGIN);
    assert_eq!(request.delay, Duration::from_secs(1));
    assert!(!request.repeats);
    assert!(request.attachment.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_foreign_response_is_ignored_but_acknowledged() {
    let h = Harness::start();
    h.settle().await;
    h.handle.backgrounding().unwrap();
    let pending = h.settle().await.pending_alert.unwrap();

    h.handle
        .respond_to_alert(AlertResponse {
            alert_id: pending,
            origin: None,
            action_id: DISABLE_ACTION.to_owned(),
        })
        .await
        .unwrap();

    let snapshot = h.settle().await;
    assert!(snapshot.settings.alerts_enabled);
    assert_eq!(snapshot.pending_alert, Some(pending));
}

#[tokio::test(start_paused = true)]
async fn test_open_and_unknown_actions_only_dismiss() {
    let h = Harness::start();
    h.settle().await;

    for action in [OPEN_ACTION, DEFAULT_ACTION, "snooze"] {
        h.handle.backgrounding().unwrap();
        let pending = h.settle().await.pending_alert.unwrap();
        h.handle.respond_to_alert(ours(pending, action)).await.unwrap();

        let snapshot = h.settle().await;
        assert!(snapshot.settings.alerts_enabled, "{action} must not disable alerts");
        assert_eq!(snapshot.pending_alert, None);
    }
}

#[tokio::test(start_paused = true)]
async fn test_disable_in_foreground_refreshes_control_label() {
    let h = Harness::start();
    h.settle().await;
    h.handle.backgrounding().unwrap();
    let pending = h.settle().await.pending_alert.unwrap();
    h.handle.foreground().unwrap();
    h.settle().await;

    h.display.clear();
    h.handle
        .respond_to_alert(ours(pending, DISABLE_ACTION))
        .await
        .unwrap();
    h.settle().await;
    assert_eq!(h.display.control_labels(), vec!["Enable Alerts".to_owned()]);
}

#[tokio::test]
async fn test_response_resolves_only_after_runtime_handles_it() {
    let h = Harness::start();
    h.settle().await;
    h.handle.backgrounding().unwrap();
    let pending = h.settle().await.pending_alert.unwrap();

    let mut response = tokio_test::task::spawn(h.handle.respond_to_alert(ours(pending, OPEN_ACTION)));
    assert_pending!(response.poll());

    h.settle().await;
    assert!(response.is_woken());
    assert_ready_ok!(response.poll());
}
