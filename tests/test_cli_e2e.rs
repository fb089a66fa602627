//! Process-level tests of the `badgewatch` binary.

mod common;

use common::{fixture_path, run_script, spawn_command, status_lines};

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ============================================================================
// version / completions
// ============================================================================

#[test]
fn test_version_human() {
    let output = spawn_command(&["version"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("badgewatch "));
}

#[test]
fn test_version_json() {
    let output = spawn_command(&["version", "--format", "json"]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(json["name"], "badgewatch");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_completions_bash() {
    let output = spawn_command(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("badgewatch"));
}

// ============================================================================
// validate
// ============================================================================

#[test]
fn test_validate_valid_config() {
    let path = fixture_path("badgewatch.yaml");
    let output = spawn_command(&["validate", path.to_str().unwrap()]);
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains(": ok"));
}

#[test]
fn test_validate_invalid_config_reports_every_error() {
    let path = fixture_path("invalid.yaml");
    let output = spawn_command(&["validate", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    let out = stdout(&output);
    assert!(out.contains("FAILED"));
    assert!(out.contains("app.name"));
    assert!(out.contains("counter.tick_interval"));
}

#[test]
fn test_validate_malformed_and_unknown_fields() {
    for name in ["malformed.yaml", "unknown_field.yaml"] {
        let path = fixture_path(name);
        let output = spawn_command(&["validate", path.to_str().unwrap()]);
        assert_eq!(output.status.code(), Some(2), "{name}");
    }
}

#[test]
fn test_validate_missing_file() {
    let output = spawn_command(&["validate", "/no/such/badgewatch.yaml"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_validate_json_checks_every_file() {
    let good = fixture_path("badgewatch.yaml");
    let bad = fixture_path("invalid.yaml");
    let output = spawn_command(&[
        "validate",
        "--format",
        "json",
        good.to_str().unwrap(),
        bad.to_str().unwrap(),
    ]);
    assert!(!output.status.success());

    let reports: Vec<serde_json::Value> = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["valid"], true);
    assert_eq!(reports[1]["valid"], false);
}

#[test]
fn test_validate_strict_promotes_warnings() {
    let path = fixture_path("warnings.yaml");
    let lenient = spawn_command(&["validate", path.to_str().unwrap()]);
    assert!(lenient.status.success());
    assert!(stdout(&lenient).contains("warning:"));

    let strict = spawn_command(&["validate", "--strict", path.to_str().unwrap()]);
    assert_eq!(strict.status.code(), Some(2));
}

// ============================================================================
// run
// ============================================================================

#[test]
fn test_run_counts_while_backgrounded() {
    let config = fixture_path("badgewatch.yaml");
    let output = run_script(
        &["--quiet", "run", "--no-events", "--config", config.to_str().unwrap()],
        "counting on\nbackground\nwait 550ms\nstatus\nforeground\nstatus\nquit\n",
    );
    assert!(output.status.success(), "{output:?}");

    let out = stdout(&output);
    let statuses = status_lines(&out);
    assert_eq!(statuses.len(), 2);

    assert_eq!(statuses[0]["phase"], "backgrounding");
    assert_eq!(statuses[0]["ticking"], true);
    assert!(statuses[0]["counter"].as_u64().unwrap() > 0);

    assert_eq!(statuses[1]["phase"], "foreground");
    assert_eq!(statuses[1]["counter"], 0);
    assert_eq!(statuses[1]["ticking"], false);

    assert!(out.contains("badge 1"));
    assert!(out.contains("Counting is On"));
}

#[test]
fn test_run_disable_action_from_delivered_alert() {
    let config = fixture_path("badgewatch.yaml");
    let output = run_script(
        &["--quiet", "run", "--no-events", "--config", config.to_str().unwrap()],
        "background\nwait 300ms\naction last disable\nstatus\nquit\n",
    );
    assert!(output.status.success(), "{output:?}");

    let out = stdout(&output);
    assert!(out.contains("Counting is Off"));
    let statuses = status_lines(&out);
    assert_eq!(statuses[0]["settings"]["alerts_enabled"], false);
    assert!(statuses[0]["pending_alert"].is_null());
}

#[test]
fn test_run_denied_authorization_shows_message() {
    let config = fixture_path("deny.yaml");
    let output = run_script(
        &["--quiet", "run", "--no-events", "--config", config.to_str().unwrap()],
        "background\nwait 300ms\nstatus\n",
    );
    assert!(output.status.success(), "{output:?}");

    let out = stdout(&output);
    assert_eq!(out.matches("message: ").count(), 1);
    let statuses = status_lines(&out);
    assert_eq!(statuses[0]["authorization"], "denied");
    assert_eq!(statuses[0]["settings"]["counting_enabled"], false);
    assert_eq!(statuses[0]["counter"], 0);
}

#[test]
fn test_run_rejects_bad_commands_and_continues() {
    let output = run_script(
        &["--quiet", "run", "--no-events"],
        "jump\ncounting maybe\nstatus\n",
    );
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown command"));
    assert_eq!(status_lines(&stdout(&output)).len(), 1);
}

#[test]
fn test_run_writes_event_log() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("events.jsonl");
    let config = fixture_path("badgewatch.yaml");
    let output = run_script(
        &[
            "--quiet",
            "run",
            "--config",
            config.to_str().unwrap(),
            "--events-file",
            events.to_str().unwrap(),
        ],
        "counting on\nbackground\nwait 250ms\nforeground\nterminate\n",
    );
    assert!(output.status.success(), "{output:?}");

    let log = std::fs::read_to_string(&events).unwrap();
    let entries: Vec<serde_json::Value> = log
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let types: Vec<&str> = entries
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();

    for expected in [
        "AuthorizationUpdated",
        "CounterArmed",
        "KeepaliveStarted",
        "AlertScheduled",
        "CounterDisarmed",
        "PhaseEntered",
        "RuntimeStopped",
    ] {
        assert!(types.contains(&expected), "missing {expected} in {types:?}");
    }
    assert_eq!(types.last(), Some(&"RuntimeStopped"));

    let sequences: Vec<u64> = entries
        .iter()
        .map(|e| e["sequence"].as_u64().unwrap())
        .collect();
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));

    let stopped = entries.last().unwrap();
    assert_eq!(stopped["phase"], "terminated");
}

#[test]
fn test_run_rejects_missing_config() {
    let output = run_script(&["run", "--config", "/no/such/file.yaml"], "");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    let output = spawn_command(&["frobnicate"]);
    assert_eq!(output.status.code(), Some(64));

    let help = spawn_command(&["--help"]);
    assert!(help.status.success());
}
