//! `badgewatch run`
//!
//! Starts the lifecycle runtime against the simulated host and feeds it
//! commands read line by line from stdin.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::alerts::{ALERT_ORIGIN, AlertId, AlertResponse};
use crate::cli::args::RunArgs;
use crate::config::{AppConfig, ConfigLoader};
use crate::error::{BadgewatchError, LifecycleError};
use crate::host::SimulatedHost;
use crate::lifecycle::{ControllerOptions, LifecycleHandle, LifecycleRuntime};
use crate::observability::{EventEmitter, EventSink};

const HELP: &str = "\
commands:
  background | foreground | terminate | suspend
  counting on|off
  alerts on|off
  action <alert-id|last> <default|open|disable|...>
  wait <duration>
  status
  help
  quit";

/// Which alert an `action` command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTarget {
    /// The most recently delivered alert.
    Last,
    /// A specific alert.
    Id(AlertId),
}

/// One line of host input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// Host is being suspended.
    Background,
    /// Host is returning.
    Foreground,
    /// Host is terminating.
    Terminate,
    /// Developer suspend button.
    Suspend,
    /// Counting switch.
    Counting(bool),
    /// Alerts control.
    Alerts(bool),
    /// User acted on an alert.
    Action {
        /// Alert acted on
        target: AlertTarget,
        /// Raw action identifier
        action: String,
    },
    /// Sleep before reading the next command.
    Wait(Duration),
    /// Print a JSON snapshot.
    Status,
    /// Print the command list.
    Help,
    /// Stop reading input.
    Quit,
}

/// Parses one input line. Blank lines and `#` comments yield `None`.
///
/// # Errors
///
/// Returns a description of the problem for malformed input.
pub fn parse_command(line: &str) -> Result<Option<HostCommand>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let words = shlex::split(line).ok_or_else(|| format!("unbalanced quotes in '{line}'"))?;
    let words: Vec<&str> = words.iter().map(String::as_str).collect();

    let command = match words.as_slice() {
        ["background" | "bg"] => HostCommand::Background,
        ["foreground" | "fg"] => HostCommand::Foreground,
        ["terminate"] => HostCommand::Terminate,
        ["suspend"] => HostCommand::Suspend,
        ["counting", state] => HostCommand::Counting(parse_switch(state)?),
        ["alerts", state] => HostCommand::Alerts(parse_switch(state)?),
        ["action", target, action] => HostCommand::Action {
            target: parse_target(target)?,
            action: (*action).to_owned(),
        },
        ["wait", duration] => HostCommand::Wait(
            humantime::parse_duration(duration)
                .map_err(|e| format!("invalid duration '{duration}': {e}"))?,
        ),
        ["status"] => HostCommand::Status,
        ["help"] => HostCommand::Help,
        ["quit" | "exit"] => HostCommand::Quit,
        _ => return Err(format!("unknown command '{line}' (try 'help')")),
    };
    Ok(Some(command))
}

fn parse_switch(word: &str) -> Result<bool, String> {
    match word {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(format!("expected on|off, got '{other}'")),
    }
}

fn parse_target(word: &str) -> Result<AlertTarget, String> {
    if word == "last" {
        return Ok(AlertTarget::Last);
    }
    word.parse()
        .map(AlertTarget::Id)
        .map_err(|_| format!("expected an alert id or 'last', got '{word}'"))
}

/// Run the simulated host until stdin closes, `quit`, or cancellation.
///
/// # Errors
///
/// Returns an error if configuration loading, metrics setup, or the event
/// file fails, or if the runtime task panics.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), BadgewatchError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let loader = ConfigLoader::with_defaults();
    let config: Arc<AppConfig> = if let Some(ref path) = args.config {
        tracing::info!(config = %path.display(), "loading configuration");
        loader.load(path)?.config
    } else {
        loader.load_defaults()?.config
    };

    let sink = match (&args.events_file, args.no_events) {
        (Some(path), _) => EventSink::File(path.clone()),
        (None, true) => EventSink::Discard,
        (None, false) => EventSink::Stderr,
    };
    let emitter = EventEmitter::open(&sink)?;

    let host = SimulatedHost::from_config(&config);
    let (runtime, handle) = LifecycleRuntime::new(
        ControllerOptions::from_config(&config),
        host.collaborators(),
        Arc::new(emitter),
        cancel.child_token(),
    );
    let task = tokio::spawn(runtime.run());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(HostCommand::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(err) = execute(command, &handle, &host).await {
                    tracing::error!(%err, "lifecycle runtime unavailable");
                    break;
                }
            }
            Err(message) => eprintln!("error: {message}"),
        }
    }

    drop(handle);
    let controller = task
        .await
        .map_err(|e| BadgewatchError::Io(std::io::Error::other(e.to_string())))?;
    tracing::info!(phase = %controller.phase(), counter = controller.counter(), "run finished");
    Ok(())
}

async fn execute(
    command: HostCommand,
    handle: &LifecycleHandle,
    host: &SimulatedHost,
) -> Result<(), LifecycleError> {
    match command {
        HostCommand::Background => handle.backgrounding(),
        HostCommand::Foreground => handle.foreground(),
        HostCommand::Terminate => handle.terminate(),
        HostCommand::Suspend => handle.request_suspend(),
        HostCommand::Counting(on) => handle.set_counting_enabled(on),
        HostCommand::Alerts(on) => handle.set_alerts_enabled(on),
        HostCommand::Action { target, action } => {
            let alert_id = match target {
                AlertTarget::Id(id) => Some(id),
                AlertTarget::Last => host.alerts.last_delivered(),
            };
            let Some(alert_id) = alert_id else {
                eprintln!("error: no delivered alert to act on");
                return Ok(());
            };
            handle
                .respond_to_alert(AlertResponse {
                    alert_id,
                    origin: Some(ALERT_ORIGIN.to_owned()),
                    action_id: action,
                })
                .await?;
            host.alerts.dismiss(alert_id);
            Ok(())
        }
        HostCommand::Wait(duration) => {
            tokio::time::sleep(duration).await;
            Ok(())
        }
        HostCommand::Status => {
            let snapshot = handle.snapshot().await?;
            match serde_json::to_string(&snapshot) {
                Ok(json) => host.display.line(&format!("status {json}")),
                Err(err) => tracing::warn!(%err, "failed to serialize snapshot"),
            }
            Ok(())
        }
        HostCommand::Help => {
            host.display.line(HELP);
            Ok(())
        }
        HostCommand::Quit => Ok(()),
    }
}
