//! Logging setup.
//!
//! Everything goes to stderr so stdout stays free for the simulated host.
//! Verbosity flags raise the level of this crate only; dependencies stay at
//! `warn` unless `BADGEWATCH_LOG_LEVEL` says otherwise.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable holding a full `EnvFilter` directive.
pub const LOG_LEVEL_ENV: &str = "BADGEWATCH_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain text, colored when the terminal allows it.
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

/// Level for `-v` repeated `verbosity` times. Saturates at `trace`.
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Filter for the given override and verbosity.
///
/// A parseable override wins outright.
fn build_filter(env_override: Option<&str>, verbosity: u8) -> EnvFilter {
    if let Some(directive) = env_override {
        match EnvFilter::try_new(directive) {
            Ok(filter) => return filter,
            Err(err) => eprintln!("ignoring {LOG_LEVEL_ENV}={directive}: {err}"),
        }
    }
    let level = verbosity_to_directive(verbosity);
    EnvFilter::new(format!("warn,{}={level}", env!("CARGO_CRATE_NAME")))
}

fn use_ansi(color: ColorChoice) -> bool {
    match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let env_override = std::env::var(LOG_LEVEL_ENV).ok();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_filter(env_override.as_deref(), verbosity))
        .with_target(verbosity >= 2)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Human => builder.with_ansi(use_ansi(color)).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
