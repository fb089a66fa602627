//! Configuration validation
//!
//! Semantic checks on a deserialized [`AppConfig`]. All issues are
//! collected rather than stopping at the first one.

use std::time::Duration;

use crate::config::schema::{AppConfig, OracleAnswer};
use crate::error::{Severity, ValidationIssue};

/// Tick intervals below this are almost certainly a typo.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &AppConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        if config.app.name.trim().is_empty() {
            self.add_error("app.name", "must not be empty");
        }

        let tick = config.counter.tick_interval;
        if tick.is_zero() {
            self.add_error("counter.tick_interval", "must be greater than zero");
        } else if tick < MIN_TICK_INTERVAL {
            self.add_warning(
                "counter.tick_interval",
                &format!("{} is unusually short", humantime::format_duration(tick)),
            );
        }

        if config.alerts.title.trim().is_empty() {
            self.add_error("alerts.title", "must not be empty");
        }
        if config.alerts.delay.is_zero() {
            self.add_error("alerts.delay", "must be greater than zero");
        }
        if let Some(path) = &config.alerts.attachment {
            if !path.exists() {
                self.add_warning(
                    "alerts.attachment",
                    &format!("{} does not exist; alerts will be sent without it", path.display()),
                );
            }
        }

        if config.settings.counting_enabled && config.simulation.oracle == OracleAnswer::Deny {
            self.add_warning(
                "settings.counting_enabled",
                "simulated oracle denies authorization; counting will be forced off",
            );
        }

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}
