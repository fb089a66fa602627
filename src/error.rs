//! Error types for `badgewatch`
//!
//! Domain errors for the lifecycle state machine and configuration loading,
//! aggregated into [`BadgewatchError`] with process exit code mapping.

use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::Phase;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `badgewatch` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Lifecycle error (rejected transition, runtime gone)
    pub const LIFECYCLE_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `badgewatch` operations.
#[derive(Debug, Error)]
pub enum BadgewatchError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Lifecycle state machine error
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BadgewatchError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Lifecycle(_) => ExitCode::LIFECYCLE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Lifecycle Errors
// ============================================================================

/// Why the keepalive session could not be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveIssue {
    /// The platform service is switched off.
    ServiceDisabled,
    /// The user explicitly denied the service's authorization.
    AuthorizationDenied,
}

impl std::fmt::Display for KeepaliveIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServiceDisabled => write!(f, "keepalive service disabled"),
            Self::AuthorizationDenied => write!(f, "keepalive authorization denied"),
        }
    }
}

/// Errors raised by the lifecycle controller and its collaborators.
///
/// Every variant is recoverable by user action; none is fatal to the process.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The authorization oracle denied the alert/badge permission.
    #[error("authorization denied")]
    AuthorizationDenied,

    /// The keepalive session could not be started.
    #[error("keepalive unavailable: {0}")]
    KeepaliveUnavailable(KeepaliveIssue),

    /// A phase event arrived in a phase that cannot accept it.
    #[error("invalid transition: {event} while {phase}")]
    InvalidTransition {
        /// Phase the controller was in
        phase: Phase,
        /// Name of the rejected event
        event: &'static str,
    },

    /// The runtime task has stopped and no longer accepts events.
    #[error("lifecycle runtime closed")]
    RuntimeClosed,
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "counter.tick_interval")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Validation failure that prevents the configuration from being used
    Error,
    /// Potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// Tests
// ============================================================================
