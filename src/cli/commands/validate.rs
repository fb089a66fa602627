//! `badgewatch validate`
//!
//! Loads each file through the normal pipeline and reports the outcome.

use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::loader::{ConfigLoader, LoadWarning};
use crate::error::{BadgewatchError, ConfigError, Severity, ValidationIssue};

#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validate configuration files.
///
/// Every file is checked before the first failure is returned.
///
/// # Errors
///
/// Returns the first file's error, or a validation error when `--strict`
/// is set and any file produced warnings.
pub fn run(args: &ValidateArgs) -> Result<(), BadgewatchError> {
    let loader = ConfigLoader::with_defaults();
    let mut reports = Vec::with_capacity(args.files.len());
    let mut first_error: Option<BadgewatchError> = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let (report, error) = check(&loader, path, args.strict);
        if first_error.is_none() {
            first_error = error;
        }
        reports.push(report);
    }

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                let status = if report.valid { "ok" } else { "FAILED" };
                println!("{}: {status}", report.file);
                for error in &report.errors {
                    println!("  error: {error}");
                }
                for warning in &report.warnings {
                    println!("  warning: {warning}");
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    first_error.map_or(Ok(()), Err)
}

fn check(
    loader: &ConfigLoader,
    path: &Path,
    strict: bool,
) -> (FileReport, Option<BadgewatchError>) {
    let file = path.display().to_string();
    match loader.load(path) {
        Ok(result) => {
            let warnings: Vec<String> = result.warnings.iter().map(render_warning).collect();
            if strict && !warnings.is_empty() {
                let issues = result
                    .warnings
                    .iter()
                    .map(|w| ValidationIssue {
                        path: w.location.clone().unwrap_or_default(),
                        message: w.message.clone(),
                        severity: Severity::Error,
                    })
                    .collect();
                let error = ConfigError::ValidationError {
                    path: file.clone(),
                    errors: issues,
                };
                return (
                    FileReport {
                        file,
                        valid: false,
                        errors: warnings,
                        warnings: Vec::new(),
                    },
                    Some(error.into()),
                );
            }
            (
                FileReport {
                    file,
                    valid: true,
                    errors: Vec::new(),
                    warnings,
                },
                None,
            )
        }
        Err(err) => {
            let errors = match &err {
                ConfigError::ValidationError { errors, .. } => {
                    errors
                    .iter()
                    .map(|e| format!("{}: {}", e.path, e.message))
                    .collect()
                }
                other => vec![other.to_string()],
            };
            (
                FileReport {
                    file,
                    valid: false,
                    errors,
                    warnings: Vec::new(),
                },
                Some(err.into()),
            )
        }
    }
}

fn render_warning(warning: &LoadWarning) -> String {
    warning.location.as_ref().map_or_else(
        || warning.message.clone(),
        |location| format!("{location}: {}", warning.message),
    )
}
