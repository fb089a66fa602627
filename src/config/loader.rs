//! Configuration loader
//!
//! Pipeline: size check, read, YAML parse into [`AppConfig`], environment
//! overrides, validation, freeze with `Arc`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::AppConfig;
use crate::config::validation::Validator;
use crate::error::ConfigError;

/// Overrides `counter.tick_interval`.
pub const TICK_INTERVAL_ENV: &str = "BADGEWATCH_TICK_INTERVAL";

/// Overrides `alerts.delay`.
pub const ALERT_DELAY_ENV: &str = "BADGEWATCH_ALERT_DELAY";

// ============================================================================
// Public API
// ============================================================================

/// Options for the configuration loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Limits for configuration size.
    pub config_limits: ConfigLimits,

    /// Skip `BADGEWATCH_*` environment overrides.
    pub ignore_env: bool,
}

/// Limits on configuration input.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("BADGEWATCH_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a configuration.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: Arc<AppConfig>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or too large, YAML parsing
    /// fails, an environment override is malformed, or validation fails.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let max = self.options.config_limits.max_config_size;
        let file_size = usize::try_from(metadata.len()).unwrap_or(max.saturating_add(1));
        if file_size > max {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {max} bytes"),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

        self.load_str(raw, path)
    }

    /// Loads configuration from text; `origin` is used in diagnostics only.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus the file checks.
    pub fn load_str(&self, content: &str, origin: &Path) -> Result<LoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let config = if content.trim().is_empty() {
            warnings.push(LoadWarning {
                message: "configuration is empty; using defaults".to_string(),
                location: Some(origin.display().to_string()),
            });
            AppConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?
        };

        self.finish(config, &origin.display().to_string(), warnings)
    }

    /// Default configuration with environment overrides applied.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment override is malformed or the
    /// result fails validation.
    pub fn load_defaults(&self) -> Result<LoadResult, ConfigError> {
        self.finish(AppConfig::default(), "<defaults>", Vec::new())
    }

    fn finish(
        &self,
        mut config: AppConfig,
        origin: &str,
        mut warnings: Vec<LoadWarning>,
    ) -> Result<LoadResult, ConfigError> {
        if !self.options.ignore_env {
            apply_overrides(&mut config, |name| std::env::var(name).ok())?;
        }

        let result = Validator::new().validate(&config);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: origin.to_string(),
                errors: result.errors,
            });
        }
        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        for warning in &warnings {
            tracing::warn!(
                location = warning.location.as_deref().unwrap_or("-"),
                "{}",
                warning.message
            );
        }

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

// ============================================================================
// Environment overrides
// ============================================================================

/// Applies `BADGEWATCH_*` duration overrides using `lookup` to read
/// variables.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] for a value that is not a
/// human-readable duration.
pub fn apply_overrides(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(tick) = duration_override(TICK_INTERVAL_ENV, &lookup)? {
        config.counter.tick_interval = tick;
    }
    if let Some(delay) = duration_override(ALERT_DELAY_ENV, &lookup)? {
        config.alerts.delay = delay;
    }
    Ok(())
}

fn duration_override(
    name: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    humantime::parse_duration(raw.trim())
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            field: name.to_string(),
            value: raw,
            expected: "a duration such as \"1s\" or \"500ms\"".to_string(),
        })
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
