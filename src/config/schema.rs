//! Configuration schema
//!
//! Typed mirror of the YAML configuration file. Every section and field has
//! a default, so an empty document is a valid configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::authorization::AuthorizationMode;
use crate::keepalive::KeepaliveAuthorization;
use crate::lifecycle::Settings;

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Application identity
    pub app: AppSection,
    /// Counter behavior
    pub counter: CounterSection,
    /// Alert content
    pub alerts: AlertsSection,
    /// Initial user settings
    pub settings: Settings,
    /// Authorization behavior
    pub authorization: AuthorizationSection,
    /// Simulated host used by `badgewatch run`
    pub simulation: SimulationSection,
}

/// `app:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppSection {
    /// Name shown in explanatory messages
    pub name: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "Badgewatch".to_owned(),
        }
    }
}

/// `counter:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CounterSection {
    /// Interval between ticks, e.g. `"1s"`
    #[serde(with = "duration_text")]
    pub tick_interval: Duration,
}

impl Default for CounterSection {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// `alerts:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertsSection {
    /// Alert title
    pub title: String,
    /// Delivery delay, e.g. `"1s"`
    #[serde(with = "duration_text")]
    pub delay: Duration,
    /// Optional image attached to every alert
    pub attachment: Option<PathBuf>,
}

impl Default for AlertsSection {
    fn default() -> Self {
        Self {
            title: "I am in the background...".to_owned(),
            delay: Duration::from_secs(1),
            attachment: None,
        }
    }
}

/// `authorization:` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorizationSection {
    /// `resolved` (wait for the answer) or `provisional`
    pub mode: AuthorizationMode,
}

/// Fixed answer of the simulated authorization oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleAnswer {
    /// Always grant.
    #[default]
    Grant,
    /// Always deny.
    Deny,
}

/// `simulation:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSection {
    /// What the oracle answers
    pub oracle: OracleAnswer,
    /// How long the oracle takes to answer
    #[serde(with = "duration_text")]
    pub oracle_latency: Duration,
    /// Whether the keepalive service is switched on
    pub keepalive_enabled: bool,
    /// Authorization the keepalive service reports
    pub keepalive_authorization: KeepaliveAuthorization,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            oracle: OracleAnswer::Grant,
            oracle_latency: Duration::ZERO,
            keepalive_enabled: true,
            keepalive_authorization: KeepaliveAuthorization::Undetermined,
        }
    }
}

/// Serde adapter for human-readable durations (`"1s"`, `"250ms"`).
mod duration_text {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
