//! Simulated host
//!
//! In-process stand-ins for the platform collaborators, used by
//! `badgewatch run` to drive the lifecycle from a terminal.

pub mod simulated;

pub use simulated::{ConsoleDisplay, SimulatedAlertCenter, SimulatedKeepalive, SimulatedOracle};

use std::sync::Arc;

use crate::config::{AppConfig, OracleAnswer};
use crate::lifecycle::Collaborators;

/// Simulated collaborators built from one configuration.
#[derive(Clone)]
pub struct SimulatedHost {
    /// Console output surface
    pub display: Arc<ConsoleDisplay>,
    /// Alert center that delivers after the requested delay
    pub alerts: Arc<SimulatedAlertCenter>,
    /// Keepalive service
    pub keepalive: Arc<SimulatedKeepalive>,
    /// Authorization oracle
    pub oracle: Arc<SimulatedOracle>,
}

impl SimulatedHost {
    /// Builds the host described by `config.simulation`, printing to stdout.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_display(config, Arc::new(ConsoleDisplay::stdout()))
    }

    /// Builds the host with a custom display.
    #[must_use]
    pub fn with_display(config: &AppConfig, display: Arc<ConsoleDisplay>) -> Self {
        let sim = &config.simulation;
        Self {
            alerts: Arc::new(SimulatedAlertCenter::new(Arc::clone(&display))),
            display,
            keepalive: Arc::new(SimulatedKeepalive::new(
                sim.keepalive_enabled,
                sim.keepalive_authorization,
            )),
            oracle: Arc::new(SimulatedOracle::new(
                sim.oracle == OracleAnswer::Grant,
                sim.oracle_latency,
            )),
        }
    }

    /// Collaborator set for the lifecycle controller.
    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            display: self.display.clone(),
            oracle: self.oracle.clone(),
            keepalive: self.keepalive.clone(),
            alerts: self.alerts.clone(),
        }
    }
}
