//! Lifecycle state machine
//!
//! [`LifecycleController`] holds the phase and settings and drives the
//! counter, alert, keepalive, and authorization components.
//! [`LifecycleRuntime`] runs it on one task fed by a [`LifecycleHandle`].

pub mod controller;
pub mod runtime;
pub mod state;

pub use controller::{Collaborators, ControllerOptions, LifecycleController};
pub use runtime::{LifecycleHandle, LifecycleRuntime};
pub use state::{
    LifecycleEvent, LifecycleSnapshot, Phase, PhaseEvent, PhaseTransition, Settings,
};
