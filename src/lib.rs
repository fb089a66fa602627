//! `badgewatch` - keeps a badge counter running while the host is suspended
//!
//! A lifecycle-driven state machine: phase transitions start and stop a
//! periodic counter, an authorization gate guards counting and alerting, and
//! at most one one-shot alert is ever outstanding. Every platform
//! collaborator is a trait, with simulated implementations in [`host`].

pub mod alerts;
pub mod authorization;
pub mod cli;
pub mod config;
pub mod counter;
pub mod display;
pub mod error;
pub mod host;
pub mod keepalive;
pub mod lifecycle;
pub mod observability;
