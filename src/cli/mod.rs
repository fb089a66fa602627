//! Command-line interface
//!
//! Argument definitions and command handlers for the `badgewatch` binary.

pub mod args;
pub mod commands;
