//! CLI module for modkit.
//!
//! This module provides the command-line interface for building
//! modules and deploying them to the platform.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, TargetArgs};
pub use output::OutputFormatter;
