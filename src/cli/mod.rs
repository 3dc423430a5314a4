//! Command-line interface
//!
//! Defines the `start`, `benchmark` and `config` subcommands.

/// Clap command definitions
pub mod commands;

pub use commands::{Action, BenchmarkOptions, Commands, ConfigOptions, StartOptions};
