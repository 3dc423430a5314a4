// src/config/mod.rs
//! Configuration management for the minter
//!
//! This module handles all configuration-related functionality including:
//! - Loading and parsing configuration files
//! - Validating settings that do not need the ledger
//! - Generating configuration templates
//!
//! The configuration uses TOML format.

/// Core configuration implementation
///
/// Contains the [`Config`] struct and related types that define
/// the minter's configuration structure and behavior.
pub mod config;

// Re-export key items for easy access
pub use config::{Config, GpuDeviceConfig, TuningConfig};

use crate::utils::error::MinerError;
use std::path::PathBuf;

/// Loads minter configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the configuration file (anything convertible to PathBuf)
///
/// # Returns
/// * `Ok(Config)` - Successfully loaded configuration
/// * `Err(MinerError)` - If the file couldn't be read or parsed
pub fn load(path: impl Into<PathBuf>) -> Result<Config, MinerError> {
    Config::load(path)
}

/// Generates a commented configuration template
///
/// # Arguments
/// * `gpu` - Whether to include a GPU device section
///
/// # Returns
/// String containing a ready-to-use TOML configuration template
pub fn generate_template(gpu: bool) -> String {
    Config::generate_template(gpu)
}
