// src/utils/mod.rs
//! Utilities module for common functionality
//!
//! Error handling, logging and decimal amount conversion shared by the rest
//! of the crate.

/// Error types and handling utilities
///
/// Contains the [`MinerError`] enum which defines all possible error conditions
/// for the minter, along with conversion implementations.
pub mod error;

/// Logging configuration and utilities
pub mod logging;

/// Decimal amount parsing and formatting
pub mod amount;

// Re-export for easier access
pub use error::MinerError;
pub use logging::init_logging;
