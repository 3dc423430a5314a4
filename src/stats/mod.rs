//! Statistics collection and reporting module
//!
//! This module provides functionality for tracking and reporting minting statistics,
//! including:
//! - Hashrate calculations, overall and per worker
//! - Accepted/submitted/rejected solution tracking
//! - Hardware monitoring (CPU, memory, temperature)
//!
//! The main component is [`StatsReporter`] which collects data and can periodically
//! report statistics to the log.
//!

/// Submodule containing the statistics reporter implementation
///
/// The reporter handles:
/// - Atomic collection of minting statistics
/// - Hardware monitoring
/// - Periodic reporting of stats
/// - Thread-safe communication channels for receiving data
pub mod reporter;

// Re-export main components
pub use reporter::{HardwareStats, MintingStats, StatsReporter, format_rate};
