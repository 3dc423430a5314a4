//! Monetary System minter - proof-of-work currency minting in Rust
//!
//! This crate mints units of a mintable ledger currency by searching for
//! nonces whose digest meets the currency's target, with support for:
//! - The SHA-256, SHA3-256, scrypt and Keccak25 minting algorithms
//! - CPU worker threads and GPU batch search
//! - Submission gated on new blocks and unconfirmed transactions
//! - Performance benchmarking
//! - Hardware monitoring

#![warn(missing_docs)]
#![deny(unsafe_code)]

/// Minting core: algorithms, workers and the controller
pub mod miner;

/// Ledger node communication and account keys
pub mod network;

/// Statistics collection and reporting functionality
pub mod stats;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use miner::{Algorithm, HashSearch, MintController, MintEvent, MintParams, MintingTarget, Solution};
pub use network::{Ledger, NodeClient};
pub use stats::{HardwareStats, MintingStats, StatsReporter};
pub use types::AlgorithmType;
pub use utils::{MinerError, init_logging};
