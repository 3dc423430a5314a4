// src/network/mod.rs
//! Network communication components
//!
//! This module handles all interaction with the ledger node:
//! - `Ledger`: the blocking interface the mining core depends on
//! - `NodeClient`: its HTTP implementation
//! - account key derivation from the secret phrase

/// Account keys and the secret phrase wrapper
pub mod account;

/// Ledger interface and the records it exchanges
pub mod ledger;

/// Ledger node HTTP client
///
/// Issues form-encoded API requests and decodes the JSON responses.
pub mod node;

// Re-export main components for cleaner imports
pub use account::{AccountKeys, SecretPhrase};
pub use ledger::Ledger;
pub use node::{NodeClient, NodeConfig};
