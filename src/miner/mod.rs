// src/miner/mod.rs
//! Core minting functionality
//!
//! This module contains all components related to the minting process:
//! - Algorithm implementations and the CPU nonce search
//! - GPU batch search
//! - Worker thread management
//! - The controller that dispatches targets and submits solutions

/// Minting hash algorithms
///
/// Contains the supported algorithms (SHA-256, SHA3-256, scrypt, Keccak25)
/// and the bounded CPU search shared by all of them.
pub mod algorithm;

/// GPU batch search over compute devices
pub mod gpu;

/// Target dispatch, solution collection and submission
pub mod controller;

/// Startup resolution of the minting parameters
pub mod setup;

/// Shutdown signalling and bounded thread joins
pub mod shutdown;

/// Minting target and solution records
pub mod target;

/// Worker thread implementation
///
/// Contains the worker loop that performs the actual hash computations.
/// Workers receive targets from the controller and publish solutions.
pub mod worker;

// Re-export main components for cleaner imports
pub use self::algorithm::{Algorithm, CpuSearch, HashSearch};
pub use self::controller::{ControllerOptions, MintController, MintEvent, MintState, SubmitOutcome};
pub use self::setup::MintParams;
pub use self::shutdown::Shutdown;
pub use self::target::{MintingTarget, Solution};
pub use self::worker::{WorkerKind, WorkerSnapshot, WorkerState};
