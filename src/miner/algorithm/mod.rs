// src/miner/algorithm/mod.rs
//! Minting hash algorithms and the nonce search contract
//!
//! This module contains all supported minting algorithms and their common
//! interface. Currently implements:
//! - SHA-256 and SHA3-256
//! - scrypt (N=1024, r=1, p=1)
//! - Keccak25

/// SHA-256 and SHA3-256
pub mod sha;

/// scrypt
pub mod scrypt_kdf;

/// Keccak25 (chained Keccak-256)
pub mod keccak25;

use crate::miner::target::meets_target;
use crate::types::{AlgorithmType, HASH_LEN, INPUT_LEN};
use crate::utils::error::MinerError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Number of candidate nonces tried per CPU search invocation
pub const CPU_BATCH: u64 = 1 << 20;

/// Common interface for all minting algorithms
///
/// Implementations may keep scratch state between calls, hence `&mut self`.
pub trait Algorithm: Send + Sync {
    /// Digest the 40-byte hash input
    fn hash(&mut self, input: &[u8; INPUT_LEN]) -> [u8; HASH_LEN];

    /// Fresh hasher with the same parameters, for another thread
    fn fork(&self) -> Box<dyn Algorithm>;

    /// Get the algorithm type
    fn algorithm_type(&self) -> AlgorithmType;

    /// Recompute the digest for `nonce` and check it against `target`
    ///
    /// Returns the digest when it meets the target.
    fn verify(
        &mut self,
        input: &[u8; INPUT_LEN],
        nonce: u64,
        target: &[u8; HASH_LEN],
    ) -> Option<[u8; HASH_LEN]> {
        let mut data = *input;
        data[..8].copy_from_slice(&nonce.to_le_bytes());
        let digest = self.hash(&data);
        meets_target(&digest, target).then_some(digest)
    }
}

/// Creates the CPU implementation of an algorithm
pub fn hasher(kind: AlgorithmType) -> Result<Box<dyn Algorithm>, MinerError> {
    Ok(match kind {
        AlgorithmType::Sha256 => Box::new(sha::Sha256Algo::new()),
        AlgorithmType::Sha3 => Box::new(sha::Sha3Algo::new()),
        AlgorithmType::Scrypt => Box::new(scrypt_kdf::ScryptAlgo::new()?),
        AlgorithmType::Keccak25 => Box::new(keccak25::Keccak25Algo::new()),
    })
}

/// How a single search invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// A digest met the target
    Found {
        /// Winning nonce
        nonce: u64,
        /// Its digest
        digest: [u8; HASH_LEN],
    },
    /// The batch was searched without success
    Exhausted,
    /// The cancellation flag was raised
    Cancelled,
}

/// Result of one search invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOutcome {
    /// How the search ended
    pub status: SearchStatus,
    /// Last nonce tried; the next search continues after it
    pub last_nonce: u64,
    /// Number of digests computed
    pub hash_count: u64,
}

/// Bounded nonce search shared by CPU and GPU backends
pub trait HashSearch: Send {
    /// Human-readable backend name (for logs/statistics)
    fn name(&self) -> String;

    /// Search candidates after `start_nonce` until success, the end of the
    /// backend's batch, or `cancel` is observed
    ///
    /// Errors are device failures; the CPU backend never fails.
    fn search(
        &mut self,
        input: &[u8; INPUT_LEN],
        target: &[u8; HASH_LEN],
        start_nonce: u64,
        cancel: &AtomicBool,
    ) -> Result<SearchOutcome, MinerError>;
}

/// Searches `count` nonces after `start_nonce` with one algorithm
///
/// Each candidate pre-increments the nonce, writes it little-endian into the
/// first 8 input bytes and compares the digest with the target. The cancel
/// flag is checked before every hash.
pub fn search_nonces(
    algorithm: &mut dyn Algorithm,
    input: &[u8; INPUT_LEN],
    target: &[u8; HASH_LEN],
    start_nonce: u64,
    count: u64,
    cancel: &AtomicBool,
) -> SearchOutcome {
    let mut data = *input;
    let mut nonce = start_nonce;
    let mut hash_count = 0;

    for _ in 0..count {
        if cancel.load(Ordering::Relaxed) {
            return SearchOutcome {
                status: SearchStatus::Cancelled,
                last_nonce: nonce,
                hash_count,
            };
        }

        nonce = nonce.wrapping_add(1);
        data[..8].copy_from_slice(&nonce.to_le_bytes());
        let digest = algorithm.hash(&data);
        hash_count += 1;

        if meets_target(&digest, target) {
            return SearchOutcome {
                status: SearchStatus::Found { nonce, digest },
                last_nonce: nonce,
                hash_count,
            };
        }
    }

    SearchOutcome {
        status: SearchStatus::Exhausted,
        last_nonce: nonce,
        hash_count,
    }
}

/// CPU backend: one algorithm instance searching fixed-size batches
pub struct CpuSearch {
    algorithm: Box<dyn Algorithm>,
    batch: u64,
}

impl CpuSearch {
    /// Creates a CPU search with the default batch size
    pub fn new(kind: AlgorithmType) -> Result<Self, MinerError> {
        Self::with_batch(kind, CPU_BATCH)
    }

    /// Creates a CPU search with a custom batch size
    pub fn with_batch(kind: AlgorithmType, batch: u64) -> Result<Self, MinerError> {
        Ok(CpuSearch {
            algorithm: hasher(kind)?,
            batch: batch.max(1),
        })
    }
}

impl HashSearch for CpuSearch {
    fn name(&self) -> String {
        format!("cpu-{}", self.algorithm.algorithm_type())
    }

    fn search(
        &mut self,
        input: &[u8; INPUT_LEN],
        target: &[u8; HASH_LEN],
        start_nonce: u64,
        cancel: &AtomicBool,
    ) -> Result<SearchOutcome, MinerError> {
        Ok(search_nonces(
            self.algorithm.as_mut(),
            input,
            target,
            start_nonce,
            self.batch,
            cancel,
        ))
    }
}
