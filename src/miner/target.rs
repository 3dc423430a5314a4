// src/miner/target.rs
//! Minting target and solution records
//!
//! A [`MintingTarget`] is fetched by the controller, stamped with the local
//! counter and shared read-only with every worker. A [`Solution`] travels
//! by value from a worker back to the controller.

use crate::types::{HASH_LEN, INPUT_LEN};
use primitive_types::U256;
use std::cmp::Ordering;
use std::fmt;

/// Target a digest must not exceed, issued per currency by the ledger
#[derive(Debug, Clone)]
pub struct MintingTarget {
    currency_id: u64,
    difficulty: U256,
    target: [u8; HASH_LEN],
    counter: u64,
}

impl MintingTarget {
    /// Creates a target from the fields of a `getMintingTarget` response
    pub fn new(currency_id: u64, difficulty: U256, target: [u8; HASH_LEN], counter: u64) -> Self {
        MintingTarget {
            currency_id,
            difficulty,
            target,
            counter,
        }
    }

    /// Currency identifier
    pub fn currency_id(&self) -> u64 {
        self.currency_id
    }

    /// Informational difficulty; never used when comparing digests
    pub fn difficulty(&self) -> U256 {
        self.difficulty
    }

    /// 32-byte target in big-endian magnitude order
    pub fn target(&self) -> &[u8; HASH_LEN] {
        &self.target
    }

    /// Minting counter this target is solved for
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Overwrites the counter with the controller's local sequence number
    pub fn set_counter(&mut self, counter: u64) {
        self.counter = counter;
    }

    /// Builds the hash input for this target
    ///
    /// Layout (little-endian u64 each): nonce, currency, units, counter,
    /// account. The nonce slot is left zero; searches overwrite it.
    pub fn hash_input(&self, units: u64, account_id: u64) -> [u8; INPUT_LEN] {
        let mut input = [0u8; INPUT_LEN];
        input[8..16].copy_from_slice(&self.currency_id.to_le_bytes());
        input[16..24].copy_from_slice(&units.to_le_bytes());
        input[24..32].copy_from_slice(&self.counter.to_le_bytes());
        input[32..40].copy_from_slice(&account_id.to_le_bytes());
        input
    }
}

/// Targets are the same target when they mint the same currency
impl PartialEq for MintingTarget {
    fn eq(&self, other: &Self) -> bool {
        self.currency_id == other.currency_id
    }
}

impl Eq for MintingTarget {}

impl fmt::Display for MintingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "currency {} counter {} difficulty {} target {}",
            self.currency_id,
            self.counter,
            self.difficulty,
            hex::encode(self.target)
        )
    }
}

/// A nonce whose digest meets the target for one counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    nonce: u64,
    counter: u64,
    digest: [u8; HASH_LEN],
    worker_id: usize,
    tx_id: Option<u64>,
}

impl Solution {
    /// Creates a solution produced by `worker_id`
    pub fn new(nonce: u64, counter: u64, digest: [u8; HASH_LEN], worker_id: usize) -> Self {
        Solution {
            nonce,
            counter,
            digest,
            worker_id,
            tx_id: None,
        }
    }

    /// Winning nonce
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Counter of the target this solution was found for
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Digest of the winning input
    pub fn digest(&self) -> &[u8; HASH_LEN] {
        &self.digest
    }

    /// Worker that found the solution
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Transaction identifier, once broadcast
    pub fn tx_id(&self) -> Option<u64> {
        self.tx_id
    }

    /// Records the broadcast transaction; only the first assignment sticks
    pub fn set_tx_id(&mut self, tx_id: u64) {
        if self.tx_id.is_none() {
            self.tx_id = Some(tx_id);
        }
    }
}

/// Compares a digest against a target as big-endian magnitudes
///
/// Bytes are compared from index 0 (most significant) and the comparison
/// stops at the first differing byte. Returns true when `digest <= target`.
pub fn meets_target(digest: &[u8; HASH_LEN], target: &[u8; HASH_LEN]) -> bool {
    for (d, t) in digest.iter().zip(target.iter()) {
        match d.cmp(t) {
            Ordering::Less => return true,
            Ordering::Greater => return false,
            Ordering::Equal => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn equal_digest_meets_target() {
        let t = [0x42u8; 32];
        assert!(meets_target(&t, &t));
    }

    #[test]
    fn most_significant_byte_decides() {
        let target = hex!("00ff000000000000000000000000000000000000000000000000000000000000");
        let below = hex!("00fe ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff");
        let above = hex!("0100 000000000000000000000000000000000000000000000000000000000000");
        assert!(meets_target(&below, &target));
        assert!(!meets_target(&above, &target));
    }

    #[test]
    fn later_bytes_break_ties() {
        let target = hex!("00000000000000000000000000000000000000000000000000000000000000f0");
        let mut digest = [0u8; 32];
        digest[31] = 0xf1;
        assert!(!meets_target(&digest, &target));
        digest[31] = 0xef;
        assert!(meets_target(&digest, &target));
    }

    #[test]
    fn zero_and_max_targets() {
        let digest = [0x01u8; 32];
        assert!(meets_target(&digest, &[0xff; 32]));
        assert!(!meets_target(&digest, &[0x00; 32]));
        assert!(meets_target(&[0u8; 32], &[0u8; 32]));
    }

    #[test]
    fn hash_input_layout_is_little_endian() {
        let target = MintingTarget::new(0x0102030405060708, U256::from(7u64), [0xff; 32], 9);
        let input = target.hash_input(1000, 0xaabb);
        assert_eq!(&input[0..8], &[0u8; 8]);
        assert_eq!(&input[8..16], &0x0102030405060708u64.to_le_bytes());
        assert_eq!(&input[16..24], &1000u64.to_le_bytes());
        assert_eq!(&input[24..32], &9u64.to_le_bytes());
        assert_eq!(&input[32..40], &0xaabbu64.to_le_bytes());
    }

    #[test]
    fn targets_compare_by_currency() {
        let a = MintingTarget::new(5, U256::from(1u64), [0x00; 32], 1);
        let b = MintingTarget::new(5, U256::from(9u64), [0xff; 32], 2);
        let c = MintingTarget::new(6, U256::from(1u64), [0x00; 32], 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn tx_id_is_assigned_once() {
        let mut s = Solution::new(42, 5, [0u8; 32], 0);
        assert_eq!(s.tx_id(), None);
        s.set_tx_id(100);
        s.set_tx_id(200);
        assert_eq!(s.tx_id(), Some(100));
    }
}
