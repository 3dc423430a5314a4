// src/miner/algorithm/keccak25.rs
//! Keccak25 (algorithm 25)
//!
//! Twenty-five chained Keccak-256 passes using the original Keccak padding
//! (0x01), each pass hashing the previous 32-byte digest.

use crate::miner::algorithm::Algorithm;
use crate::types::{AlgorithmType, HASH_LEN, INPUT_LEN};
use sha3::{Digest, Keccak256};

const PASSES: usize = 25;

/// Keccak25 minting algorithm
#[derive(Debug, Default)]
pub struct Keccak25Algo;

impl Keccak25Algo {
    /// Creates a Keccak25 hasher
    pub fn new() -> Self {
        Keccak25Algo
    }
}

impl Algorithm for Keccak25Algo {
    fn hash(&mut self, input: &[u8; INPUT_LEN]) -> [u8; HASH_LEN] {
        let mut digest: [u8; HASH_LEN] = Keccak256::digest(input).into();
        for _ in 1..PASSES {
            digest = Keccak256::digest(digest).into();
        }
        digest
    }

    fn fork(&self) -> Box<dyn Algorithm> {
        Box::new(Keccak25Algo)
    }

    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::Keccak25
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn known_vector() {
        let mut input = [0u8; INPUT_LEN];
        for (i, b) in input.iter_mut().enumerate() {
            *b = i as u8;
        }
        assert_eq!(
            Keccak25Algo::new().hash(&input),
            hex!("59d371a32eb5f714b32aad682c7f76b63af45011befe5fc5e9540908d4a26bd8")
        );
    }
}
