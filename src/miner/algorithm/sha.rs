// src/miner/algorithm/sha.rs
//! SHA-256 (algorithm 2) and SHA3-256 (algorithm 3)

use crate::miner::algorithm::Algorithm;
use crate::types::{AlgorithmType, HASH_LEN, INPUT_LEN};
use sha2::Sha256;
use sha3::{Digest, Sha3_256};

/// SHA-256 minting algorithm
#[derive(Debug, Default)]
pub struct Sha256Algo;

impl Sha256Algo {
    /// Creates a SHA-256 hasher
    pub fn new() -> Self {
        Sha256Algo
    }
}

impl Algorithm for Sha256Algo {
    fn hash(&mut self, input: &[u8; INPUT_LEN]) -> [u8; HASH_LEN] {
        Sha256::digest(input).into()
    }

    fn fork(&self) -> Box<dyn Algorithm> {
        Box::new(Sha256Algo)
    }

    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::Sha256
    }
}

/// SHA3-256 minting algorithm
#[derive(Debug, Default)]
pub struct Sha3Algo;

impl Sha3Algo {
    /// Creates a SHA3-256 hasher
    pub fn new() -> Self {
        Sha3Algo
    }
}

impl Algorithm for Sha3Algo {
    fn hash(&mut self, input: &[u8; INPUT_LEN]) -> [u8; HASH_LEN] {
        Sha3_256::digest(input).into()
    }

    fn fork(&self) -> Box<dyn Algorithm> {
        Box::new(Sha3Algo)
    }

    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::Sha3
    }
}
