// src/miner/algorithm/scrypt_kdf.rs
//! scrypt (algorithm 5)
//!
//! N=1024, r=1, p=1 with a 32-byte output; the hash input is both the
//! password and the salt.

use crate::miner::algorithm::Algorithm;
use crate::types::{AlgorithmType, HASH_LEN, INPUT_LEN};
use crate::utils::error::MinerError;
use scrypt::{Params, scrypt};

const LOG_N: u8 = 10;

/// scrypt minting algorithm
#[derive(Clone)]
pub struct ScryptAlgo {
    params: Params,
}

impl ScryptAlgo {
    /// Creates an scrypt hasher
    pub fn new() -> Result<Self, MinerError> {
        let params = Params::new(LOG_N, 1, 1, HASH_LEN)
            .map_err(|e| MinerError::ConfigError(format!("Invalid scrypt parameters: {}", e)))?;
        Ok(ScryptAlgo { params })
    }
}

impl Algorithm for ScryptAlgo {
    fn hash(&mut self, input: &[u8; INPUT_LEN]) -> [u8; HASH_LEN] {
        let mut digest = [0u8; HASH_LEN];
        // only an empty or oversized output is rejected
        if scrypt(input, input, &self.params, &mut digest).is_err() {
            return [u8::MAX; HASH_LEN];
        }
        digest
    }

    fn fork(&self) -> Box<dyn Algorithm> {
        Box::new(self.clone())
    }

    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::Scrypt
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
            ScryptAlgo::new().unwrap().hash(&input),
            hex!("d02173ee5d9345f4c5a692af5071ab4891269959082d2bd00477b2bdf57f94ad")
        );
    }
}
