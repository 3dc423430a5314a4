// src/types.rs
use crate::utils::error::MinerError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of the hash input: nonce, currency, units, counter and account
pub const INPUT_LEN: usize = 40;

/// Length of a digest and of a minting target
pub const HASH_LEN: usize = 32;

/// Minting hash algorithms defined by the currency
///
/// The discriminant is the numeric algorithm identifier the ledger reports
/// in the currency definition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmType {
    /// SHA-256
    #[clap(name = "sha256")]
    Sha256 = 2,

    /// SHA3-256 (FIPS 202 padding)
    #[clap(name = "sha3")]
    Sha3 = 3,

    /// scrypt with N=1024, r=1, p=1
    ///
    /// Memory-hard; expect a hash rate several orders of magnitude below
    /// the SHA family.
    #[clap(name = "scrypt")]
    Scrypt = 5,

    /// Twenty-five chained Keccak-256 passes
    #[clap(name = "keccak25")]
    Keccak25 = 25,
}

impl AlgorithmType {
    /// Numeric identifier used by the ledger
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Whether a GPU kernel exists for this algorithm
    pub fn gpu_supported(self) -> bool {
        matches!(self, AlgorithmType::Sha256 | AlgorithmType::Sha3)
    }
}

impl TryFrom<u32> for AlgorithmType {
    type Error = MinerError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        match id {
            2 => Ok(AlgorithmType::Sha256),
            3 => Ok(AlgorithmType::Sha3),
            5 => Ok(AlgorithmType::Scrypt),
            25 => Ok(AlgorithmType::Keccak25),
            other => Err(MinerError::UnsupportedAlgorithm(other)),
        }
    }
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmType::Sha256 => write!(f, "sha256"),
            AlgorithmType::Sha3 => write!(f, "sha3"),
            AlgorithmType::Scrypt => write!(f, "scrypt"),
            AlgorithmType::Keccak25 => write!(f, "keccak25"),
        }
    }
}

impl FromStr for AlgorithmType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" | "2" => Ok(AlgorithmType::Sha256),
            "sha3" | "sha3-256" | "3" => Ok(AlgorithmType::Sha3),
            "scrypt" | "5" => Ok(AlgorithmType::Scrypt),
            "keccak25" | "25" => Ok(AlgorithmType::Keccak25),
            _ => Err(format!("Unknown algorithm: {}", s)),
        }
    }
}
