// src/network/account.rs
//! Account keys derived from the secret phrase
//!
//! The public key is the Curve25519 base-point multiple of
//! `SHA-256(secret phrase)`; the account identifier is the first eight bytes
//! of `SHA-256(public key)` read little-endian.

use crate::utils::error::MinerError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use x25519_dalek::{X25519_BASEPOINT_BYTES, x25519};

/// Account secret phrase; never printed
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretPhrase(String);

impl SecretPhrase {
    /// Wraps a secret phrase
    pub fn new(phrase: impl Into<String>) -> Self {
        SecretPhrase(phrase.into())
    }

    /// Raw phrase, for signing requests only
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the phrase is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretPhrase(<redacted>)")
    }
}

/// Public key and identifier of the minting account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountKeys {
    /// Curve25519 public key
    pub public_key: [u8; 32],
    /// Numeric account identifier
    pub account_id: u64,
}

impl AccountKeys {
    /// Derives the keys for `secret`
    pub fn from_secret(secret: &SecretPhrase) -> Result<Self, MinerError> {
        if secret.is_empty() {
            return Err(MinerError::ConfigError("Secret phrase is empty".to_string()));
        }
        let private: [u8; 32] = Sha256::digest(secret.expose().as_bytes()).into();
        let public_key = x25519(private, X25519_BASEPOINT_BYTES);
        Ok(AccountKeys {
            public_key,
            account_id: account_id(&public_key),
        })
    }
}

/// Account identifier for a public key
pub fn account_id(public_key: &[u8; 32]) -> u64 {
    let hash = Sha256::digest(public_key);
    let mut id = [0u8; 8];
    id.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(id)
}
