// src/utils/error.rs
use serde_json;
use std::io;
use thiserror::Error;
use url;

/// Main error type for the minting application
///
/// Variants fall into the classes the controller acts on:
/// - transient: transport failures, retried on the next cycle
/// - rejection: the ledger refused the request, the solution is discarded
/// - fatal: everything else, including configuration errors
#[derive(Error, Debug)]
pub enum MinerError {
    /// The currency uses a hash algorithm this miner cannot compute
    #[error("Currency algorithm {0} is not supported")]
    UnsupportedAlgorithm(u32),

    /// Errors related to network connectivity
    #[error("Network connection error: {0}")]
    ConnectionError(String),

    /// Malformed or unexpected responses from the ledger
    #[error("Protocol violation: {0}")]
    ProtocolError(String),

    /// The ledger answered with a structured error
    #[error("Error {code} returned for {request} request: {description}")]
    Rejected {
        /// Request type that failed
        request: String,
        /// Ledger error code
        code: i64,
        /// Ledger error description
        description: String,
    },

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Configuration file or parameter errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Thread communication channel errors
    #[error("Thread communication error: {0}")]
    ChannelError(String),

    /// Invalid user input or parameter errors
    #[error("Invalid input: {0}")]
    InputError(String),

    /// GPU device or kernel errors
    #[error("GPU error: {0}")]
    GpuError(String),

    /// Thread spawn or join failures
    #[error("Task execution error: {0}")]
    TaskError(String),
}

impl MinerError {
    /// Transport-level failures that may succeed when retried
    pub fn is_transient(&self) -> bool {
        match self {
            MinerError::ConnectionError(_) | MinerError::IoError(_) => true,
            MinerError::HttpError(e) => e.is_connect() || e.is_timeout() || e.is_request() || e.is_body(),
            _ => false,
        }
    }

    /// Structured refusals from the ledger
    pub fn is_rejection(&self) -> bool {
        matches!(self, MinerError::Rejected { .. })
    }

    /// Errors that stop minting
    pub fn is_fatal(&self) -> bool {
        !self.is_transient() && !self.is_rejection()
    }
}

/// Converts hex decoding errors into MinerError
///
/// Target bytes and transaction bytes arrive hex encoded; a decoding failure
/// means the ledger response is malformed.
impl From<hex::FromHexError> for MinerError {
    fn from(e: hex::FromHexError) -> Self {
        MinerError::ProtocolError(format!("Hex conversion failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        let transient = MinerError::ConnectionError("refused".into());
        assert!(transient.is_transient());
        assert!(!transient.is_fatal());

        let rejected = MinerError::Rejected {
            request: "broadcastTransaction".into(),
            code: 4,
            description: "Incorrect counter".into(),
        };
        assert!(rejected.is_rejection());
        assert!(!rejected.is_fatal());

        let malformed = MinerError::ProtocolError("missing targetBytes".into());
        assert!(malformed.is_fatal());

        let not_json = MinerError::from(serde_json::from_str::<serde_json::Value>("<html>").unwrap_err());
        assert!(not_json.is_fatal());
    }

    #[test]
    fn rejection_message_names_request() {
        let rejected = MinerError::Rejected {
            request: "currencyMint".into(),
            code: 8,
            description: "Not enough funds".into(),
        };
        assert_eq!(
            rejected.to_string(),
            "Error 8 returned for currencyMint request: Not enough funds"
        );
    }
}
