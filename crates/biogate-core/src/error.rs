//! Error types for the integrity service.

use biogate_protocol::RejectReason;
use thiserror::Error;

/// Errors that can occur in high-level integrity operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration file could not be parsed.
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Wire encoding or decoding failed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A message was turned away.
    #[error("Rejected: {0}")]
    Rejected(RejectReason),

    /// No public key is registered for the peer.
    #[error("No public key for peer {0}")]
    UnknownSigner(String),

    /// Cryptographic error.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] biogate_crypto::CryptoError),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] biogate_protocol::ProtocolError),

    /// Proof error.
    #[error("Proof error: {0}")]
    Proof(#[from] biogate_proof::ProofError),

    /// Anomaly detector error.
    #[error("Anomaly error: {0}")]
    Anomaly(#[from] biogate_anomaly::AnomalyError),

    /// Reputation error.
    #[error("Reputation error: {0}")]
    Reputation(#[from] biogate_reputation::ReputationError),
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

/// Result type for integrity operations.
pub type Result<T> = std::result::Result<T, CoreError>;
