//! Error types for proof generation and verification.

use biogate_protocol::RejectReason;
use thiserror::Error;

/// Errors raised while building proofs, commitments or attestations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProofError {
    /// No readings were supplied.
    #[error("Cannot generate a proof from zero readings")]
    EmptyInput,

    /// More readings than one proof may carry.
    #[error("Too many readings: {count} (max {max})")]
    TooManyReadings {
        /// Supplied count.
        count: usize,
        /// Allowed count.
        max: usize,
    },

    /// A reading or other wire object failed validation.
    #[error("Protocol error: {0}")]
    Protocol(#[from] biogate_protocol::ProtocolError),

    /// A key or signature could not be decoded.
    #[error("Crypto error: {0}")]
    Crypto(#[from] biogate_crypto::CryptoError),

    /// A committed value is NaN or infinite.
    #[error("Cannot commit to a non-finite value")]
    NonFiniteValue,

    /// Quorum parameters or membership are invalid.
    #[error("Invalid quorum: {0}")]
    InvalidQuorum(String),

    /// Invalid configuration value.
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result type for proof operations.
pub type Result<T> = std::result::Result<T, ProofError>;

/// Why an aggregate proof failed verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofRejection {
    /// Structure is inconsistent with itself.
    #[error("Malformed proof: {0}")]
    Malformed(String),

    /// Newest reading is older than the allowed age.
    #[error("Proof is stale: newest reading {age_ms}ms old")]
    Stale {
        /// Age of the newest reading.
        age_ms: u64,
    },

    /// A timestamp lies too far in the future.
    #[error("Proof timestamp {ahead_ms}ms in the future")]
    FromFuture {
        /// How far ahead.
        ahead_ms: u64,
    },

    /// A per-reading device signature failed.
    #[error("Device proof {index} has an invalid signature")]
    DeviceSignature {
        /// Position in `device_proofs`.
        index: usize,
    },

    /// The aggregate signature or proof hash does not match the payload.
    #[error("Aggregate signature invalid")]
    AggregateSignature,

    /// The freshness signature failed.
    #[error("Freshness signature invalid")]
    FreshnessSignature,

    /// The anti-tamper hash does not match.
    #[error("Anti-tamper hash mismatch")]
    AntiTamper,

    /// The proof nonce was already consumed.
    #[error("Proof nonce already used")]
    ReplayedNonce,
}

impl ProofRejection {
    /// Reason code a counterparty may see.
    pub fn reason(&self) -> RejectReason {
        match self {
            Self::Malformed(_) => RejectReason::MalformedInput,
            Self::Stale { .. } | Self::FromFuture { .. } => RejectReason::Stale,
            Self::DeviceSignature { .. }
            | Self::AggregateSignature
            | Self::FreshnessSignature
            | Self::AntiTamper => RejectReason::SignatureInvalid,
            Self::ReplayedNonce => RejectReason::ReplayedNonce,
        }
    }
}
