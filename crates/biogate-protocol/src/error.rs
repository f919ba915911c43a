//! Error types and the rejection taxonomy shared across crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or validating wire objects.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Cryptographic decoding failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] biogate_crypto::CryptoError),

    /// A field failed boundary validation.
    #[error("Malformed {field}: {reason}")]
    Malformed {
        /// Offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Nonce string is not 64 hex characters.
    #[error("Malformed nonce: {0}")]
    MalformedNonce(String),

    /// Timestamp is older than the freshness window.
    #[error("Stale timestamp: {age_ms}ms old (max {max_age_ms}ms)")]
    Stale {
        /// Age of the timestamp.
        age_ms: u64,
        /// Allowed age.
        max_age_ms: u64,
    },

    /// Timestamp is further in the future than clock skew allows.
    #[error("Timestamp {ahead_ms}ms in the future (max skew {max_skew_ms}ms)")]
    FromFuture {
        /// How far ahead.
        ahead_ms: u64,
        /// Allowed skew.
        max_skew_ms: u64,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ProtocolError {
    /// Shorthand for a `Malformed` error.
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            field,
            reason: reason.into(),
        }
    }

    /// Map to the externally visible reason code.
    pub fn reject_reason(&self) -> RejectReason {
        match self {
            Self::Stale { .. } | Self::FromFuture { .. } => RejectReason::Stale,
            _ => RejectReason::MalformedInput,
        }
    }
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Why an inbound message or proof was turned away.
///
/// This is all a counterparty ever learns. Internal severities and scoring
/// formulas stay local.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Wrong shape or length. Never retried.
    MalformedInput,
    /// Outside the freshness window. Resubmit with fresh data.
    Stale,
    /// Nonce seen before. Permanent for that nonce.
    ReplayedNonce,
    /// A signature did not verify.
    SignatureInvalid,
    /// Sender exceeded its request budget.
    RateLimited,
    /// Sender is blacklisted. Terminal.
    ReputationExhausted,
}

impl RejectReason {
    /// Stable reason code for the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedInput => "E_MALFORMED",
            Self::Stale => "E_STALE",
            Self::ReplayedNonce => "E_REPLAY",
            Self::SignatureInvalid => "E_SIGNATURE",
            Self::RateLimited => "E_RATE_LIMITED",
            Self::ReputationExhausted => "E_EXCLUDED",
        }
    }

    /// Whether the sender may try again with new data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Stale | Self::RateLimited)
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
