//! Error types for reputation operations.

use thiserror::Error;

use crate::peer::PeerId;

/// Errors that can occur during reputation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReputationError {
    /// Peer is not tracked.
    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// Peer is blacklisted.
    #[error("Peer blacklisted: {0}")]
    Blacklisted(PeerId),

    /// Peer is quarantined and not eligible.
    #[error("Peer quarantined until {until_ms}: {peer}")]
    Quarantined {
        /// Who.
        peer: PeerId,
        /// Earliest release.
        until_ms: u64,
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

/// Result type for reputation operations.
pub type Result<T> = std::result::Result<T, ReputationError>;
