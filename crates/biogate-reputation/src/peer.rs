//! Peer identity and lifecycle state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport-level peer identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Why a peer was blacklisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Score fell below the blacklist threshold.
    ScoreExhausted,
    /// Too much suspicious activity in a short window.
    SuspiciousBurst,
    /// Anomaly detector returned an exclude verdict.
    AnomalyExclude,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ScoreExhausted => "score_exhausted",
            Self::SuspiciousBurst => "suspicious_burst",
            Self::AnomalyExclude => "anomaly_exclude",
        };
        f.write_str(s)
    }
}

/// Why a peer was quarantined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineCause {
    /// Score fell below the quarantine threshold.
    LowScore,
    /// Anomaly detector returned a quarantine verdict.
    Anomaly,
}

/// Lifecycle state of a known peer. Unknown peers have no state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PeerState {
    /// Participating normally.
    Active,
    /// Messages are scored but the peer is not eligible.
    Quarantined {
        /// Earliest release time.
        until_ms: u64,
        /// What triggered it.
        cause: QuarantineCause,
    },
    /// Terminal. No automatic rehabilitation.
    Blacklisted {
        /// When it happened.
        since_ms: u64,
        /// What triggered it.
        reason: ExclusionReason,
    },
}

impl PeerState {
    /// Whether the peer is blacklisted.
    #[must_use]
    pub fn is_blacklisted(&self) -> bool {
        matches!(self, Self::Blacklisted { .. })
    }

    /// Whether the peer is quarantined.
    #[must_use]
    pub fn is_quarantined(&self) -> bool {
        matches!(self, Self::Quarantined { .. })
    }

    /// Whether the peer is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}
