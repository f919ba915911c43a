//! Per-peer suspicious activity log.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Kinds of suspicious activity and their fixed severities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspiciousKind {
    /// Structurally invalid message.
    InvalidMessage,
    /// Signature did not verify.
    SignatureInvalid,
    /// Nonce reuse.
    ReplayedNonce,
    /// Timestamp outside the freshness window.
    StaleMessage,
    /// Exceeded the request budget.
    RateLimited,
    /// Confirmed equivocation or forged signature.
    ByzantineBehavior,
    /// Anomaly detector asked for investigation.
    AnomalyInvestigate,
}

impl SuspiciousKind {
    /// Severity added to the burst sum.
    pub fn severity(&self) -> u32 {
        match self {
            Self::InvalidMessage => 10,
            Self::SignatureInvalid => 10,
            Self::ReplayedNonce => 15,
            Self::StaleMessage => 3,
            Self::RateLimited => 2,
            Self::ByzantineBehavior => 50,
            Self::AnomalyInvestigate => 5,
        }
    }

    /// Whether this kind counts as an invalid message for scoring.
    pub fn is_invalid_message(&self) -> bool {
        matches!(
            self,
            Self::InvalidMessage | Self::SignatureInvalid | Self::ReplayedNonce
        )
    }
}

/// One logged event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspiciousEntry {
    /// When it happened.
    pub timestamp_ms: u64,
    /// What happened.
    pub kind: SuspiciousKind,
    /// Severity at logging time.
    pub severity: u32,
}

/// Count and summed severity of entries in a window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BurstSummary {
    /// Entries in the window.
    pub entries: usize,
    /// Summed severity.
    pub severity: u32,
}

/// Ordered, bounded log of suspicious entries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuspiciousLog {
    entries: VecDeque<SuspiciousEntry>,
    capacity: usize,
}

impl SuspiciousLog {
    /// Create a log keeping at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(128)),
            capacity,
        }
    }

    /// Append an entry, dropping the oldest beyond capacity.
    pub fn push(&mut self, kind: SuspiciousKind, timestamp_ms: u64) -> SuspiciousEntry {
        let entry = SuspiciousEntry {
            timestamp_ms,
            kind,
            severity: kind.severity(),
        };
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        entry
    }

    /// Entries no older than `window_ms` before `now_ms`. Callers supply
    /// timestamps, so the log is not assumed to be in time order.
    pub fn burst(&self, now_ms: u64, window_ms: u64) -> BurstSummary {
        let cutoff = now_ms.saturating_sub(window_ms);
        self.entries
            .iter()
            .filter(|e| e.timestamp_ms >= cutoff)
            .fold(BurstSummary::default(), |acc, e| BurstSummary {
                entries: acc.entries + 1,
                severity: acc.severity.saturating_add(e.severity),
            })
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &SuspiciousEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
