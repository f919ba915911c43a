//! Per-peer reputation record.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::peer::{PeerId, PeerState};
use crate::score::ReputationScore;

/// Message and behavior counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCounters {
    /// Valid messages received.
    pub valid_messages: u64,
    /// Invalid messages received.
    pub invalid_messages: u64,
    /// Confirmed Byzantine events.
    pub byzantine_events: u64,
    /// Consensus rounds participated in.
    pub consensus_participation: u64,
}

/// Fixed-size ring buffer of response latencies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyWindow {
    samples: VecDeque<u64>,
    capacity: usize,
}

impl LatencyWindow {
    /// Keep the last `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a sample in milliseconds.
    pub fn push(&mut self, latency_ms: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);
    }

    /// Mean latency, if any samples exist.
    pub fn mean_ms(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().sum();
        Some(sum as f64 / self.samples.len() as f64)
    }

    /// 95th percentile by nearest rank.
    pub fn p95_ms(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let rank = (sorted.len() * 95).div_ceil(100);
        sorted.get(rank.saturating_sub(1)).copied()
    }

    /// Samples held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Everything known about one peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReputationRecord {
    /// Who.
    pub peer_id: PeerId,
    /// Trust score.
    pub score: ReputationScore,
    /// Counters.
    pub counters: MessageCounters,
    /// Recent response latencies.
    pub latency: LatencyWindow,
    /// Last time anything was heard.
    pub last_seen_ms: u64,
    /// Lifecycle state.
    pub state: PeerState,
}

impl ReputationRecord {
    /// Fresh active record.
    pub fn new(peer_id: PeerId, initial_score: u32, latency_window: usize, now_ms: u64) -> Self {
        Self {
            peer_id,
            score: ReputationScore::with_score(initial_score),
            counters: MessageCounters::default(),
            latency: LatencyWindow::new(latency_window),
            last_seen_ms: now_ms,
            state: PeerState::Active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_ring() {
        let mut window = LatencyWindow::new(3);
        for l in [10, 20, 30, 40] {
            window.push(l);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.mean_ms(), Some(30.0));
    }

    #[test]
    fn test_p95() {
        let mut window = LatencyWindow::new(100);
        for l in 1..=100 {
            window.push(l);
        }
        assert_eq!(window.p95_ms(), Some(95));
        let empty = LatencyWindow::new(10);
        assert_eq!(empty.p95_ms(), None);
        assert_eq!(empty.mean_ms(), None);
    }

    #[test]
    fn test_new_record_active() {
        let record = ReputationRecord::new(PeerId::new("p"), 100, 10, 5);
        assert!(record.state.is_active());
        assert_eq!(record.score.current(), 100);
        assert_eq!(record.last_seen_ms, 5);
    }
}
