//! Events emitted by the reputation manager and commands sent to transport.

use serde::{Deserialize, Serialize};

use crate::peer::{ExclusionReason, PeerId, QuarantineCause};

/// Broadcast when too many peers are excluded or quarantined at once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionAlert {
    /// Blacklisted or quarantined peers.
    pub affected: usize,
    /// All tracked peers.
    pub total: usize,
    /// When the threshold was crossed.
    pub timestamp_ms: u64,
}

impl PartitionAlert {
    /// Affected share of tracked peers.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.affected as f64 / self.total as f64
        }
    }
}

/// Observable reputation transitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReputationEvent {
    /// Peer blacklisted and disconnected.
    PeerExcluded {
        /// Who.
        peer: PeerId,
        /// Why.
        reason: ExclusionReason,
        /// Score at exclusion.
        score: u32,
    },
    /// Burst rule hit but severity stayed under the threshold.
    BurstWarning {
        /// Who.
        peer: PeerId,
        /// Entries in the window.
        entries: usize,
        /// Summed severity.
        severity: u32,
    },
    /// Peer quarantined.
    PeerQuarantined {
        /// Who.
        peer: PeerId,
        /// Earliest release.
        until_ms: u64,
        /// Why.
        cause: QuarantineCause,
    },
    /// Peer left quarantine.
    PeerReleased {
        /// Who.
        peer: PeerId,
    },
    /// Too many peers affected.
    PartitionAlert(PartitionAlert),
}

/// Commands the reputation manager sends to the transport layer.
///
/// Implementations must not call back into the manager.
pub trait TransportCommands: Send + Sync {
    /// Drop the connection to `peer` and refuse reconnects.
    fn disconnect(&self, peer: &PeerId, reason: ExclusionReason);

    /// Tell other peers that the network may be partitioned.
    fn broadcast_partition_alert(&self, alert: &PartitionAlert);
}
