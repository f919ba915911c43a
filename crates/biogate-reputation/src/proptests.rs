//! Property-based tests for the reputation state machine.

use std::sync::Arc;

use proptest::prelude::*;

use crate::{
    ExclusionReason, PartitionAlert, PeerId, ReputationConfig, ReputationManager, SuspiciousKind,
    TransportCommands,
};

struct NoopTransport;

impl TransportCommands for NoopTransport {
    fn disconnect(&self, _peer: &PeerId, _reason: ExclusionReason) {}
    fn broadcast_partition_alert(&self, _alert: &PartitionAlert) {}
}

fn manager() -> ReputationManager {
    ReputationManager::new(ReputationConfig::default(), Arc::new(NoopTransport)).unwrap()
}

fn invalid_kind() -> impl Strategy<Value = SuspiciousKind> {
    prop::sample::select(vec![
        SuspiciousKind::InvalidMessage,
        SuspiciousKind::SignatureInvalid,
        SuspiciousKind::ReplayedNonce,
    ])
}

#[derive(Clone, Debug)]
enum Op {
    Valid,
    Participation,
    Latency(u64),
    Stale,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Valid),
        Just(Op::Participation),
        (0u64..5_000).prop_map(Op::Latency),
        Just(Op::Stale),
    ]
}

proptest! {
    /// A peer sending only invalid messages inside one burst window is
    /// blacklisted within eight of them.
    #[test]
    fn invalid_only_blacklisted_within_eight(
        kinds in prop::collection::vec(invalid_kind(), 8),
        gaps in prop::collection::vec(0u64..30_000, 8),
    ) {
        let mgr = manager();
        let peer = PeerId::new("bad");
        let mut now = 1_000u64;
        for (kind, gap) in kinds.into_iter().zip(gaps) {
            now += gap;
            mgr.report(&peer, kind, now);
        }
        prop_assert!(mgr.state(&peer).unwrap().is_blacklisted());
    }

    /// Gains never push a score above the soft cap.
    #[test]
    fn score_never_exceeds_soft_cap(ops in prop::collection::vec(op(), 0..200)) {
        let mgr = manager();
        let peer = PeerId::new("good");
        mgr.on_connect(&peer, 0);
        for (i, op) in ops.into_iter().enumerate() {
            let now = i as u64 * 1_000;
            match op {
                Op::Valid => mgr.record_valid_message(&peer, now),
                Op::Participation => mgr.record_participation(&peer, now),
                Op::Latency(ms) => mgr.record_latency(&peer, ms, now),
                Op::Stale => mgr.report(&peer, SuspiciousKind::StaleMessage, now),
            }
            prop_assert!(mgr.score(&peer).unwrap() <= 150);
        }
    }

    /// Nothing brings a blacklisted peer back.
    #[test]
    fn blacklist_is_terminal(ops in prop::collection::vec(op(), 0..50)) {
        let mgr = manager();
        let peer = PeerId::new("gone");
        mgr.on_connect(&peer, 0);
        mgr.record_byzantine(&peer, 1);
        mgr.record_byzantine(&peer, 2);
        prop_assert!(mgr.state(&peer).unwrap().is_blacklisted());
        for (i, op) in ops.into_iter().enumerate() {
            let now = 10 + i as u64;
            match op {
                Op::Valid => mgr.record_valid_message(&peer, now),
                Op::Participation => mgr.record_participation(&peer, now),
                _ => mgr.tick(now + 10_000_000),
            }
        }
        mgr.on_disconnect(&peer);
        mgr.on_connect(&peer, 20_000_000);
        prop_assert!(mgr.state(&peer).unwrap().is_blacklisted());
        prop_assert!(mgr.admit(&peer, 20_000_001).is_err());
    }
}
