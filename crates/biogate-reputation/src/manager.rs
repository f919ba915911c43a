//! Central reputation manager.
//!
//! Holds one [`PeerEntry`] per connected peer behind its own mutex, so an
//! update to one peer is a single atomic read-modify-write and never waits on
//! another peer. The peer map lock is only held long enough to clone an entry
//! handle.
//!
//! ## Security
//!
//! Blacklisting is terminal and idempotent. The state is written under the
//! peer lock before [`TransportCommands::disconnect`] runs, so any concurrent
//! admission check already sees the peer as excluded. Transport callbacks are
//! made with no manager lock held.
//!
//! A disconnected peer's entry moves to the archive under the peer map's
//! write lock, so a concurrent lookup finds it in exactly one of the two
//! maps. The archive holds the same entry handle, which keeps late updates.
//! It is bounded by count and age; blacklisted peers are dropped last.
//!
//! Lock order: peer map, then archive, then a single peer entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use biogate_anomaly::AnomalyAction;
use biogate_protocol::RejectReason;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::config::ReputationConfig;
use crate::error::{ReputationError, Result};
use crate::events::{PartitionAlert, ReputationEvent, TransportCommands};
use crate::peer::{ExclusionReason, PeerId, PeerState, QuarantineCause};
use crate::rate_limiter::{RateLimitResult, RequestWindow};
use crate::record::ReputationRecord;
use crate::suspicious::{SuspiciousEntry, SuspiciousKind, SuspiciousLog};

/// Mutable per-peer state.
#[derive(Clone, Debug)]
struct PeerEntry {
    record: ReputationRecord,
    log: SuspiciousLog,
    limiter: RequestWindow,
    rate_limit_logged_ms: Option<u64>,
}

impl PeerEntry {
    fn new(peer: PeerId, config: &ReputationConfig, now_ms: u64) -> Self {
        Self {
            record: ReputationRecord::new(
                peer,
                config.initial_score,
                config.latency_window,
                now_ms,
            ),
            log: SuspiciousLog::new(config.suspicious_log_capacity),
            limiter: RequestWindow::new(
                config.rate_limit_max_requests,
                config.rate_limit_window_ms,
            ),
            rate_limit_logged_ms: None,
        }
    }

    fn blacklist(&mut self, reason: ExclusionReason, now_ms: u64) -> ReputationEvent {
        self.record.state = PeerState::Blacklisted {
            since_ms: now_ms,
            reason,
        };
        ReputationEvent::PeerExcluded {
            peer: self.record.peer_id.clone(),
            reason,
            score: self.record.score.current(),
        }
    }
}

/// Apply the escalation rules after an update.
///
/// `logged` is set when the update appended a suspicious entry, which is the
/// only time the burst rule is evaluated.
fn escalate(
    entry: &mut PeerEntry,
    config: &ReputationConfig,
    now_ms: u64,
    logged: bool,
) -> Vec<ReputationEvent> {
    let mut events = Vec::new();
    if entry.record.state.is_blacklisted() {
        return events;
    }

    let score = entry.record.score.current();
    if score < config.blacklist_threshold {
        events.push(entry.blacklist(ExclusionReason::ScoreExhausted, now_ms));
        return events;
    }

    if logged {
        let burst = entry.log.burst(now_ms, config.burst_window_ms);
        if burst.entries >= config.burst_min_entries {
            if burst.severity > config.burst_severity_threshold {
                events.push(entry.blacklist(ExclusionReason::SuspiciousBurst, now_ms));
                return events;
            }
            events.push(ReputationEvent::BurstWarning {
                peer: entry.record.peer_id.clone(),
                entries: burst.entries,
                severity: burst.severity,
            });
        }
    }

    let state = entry.record.state;
    match state {
        PeerState::Active if score < config.quarantine_threshold => {
            let until_ms = now_ms.saturating_add(config.quarantine_duration_ms);
            entry.record.state = PeerState::Quarantined {
                until_ms,
                cause: QuarantineCause::LowScore,
            };
            events.push(ReputationEvent::PeerQuarantined {
                peer: entry.record.peer_id.clone(),
                until_ms,
                cause: QuarantineCause::LowScore,
            });
        }
        PeerState::Quarantined { until_ms, .. }
            if now_ms >= until_ms && score >= config.quarantine_threshold =>
        {
            entry.record.state = PeerState::Active;
            events.push(ReputationEvent::PeerReleased {
                peer: entry.record.peer_id.clone(),
            });
        }
        _ => {}
    }
    events
}

/// Evict archived entries until at most `capacity` remain: non-blacklisted
/// before blacklisted, least recently seen first.
fn trim_archive(archive: &mut HashMap<PeerId, Arc<Mutex<PeerEntry>>>, capacity: usize) {
    let excess = archive.len().saturating_sub(capacity);
    if excess == 0 {
        return;
    }
    let mut candidates: Vec<(bool, u64, PeerId)> = archive
        .iter()
        .map(|(id, entry)| {
            let entry = entry.lock();
            (
                entry.record.state.is_blacklisted(),
                entry.record.last_seen_ms,
                id.clone(),
            )
        })
        .collect();
    candidates.sort_unstable();
    for (_, _, id) in candidates.into_iter().take(excess) {
        archive.remove(&id);
    }
    debug!(evicted = excess, capacity, "Archive over capacity");
}

/// Tracks peer reputation and drives Byzantine response.
pub struct ReputationManager {
    config: ReputationConfig,
    peers: RwLock<HashMap<PeerId, Arc<Mutex<PeerEntry>>>>,
    archive: Mutex<HashMap<PeerId, Arc<Mutex<PeerEntry>>>>,
    transport: Arc<dyn TransportCommands>,
    events_tx: mpsc::Sender<ReputationEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<ReputationEvent>>>,
    partition_alerted: AtomicBool,
}

impl ReputationManager {
    /// Create a manager that sends transport commands to `transport`.
    pub fn new(config: ReputationConfig, transport: Arc<dyn TransportCommands>) -> Result<Self> {
        config.validate()?;
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);
        Ok(Self {
            config,
            peers: RwLock::new(HashMap::new()),
            archive: Mutex::new(HashMap::new()),
            transport,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            partition_alerted: AtomicBool::new(false),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ReputationConfig {
        &self.config
    }

    /// Take the event receiver. Returns `None` after the first call.
    pub fn subscribe(&self) -> Option<mpsc::Receiver<ReputationEvent>> {
        self.events_rx.lock().take()
    }

    fn get(&self, peer: &PeerId) -> Option<Arc<Mutex<PeerEntry>>> {
        self.peers.read().get(peer).cloned()
    }

    /// Entry for `peer`, created on first contact or restored from the archive.
    fn entry(&self, peer: &PeerId, now_ms: u64) -> Arc<Mutex<PeerEntry>> {
        if let Some(entry) = self.get(peer) {
            return entry;
        }
        let mut peers = self.peers.write();
        peers
            .entry(peer.clone())
            .or_insert_with(|| match self.archive.lock().remove(peer) {
                Some(entry) => {
                    debug!(peer = %peer, "Restored archived reputation");
                    entry
                }
                None => {
                    debug!(peer = %peer, "New peer");
                    Arc::new(Mutex::new(PeerEntry::new(peer.clone(), &self.config, now_ms)))
                }
            })
            .clone()
    }

    /// Register a connection. A previously archived record is restored.
    pub fn on_connect(&self, peer: &PeerId, now_ms: u64) -> PeerState {
        let entry = self.entry(peer, now_ms);
        let mut entry = entry.lock();
        entry.record.last_seen_ms = now_ms;
        info!(peer = %peer, state = ?entry.record.state, "Peer connected");
        entry.record.state
    }

    /// Archive the record of a disconnected peer.
    pub fn on_disconnect(&self, peer: &PeerId) {
        let mut peers = self.peers.write();
        let Some(entry) = peers.remove(peer) else {
            return;
        };
        info!(peer = %peer, score = entry.lock().record.score.current(), "Peer disconnected");
        let mut archive = self.archive.lock();
        archive.insert(peer.clone(), entry);
        trim_archive(&mut archive, self.config.archive_capacity);
    }

    /// Archive connected peers that have been silent for the idle timeout.
    fn archive_idle(&self, now_ms: u64) -> usize {
        let timeout = self.config.idle_timeout_ms;
        let mut peers = self.peers.write();
        let idle: Vec<PeerId> = peers
            .iter()
            .filter(|(_, e)| e.lock().record.last_seen_ms.saturating_add(timeout) <= now_ms)
            .map(|(id, _)| id.clone())
            .collect();
        if idle.is_empty() {
            return 0;
        }
        let mut archive = self.archive.lock();
        for id in &idle {
            if let Some(entry) = peers.remove(id) {
                archive.insert(id.clone(), entry);
            }
        }
        trim_archive(&mut archive, self.config.archive_capacity);
        idle.len()
    }

    /// Forget archived peers past the retention. Blacklisted peers stay.
    fn prune_archive(&self, now_ms: u64) -> usize {
        let retention = self.config.archive_retention_ms;
        let mut archive = self.archive.lock();
        let before = archive.len();
        archive.retain(|_, entry| {
            let entry = entry.lock();
            entry.record.state.is_blacklisted()
                || entry.record.last_seen_ms.saturating_add(retention) > now_ms
        });
        before - archive.len()
    }

    /// Admission check before any other processing.
    ///
    /// Blacklisted peers are refused outright. Everyone else goes through the
    /// DoS guard, which ignores score.
    pub fn admit(&self, peer: &PeerId, now_ms: u64) -> std::result::Result<(), RejectReason> {
        let entry = self.entry(peer, now_ms);
        let (outcome, events) = {
            let mut entry = entry.lock();
            if entry.record.state.is_blacklisted() {
                debug!(peer = %peer, "Refused blacklisted peer");
                return Err(RejectReason::ReputationExhausted);
            }
            entry.record.last_seen_ms = now_ms;
            match entry.limiter.check(now_ms) {
                RateLimitResult::Allowed { .. } => (Ok(()), Vec::new()),
                RateLimitResult::Limited { retry_after_ms } => {
                    debug!(peer = %peer, retry_after_ms, "Rate limited");
                    let window = self.config.rate_limit_window_ms;
                    let due = entry
                        .rate_limit_logged_ms
                        .map_or(true, |t| now_ms >= t.saturating_add(window));
                    let events = if due {
                        entry.rate_limit_logged_ms = Some(now_ms);
                        entry.log.push(SuspiciousKind::RateLimited, now_ms);
                        escalate(&mut *entry, &self.config, now_ms, true)
                    } else {
                        Vec::new()
                    };
                    (Err(RejectReason::RateLimited), events)
                }
            }
        };
        self.dispatch(events, now_ms);
        outcome
    }

    fn update<F>(&self, peer: &PeerId, now_ms: u64, apply: F)
    where
        F: FnOnce(&mut PeerEntry, &ReputationConfig) -> bool,
    {
        let entry = self.entry(peer, now_ms);
        let events = {
            let mut entry = entry.lock();
            if entry.record.state.is_blacklisted() {
                debug!(peer = %peer, "Ignoring update for blacklisted peer");
                return;
            }
            entry.record.last_seen_ms = now_ms;
            let logged = apply(&mut *entry, &self.config);
            escalate(&mut *entry, &self.config, now_ms, logged)
        };
        self.dispatch(events, now_ms);
    }

    /// A message passed every check.
    pub fn record_valid_message(&self, peer: &PeerId, now_ms: u64) {
        self.update(peer, now_ms, |entry, config| {
            entry.record.counters.valid_messages += 1;
            entry
                .record
                .score
                .gain(config.valid_message_gain, config.soft_cap);
            false
        });
    }

    /// The peer took part in a consensus round.
    pub fn record_participation(&self, peer: &PeerId, now_ms: u64) {
        self.update(peer, now_ms, |entry, config| {
            entry.record.counters.consensus_participation += 1;
            entry
                .record
                .score
                .gain(config.participation_gain, config.soft_cap);
            false
        });
    }

    /// A message failed validation.
    pub fn record_invalid_message(&self, peer: &PeerId, now_ms: u64) {
        self.report(peer, SuspiciousKind::InvalidMessage, now_ms);
    }

    /// Confirmed Byzantine behavior.
    pub fn record_byzantine(&self, peer: &PeerId, now_ms: u64) {
        self.report(peer, SuspiciousKind::ByzantineBehavior, now_ms);
    }

    /// Log suspicious activity and apply its score penalty, if any.
    pub fn report(&self, peer: &PeerId, kind: SuspiciousKind, now_ms: u64) {
        self.update(peer, now_ms, |entry, config| {
            entry.log.push(kind, now_ms);
            if kind.is_invalid_message() {
                entry.record.counters.invalid_messages += 1;
                entry.record.score.lose(config.invalid_message_penalty);
            } else if kind == SuspiciousKind::ByzantineBehavior {
                entry.record.counters.byzantine_events += 1;
                entry.record.score.lose(config.byzantine_penalty);
            }
            debug!(
                peer = %entry.record.peer_id,
                kind = ?kind,
                score = entry.record.score.current(),
                "Suspicious activity"
            );
            true
        });
    }

    /// Act on an anomaly verdict.
    pub fn apply_anomaly(&self, peer: &PeerId, action: AnomalyAction, now_ms: u64) {
        match action {
            AnomalyAction::Monitor => {}
            AnomalyAction::Investigate => {
                self.report(peer, SuspiciousKind::AnomalyInvestigate, now_ms)
            }
            AnomalyAction::Quarantine => self.update(peer, now_ms, |entry, config| {
                let until_ms = now_ms.saturating_add(config.quarantine_duration_ms);
                let until_ms = match entry.record.state {
                    PeerState::Quarantined { until_ms: prev, .. } => prev.max(until_ms),
                    _ => until_ms,
                };
                entry.record.state = PeerState::Quarantined {
                    until_ms,
                    cause: QuarantineCause::Anomaly,
                };
                false
            }),
            AnomalyAction::Exclude => self.exclude(peer, ExclusionReason::AnomalyExclude, now_ms),
        }
        if action == AnomalyAction::Quarantine {
            if let Some(PeerState::Quarantined { until_ms, cause }) = self.state(peer) {
                self.dispatch(
                    vec![ReputationEvent::PeerQuarantined {
                        peer: peer.clone(),
                        until_ms,
                        cause,
                    }],
                    now_ms,
                );
            }
        }
    }

    /// Blacklist a peer directly.
    pub fn exclude(&self, peer: &PeerId, reason: ExclusionReason, now_ms: u64) {
        let entry = self.entry(peer, now_ms);
        let events = {
            let mut entry = entry.lock();
            if entry.record.state.is_blacklisted() {
                return;
            }
            vec![entry.blacklist(reason, now_ms)]
        };
        self.dispatch(events, now_ms);
    }

    /// Add a response latency sample.
    pub fn record_latency(&self, peer: &PeerId, latency_ms: u64, now_ms: u64) {
        let entry = self.entry(peer, now_ms);
        entry.lock().record.latency.push(latency_ms);
    }

    /// Release quarantined peers whose time is up, archive idle peers and
    /// prune the archive.
    pub fn tick(&self, now_ms: u64) {
        let entries: Vec<_> = self.peers.read().values().cloned().collect();
        let events: Vec<_> = entries
            .iter()
            .flat_map(|entry| {
                let mut entry = entry.lock();
                if entry.record.state.is_quarantined() {
                    escalate(&mut *entry, &self.config, now_ms, false)
                } else {
                    Vec::new()
                }
            })
            .collect();
        self.dispatch(events, now_ms);

        let idle = self.archive_idle(now_ms);
        let pruned = self.prune_archive(now_ms);
        if idle > 0 || pruned > 0 {
            debug!(idle, pruned, "Peer housekeeping");
        }
    }

    /// Whether the peer may take part in consensus.
    #[must_use]
    pub fn is_eligible(&self, peer: &PeerId) -> bool {
        self.state(peer).is_some_and(|s| s.is_active())
    }

    /// Score of an eligible peer.
    pub fn require_active(&self, peer: &PeerId) -> Result<u32> {
        let entry = self
            .get(peer)
            .ok_or_else(|| ReputationError::UnknownPeer(peer.clone()))?;
        let entry = entry.lock();
        match entry.record.state {
            PeerState::Active => Ok(entry.record.score.current()),
            PeerState::Quarantined { until_ms, .. } => Err(ReputationError::Quarantined {
                peer: peer.clone(),
                until_ms,
            }),
            PeerState::Blacklisted { .. } => Err(ReputationError::Blacklisted(peer.clone())),
        }
    }

    /// Current score, if the peer is connected.
    #[must_use]
    pub fn score(&self, peer: &PeerId) -> Option<u32> {
        self.get(peer).map(|e| e.lock().record.score.current())
    }

    /// Current state, if the peer is connected.
    #[must_use]
    pub fn state(&self, peer: &PeerId) -> Option<PeerState> {
        self.get(peer).map(|e| e.lock().record.state)
    }

    /// Snapshot of a connected or archived peer's record.
    #[must_use]
    pub fn record(&self, peer: &PeerId) -> Option<ReputationRecord> {
        match self.get(peer) {
            Some(entry) => Some(entry.lock().record.clone()),
            None => self
                .archive
                .lock()
                .get(peer)
                .map(|e| e.lock().record.clone()),
        }
    }

    /// Suspicious log of a connected peer, oldest first.
    #[must_use]
    pub fn suspicious_entries(&self, peer: &PeerId) -> Vec<SuspiciousEntry> {
        self.get(peer)
            .map(|e| e.lock().log.entries().copied().collect())
            .unwrap_or_default()
    }

    /// Connected peers.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    /// Disconnected peers still remembered.
    #[must_use]
    pub fn archived_count(&self) -> usize {
        self.archive.lock().len()
    }

    /// Connected peers that are blacklisted.
    #[must_use]
    pub fn blacklisted_peers(&self) -> Vec<PeerId> {
        let entries: Vec<_> = self.peers.read().values().cloned().collect();
        entries
            .iter()
            .filter_map(|e| {
                let e = e.lock();
                e.record
                    .state
                    .is_blacklisted()
                    .then(|| e.record.peer_id.clone())
            })
            .collect()
    }

    /// Run transport commands and publish events. No locks are held here.
    fn dispatch(&self, events: Vec<ReputationEvent>, now_ms: u64) {
        let mut state_changed = false;
        for event in events {
            match &event {
                ReputationEvent::PeerExcluded {
                    peer,
                    reason,
                    score,
                } => {
                    warn!(peer = %peer, reason = %reason, score, "Peer blacklisted");
                    self.transport.disconnect(peer, *reason);
                    state_changed = true;
                }
                ReputationEvent::BurstWarning {
                    peer,
                    entries,
                    severity,
                } => {
                    warn!(peer = %peer, entries, severity, "Suspicious burst below threshold");
                }
                ReputationEvent::PeerQuarantined {
                    peer,
                    until_ms,
                    cause,
                } => {
                    info!(peer = %peer, until_ms, cause = ?cause, "Peer quarantined");
                    state_changed = true;
                }
                ReputationEvent::PeerReleased { peer } => {
                    info!(peer = %peer, "Peer released from quarantine");
                    state_changed = true;
                }
                ReputationEvent::PartitionAlert(_) => {}
            }
            self.emit(event);
        }
        if state_changed {
            self.check_partition(now_ms);
        }
    }

    fn emit(&self, event: ReputationEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(event = ?event, "Event channel full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Event receiver dropped");
            }
        }
    }

    fn check_partition(&self, now_ms: u64) {
        let entries: Vec<_> = self.peers.read().values().cloned().collect();
        let total = entries.len();
        if total == 0 {
            return;
        }
        let affected = entries
            .iter()
            .filter(|e| {
                let state = e.lock().record.state;
                state.is_blacklisted() || state.is_quarantined()
            })
            .count();

        let alert = PartitionAlert {
            affected,
            total,
            timestamp_ms: now_ms,
        };
        if alert.fraction() > self.config.partition_alert_fraction {
            if !self.partition_alerted.swap(true, Ordering::SeqCst) {
                warn!(affected, total, "Possible network partition");
                self.transport.broadcast_partition_alert(&alert);
                self.emit(ReputationEvent::PartitionAlert(alert));
            }
        } else {
            self.partition_alerted.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopTransport;

    impl TransportCommands for NoopTransport {
        fn disconnect(&self, _peer: &PeerId, _reason: ExclusionReason) {}
        fn broadcast_partition_alert(&self, _alert: &PartitionAlert) {}
    }

    fn manager() -> ReputationManager {
        ReputationManager::new(ReputationConfig::default(), Arc::new(NoopTransport)).unwrap()
    }

    #[test]
    fn test_first_contact_active() {
        let mgr = manager();
        let peer = PeerId::new("a");
        assert_eq!(mgr.on_connect(&peer, 0), PeerState::Active);
        assert_eq!(mgr.score(&peer), Some(100));
        assert!(mgr.is_eligible(&peer));
    }

    #[test]
    fn test_valid_messages_capped() {
        let mgr = manager();
        let peer = PeerId::new("a");
        for i in 0..100 {
            mgr.record_valid_message(&peer, i);
        }
        assert_eq!(mgr.score(&peer), Some(150));
        let record = mgr.record(&peer).unwrap();
        assert_eq!(record.counters.valid_messages, 100);
    }

    #[test]
    fn test_stale_has_no_penalty() {
        let mgr = manager();
        let peer = PeerId::new("a");
        mgr.report(&peer, SuspiciousKind::StaleMessage, 0);
        assert_eq!(mgr.score(&peer), Some(100));
        assert_eq!(mgr.suspicious_entries(&peer).len(), 1);
    }

    #[test]
    fn test_low_score_quarantine_and_release() {
        let mgr = manager();
        let peer = PeerId::new("a");
        // Spread out so the burst rule stays quiet.
        for i in 0..7 {
            mgr.record_invalid_message(&peer, i * 400_000);
        }
        assert_eq!(mgr.score(&peer), Some(30));
        assert!(matches!(
            mgr.state(&peer),
            Some(PeerState::Quarantined {
                cause: QuarantineCause::LowScore,
                ..
            })
        ));
        assert!(!mgr.is_eligible(&peer));

        for i in 0..5 {
            mgr.record_valid_message(&peer, 3_000_000 + i);
        }
        mgr.tick(10_000_000);
        assert!(mgr.is_eligible(&peer));
    }

    #[test]
    fn test_require_active() {
        let mgr = manager();
        let peer = PeerId::new("a");
        assert_eq!(
            mgr.require_active(&peer),
            Err(ReputationError::UnknownPeer(peer.clone()))
        );
        mgr.on_connect(&peer, 0);
        assert_eq!(mgr.require_active(&peer), Ok(100));
        mgr.exclude(&peer, ExclusionReason::AnomalyExclude, 1);
        assert_eq!(
            mgr.require_active(&peer),
            Err(ReputationError::Blacklisted(peer.clone()))
        );
    }

    #[test]
    fn test_subscribe_once() {
        let mgr = manager();
        assert!(mgr.subscribe().is_some());
        assert!(mgr.subscribe().is_none());
    }
}
