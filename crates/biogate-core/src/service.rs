//! The integrity service: one entry point for everything a peer sends.
//!
//! Inbound envelopes pass admission, format, freshness, nonce and signature
//! checks in that order before the payload is decoded. Nonces are scoped to
//! the sending peer, so a nonce seen from one peer never blocks another. Every outcome, good or
//! bad, is reported to the reputation manager. Proof submissions are
//! additionally verified, fed to the anomaly detector and staged for
//! broadcast unless the verdict is critical.

use std::collections::HashMap;
use std::sync::Arc;

use biogate_anomaly::{AnomalyDetector, AnomalyVerdict};
use biogate_crypto::{
    decrypt_with_aad, encrypt_with_aad, Hash256, PublicKey, SealedPayload, SealingKey,
};
use biogate_proof::{
    commit, eligibility_score, AggregateProof, Commitment, CommitmentKind, ProofEngine,
};
use biogate_protocol::limits::NONCE_SIZE;
use biogate_protocol::{check_freshness, Nonce, Reading, RejectReason, ReplayGuard};
use biogate_reputation::{
    PeerId, ReputationManager, ReputationRecord, SuspiciousKind, TransportCommands,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::IntegrityConfig;
use crate::envelope::{InboundEnvelope, PeerMessage};
use crate::error::{CoreError, Result};
use crate::gate::BroadcastGate;

/// Looks up peers' signing keys.
pub trait PeerDirectory: Send + Sync {
    /// Public key for `peer`, if known.
    fn public_key(&self, peer: &PeerId) -> Option<PublicKey>;
}

/// In-memory [`PeerDirectory`].
#[derive(Debug, Default)]
pub struct StaticDirectory {
    keys: RwLock<HashMap<PeerId, PublicKey>>,
}

impl StaticDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a key.
    pub fn insert(&self, peer: PeerId, key: PublicKey) {
        self.keys.write().insert(peer, key);
    }

    /// Forget a key.
    pub fn remove(&self, peer: &PeerId) -> Option<PublicKey> {
        self.keys.write().remove(peer)
    }
}

impl PeerDirectory for StaticDirectory {
    fn public_key(&self, peer: &PeerId) -> Option<PublicKey> {
        self.keys.read().get(peer).copied()
    }
}

/// What an accepted envelope led to.
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatched {
    /// Proof verified and staged for broadcast.
    ProofStaged(AnomalyVerdict),
    /// Proof verified but withheld by a critical anomaly verdict.
    ProofWithheld(AnomalyVerdict),
    /// Vote recorded.
    Participation {
        /// Round voted in.
        round: u64,
    },
    /// Liveness recorded.
    Heartbeat,
    /// Equivocation evidence checked and the accused penalized.
    ByzantineConfirmed {
        /// Who equivocated.
        accused: PeerId,
    },
    /// Valid evidence for an equivocation that was already penalized.
    ByzantineAlreadyCounted {
        /// Who equivocated.
        accused: PeerId,
        /// Round of the conflicting votes.
        round: u64,
    },
}

/// Per-round output handed to consensus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsensusInput {
    /// Validator this input describes.
    pub validator_id: String,
    /// Whether a staged proof still verifies.
    pub proof_valid: bool,
    /// Emotional score from the proof, or zero.
    pub emotional_score: f64,
    /// Authenticity from the proof, or zero.
    pub authenticity: f64,
    /// Eligibility commitment when the proof is valid.
    pub commitment: Option<Commitment>,
    /// Current reputation score.
    pub reputation_score: u32,
    /// Latest anomaly verdict.
    pub anomaly_verdict: AnomalyVerdict,
    /// Active, valid proof and no critical verdict.
    pub eligible: bool,
}

fn suspicious_kind(reason: RejectReason) -> SuspiciousKind {
    match reason {
        RejectReason::Stale => SuspiciousKind::StaleMessage,
        RejectReason::ReplayedNonce => SuspiciousKind::ReplayedNonce,
        RejectReason::SignatureInvalid => SuspiciousKind::SignatureInvalid,
        RejectReason::RateLimited => SuspiciousKind::RateLimited,
        RejectReason::MalformedInput | RejectReason::ReputationExhausted => {
            SuspiciousKind::InvalidMessage
        }
    }
}

/// Wires proofs, replay protection, anomaly detection and reputation.
pub struct IntegrityService {
    config: IntegrityConfig,
    proofs: ProofEngine,
    replay: ReplayGuard,
    anomaly: AnomalyDetector,
    reputation: ReputationManager,
    directory: Arc<dyn PeerDirectory>,
    gate: BroadcastGate,
}

impl IntegrityService {
    /// Build the service. The configuration is validated first.
    pub fn new(
        config: IntegrityConfig,
        directory: Arc<dyn PeerDirectory>,
        transport: Arc<dyn TransportCommands>,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            nonce_window_ms = config.replay.window_ms,
            rate_limit = config.reputation.rate_limit_max_requests,
            "Integrity service starting"
        );
        Ok(Self {
            proofs: ProofEngine::new(config.proof.clone()),
            replay: ReplayGuard::new(config.replay.clone()),
            anomaly: AnomalyDetector::new(config.anomaly.clone())?,
            reputation: ReputationManager::new(config.reputation.clone(), transport)?,
            directory,
            gate: BroadcastGate::new(),
            config,
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &IntegrityConfig {
        &self.config
    }

    /// Proof engine.
    #[must_use]
    pub fn proofs(&self) -> &ProofEngine {
        &self.proofs
    }

    /// Nonce registry.
    #[must_use]
    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.replay
    }

    /// Anomaly detector.
    #[must_use]
    pub fn anomaly(&self) -> &AnomalyDetector {
        &self.anomaly
    }

    /// Reputation manager.
    #[must_use]
    pub fn reputation(&self) -> &ReputationManager {
        &self.reputation
    }

    /// Staged proofs.
    #[must_use]
    pub fn gate(&self) -> &BroadcastGate {
        &self.gate
    }

    /// Transport reported a new connection.
    pub fn on_connect(&self, peer: &PeerId, now_ms: u64) {
        self.reputation.on_connect(peer, now_ms);
    }

    /// Transport reported a closed connection.
    pub fn on_disconnect(&self, peer: &PeerId) {
        self.reputation.on_disconnect(peer);
    }

    fn reject(&self, peer: &PeerId, reason: RejectReason, now_ms: u64) -> RejectReason {
        debug!(peer = %peer, reason = %reason, "Inbound rejected");
        self.reputation.report(peer, suspicious_kind(reason), now_ms);
        reason
    }

    /// Run an inbound envelope through every check and dispatch it.
    ///
    /// Only the reject reason ever leaves this function.
    pub fn handle_inbound(
        &self,
        peer: &PeerId,
        envelope: &InboundEnvelope,
        now_ms: u64,
    ) -> std::result::Result<Dispatched, RejectReason> {
        self.reputation.admit(peer, now_ms)?;

        if envelope.payload.len() > self.config.envelope.max_payload_bytes {
            return Err(self.reject(peer, RejectReason::MalformedInput, now_ms));
        }
        let nonce = Nonce::from_hex(&envelope.nonce)
            .map_err(|_| self.reject(peer, RejectReason::MalformedInput, now_ms))?;

        check_freshness(
            envelope.timestamp_ms,
            now_ms,
            self.config.envelope.max_age_ms,
            self.config.envelope.max_clock_skew_ms,
        )
        .map_err(|e| self.reject(peer, e.reject_reason(), now_ms))?;

        let retain_until_ms = envelope
            .timestamp_ms
            .saturating_add(self.config.envelope.max_age_ms)
            .saturating_add(1);
        if !self
            .replay
            .check_and_consume_scoped(&envelope_scope(peer), &nonce, now_ms, retain_until_ms)
        {
            return Err(self.reject(peer, RejectReason::ReplayedNonce, now_ms));
        }

        let public_key = self
            .directory
            .public_key(peer)
            .ok_or_else(|| self.reject(peer, RejectReason::SignatureInvalid, now_ms))?;
        if !envelope.verify_signature(&public_key) {
            return Err(self.reject(peer, RejectReason::SignatureInvalid, now_ms));
        }

        let message = envelope
            .decode(self.config.envelope.max_payload_bytes)
            .map_err(|_| self.reject(peer, RejectReason::MalformedInput, now_ms))?;

        match message {
            PeerMessage::ProofSubmission(proof) => {
                self.handle_proof(peer, &public_key, proof, now_ms)
            }
            PeerMessage::ConsensusParticipation { round, .. } => {
                self.reputation.record_participation(peer, now_ms);
                Ok(Dispatched::Participation { round })
            }
            PeerMessage::Heartbeat { echo_ms } => {
                self.reputation.record_valid_message(peer, now_ms);
                if let Some(sent) = echo_ms.filter(|&t| t <= now_ms) {
                    self.reputation.record_latency(peer, now_ms - sent, now_ms);
                }
                Ok(Dispatched::Heartbeat)
            }
            PeerMessage::ByzantineReport {
                accused,
                first,
                second,
            } => self.handle_report(peer, accused, &first, &second, now_ms),
        }
    }

    fn handle_report(
        &self,
        reporter: &PeerId,
        accused: PeerId,
        first: &InboundEnvelope,
        second: &InboundEnvelope,
        now_ms: u64,
    ) -> std::result::Result<Dispatched, RejectReason> {
        for evidence in [first, second] {
            check_freshness(
                evidence.timestamp_ms,
                now_ms,
                self.config.envelope.max_age_ms,
                self.config.envelope.max_clock_skew_ms,
            )
            .map_err(|e| self.reject(reporter, e.reject_reason(), now_ms))?;
        }
        let Some(round) = self.equivocation_round(&accused, first, second) else {
            return Err(self.reject(reporter, RejectReason::MalformedInput, now_ms));
        };

        // One penalty per accused and round. Fresh evidence is tracked for
        // as long as it could still be accepted.
        let oldest_ms = first.timestamp_ms.min(second.timestamp_ms);
        let retain_until_ms = oldest_ms
            .saturating_add(self.config.envelope.max_age_ms)
            .saturating_add(1);
        if !self.replay.check_and_consume_scoped(
            &equivocation_scope(&accused),
            &round_key(round),
            now_ms,
            retain_until_ms,
        ) {
            debug!(reporter = %reporter, accused = %accused, round, "Equivocation already counted");
            return Ok(Dispatched::ByzantineAlreadyCounted { accused, round });
        }

        warn!(reporter = %reporter, accused = %accused, round, "Equivocation confirmed");
        self.reputation.record_byzantine(&accused, now_ms);
        self.reputation.record_valid_message(reporter, now_ms);
        Ok(Dispatched::ByzantineConfirmed { accused })
    }

    fn handle_proof(
        &self,
        peer: &PeerId,
        public_key: &PublicKey,
        proof: AggregateProof,
        now_ms: u64,
    ) -> std::result::Result<Dispatched, RejectReason> {
        if let Err(rejection) = self
            .proofs
            .accept_proof(&proof, public_key, now_ms, &self.replay)
        {
            debug!(peer = %peer, rejection = ?rejection, "Proof rejected");
            return Err(self.reject(peer, rejection.reason(), now_ms));
        }
        self.reputation.record_valid_message(peer, now_ms);

        let readings: Vec<Reading> = proof.readings().cloned().collect();
        let verdict = self.anomaly.record_and_analyze(peer.as_str(), &readings);
        self.reputation.apply_anomaly(peer, verdict.action, now_ms);

        if verdict.blocks_broadcast() {
            warn!(
                peer = %peer,
                dimension = %verdict.dominant,
                score = verdict.severity_score,
                "Critical anomaly, proof withheld"
            );
            self.gate.discard(peer);
            Ok(Dispatched::ProofWithheld(verdict))
        } else {
            self.gate.stage(peer, proof, now_ms);
            Ok(Dispatched::ProofStaged(verdict))
        }
    }

    /// Round in which `accused` signed two different votes, if the
    /// evidence shows one.
    fn equivocation_round(
        &self,
        accused: &PeerId,
        first: &InboundEnvelope,
        second: &InboundEnvelope,
    ) -> Option<u64> {
        let key = self.directory.public_key(accused)?;
        if !first.verify_signature(&key) || !second.verify_signature(&key) {
            return None;
        }
        let max = self.config.envelope.max_payload_bytes;
        let vote = |env: &InboundEnvelope| -> Option<(u64, Hash256)> {
            match env.decode(max).ok()? {
                PeerMessage::ConsensusParticipation { round, vote } => Some((round, vote)),
                _ => None,
            }
        };
        let (r1, v1) = vote(first)?;
        let (r2, v2) = vote(second)?;
        (r1 == r2 && v1 != v2).then_some(r1)
    }

    /// Build the consensus input for `validator` this round.
    ///
    /// # Errors
    ///
    /// `Reputation(UnknownPeer)` if the validator has never been seen.
    pub fn evaluate_round(&self, validator: &PeerId, now_ms: u64) -> Result<ConsensusInput> {
        let record: ReputationRecord = self.reputation.record(validator).ok_or_else(|| {
            biogate_reputation::ReputationError::UnknownPeer(validator.clone())
        })?;
        let anomaly_verdict = self.anomaly.analyze(validator.as_str());

        let staged = self.gate.get(validator);
        let key = self.directory.public_key(validator);
        let valid_proof = match (staged, key) {
            (Some(staged), Some(key)) if self.proofs.verify(&staged.proof, &key, now_ms) => {
                Some(staged.proof)
            }
            _ => None,
        };

        let (proof_valid, emotional_score, authenticity, commitment) = match &valid_proof {
            Some(proof) => {
                let score = eligibility_score(proof.emotional_score, proof.authenticity);
                let commitment = commit(
                    CommitmentKind::ConsensusEligibility,
                    score,
                    validator.as_str(),
                    now_ms,
                    None,
                )?;
                (true, proof.emotional_score, proof.authenticity, Some(commitment))
            }
            None => (false, 0.0, 0.0, None),
        };

        let eligible =
            record.state.is_active() && proof_valid && !anomaly_verdict.blocks_broadcast();
        debug!(
            validator = %validator,
            proof_valid,
            eligible,
            score = record.score.current(),
            "Round evaluated"
        );
        Ok(ConsensusInput {
            validator_id: validator.to_string(),
            proof_valid,
            emotional_score,
            authenticity,
            commitment,
            reputation_score: record.score.current(),
            anomaly_verdict,
            eligible,
        })
    }

    /// Housekeeping: release quarantines, sweep nonces, drop stale proofs.
    pub fn tick(&self, now_ms: u64) {
        self.reputation.tick(now_ms);
        let swept = self.replay.sweep(now_ms);
        let expired = self.gate.expire(now_ms, self.config.proof.max_age_ms);
        if swept > 0 || expired > 0 {
            debug!(swept, expired, "Housekeeping");
        }
    }
}

fn envelope_scope(peer: &PeerId) -> Vec<u8> {
    let mut scope = b"envelope/".to_vec();
    scope.extend_from_slice(peer.as_str().as_bytes());
    scope
}

fn equivocation_scope(accused: &PeerId) -> Vec<u8> {
    let mut scope = b"equivocation/".to_vec();
    scope.extend_from_slice(accused.as_str().as_bytes());
    scope
}

fn round_key(round: u64) -> Nonce {
    let mut bytes = [0u8; NONCE_SIZE];
    bytes[..8].copy_from_slice(&round.to_be_bytes());
    Nonce::from_array(bytes)
}

/// Seal a batch of readings, bound to `subject_id`.
pub fn seal_readings(key: &SealingKey, readings: &[Reading], subject_id: &str) -> Result<SealedPayload> {
    let plaintext = bincode::serialize(readings)?;
    Ok(encrypt_with_aad(key, &plaintext, subject_id.as_bytes())?)
}

/// Open a sealed batch and validate every reading.
pub fn open_readings(key: &SealingKey, sealed: &SealedPayload, subject_id: &str) -> Result<Vec<Reading>> {
    let plaintext = decrypt_with_aad(key, sealed, subject_id.as_bytes())?;
    let readings: Vec<Reading> = bincode::deserialize(&plaintext)?;
    for reading in &readings {
        reading.validate()?;
    }
    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use biogate_protocol::SignalType;

    #[test]
    fn test_reject_reason_mapping() {
        assert_eq!(suspicious_kind(RejectReason::Stale), SuspiciousKind::StaleMessage);
        assert_eq!(
            suspicious_kind(RejectReason::MalformedInput),
            SuspiciousKind::InvalidMessage
        );
        assert_eq!(
            suspicious_kind(RejectReason::ReplayedNonce),
            SuspiciousKind::ReplayedNonce
        );
    }

    #[test]
    fn test_replay_scopes_are_disjoint() {
        let alice = PeerId::new("alice");
        let tricky = PeerId::new("equivocation/alice");
        assert_ne!(envelope_scope(&tricky), equivocation_scope(&alice));
        assert_ne!(envelope_scope(&alice), equivocation_scope(&alice));
        assert_ne!(round_key(1), round_key(2));
    }

    #[test]
    fn test_seal_open_readings() {
        let key = SealingKey::generate();
        let readings = vec![
            Reading::new("ring", SignalType::HeartRate, 72.0, "bpm", 1_750_000_000_000, 0.95)
                .unwrap(),
            Reading::new("band", SignalType::Stress, 0.3, "", 1_750_000_000_500, 0.88).unwrap(),
        ];
        let sealed = seal_readings(&key, &readings, "validator-1").unwrap();
        assert_eq!(open_readings(&key, &sealed, "validator-1").unwrap(), readings);
        assert!(matches!(
            open_readings(&key, &sealed, "validator-2"),
            Err(CoreError::Crypto(_))
        ));
        assert!(open_readings(&SealingKey::generate(), &sealed, "validator-1").is_err());
    }

    #[test]
    fn test_static_directory() {
        let dir = StaticDirectory::new();
        let peer = PeerId::new("p");
        let key = biogate_crypto::SigningKeyPair::generate().public_key();
        assert!(dir.public_key(&peer).is_none());
        dir.insert(peer.clone(), key);
        assert_eq!(dir.public_key(&peer), Some(key));
        assert_eq!(dir.remove(&peer), Some(key));
    }
}
