//! Holding area for verified proofs awaiting broadcast.

use std::collections::HashMap;

use biogate_proof::AggregateProof;
use biogate_reputation::PeerId;
use parking_lot::Mutex;
use tracing::debug;

/// A verified proof waiting for its round.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedProof {
    /// The proof.
    pub proof: AggregateProof,
    /// When it was staged.
    pub staged_at_ms: u64,
}

/// One staged proof per validator. A newer proof replaces the older one.
#[derive(Debug, Default)]
pub struct BroadcastGate {
    staged: Mutex<HashMap<PeerId, StagedProof>>,
}

impl BroadcastGate {
    /// Empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `proof` for `validator`.
    pub fn stage(&self, validator: &PeerId, proof: AggregateProof, now_ms: u64) {
        debug!(validator = %validator, proof_hash = %proof.proof_hash.to_hex(), "Proof staged");
        self.staged.lock().insert(
            validator.clone(),
            StagedProof {
                proof,
                staged_at_ms: now_ms,
            },
        );
    }

    /// Drop the staged proof. Returns whether one existed.
    pub fn discard(&self, validator: &PeerId) -> bool {
        let removed = self.staged.lock().remove(validator).is_some();
        if removed {
            debug!(validator = %validator, "Staged proof discarded");
        }
        removed
    }

    /// Copy of the staged proof.
    pub fn get(&self, validator: &PeerId) -> Option<StagedProof> {
        self.staged.lock().get(validator).cloned()
    }

    /// Take the staged proof for broadcast.
    pub fn release(&self, validator: &PeerId) -> Option<AggregateProof> {
        self.staged.lock().remove(validator).map(|s| s.proof)
    }

    /// Drop proofs staged more than `max_age_ms` ago. Returns how many.
    pub fn expire(&self, now_ms: u64, max_age_ms: u64) -> usize {
        let mut staged = self.staged.lock();
        let before = staged.len();
        staged.retain(|_, s| s.staged_at_ms.saturating_add(max_age_ms) > now_ms);
        before - staged.len()
    }

    /// Number of staged proofs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.staged.lock().len()
    }

    /// Whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staged.lock().is_empty()
    }
}
