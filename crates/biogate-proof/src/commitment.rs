//! Salted value commitments with a public threshold predicate.
//!
//! A [`Commitment`] binds a secret numeric value to a subject and time. It
//! exposes only whether the value meets the threshold for its
//! [`CommitmentKind`]; the value itself is checked later by recomputation.
//!
//! ## Known information leak
//!
//! `threshold_proof = H(threshold_met || salt || floor(value / 10))`. The salt
//! is stored in the commitment, so anyone holding it can try the handful of
//! plausible buckets and learn the value's decade. This is kept for
//! compatibility with existing verifiers. Do not treat the threshold proof
//! as hiding anything beyond the bucket.

use biogate_crypto::Hash256;
use biogate_protocol::{purposes, CanonicalEncoder};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::{ProofError, Result};

/// Salt size in bytes.
pub const SALT_SIZE: usize = 32;

/// Weight of the emotional score in the eligibility blend.
pub const ELIGIBILITY_EMOTIONAL_WEIGHT: f64 = 0.6;
/// Weight of authenticity (scaled to 100) in the eligibility blend.
pub const ELIGIBILITY_AUTHENTICITY_WEIGHT: f64 = 0.4;

/// What a commitment asserts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentKind {
    /// Emotional score, threshold 75.
    Emotional,
    /// Authenticity, threshold 0.70.
    Authenticity,
    /// Blended eligibility score, threshold 70.
    ConsensusEligibility,
}

impl CommitmentKind {
    /// Value the committed number must reach.
    pub fn threshold(&self) -> f64 {
        match self {
            Self::Emotional => 75.0,
            Self::Authenticity => 0.70,
            Self::ConsensusEligibility => 70.0,
        }
    }
}

/// Blend used for [`CommitmentKind::ConsensusEligibility`].
pub fn eligibility_score(emotional_score: f64, authenticity: f64) -> f64 {
    ELIGIBILITY_EMOTIONAL_WEIGHT * emotional_score
        + ELIGIBILITY_AUTHENTICITY_WEIGHT * authenticity * 100.0
}

/// A hiding commitment to a value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// `H(value || subject_id || timestamp || salt)`.
    pub commitment_hash: Hash256,
    /// Whether the value met the kind's threshold.
    pub threshold_met: bool,
    /// `H(threshold_met || salt || bucket(value))`.
    pub threshold_proof: Hash256,
    /// Random salt.
    pub salt: [u8; SALT_SIZE],
    /// Commitment time.
    pub timestamp_ms: u64,
    /// Who the value belongs to.
    pub subject_id: String,
    /// What is asserted.
    pub kind: CommitmentKind,
}

fn commitment_hash(value: f64, subject_id: &str, timestamp_ms: u64, salt: &[u8; SALT_SIZE]) -> Hash256 {
    Hash256::hash(
        &CanonicalEncoder::new(purposes::COMMITMENT)
            .f64(value)
            .str(subject_id)
            .u64(timestamp_ms)
            .bytes(salt)
            .finish(),
    )
}

fn bucket(value: f64) -> i64 {
    (value / 10.0).floor() as i64
}

fn threshold_proof(threshold_met: bool, salt: &[u8; SALT_SIZE], value: f64) -> Hash256 {
    Hash256::hash(
        &CanonicalEncoder::new(purposes::THRESHOLD_PROOF)
            .u8(u8::from(threshold_met))
            .bytes(salt)
            .bytes(&bucket(value).to_be_bytes())
            .finish(),
    )
}

/// Commit to `value`. A random salt is drawn when `salt` is `None`.
///
/// # Errors
///
/// `NonFiniteValue` for NaN or infinite input.
pub fn commit(
    kind: CommitmentKind,
    value: f64,
    subject_id: &str,
    timestamp_ms: u64,
    salt: Option<[u8; SALT_SIZE]>,
) -> Result<Commitment> {
    if !value.is_finite() {
        return Err(ProofError::NonFiniteValue);
    }
    let salt = salt.unwrap_or_else(|| {
        let mut s = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut s);
        s
    });
    let threshold_met = value >= kind.threshold();
    Ok(Commitment {
        commitment_hash: commitment_hash(value, subject_id, timestamp_ms, &salt),
        threshold_met,
        threshold_proof: threshold_proof(threshold_met, &salt, value),
        salt,
        timestamp_ms,
        subject_id: subject_id.to_string(),
        kind,
    })
}

/// Check a claimed value against `commitment`. Any mismatch fails.
pub fn verify_commitment(
    commitment: &Commitment,
    claimed_value: f64,
    subject_id: &str,
    timestamp_ms: u64,
) -> bool {
    if !claimed_value.is_finite() {
        return false;
    }
    let hash = commitment_hash(claimed_value, subject_id, timestamp_ms, &commitment.salt);
    let met = claimed_value >= commitment.kind.threshold();
    let proof = threshold_proof(met, &commitment.salt, claimed_value);

    let hash_ok = hash.ct_eq(&commitment.commitment_hash);
    let proof_ok = proof.ct_eq(&commitment.threshold_proof);
    bool::from(hash_ok & proof_ok) && met == commitment.threshold_met
}

impl Commitment {
    /// See [`verify_commitment`].
    pub fn verify(&self, claimed_value: f64, subject_id: &str, timestamp_ms: u64) -> bool {
        verify_commitment(self, claimed_value, subject_id, timestamp_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: u64 = 1_750_000_000_000;
    const SALT: [u8; SALT_SIZE] = [7u8; SALT_SIZE];

    #[test]
    fn test_commit_and_verify() {
        let c = commit(CommitmentKind::Emotional, 80.0, "validator-1", TS, None).unwrap();
        assert!(c.threshold_met);
        assert!(c.verify(80.0, "validator-1", TS));
    }

    #[test]
    fn test_wrong_value_fails() {
        let c = commit(CommitmentKind::Emotional, 80.0, "validator-1", TS, None).unwrap();
        assert!(!c.verify(60.0, "validator-1", TS));
        assert!(!c.verify(81.0, "validator-1", TS));
    }

    #[test]
    fn test_wrong_subject_or_time_fails() {
        let c = commit(CommitmentKind::Emotional, 80.0, "validator-1", TS, None).unwrap();
        assert!(!c.verify(80.0, "validator-2", TS));
        assert!(!c.verify(80.0, "validator-1", TS + 1));
    }

    #[test]
    fn test_deterministic_with_salt() {
        let a = commit(CommitmentKind::Emotional, 80.0, "v", TS, Some(SALT)).unwrap();
        let b = commit(CommitmentKind::Emotional, 80.0, "v", TS, Some(SALT)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_one_unit_changes_hash() {
        let a = commit(CommitmentKind::Emotional, 80.0, "v", TS, Some(SALT)).unwrap();
        let b = commit(CommitmentKind::Emotional, 81.0, "v", TS, Some(SALT)).unwrap();
        assert_ne!(a.commitment_hash, b.commitment_hash);
    }

    #[test]
    fn test_random_salts_differ() {
        let a = commit(CommitmentKind::Emotional, 80.0, "v", TS, None).unwrap();
        let b = commit(CommitmentKind::Emotional, 80.0, "v", TS, None).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.commitment_hash, b.commitment_hash);
    }

    #[test]
    fn test_thresholds() {
        assert!(!commit(CommitmentKind::Emotional, 74.99, "v", TS, None).unwrap().threshold_met);
        assert!(commit(CommitmentKind::Authenticity, 0.70, "v", TS, None).unwrap().threshold_met);
        assert!(!commit(CommitmentKind::Authenticity, 0.69, "v", TS, None).unwrap().threshold_met);
        let blended = eligibility_score(76.8, 0.94);
        assert!(commit(CommitmentKind::ConsensusEligibility, blended, "v", TS, None).unwrap().threshold_met);
    }

    #[test]
    fn test_flipped_threshold_flag_fails() {
        let mut c = commit(CommitmentKind::Emotional, 60.0, "v", TS, None).unwrap();
        c.threshold_met = true;
        assert!(!c.verify(60.0, "v", TS));
    }

    #[test]
    fn test_bucket_leak_is_observable() {
        // Same salt and flag: the threshold proof only depends on the decade
        let a = commit(CommitmentKind::Emotional, 81.0, "v", TS, Some(SALT)).unwrap();
        let b = commit(CommitmentKind::Emotional, 89.0, "v", TS, Some(SALT)).unwrap();
        let c = commit(CommitmentKind::Emotional, 91.0, "v", TS, Some(SALT)).unwrap();
        assert_eq!(a.threshold_proof, b.threshold_proof);
        assert_ne!(a.threshold_proof, c.threshold_proof);
    }

    #[test]
    fn test_non_finite_rejected() {
        assert_eq!(
            commit(CommitmentKind::Emotional, f64::NAN, "v", TS, None).unwrap_err(),
            ProofError::NonFiniteValue
        );
        let c = commit(CommitmentKind::Emotional, 80.0, "v", TS, None).unwrap();
        assert!(!c.verify(f64::INFINITY, "v", TS));
    }
}
