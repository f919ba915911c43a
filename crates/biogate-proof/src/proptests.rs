//! Property-based tests for proofs, scores and commitments.

use biogate_crypto::{verify, SigningKeyPair};
use biogate_protocol::limits::DEFAULT_MAX_PROOF_AGE_MS;
use biogate_protocol::{Reading, SignalType};
use proptest::prelude::*;

use crate::commitment::{commit, CommitmentKind};
use crate::proof::{verify_proof, ProofConfig, ProofEngine};
use crate::scoring::compute_scores;

const NOW: u64 = 1_750_000_000_000;

fn signal() -> impl Strategy<Value = SignalType> {
    prop::sample::select(SignalType::ALL.to_vec())
}

fn reading() -> impl Strategy<Value = Reading> {
    (
        "[a-z]{1,8}",
        signal(),
        -500.0f64..500.0,
        0u64..60_000,
        0.0f64..=1.0,
    )
        .prop_map(|(device, signal, value, offset, quality)| {
            Reading::new(device, signal, value, "", NOW - offset, quality).unwrap()
        })
}

/// Any finite value, including magnitudes near `f64::MAX`.
fn finite_reading() -> impl Strategy<Value = Reading> {
    (
        signal(),
        prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO,
        0u64..60_000,
    )
        .prop_map(|(signal, value, offset)| {
            Reading::new("dev", signal, value, "", NOW - offset, 0.9).unwrap()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Extreme but finite values still yield in-range scores and a proof
    /// that verifies.
    #[test]
    fn finite_values_give_verifiable_proofs(readings in prop::collection::vec(finite_reading(), 1..12)) {
        let scores = compute_scores(&readings, 0.0, &mut rand::thread_rng());
        prop_assert!((0.0..=1.0).contains(&scores.authenticity));
        prop_assert!((0.0..=1.0).contains(&scores.consistency));

        let key = SigningKeyPair::generate();
        let engine = ProofEngine::new(ProofConfig::default());
        let proof = engine.generate_proof_at(&readings, &key, NOW).unwrap();
        prop_assert!(engine.verify(&proof, &key.public_key(), NOW));
    }

    /// Scores stay in range for any readings.
    #[test]
    fn scores_bounded(readings in prop::collection::vec(reading(), 1..40), jitter in 0.0f64..5.0) {
        let scores = compute_scores(&readings, jitter, &mut rand::thread_rng());
        prop_assert!((0.0..=100.0).contains(&scores.emotional_score));
        prop_assert!((0.0..=1.0).contains(&scores.authenticity));
        prop_assert!((0.0..=1.0).contains(&scores.consistency));
    }

    /// Generated proofs verify, and flipping any bit of the signed payload
    /// breaks the aggregate signature.
    #[test]
    fn payload_bit_flip_rejected(
        readings in prop::collection::vec(reading(), 1..8),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = SigningKeyPair::generate();
        let engine = ProofEngine::new(ProofConfig::default());
        let proof = engine.generate_proof_at(&readings, &key, NOW).unwrap();
        prop_assert!(engine.verify(&proof, &key.public_key(), NOW));

        let mut payload = proof.canonical_payload();
        let i = index.index(payload.len());
        payload[i] ^= 1 << bit;
        prop_assert!(!verify(&payload, &proof.aggregate_signature, &key.public_key()));
    }

    /// Perturbing any score invalidates the proof.
    #[test]
    fn score_tamper_rejected(readings in prop::collection::vec(reading(), 1..8), delta in 0.01f64..0.5) {
        let key = SigningKeyPair::generate();
        let engine = ProofEngine::new(ProofConfig::default());
        let proof = engine.generate_proof_at(&readings, &key, NOW).unwrap();

        let mut emotional = proof.clone();
        emotional.emotional_score = if proof.emotional_score > 50.0 {
            proof.emotional_score - delta
        } else {
            proof.emotional_score + delta
        };
        prop_assert!(!engine.verify(&emotional, &key.public_key(), NOW));

        let mut authentic = proof.clone();
        authentic.authenticity = if proof.authenticity > 0.5 {
            proof.authenticity - delta
        } else {
            proof.authenticity + delta
        };
        prop_assert!(!engine.verify(&authentic, &key.public_key(), NOW));
    }

    /// A proof past its maximum age never verifies.
    #[test]
    fn stale_proof_rejected(readings in prop::collection::vec(reading(), 1..8), extra in 1u64..1_000_000) {
        let key = SigningKeyPair::generate();
        let engine = ProofEngine::new(ProofConfig::default());
        let proof = engine.generate_proof_at(&readings, &key, NOW).unwrap();
        let newest = proof.newest_reading_ms().unwrap();
        let later = newest + DEFAULT_MAX_PROOF_AGE_MS + extra;
        prop_assert!(!verify_proof(&proof, &key.public_key(), DEFAULT_MAX_PROOF_AGE_MS, later));
    }

    /// Commitments are deterministic under a fixed salt and change with
    /// a one-unit change in value.
    #[test]
    fn commitment_deterministic_and_sensitive(
        value in -1_000.0f64..1_000.0,
        subject in "[a-z0-9]{1,16}",
        salt in any::<[u8; 32]>(),
    ) {
        let a = commit(CommitmentKind::Emotional, value, &subject, NOW, Some(salt)).unwrap();
        let b = commit(CommitmentKind::Emotional, value, &subject, NOW, Some(salt)).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert!(a.verify(value, &subject, NOW));
        prop_assert!(!a.verify(value + 1.0, &subject, NOW));
    }
}
