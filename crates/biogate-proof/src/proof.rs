//! Device proofs and aggregate biometric proofs.
//!
//! An [`AggregateProof`] binds a set of signed readings to the scores
//! derived from them, an issue time and a nonce.
//!
//! ## Construction
//!
//! 1. Each reading is signed on its own ([`DeviceProof`]).
//! 2. The canonical payload lists the readings in a fixed order followed by
//!    the scores, device count, issue time and nonce.
//! 3. `proof_hash = H(payload)` and `aggregate_signature = sign(payload)`.
//! 4. `freshness_signature = sign(issued_at || proof_hash)`.
//! 5. `anti_tamper_hash = H(proof_hash || aggregate_signature || freshness_signature)`.
//!
//! ## Security
//!
//! Verification recomputes the payload from the proof's own fields, so a
//! change to any reading, score or count breaks the aggregate signature.
//! Verification never panics and never returns an error for bad input;
//! it yields a [`ProofRejection`].

use std::collections::HashSet;

use biogate_crypto::{Hash256, PublicKey, Signature, SigningKeyPair};
use biogate_protocol::limits::{
    DEFAULT_MAX_PROOF_AGE_MS, MAX_CLOCK_SKEW_MS, MAX_READINGS_PER_PROOF,
};
use biogate_protocol::{now_ms, purposes, CanonicalEncoder, Nonce, Reading, ReplayGuard};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProofError, ProofRejection, Result};
use crate::scoring::compute_scores;

/// Default emotional score jitter amplitude.
pub const DEFAULT_JITTER_AMPLITUDE: f64 = 0.5;

/// Largest jitter amplitude accepted by configuration.
pub const MAX_JITTER_AMPLITUDE: f64 = 5.0;

/// Proof engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofConfig {
    /// Maximum age of the newest reading.
    pub max_age_ms: u64,
    /// How far readings may lie in the future.
    pub max_clock_skew_ms: u64,
    /// Emotional score jitter in points; 0 disables it.
    pub jitter_amplitude: f64,
    /// Maximum readings per proof.
    pub max_readings: usize,
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            max_age_ms: DEFAULT_MAX_PROOF_AGE_MS,
            max_clock_skew_ms: MAX_CLOCK_SKEW_MS,
            jitter_amplitude: DEFAULT_JITTER_AMPLITUDE,
            max_readings: MAX_READINGS_PER_PROOF,
        }
    }
}

impl ProofConfig {
    /// Set the maximum proof age.
    pub fn with_max_age_ms(mut self, max_age_ms: u64) -> Self {
        self.max_age_ms = max_age_ms;
        self
    }

    /// Set the allowed clock skew.
    pub fn with_max_clock_skew_ms(mut self, skew_ms: u64) -> Self {
        self.max_clock_skew_ms = skew_ms;
        self
    }

    /// Set the jitter amplitude.
    pub fn with_jitter_amplitude(mut self, amplitude: f64) -> Self {
        self.jitter_amplitude = amplitude;
        self
    }

    /// Set the per-proof reading limit.
    pub fn with_max_readings(mut self, max_readings: usize) -> Self {
        self.max_readings = max_readings;
        self
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_age_ms == 0 {
            return Err(ProofError::InvalidConfig {
                field: "max_age_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(0.0..=MAX_JITTER_AMPLITUDE).contains(&self.jitter_amplitude) {
            return Err(ProofError::InvalidConfig {
                field: "jitter_amplitude",
                reason: format!("must be within [0, {MAX_JITTER_AMPLITUDE}]"),
            });
        }
        if self.max_readings == 0 || self.max_readings > MAX_READINGS_PER_PROOF {
            return Err(ProofError::InvalidConfig {
                field: "max_readings",
                reason: format!("must be within [1, {MAX_READINGS_PER_PROOF}]"),
            });
        }
        Ok(())
    }
}

/// A single reading with its device signature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceProof {
    /// The signed reading.
    pub reading: Reading,
    /// Signature over [`Reading::canonical_bytes`].
    pub signature: Signature,
}

impl DeviceProof {
    /// Sign `reading` with `key`.
    pub fn sign(reading: Reading, key: &SigningKeyPair) -> Self {
        let signature = key.sign(&reading.canonical_bytes());
        Self { reading, signature }
    }

    /// Check the signature against `public_key`.
    pub fn verify(&self, public_key: &PublicKey) -> bool {
        public_key.verify(&self.reading.canonical_bytes(), &self.signature)
    }
}

/// A signed bundle of readings and the scores derived from them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateProof {
    /// Per-reading proofs in canonical order.
    pub device_proofs: Vec<DeviceProof>,
    /// Signature over the canonical payload.
    pub aggregate_signature: Signature,
    /// Signature over `issued_at_ms || proof_hash`.
    pub freshness_signature: Signature,
    /// Digest over the hash and both signatures.
    pub anti_tamper_hash: Hash256,
    /// Emotional score in [0, 100].
    pub emotional_score: f64,
    /// Authenticity in [0, 1].
    pub authenticity: f64,
    /// Consistency in [0, 1].
    pub consistency_score: f64,
    /// Number of distinct devices.
    pub device_count: u32,
    /// When the proof was generated.
    pub issued_at_ms: u64,
    /// Digest of the canonical payload.
    pub proof_hash: Hash256,
    /// Single-use nonce.
    pub nonce: Nonce,
}

impl AggregateProof {
    /// Readings in the proof.
    pub fn readings(&self) -> impl Iterator<Item = &Reading> {
        self.device_proofs.iter().map(|p| &p.reading)
    }

    /// Timestamp of the newest reading.
    pub fn newest_reading_ms(&self) -> Option<u64> {
        self.readings().map(Reading::timestamp_ms).max()
    }

    /// Recompute the canonical payload from this proof's fields.
    pub fn canonical_payload(&self) -> Vec<u8> {
        let mut readings: Vec<&Reading> = self.readings().collect();
        readings.sort_by(|a, b| a.canonical_cmp(b));

        let mut enc = CanonicalEncoder::new(purposes::AGGREGATE_PROOF).u64(readings.len() as u64);
        for r in readings {
            enc = enc
                .str(r.device_id())
                .u8(r.signal_type().tag())
                .f64(r.value())
                .str(r.unit())
                .u64(r.timestamp_ms())
                .f64(r.quality());
        }
        enc.f64(self.emotional_score)
            .f64(self.authenticity)
            .u64(u64::from(self.device_count))
            .f64(self.consistency_score)
            .u64(self.issued_at_ms)
            .bytes(self.nonce.as_bytes())
            .finish()
    }

    /// Bytes covered by the freshness signature.
    pub fn freshness_message(issued_at_ms: u64, proof_hash: &Hash256) -> Vec<u8> {
        CanonicalEncoder::new(purposes::FRESHNESS)
            .u64(issued_at_ms)
            .bytes(proof_hash.as_bytes())
            .finish()
    }

    /// Digest binding the proof hash to both signatures.
    pub fn compute_anti_tamper_hash(
        proof_hash: &Hash256,
        aggregate_signature: &Signature,
        freshness_signature: &Signature,
    ) -> Hash256 {
        Hash256::hash(
            &CanonicalEncoder::new(purposes::ANTI_TAMPER)
                .bytes(proof_hash.as_bytes())
                .bytes(&aggregate_signature.to_bytes())
                .bytes(&freshness_signature.to_bytes())
                .finish(),
        )
    }
}

fn distinct_devices<'a>(readings: impl Iterator<Item = &'a Reading>) -> u32 {
    let devices: HashSet<&str> = readings.map(Reading::device_id).collect();
    u32::try_from(devices.len()).unwrap_or(u32::MAX)
}

/// Generates and verifies aggregate proofs.
#[derive(Debug, Clone, Default)]
pub struct ProofEngine {
    config: ProofConfig,
}

impl ProofEngine {
    /// Create an engine with `config`.
    pub fn new(config: ProofConfig) -> Self {
        Self { config }
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &ProofConfig {
        &self.config
    }

    /// Generate a proof issued now.
    pub fn generate_proof(&self, readings: &[Reading], key: &SigningKeyPair) -> Result<AggregateProof> {
        self.generate_proof_at(readings, key, now_ms())
    }

    /// Generate a proof issued at `issued_at_ms`.
    ///
    /// # Errors
    ///
    /// `EmptyInput` for no readings, `TooManyReadings` above the limit, and
    /// `Protocol` for a reading that fails validation.
    pub fn generate_proof_at(
        &self,
        readings: &[Reading],
        key: &SigningKeyPair,
        issued_at_ms: u64,
    ) -> Result<AggregateProof> {
        if readings.is_empty() {
            return Err(ProofError::EmptyInput);
        }
        if readings.len() > self.config.max_readings {
            return Err(ProofError::TooManyReadings {
                count: readings.len(),
                max: self.config.max_readings,
            });
        }
        for reading in readings {
            reading.validate()?;
        }

        let mut ordered = readings.to_vec();
        ordered.sort_by(|a, b| a.canonical_cmp(b));

        let scores = compute_scores(&ordered, self.config.jitter_amplitude, &mut rand::thread_rng());
        let device_count = distinct_devices(ordered.iter());
        let device_proofs: Vec<DeviceProof> = ordered
            .into_iter()
            .map(|r| DeviceProof::sign(r, key))
            .collect();

        // Signatures are filled in below once the payload is fixed
        let placeholder = key.sign(b"");
        let mut proof = AggregateProof {
            device_proofs,
            aggregate_signature: placeholder,
            freshness_signature: placeholder,
            anti_tamper_hash: Hash256::default(),
            emotional_score: scores.emotional_score,
            authenticity: scores.authenticity,
            consistency_score: scores.consistency,
            device_count,
            issued_at_ms,
            proof_hash: Hash256::default(),
            nonce: Nonce::generate(),
        };

        let payload = proof.canonical_payload();
        proof.proof_hash = Hash256::hash(&payload);
        proof.aggregate_signature = key.sign(&payload);
        proof.freshness_signature =
            key.sign(&AggregateProof::freshness_message(issued_at_ms, &proof.proof_hash));
        proof.anti_tamper_hash = AggregateProof::compute_anti_tamper_hash(
            &proof.proof_hash,
            &proof.aggregate_signature,
            &proof.freshness_signature,
        );

        debug!(
            readings = proof.device_proofs.len(),
            devices = proof.device_count,
            proof_hash = %proof.proof_hash,
            "Generated aggregate proof"
        );
        Ok(proof)
    }

    /// Verify with the configured maximum age.
    pub fn verify(&self, proof: &AggregateProof, public_key: &PublicKey, now_ms: u64) -> bool {
        self.check(proof, public_key, now_ms).is_ok()
    }

    /// Verify and report the first failure found.
    pub fn check(
        &self,
        proof: &AggregateProof,
        public_key: &PublicKey,
        now_ms: u64,
    ) -> std::result::Result<(), ProofRejection> {
        check_proof_with(
            proof,
            public_key,
            self.config.max_age_ms,
            self.config.max_clock_skew_ms,
            self.config.max_readings,
            now_ms,
        )
    }

    /// Consume the proof's nonce, then verify.
    ///
    /// The nonce is scoped to `public_key` and spent even when verification
    /// fails, so a rejected proof can never be resubmitted unchanged. It is
    /// remembered until the proof would go stale, which may be later than
    /// the guard's window when readings are dated ahead of `now_ms`.
    pub fn accept_proof(
        &self,
        proof: &AggregateProof,
        public_key: &PublicKey,
        now_ms: u64,
        guard: &ReplayGuard,
    ) -> std::result::Result<(), ProofRejection> {
        let stale_after_ms = proof
            .newest_reading_ms()
            .unwrap_or(0)
            .saturating_add(self.config.max_age_ms)
            .saturating_add(1);
        let fresh_nonce = guard.check_and_consume_scoped(
            &public_key.to_bytes(),
            &proof.nonce,
            now_ms,
            stale_after_ms,
        );
        let outcome = self.check(proof, public_key, now_ms);
        if !fresh_nonce {
            return Err(ProofRejection::ReplayedNonce);
        }
        outcome
    }

    /// Verify many proofs in parallel. Output order matches input order.
    pub fn verify_batch(&self, items: &[(AggregateProof, PublicKey)], now_ms: u64) -> Vec<bool> {
        items
            .par_iter()
            .map(|(proof, pk)| self.verify(proof, pk, now_ms))
            .collect()
    }
}

/// Verify a proof with an explicit maximum age and default skew allowance.
pub fn verify_proof(proof: &AggregateProof, public_key: &PublicKey, max_age_ms: u64, now_ms: u64) -> bool {
    check_proof(proof, public_key, max_age_ms, now_ms).is_ok()
}

/// [`verify_proof`] reporting why it failed.
pub fn check_proof(
    proof: &AggregateProof,
    public_key: &PublicKey,
    max_age_ms: u64,
    now_ms: u64,
) -> std::result::Result<(), ProofRejection> {
    check_proof_with(
        proof,
        public_key,
        max_age_ms,
        MAX_CLOCK_SKEW_MS,
        MAX_READINGS_PER_PROOF,
        now_ms,
    )
}

fn check_structure(proof: &AggregateProof, max_readings: usize) -> std::result::Result<(), ProofRejection> {
    if proof.device_proofs.is_empty() {
        return Err(ProofRejection::Malformed("no readings".to_string()));
    }
    if proof.device_proofs.len() > max_readings {
        return Err(ProofRejection::Malformed(format!(
            "{} readings exceeds {max_readings}",
            proof.device_proofs.len()
        )));
    }
    for reading in proof.readings() {
        reading
            .validate()
            .map_err(|e| ProofRejection::Malformed(e.to_string()))?;
    }
    if distinct_devices(proof.readings()) != proof.device_count {
        return Err(ProofRejection::Malformed("device count mismatch".to_string()));
    }
    if !(0.0..=100.0).contains(&proof.emotional_score) {
        return Err(ProofRejection::Malformed("emotional score out of range".to_string()));
    }
    if !(0.0..=1.0).contains(&proof.authenticity) || !(0.0..=1.0).contains(&proof.consistency_score) {
        return Err(ProofRejection::Malformed("score out of range".to_string()));
    }
    Ok(())
}

fn check_freshness(
    proof: &AggregateProof,
    max_age_ms: u64,
    max_skew_ms: u64,
    now_ms: u64,
) -> std::result::Result<(), ProofRejection> {
    let newest = proof.newest_reading_ms().unwrap_or(0);
    let ahead_ms = newest.max(proof.issued_at_ms).saturating_sub(now_ms);
    if ahead_ms > max_skew_ms {
        return Err(ProofRejection::FromFuture { ahead_ms });
    }
    let age_ms = now_ms.saturating_sub(newest);
    if age_ms > max_age_ms {
        return Err(ProofRejection::Stale { age_ms });
    }
    Ok(())
}

fn check_proof_with(
    proof: &AggregateProof,
    public_key: &PublicKey,
    max_age_ms: u64,
    max_skew_ms: u64,
    max_readings: usize,
    now_ms: u64,
) -> std::result::Result<(), ProofRejection> {
    let outcome = check_structure(proof, max_readings)
        .and_then(|()| check_freshness(proof, max_age_ms, max_skew_ms, now_ms))
        .and_then(|()| check_signatures(proof, public_key));

    if let Err(ref rejection) = outcome {
        debug!(proof_hash = %proof.proof_hash, %rejection, "Proof rejected");
    }
    outcome
}

fn check_signatures(proof: &AggregateProof, public_key: &PublicKey) -> std::result::Result<(), ProofRejection> {
    if let Some(index) = proof.device_proofs.iter().position(|p| !p.verify(public_key)) {
        return Err(ProofRejection::DeviceSignature { index });
    }

    let payload = proof.canonical_payload();
    if Hash256::hash(&payload) != proof.proof_hash
        || !public_key.verify(&payload, &proof.aggregate_signature)
    {
        return Err(ProofRejection::AggregateSignature);
    }

    let freshness = AggregateProof::freshness_message(proof.issued_at_ms, &proof.proof_hash);
    if !public_key.verify(&freshness, &proof.freshness_signature) {
        return Err(ProofRejection::FreshnessSignature);
    }

    let expected = AggregateProof::compute_anti_tamper_hash(
        &proof.proof_hash,
        &proof.aggregate_signature,
        &proof.freshness_signature,
    );
    if expected != proof.anti_tamper_hash {
        warn!(proof_hash = %proof.proof_hash, "Anti-tamper hash mismatch on signed proof");
        return Err(ProofRejection::AntiTamper);
    }
    Ok(())
}
