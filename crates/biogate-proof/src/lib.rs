//! # biogate-proof
//!
//! Biometric attestation for BIOGATE validators.
//!
//! - [`ProofEngine`]: signs readings into an [`AggregateProof`] and verifies
//!   them, singly or in parallel batches
//! - [`scoring`]: emotional, authenticity and consistency scores
//! - [`commitment`]: salted commitments that reveal only a threshold flag
//! - [`QuorumAttestation`]: t-of-n signatures from a declared signer set
//!
//! ## Example
//!
//! ```
//! use biogate_crypto::SigningKeyPair;
//! use biogate_proof::{ProofConfig, ProofEngine};
//! use biogate_protocol::{Reading, SignalType};
//!
//! let now = 1_750_000_000_000;
//! let key = SigningKeyPair::generate();
//! let readings = vec![
//!     Reading::new("watch", SignalType::HeartRate, 72.0, "bpm", now, 0.95).unwrap(),
//! ];
//! let engine = ProofEngine::new(ProofConfig::default());
//! let proof = engine.generate_proof_at(&readings, &key, now).unwrap();
//! assert!(engine.verify(&proof, &key.public_key(), now));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod commitment;
pub mod error;
pub mod proof;
pub mod quorum;
pub mod scoring;

#[cfg(test)]
mod proptests;

pub use commitment::{commit, eligibility_score, verify_commitment, Commitment, CommitmentKind};
pub use error::{ProofError, ProofRejection, Result};
pub use proof::{
    check_proof, verify_proof, AggregateProof, DeviceProof, ProofConfig, ProofEngine,
    DEFAULT_JITTER_AMPLITUDE,
};
pub use quorum::QuorumAttestation;
pub use scoring::{compute_scores, ScoreBreakdown};
