//! Fuzz target for checking proofs parsed from untrusted JSON.

#![no_main]

use biogate_crypto::SigningKeyPair;
use biogate_proof::{AggregateProof, ProofConfig, ProofEngine};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(proof) = serde_json::from_slice::<AggregateProof>(data) else {
        return;
    };
    let key = SigningKeyPair::from_secret_bytes(&[7u8; 32]).unwrap();
    let engine = ProofEngine::new(ProofConfig::default());
    // Must reject cleanly, never panic.
    let _ = engine.check(&proof, &key.public_key(), proof.issued_at_ms);
});
