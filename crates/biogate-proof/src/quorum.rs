//! t-of-n quorum attestations over a shared statement.
//!
//! Each member of a declared signer set signs the same statement with its
//! own Ed25519 key, and the attestation holds once `threshold` distinct
//! members have valid signatures. This is plain multisignature, not a
//! threshold scheme: signatures are individually carried and verified, and
//! the attestation grows with the number of signers.
//!
//! The statement binds the message to the signer set and threshold, so a
//! signature cannot be lifted into a quorum with different membership.

use std::collections::{BTreeMap, HashSet};

use biogate_crypto::{PublicKey, Signature, SigningKeyPair};
use biogate_protocol::{purposes, CanonicalEncoder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProofError, Result};

/// Maximum size of a signer set.
pub const MAX_QUORUM_SIGNERS: usize = 256;

/// Signatures from a declared set of signers over one message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuorumAttestation {
    message: Vec<u8>,
    signers: Vec<PublicKey>,
    threshold: usize,
    /// Signer index to signature.
    signatures: BTreeMap<usize, Signature>,
}

impl QuorumAttestation {
    /// Declare a quorum over `message`.
    ///
    /// # Errors
    ///
    /// `InvalidQuorum` when the set is empty, too large or has duplicates,
    /// or when `threshold` is 0 or larger than the set.
    pub fn new(message: Vec<u8>, signers: Vec<PublicKey>, threshold: usize) -> Result<Self> {
        if signers.is_empty() || signers.len() > MAX_QUORUM_SIGNERS {
            return Err(ProofError::InvalidQuorum(format!(
                "signer set size {} outside [1, {MAX_QUORUM_SIGNERS}]",
                signers.len()
            )));
        }
        let distinct: HashSet<[u8; 32]> = signers.iter().map(PublicKey::to_bytes).collect();
        if distinct.len() != signers.len() {
            return Err(ProofError::InvalidQuorum("duplicate signer".to_string()));
        }
        if threshold == 0 || threshold > signers.len() {
            return Err(ProofError::InvalidQuorum(format!(
                "threshold {threshold} outside [1, {}]",
                signers.len()
            )));
        }
        Ok(Self {
            message,
            signers,
            threshold,
            signatures: BTreeMap::new(),
        })
    }

    /// The attested message.
    #[must_use]
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Required number of distinct valid signers.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Declared signer set.
    #[must_use]
    pub fn signers(&self) -> &[PublicKey] {
        &self.signers
    }

    /// Bytes each signer signs.
    pub fn statement(&self) -> Vec<u8> {
        let mut enc = CanonicalEncoder::new(purposes::QUORUM)
            .u64(self.threshold as u64)
            .u64(self.signers.len() as u64);
        for signer in &self.signers {
            enc = enc.bytes(&signer.to_bytes());
        }
        enc.bytes(&self.message).finish()
    }

    /// Sign with `key`, which must belong to the signer set.
    pub fn sign(&mut self, key: &SigningKeyPair) -> Result<()> {
        let public = key.public_key();
        let index = self
            .signers
            .iter()
            .position(|s| *s == public)
            .ok_or_else(|| ProofError::InvalidQuorum("key is not a declared signer".to_string()))?;
        let signature = key.sign(&self.statement());
        self.signatures.insert(index, signature);
        Ok(())
    }

    /// Attach a signature produced elsewhere for signer `index`.
    pub fn attach(&mut self, index: usize, signature: Signature) -> Result<()> {
        if index >= self.signers.len() {
            return Err(ProofError::InvalidQuorum(format!("signer index {index} out of range")));
        }
        self.signatures.insert(index, signature);
        Ok(())
    }

    /// Number of distinct signers whose signatures verify.
    pub fn valid_signers(&self) -> usize {
        let statement = self.statement();
        self.signatures
            .iter()
            .filter(|(index, signature)| {
                self.signers
                    .get(**index)
                    .is_some_and(|pk| pk.verify(&statement, signature))
            })
            .count()
    }

    /// Whether at least `threshold` distinct declared signers signed.
    pub fn verify(&self) -> bool {
        let valid = self.valid_signers();
        debug!(valid, threshold = self.threshold, "Quorum attestation checked");
        valid >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<SigningKeyPair> {
        (0..n).map(|_| SigningKeyPair::generate()).collect()
    }

    fn quorum(keys: &[SigningKeyPair], threshold: usize) -> QuorumAttestation {
        let pks = keys.iter().map(SigningKeyPair::public_key).collect();
        QuorumAttestation::new(b"round-42".to_vec(), pks, threshold).unwrap()
    }

    #[test]
    fn test_threshold_reached() {
        let keys = keys(3);
        let mut q = quorum(&keys, 2);
        q.sign(&keys[0]).unwrap();
        assert!(!q.verify());
        q.sign(&keys[2]).unwrap();
        assert!(q.verify());
    }

    #[test]
    fn test_same_signer_counts_once() {
        let keys = keys(3);
        let mut q = quorum(&keys, 2);
        q.sign(&keys[1]).unwrap();
        q.sign(&keys[1]).unwrap();
        assert_eq!(q.valid_signers(), 1);
        assert!(!q.verify());
    }

    #[test]
    fn test_outsider_cannot_sign() {
        let keys = keys(2);
        let mut q = quorum(&keys, 1);
        assert!(q.sign(&SigningKeyPair::generate()).is_err());
    }

    #[test]
    fn test_forged_signature_not_counted() {
        let keys = keys(2);
        let mut q = quorum(&keys, 2);
        q.sign(&keys[0]).unwrap();
        let forged = keys[0].sign(&q.statement());
        q.attach(1, forged).unwrap();
        assert_eq!(q.valid_signers(), 1);
        assert!(!q.verify());
    }

    #[test]
    fn test_signature_bound_to_signer_set() {
        let keys = keys(3);
        let mut small = quorum(&keys[..2], 1);
        small.sign(&keys[0]).unwrap();
        let lifted = small.signatures[&0];

        let mut large = quorum(&keys, 1);
        large.attach(0, lifted).unwrap();
        assert!(!large.verify());
    }

    #[test]
    fn test_invalid_parameters() {
        let keys = keys(2);
        let pks: Vec<PublicKey> = keys.iter().map(SigningKeyPair::public_key).collect();
        assert!(QuorumAttestation::new(vec![], pks.clone(), 0).is_err());
        assert!(QuorumAttestation::new(vec![], pks.clone(), 3).is_err());
        assert!(QuorumAttestation::new(vec![], vec![], 1).is_err());
        assert!(QuorumAttestation::new(vec![], vec![pks[0], pks[0]], 1).is_err());
    }
}
