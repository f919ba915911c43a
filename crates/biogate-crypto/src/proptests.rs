//! Property-based tests for the signature engine and hashing.

use proptest::prelude::*;

use crate::{
    decrypt_with_aad, encrypt_with_aad, verify, verify_raw, Hash256, PublicKey, SealingKey,
    Signature, SigningKeyPair,
};

proptest! {
    /// Any message signed with a key verifies under its public key.
    #[test]
    fn sign_verify_roundtrip(message in prop::collection::vec(any::<u8>(), 0..512)) {
        let key = SigningKeyPair::generate();
        let sig = key.sign(&message);
        prop_assert!(verify(&message, &sig, &key.public_key()));
    }

    /// Flipping any bit of the message breaks verification.
    #[test]
    fn bit_flip_in_message_rejected(
        message in prop::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = SigningKeyPair::generate();
        let sig = key.sign(&message);
        let mut tampered = message.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= 1 << bit;
        prop_assert!(!verify(&tampered, &sig, &key.public_key()));
    }

    /// Flipping any bit of the signature breaks verification.
    #[test]
    fn bit_flip_in_signature_rejected(
        message in prop::collection::vec(any::<u8>(), 0..128),
        index in 0usize..64,
        bit in 0u8..8,
    ) {
        let key = SigningKeyPair::generate();
        let mut sig = key.sign(&message).to_bytes();
        sig[index] ^= 1 << bit;
        prop_assert!(!verify_raw(&message, &sig, &key.public_key().to_bytes()));
    }

    /// Arbitrary bytes never make raw verification panic.
    #[test]
    fn verify_raw_never_panics(
        message in prop::collection::vec(any::<u8>(), 0..64),
        sig in prop::collection::vec(any::<u8>(), 0..100),
        pk in prop::collection::vec(any::<u8>(), 0..40),
    ) {
        let _ = verify_raw(&message, &sig, &pk);
        let _ = Signature::from_bytes(&sig);
        let _ = PublicKey::from_bytes(&pk);
    }

    /// Hashing is a function of its input.
    #[test]
    fn hash_many_deterministic(a in prop::collection::vec(any::<u8>(), 0..64), b in prop::collection::vec(any::<u8>(), 0..64)) {
        prop_assert_eq!(Hash256::hash_many(&[&a, &b]), Hash256::hash_many(&[&a, &b]));
    }

    /// Sealing then opening with matching AAD returns the plaintext.
    #[test]
    fn seal_open_roundtrip(
        plaintext in prop::collection::vec(any::<u8>(), 0..512),
        aad in prop::collection::vec(any::<u8>(), 0..32),
    ) {
        let key = SealingKey::generate();
        let sealed = encrypt_with_aad(&key, &plaintext, &aad).unwrap();
        prop_assert_eq!(decrypt_with_aad(&key, &sealed, &aad).unwrap(), plaintext);
    }
}
