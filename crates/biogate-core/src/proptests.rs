//! Property-based tests for the envelope boundary.

use biogate_crypto::SigningKeyPair;
use biogate_protocol::Nonce;
use proptest::prelude::*;

use crate::envelope::{InboundEnvelope, PeerMessage};

proptest! {
    /// Arbitrary bytes never decode into an envelope that panics later.
    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        if let Ok(env) = InboundEnvelope::from_bytes(&bytes, 4096) {
            let _ = env.decode(4096);
        }
    }

    /// Changing any payload byte breaks the envelope signature.
    #[test]
    fn payload_bit_flip_breaks_signature(
        echo in any::<Option<u64>>(),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = SigningKeyPair::generate();
        let msg = PeerMessage::Heartbeat { echo_ms: echo };
        let mut env = InboundEnvelope::seal(&msg, &Nonce::generate(), 1_750_000_000_000, &key).unwrap();
        prop_assert!(env.verify_signature(&key.public_key()));
        let i = index.index(env.payload.len());
        env.payload[i] ^= 1 << bit;
        prop_assert!(!env.verify_signature(&key.public_key()));
    }
}
