//! Fuzz target for InboundEnvelope parsing and payload decoding.

#![no_main]

use biogate_core::InboundEnvelope;
use libfuzzer_sys::fuzz_target;

const MAX_BYTES: usize = 64 * 1024;

fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = InboundEnvelope::from_bytes(data, MAX_BYTES) {
        if let Ok(message) = envelope.decode(MAX_BYTES) {
            assert_eq!(message.kind(), envelope.kind);
        }
    }
});
