//! Fuzz target for SealedPayload::from_bytes.

#![no_main]

use biogate_crypto::SealedPayload;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(sealed) = SealedPayload::from_bytes(data) {
        let bytes = sealed.to_bytes();
        let again = SealedPayload::from_bytes(&bytes).unwrap();
        assert_eq!(again.to_bytes(), bytes);
    }
});
