//! Fuzz target for Nonce::from_hex.

#![no_main]

use biogate_protocol::Nonce;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(nonce) = Nonce::from_hex(s) {
        // Only the canonical lowercase form parses, so it round-trips exactly.
        assert_eq!(nonce.to_hex(), s);
    }
});
