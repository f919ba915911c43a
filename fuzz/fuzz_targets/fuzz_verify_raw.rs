//! Fuzz target for verify_raw with arbitrary key and signature bytes.

#![no_main]

use biogate_crypto::verify_raw;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 96 {
        let _ = verify_raw(data, data, data);
        return;
    }
    let (public_key, rest) = data.split_at(32);
    let (signature, message) = rest.split_at(64);
    let _ = verify_raw(message, signature, public_key);
});
