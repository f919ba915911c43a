//! Property-based tests for nonces, replay protection and freshness.

use proptest::prelude::*;

use crate::limits::{MAX_CLOCK_SKEW_MS, MIN_VALID_TIMESTAMP_MS};
use crate::{check_freshness, Nonce, ProtocolError, ReplayGuard};

proptest! {
    /// Every nonce is accepted exactly once, however many times it is offered.
    #[test]
    fn nonce_consumed_exactly_once(bytes in any::<[u8; 32]>(), attempts in 2usize..10) {
        let guard = ReplayGuard::default();
        let nonce = Nonce::from_array(bytes);
        let accepted = (0..attempts)
            .filter(|i| guard.check_and_consume_at(&nonce, MIN_VALID_TIMESTAMP_MS + *i as u64))
            .count();
        prop_assert_eq!(accepted, 1);
    }

    /// Distinct nonces never interfere with each other.
    #[test]
    fn distinct_nonces_independent(seeds in prop::collection::hash_set(any::<[u8; 32]>(), 1..50)) {
        let guard = ReplayGuard::default();
        for bytes in &seeds {
            prop_assert!(guard.check_and_consume_at(&Nonce::from_array(*bytes), MIN_VALID_TIMESTAMP_MS));
        }
        prop_assert_eq!(guard.len(), seeds.len());
    }

    /// Arbitrary strings never panic the nonce parser.
    #[test]
    fn nonce_parse_never_panics(s in ".{0,80}") {
        let _ = Nonce::from_hex(&s);
    }

    /// Wire encoding roundtrips.
    #[test]
    fn nonce_hex_roundtrip(bytes in any::<[u8; 32]>()) {
        let nonce = Nonce::from_array(bytes);
        prop_assert_eq!(Nonce::from_hex(&nonce.to_hex()).unwrap(), nonce);
    }

    /// Anything older than the window is stale.
    #[test]
    fn stale_always_rejected(age in 1u64..10_000_000, window in 0u64..1_000_000) {
        let now = MIN_VALID_TIMESTAMP_MS + 100_000_000;
        let ts = now - window - age;
        let is_stale = matches!(
            check_freshness(ts, now, window, MAX_CLOCK_SKEW_MS),
            Err(ProtocolError::Stale { .. })
        );
        prop_assert!(is_stale);
    }
}
