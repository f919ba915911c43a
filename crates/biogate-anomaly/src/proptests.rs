//! Property-based tests for anomaly scoring.

use biogate_protocol::{Reading, SignalType};
use proptest::prelude::*;

use crate::{analyze_readings, AnomalyConfig, Severity};

fn reading() -> impl Strategy<Value = Reading> {
    (
        0usize..6,
        prop::sample::select(SignalType::ALL.to_vec()),
        -1_000.0f64..1_000.0,
        0u64..10_000_000,
        0.0f64..=1.0,
    )
        .prop_map(|(device, signal, value, ts, quality)| {
            Reading::new(format!("dev-{device}"), signal, value, "", ts, quality).unwrap()
        })
}

proptest! {
    /// Every dimension and the combined severity stay within [0, 1].
    #[test]
    fn scores_bounded(readings in prop::collection::vec(reading(), 0..120)) {
        let verdict = analyze_readings("v", &readings, &AnomalyConfig::default());
        for score in [
            verdict.scores.pattern_deviation,
            verdict.scores.temporal,
            verdict.scores.device_tampering,
            verdict.scores.value_manipulation,
            verdict.severity_score,
            verdict.confidence,
        ] {
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }

    /// Severity is the bucket of the highest dimension.
    #[test]
    fn severity_matches_max(readings in prop::collection::vec(reading(), 10..80)) {
        let verdict = analyze_readings("v", &readings, &AnomalyConfig::default());
        let s = verdict.scores;
        let max = s.pattern_deviation
            .max(s.temporal)
            .max(s.device_tampering)
            .max(s.value_manipulation);
        prop_assert_eq!(verdict.severity_score, max);
        prop_assert_eq!(verdict.severity, Severity::from_score(max));
        prop_assert_eq!(verdict.action, verdict.severity.action());
    }

    /// Short histories never produce a confident verdict.
    #[test]
    fn short_history_insufficient(readings in prop::collection::vec(reading(), 0..10)) {
        let verdict = analyze_readings("v", &readings, &AnomalyConfig::default());
        prop_assert!(verdict.insufficient_data);
        prop_assert_eq!(verdict.severity, Severity::Low);
    }
}
