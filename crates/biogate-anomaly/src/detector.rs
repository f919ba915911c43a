//! Anomaly scoring over reading histories.
//!
//! Four independent dimensions are scored in [0, 1]:
//!
//! - **Pattern deviation**: share of values more than `outlier_sigma`
//!   standard deviations from their signal type's mean, times
//!   `deviation_scale`.
//! - **Temporal**: share of consecutive gaps outside
//!   `[min_gap_ms, max_gap_ms]`, times `temporal_scale`.
//! - **Device tampering**: penalties for too many distinct devices and for
//!   low mean quality.
//! - **Value manipulation**: a penalty when most values are multiples of 5,
//!   plus a penalty per implausible jump between consecutive readings of
//!   the same signal.
//!
//! The verdict's severity is the highest dimension score.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use biogate_protocol::{Reading, SignalType};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::AnomalyConfig;
use crate::error::Result;
use crate::verdict::{AnomalyVerdict, DimensionScores, Severity};

fn by_signal<'a>(readings: &[&'a Reading]) -> BTreeMap<SignalType, Vec<&'a Reading>> {
    let mut groups: BTreeMap<SignalType, Vec<&Reading>> = BTreeMap::new();
    for r in readings {
        groups.entry(r.signal_type()).or_default().push(r);
    }
    groups
}

fn time_ordered(readings: &[Reading]) -> Vec<&Reading> {
    let mut ordered: Vec<&Reading> = readings.iter().collect();
    ordered.sort_by_key(|r| r.timestamp_ms());
    ordered
}

/// Outlier share across signal types, scaled and capped.
pub fn pattern_deviation(readings: &[Reading], config: &AnomalyConfig) -> f64 {
    if readings.is_empty() {
        return 0.0;
    }
    let refs: Vec<&Reading> = readings.iter().collect();
    let mut outliers = 0usize;
    for group in by_signal(&refs).values() {
        if group.len() < 2 {
            continue;
        }
        let n = group.len() as f64;
        let mean = group.iter().map(|r| r.value()).sum::<f64>() / n;
        let std_dev = (group.iter().map(|r| (r.value() - mean).powi(2)).sum::<f64>() / n).sqrt();
        if std_dev == 0.0 {
            continue;
        }
        let limit = config.outlier_sigma * std_dev;
        outliers += group
            .iter()
            .filter(|r| (r.value() - mean).abs() > limit)
            .count();
    }
    (outliers as f64 / readings.len() as f64 * config.deviation_scale).clamp(0.0, 1.0)
}

/// Share of implausible gaps between consecutive readings, scaled and capped.
pub fn temporal_inconsistency(readings: &[Reading], config: &AnomalyConfig) -> f64 {
    let ordered = time_ordered(readings);
    if ordered.len() < 2 {
        return 0.0;
    }
    let gaps = ordered.len() - 1;
    let bad = ordered
        .windows(2)
        .filter(|w| {
            let gap = w[1].timestamp_ms() - w[0].timestamp_ms();
            gap < config.min_gap_ms || gap > config.max_gap_ms
        })
        .count();
    (bad as f64 / gaps as f64 * config.temporal_scale).clamp(0.0, 1.0)
}

/// Penalties for too many devices and for low mean quality.
pub fn device_tampering(readings: &[Reading], config: &AnomalyConfig) -> f64 {
    if readings.is_empty() {
        return 0.0;
    }
    let mut score = 0.0;
    let devices: HashSet<&str> = readings.iter().map(Reading::device_id).collect();
    if devices.len() > config.max_devices {
        score += config.device_count_penalty;
    }
    let mean_quality = readings.iter().map(Reading::quality).sum::<f64>() / readings.len() as f64;
    if mean_quality < config.min_mean_quality {
        score += config.low_quality_penalty;
    }
    f64::min(score, 1.0)
}

fn is_round(value: f64) -> bool {
    let fifths = value / 5.0;
    (fifths - fifths.round()).abs() < 1e-9
}

/// Penalties for round-number clustering and implausible jumps.
pub fn value_manipulation(readings: &[Reading], config: &AnomalyConfig) -> f64 {
    if readings.is_empty() {
        return 0.0;
    }
    let mut score = 0.0;

    let round = readings.iter().filter(|r| is_round(r.value())).count();
    if round as f64 / readings.len() as f64 > config.round_value_ratio {
        score += config.round_value_penalty;
    }

    let ordered = time_ordered(readings);
    for group in by_signal(&ordered).values() {
        for pair in group.windows(2) {
            let prev = pair[0].value();
            if prev == 0.0 {
                continue;
            }
            if ((pair[1].value() - prev) / prev).abs() > config.jump_ratio {
                score += config.jump_penalty;
            }
        }
    }
    f64::min(score, 1.0)
}

/// Analyze a reading history without any stored state.
pub fn analyze_readings(
    validator_id: &str,
    readings: &[Reading],
    config: &AnomalyConfig,
) -> AnomalyVerdict {
    if readings.len() < config.min_readings {
        return AnomalyVerdict::insufficient(validator_id, readings.len());
    }

    let scores = DimensionScores {
        pattern_deviation: pattern_deviation(readings, config),
        temporal: temporal_inconsistency(readings, config),
        device_tampering: device_tampering(readings, config),
        value_manipulation: value_manipulation(readings, config),
    };
    let (dominant, confidence) = scores.dominant();
    let severity = Severity::from_score(confidence);

    AnomalyVerdict {
        validator_id: validator_id.to_string(),
        scores,
        severity_score: confidence,
        severity,
        action: severity.action(),
        dominant,
        confidence,
        insufficient_data: false,
        reading_count: readings.len(),
    }
}

/// Keeps bounded per-validator histories and analyzes them on demand.
#[derive(Debug)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
    histories: RwLock<HashMap<String, VecDeque<Reading>>>,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self {
            config: AnomalyConfig::default(),
            histories: RwLock::new(HashMap::new()),
        }
    }
}

impl AnomalyDetector {
    /// Create a detector after validating `config`.
    pub fn new(config: AnomalyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            histories: RwLock::new(HashMap::new()),
        })
    }

    /// Current thresholds.
    #[must_use]
    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Append readings to a validator's history, dropping the oldest beyond
    /// capacity. Readings that fail validation are skipped.
    pub fn record(&self, validator_id: &str, readings: &[Reading]) {
        let mut histories = self.histories.write();
        let history = histories.entry(validator_id.to_string()).or_default();
        for reading in readings {
            if let Err(e) = reading.validate() {
                debug!(validator = validator_id, error = %e, "Skipping invalid reading");
                continue;
            }
            if history.len() == self.config.history_capacity {
                history.pop_front();
            }
            history.push_back(reading.clone());
        }
    }

    /// Analyze a validator's current history.
    pub fn analyze(&self, validator_id: &str) -> AnomalyVerdict {
        let readings: Vec<Reading> = {
            let histories = self.histories.read();
            match histories.get(validator_id) {
                Some(history) => history.iter().cloned().collect(),
                None => Vec::new(),
            }
        };

        let verdict = analyze_readings(validator_id, &readings, &self.config);
        if verdict.severity >= Severity::High {
            info!(
                validator = validator_id,
                severity = ?verdict.severity,
                dominant = %verdict.dominant,
                confidence = verdict.confidence,
                "Anomalous reading pattern"
            );
        } else {
            debug!(
                validator = validator_id,
                action = %verdict.action,
                insufficient = verdict.insufficient_data,
                "Anomaly analysis complete"
            );
        }
        verdict
    }

    /// Record then analyze.
    pub fn record_and_analyze(&self, validator_id: &str, readings: &[Reading]) -> AnomalyVerdict {
        self.record(validator_id, readings);
        self.analyze(validator_id)
    }

    /// Drop a validator's history.
    pub fn forget(&self, validator_id: &str) -> bool {
        self.histories.write().remove(validator_id).is_some()
    }

    /// Readings held for a validator.
    pub fn history_len(&self, validator_id: &str) -> usize {
        self.histories
            .read()
            .get(validator_id)
            .map_or(0, VecDeque::len)
    }

    /// Validators with a stored history.
    pub fn tracked_validators(&self) -> usize {
        self.histories.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::{AnomalyAction, AnomalyDimension};

    const T0: u64 = 1_750_000_000_000;

    fn steady(n: usize) -> Vec<Reading> {
        (0..n)
            .map(|i| {
                let value = 70.3 + (i % 7) as f64 * 0.1;
                Reading::new("watch", SignalType::HeartRate, value, "bpm", T0 + i as u64 * 10_000, 0.9)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_insufficient_data() {
        let detector = AnomalyDetector::default();
        detector.record("v", &steady(5));
        let verdict = detector.analyze("v");
        assert!(verdict.insufficient_data);
        assert_eq!(verdict.action, AnomalyAction::Monitor);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn test_unknown_validator_is_insufficient() {
        assert!(AnomalyDetector::default().analyze("nobody").insufficient_data);
    }

    #[test]
    fn test_steady_history_is_clean() {
        let verdict = analyze_readings("v", &steady(50), &AnomalyConfig::default());
        assert!(!verdict.insufficient_data);
        assert_eq!(verdict.scores.temporal, 0.0);
        assert_eq!(verdict.scores.device_tampering, 0.0);
        assert_eq!(verdict.scores.value_manipulation, 0.0);
        assert_eq!(verdict.action, AnomalyAction::Monitor);
    }

    #[test]
    fn test_burst_timing_flagged() {
        let readings: Vec<Reading> = (0..20)
            .map(|i| Reading::new("watch", SignalType::HeartRate, 71.3, "bpm", T0 + i * 100, 0.9).unwrap())
            .collect();
        let verdict = analyze_readings("v", &readings, &AnomalyConfig::default());
        assert_eq!(verdict.scores.temporal, 1.0);
        assert_eq!(verdict.dominant, AnomalyDimension::Temporal);
        assert_eq!(verdict.action, AnomalyAction::Exclude);
        assert!(verdict.blocks_broadcast());
    }

    #[test]
    fn test_device_tampering() {
        let readings: Vec<Reading> = (0..12)
            .map(|i| {
                Reading::new(format!("dev-{}", i % 4), SignalType::Gsr, 2.1, "uS", T0 + i * 10_000, 0.3)
                    .unwrap()
            })
            .collect();
        let score = device_tampering(&readings, &AnomalyConfig::default());
        assert!((score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_round_values_and_jumps() {
        let values = [70.0, 75.0, 80.0, 160.0, 80.0, 85.0, 90.0, 95.0, 100.0, 105.0];
        let readings: Vec<Reading> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                Reading::new("watch", SignalType::HeartRate, v, "bpm", T0 + i as u64 * 10_000, 0.9).unwrap()
            })
            .collect();
        // Round values +0.3, jump 80 -> 160 +0.2, jump 160 -> 80 is exactly 50% and not counted
        let score = value_manipulation(&readings, &AnomalyConfig::default());
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_history_is_bounded() {
        let detector = AnomalyDetector::new(
            AnomalyConfig::default()
                .with_history_capacity(20)
                .with_min_readings(10),
        )
        .unwrap();
        detector.record("v", &steady(50));
        assert_eq!(detector.history_len("v"), 20);
        assert_eq!(detector.tracked_validators(), 1);
        assert!(detector.forget("v"));
        assert_eq!(detector.history_len("v"), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(AnomalyDetector::new(AnomalyConfig::default().with_history_capacity(0)).is_err());
    }
}
