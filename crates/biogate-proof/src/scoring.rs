//! Emotional, authenticity and consistency scores derived from readings.
//!
//! The emotional score blends four dimensions:
//!
//! | Dimension | Weight | Source |
//! |---|---|---|
//! | Heart-rate zone | 0.25 | mean heart rate |
//! | Inverted stress | 0.30 | `1 - mean stress` |
//! | Focus | 0.25 | mean focus |
//! | Device authenticity | 0.20 | mean reading quality |
//!
//! A dimension with no readings scores a neutral 0.5. The result is scaled
//! to [0, 100] and may carry a small uniform jitter. The jitter is fairness
//! noise for tie-breaking between validators. It is not a security control
//! and can be disabled by setting its amplitude to zero.

use std::collections::BTreeMap;

use biogate_protocol::{round2, Reading, SignalType};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Weight of the heart-rate zone.
pub const HEART_RATE_WEIGHT: f64 = 0.25;
/// Weight of inverted stress.
pub const STRESS_WEIGHT: f64 = 0.30;
/// Weight of focus.
pub const FOCUS_WEIGHT: f64 = 0.25;
/// Weight of device authenticity.
pub const DEVICE_WEIGHT: f64 = 0.20;

/// Lower edge of the ideal heart-rate zone (bpm).
pub const HEART_RATE_ZONE_LOW: f64 = 60.0;
/// Upper edge of the ideal heart-rate zone (bpm).
pub const HEART_RATE_ZONE_HIGH: f64 = 100.0;
/// Distance outside the zone at which the zone score reaches zero (bpm).
pub const HEART_RATE_FALLOFF: f64 = 40.0;

/// Score used for a dimension with no readings.
const NEUTRAL: f64 = 0.5;

/// Scores computed for one batch of readings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Emotional score in [0, 100], rounded to 2 dp.
    pub emotional_score: f64,
    /// Authenticity in [0, 1], rounded to 2 dp.
    pub authenticity: f64,
    /// Cross-reading consistency in [0, 1], rounded to 2 dp.
    pub consistency: f64,
}

/// 1.0 inside the ideal zone, falling linearly to 0 at
/// [`HEART_RATE_FALLOFF`] bpm outside it.
pub fn heart_rate_zone(bpm: f64) -> f64 {
    let distance = if bpm < HEART_RATE_ZONE_LOW {
        HEART_RATE_ZONE_LOW - bpm
    } else if bpm > HEART_RATE_ZONE_HIGH {
        bpm - HEART_RATE_ZONE_HIGH
    } else {
        0.0
    };
    (1.0 - distance / HEART_RATE_FALLOFF).clamp(0.0, 1.0)
}

/// Stress and focus arrive either as fractions or as percentages.
fn as_fraction(value: f64) -> f64 {
    let v = if value > 1.0 { value / 100.0 } else { value };
    v.clamp(0.0, 1.0)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

fn mean_of(readings: &[Reading], signal: SignalType) -> Option<f64> {
    mean(
        readings
            .iter()
            .filter(|r| r.signal_type() == signal)
            .map(Reading::value),
    )
}

/// Mean device-reported quality, or 0 for no readings.
pub fn device_authenticity(readings: &[Reading]) -> f64 {
    mean(readings.iter().map(Reading::quality)).unwrap_or(0.0)
}

/// Coefficient of variation of `values`, or `None` when the mean is zero.
///
/// Values are scaled by their largest magnitude first, which leaves the
/// ratio unchanged and keeps sums of extreme finite values from
/// overflowing.
fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let scale = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let n = values.len() as f64;
    let m = values.iter().map(|v| v / scale).sum::<f64>() / n;
    if m.abs() < f64::EPSILON {
        return None;
    }
    let variance = values
        .iter()
        .map(|v| (v / scale - m).powi(2))
        .sum::<f64>()
        / n;
    Some(variance.sqrt() / m.abs())
}

/// `1 - mean coefficient of variation` over signal types with at least
/// two readings. 1.0 when there is nothing to compare, 0.0 when the
/// variation cannot be represented.
pub fn consistency_score(readings: &[Reading]) -> f64 {
    let mut by_type: BTreeMap<SignalType, Vec<f64>> = BTreeMap::new();
    for r in readings {
        by_type.entry(r.signal_type()).or_default().push(r.value());
    }

    let cvs = by_type
        .values()
        .filter(|v| v.len() >= 2)
        .filter_map(|values| coefficient_of_variation(values));

    match mean(cvs) {
        Some(cv) if cv.is_finite() => (1.0 - cv).clamp(0.0, 1.0),
        Some(_) => 0.0,
        None => 1.0,
    }
}

/// `0.7 * mean quality + 0.3 * consistency`, in [0, 1].
pub fn authenticity(readings: &[Reading], consistency: f64) -> f64 {
    (0.7 * device_authenticity(readings) + 0.3 * consistency).clamp(0.0, 1.0)
}

/// Emotional score before jitter, in [0, 100].
pub fn base_emotional_score(readings: &[Reading]) -> f64 {
    let hr = mean_of(readings, SignalType::HeartRate)
        .map(heart_rate_zone)
        .unwrap_or(NEUTRAL);
    let calm = mean_of(readings, SignalType::Stress)
        .map(|s| 1.0 - as_fraction(s))
        .unwrap_or(NEUTRAL);
    let focus = mean_of(readings, SignalType::Focus)
        .map(as_fraction)
        .unwrap_or(NEUTRAL);
    let device = if readings.is_empty() {
        NEUTRAL
    } else {
        device_authenticity(readings)
    };

    let blended = HEART_RATE_WEIGHT * hr
        + STRESS_WEIGHT * calm
        + FOCUS_WEIGHT * focus
        + DEVICE_WEIGHT * device;
    (blended * 100.0).clamp(0.0, 100.0)
}

/// Compute every score for `readings`, adding uniform jitter in
/// `±jitter_amplitude` to the emotional score.
pub fn compute_scores<R: Rng>(
    readings: &[Reading],
    jitter_amplitude: f64,
    rng: &mut R,
) -> ScoreBreakdown {
    let jitter = if jitter_amplitude > 0.0 {
        rng.gen_range(-jitter_amplitude..=jitter_amplitude)
    } else {
        0.0
    };
    let consistency = consistency_score(readings);
    ScoreBreakdown {
        emotional_score: round2((base_emotional_score(readings) + jitter).clamp(0.0, 100.0)),
        authenticity: round2(authenticity(readings, consistency)),
        consistency: round2(consistency),
    }
}
