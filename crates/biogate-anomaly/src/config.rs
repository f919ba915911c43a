//! Anomaly detector thresholds.

use serde::{Deserialize, Serialize};

use crate::error::{AnomalyError, Result};

/// Default readings kept per validator.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1_000;

/// Default readings needed for a confident verdict.
pub const DEFAULT_MIN_READINGS: usize = 10;

/// Thresholds and weights for the four anomaly dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Readings kept per validator; older ones fall off.
    pub history_capacity: usize,
    /// Readings needed before a verdict is confident.
    pub min_readings: usize,

    /// Distance from the mean, in standard deviations, that counts as an outlier.
    pub outlier_sigma: f64,
    /// Multiplier applied to the outlier fraction.
    pub deviation_scale: f64,

    /// Smallest plausible gap between consecutive readings.
    pub min_gap_ms: u64,
    /// Largest plausible gap between consecutive readings.
    pub max_gap_ms: u64,
    /// Multiplier applied to the implausible-gap fraction.
    pub temporal_scale: f64,

    /// Distinct devices above which tampering is suspected.
    pub max_devices: usize,
    /// Penalty for too many devices.
    pub device_count_penalty: f64,
    /// Mean quality below which tampering is suspected.
    pub min_mean_quality: f64,
    /// Penalty for low mean quality.
    pub low_quality_penalty: f64,

    /// Share of round values (multiples of 5) above which manipulation is suspected.
    pub round_value_ratio: f64,
    /// Penalty for too many round values.
    pub round_value_penalty: f64,
    /// Relative change between consecutive same-signal readings that counts as a jump.
    pub jump_ratio: f64,
    /// Penalty per jump.
    pub jump_penalty: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            min_readings: DEFAULT_MIN_READINGS,
            outlier_sigma: 2.0,
            deviation_scale: 3.0,
            min_gap_ms: 1_000,
            max_gap_ms: 120_000,
            temporal_scale: 2.0,
            max_devices: 3,
            device_count_penalty: 0.3,
            min_mean_quality: 0.5,
            low_quality_penalty: 0.4,
            round_value_ratio: 0.7,
            round_value_penalty: 0.3,
            jump_ratio: 0.5,
            jump_penalty: 0.2,
        }
    }
}

impl AnomalyConfig {
    /// Set the per-validator history capacity.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Set the minimum readings for a confident verdict.
    pub fn with_min_readings(mut self, min_readings: usize) -> Self {
        self.min_readings = min_readings;
        self
    }

    /// Set the plausible gap range.
    pub fn with_gap_range_ms(mut self, min_gap_ms: u64, max_gap_ms: u64) -> Self {
        self.min_gap_ms = min_gap_ms;
        self.max_gap_ms = max_gap_ms;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(invalid("history_capacity", "must be greater than zero"));
        }
        if self.min_readings < 2 || self.min_readings > self.history_capacity {
            return Err(invalid(
                "min_readings",
                "must be at least 2 and no larger than history_capacity",
            ));
        }
        if !(self.outlier_sigma.is_finite() && self.outlier_sigma > 0.0) {
            return Err(invalid("outlier_sigma", "must be positive"));
        }
        if self.min_gap_ms >= self.max_gap_ms {
            return Err(invalid("min_gap_ms", "must be below max_gap_ms"));
        }
        let fractions = [
            ("min_mean_quality", self.min_mean_quality),
            ("round_value_ratio", self.round_value_ratio),
            ("device_count_penalty", self.device_count_penalty),
            ("low_quality_penalty", self.low_quality_penalty),
            ("round_value_penalty", self.round_value_penalty),
            ("jump_penalty", self.jump_penalty),
        ];
        for (field, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be within [0, 1]"));
            }
        }
        let scales = [
            ("deviation_scale", self.deviation_scale),
            ("temporal_scale", self.temporal_scale),
            ("jump_ratio", self.jump_ratio),
        ];
        for (field, value) in scales {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, "must be positive"));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> AnomalyError {
    AnomalyError::InvalidConfig {
        field,
        reason: reason.to_string(),
    }
}
