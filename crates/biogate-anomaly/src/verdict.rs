//! Anomaly verdict types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four independent scoring dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyDimension {
    /// Values far from their signal's mean.
    PatternDeviation,
    /// Implausible spacing between readings.
    Temporal,
    /// Too many devices or poor signal quality.
    DeviceTampering,
    /// Round numbers and implausible jumps.
    ValueManipulation,
}

impl AnomalyDimension {
    /// Every dimension, in tie-break order.
    pub const ALL: [AnomalyDimension; 4] = [
        AnomalyDimension::PatternDeviation,
        AnomalyDimension::Temporal,
        AnomalyDimension::DeviceTampering,
        AnomalyDimension::ValueManipulation,
    ];
}

impl fmt::Display for AnomalyDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PatternDeviation => "pattern_deviation",
            Self::Temporal => "temporal",
            Self::DeviceTampering => "device_tampering",
            Self::ValueManipulation => "value_manipulation",
        };
        f.write_str(name)
    }
}

/// Severity bucket of the combined score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Below 0.4.
    Low,
    /// 0.4 up to 0.6.
    Medium,
    /// 0.6 up to 0.8.
    High,
    /// 0.8 and above.
    Critical,
}

impl Severity {
    /// Bucket a combined score.
    pub fn from_score(score: f64) -> Self {
        if score < 0.4 {
            Self::Low
        } else if score < 0.6 {
            Self::Medium
        } else if score < 0.8 {
            Self::High
        } else {
            Self::Critical
        }
    }

    /// Recommended response.
    pub fn action(&self) -> AnomalyAction {
        match self {
            Self::Low => AnomalyAction::Monitor,
            Self::Medium => AnomalyAction::Investigate,
            Self::High => AnomalyAction::Quarantine,
            Self::Critical => AnomalyAction::Exclude,
        }
    }
}

/// What downstream logic should do about a validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyAction {
    /// Keep watching.
    Monitor,
    /// Log for review.
    Investigate,
    /// Stop counting the validator for a while.
    Quarantine,
    /// Remove the validator.
    Exclude,
}

impl fmt::Display for AnomalyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Monitor => "monitor",
            Self::Investigate => "investigate",
            Self::Quarantine => "quarantine",
            Self::Exclude => "exclude",
        };
        f.write_str(name)
    }
}

/// Per-dimension scores, each in [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    /// Pattern deviation.
    pub pattern_deviation: f64,
    /// Temporal inconsistency.
    pub temporal: f64,
    /// Device tampering.
    pub device_tampering: f64,
    /// Value manipulation.
    pub value_manipulation: f64,
}

impl DimensionScores {
    /// Score for one dimension.
    pub fn get(&self, dimension: AnomalyDimension) -> f64 {
        match dimension {
            AnomalyDimension::PatternDeviation => self.pattern_deviation,
            AnomalyDimension::Temporal => self.temporal,
            AnomalyDimension::DeviceTampering => self.device_tampering,
            AnomalyDimension::ValueManipulation => self.value_manipulation,
        }
    }

    /// Highest-scoring dimension; earlier dimensions win ties.
    pub fn dominant(&self) -> (AnomalyDimension, f64) {
        AnomalyDimension::ALL
            .into_iter()
            .map(|d| (d, self.get(d)))
            .fold((AnomalyDimension::PatternDeviation, f64::MIN), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            })
    }
}

/// Outcome of analyzing one validator's history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    /// Validator analyzed.
    pub validator_id: String,
    /// Per-dimension scores.
    pub scores: DimensionScores,
    /// Highest dimension score.
    pub severity_score: f64,
    /// Bucketed severity.
    pub severity: Severity,
    /// Recommended response.
    pub action: AnomalyAction,
    /// Dimension that set the severity.
    pub dominant: AnomalyDimension,
    /// Score of the dominant dimension.
    pub confidence: f64,
    /// Too few readings for a confident verdict.
    pub insufficient_data: bool,
    /// Readings analyzed.
    pub reading_count: usize,
}

impl AnomalyVerdict {
    /// Low-confidence verdict for a short history.
    pub fn insufficient(validator_id: impl Into<String>, reading_count: usize) -> Self {
        Self {
            validator_id: validator_id.into(),
            scores: DimensionScores::default(),
            severity_score: 0.0,
            severity: Severity::Low,
            action: AnomalyAction::Monitor,
            dominant: AnomalyDimension::PatternDeviation,
            confidence: 0.0,
            insufficient_data: true,
            reading_count,
        }
    }

    /// Whether the validator's pending proof must not be broadcast.
    #[must_use]
    pub fn blocks_broadcast(&self) -> bool {
        self.severity == Severity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets() {
        assert_eq!(Severity::from_score(0.0), Severity::Low);
        assert_eq!(Severity::from_score(0.39), Severity::Low);
        assert_eq!(Severity::from_score(0.4), Severity::Medium);
        assert_eq!(Severity::from_score(0.6), Severity::High);
        assert_eq!(Severity::from_score(0.79), Severity::High);
        assert_eq!(Severity::from_score(0.8), Severity::Critical);
        assert_eq!(Severity::from_score(1.0).action(), AnomalyAction::Exclude);
    }

    #[test]
    fn test_dominant_tie_prefers_first() {
        let scores = DimensionScores {
            pattern_deviation: 0.2,
            temporal: 0.5,
            device_tampering: 0.5,
            value_manipulation: 0.1,
        };
        assert_eq!(scores.dominant(), (AnomalyDimension::Temporal, 0.5));
    }

    #[test]
    fn test_insufficient_is_monitor() {
        let v = AnomalyVerdict::insufficient("v", 3);
        assert_eq!(v.action, AnomalyAction::Monitor);
        assert!(v.insufficient_data);
        assert!(!v.blocks_broadcast());
    }
}
