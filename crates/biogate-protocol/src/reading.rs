//! Biometric readings as delivered by the device collaborator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::limits::{MAX_DEVICE_ID_LEN, MAX_UNIT_LEN};
use crate::wire::{purposes, CanonicalEncoder};

/// Kind of physiological signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// Beats per minute.
    HeartRate,
    /// Stress level, as a fraction or a percentage.
    Stress,
    /// Focus level, as a fraction or a percentage.
    Focus,
    /// Electroencephalography.
    Eeg,
    /// Galvanic skin response.
    Gsr,
}

impl SignalType {
    /// All signal types in canonical order.
    pub const ALL: [SignalType; 5] = [
        SignalType::HeartRate,
        SignalType::Stress,
        SignalType::Focus,
        SignalType::Eeg,
        SignalType::Gsr,
    ];

    /// Stable tag used in canonical encodings.
    pub fn tag(&self) -> u8 {
        match self {
            Self::HeartRate => 1,
            Self::Stress => 2,
            Self::Focus => 3,
            Self::Eeg => 4,
            Self::Gsr => 5,
        }
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeartRate => "heart_rate",
            Self::Stress => "stress",
            Self::Focus => "focus",
            Self::Eeg => "eeg",
            Self::Gsr => "gsr",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProtocolError::malformed("signal_type", format!("unknown type {s:?}")))
    }
}

/// A single timestamped device measurement.
///
/// Fields are private so a reading cannot change after validation. Values
/// that arrive through deserialization must be re-checked with
/// [`Reading::validate`] before use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    device_id: String,
    signal_type: SignalType,
    value: f64,
    unit: String,
    timestamp_ms: u64,
    quality: f64,
}

impl Reading {
    /// Build and validate a reading.
    pub fn new(
        device_id: impl Into<String>,
        signal_type: SignalType,
        value: f64,
        unit: impl Into<String>,
        timestamp_ms: u64,
        quality: f64,
    ) -> Result<Self> {
        let reading = Self {
            device_id: device_id.into(),
            signal_type,
            value,
            unit: unit.into(),
            timestamp_ms,
            quality,
        };
        reading.validate()?;
        Ok(reading)
    }

    /// Boundary checks on shape and range.
    pub fn validate(&self) -> Result<()> {
        if self.device_id.is_empty() {
            return Err(ProtocolError::malformed("device_id", "empty"));
        }
        if self.device_id.len() > MAX_DEVICE_ID_LEN {
            return Err(ProtocolError::malformed(
                "device_id",
                format!("{} bytes exceeds {MAX_DEVICE_ID_LEN}", self.device_id.len()),
            ));
        }
        if self.unit.len() > MAX_UNIT_LEN {
            return Err(ProtocolError::malformed(
                "unit",
                format!("{} bytes exceeds {MAX_UNIT_LEN}", self.unit.len()),
            ));
        }
        if !self.value.is_finite() {
            return Err(ProtocolError::malformed("value", "not finite"));
        }
        if !self.quality.is_finite() || !(0.0..=1.0).contains(&self.quality) {
            return Err(ProtocolError::malformed(
                "quality",
                format!("{} outside [0, 1]", self.quality),
            ));
        }
        Ok(())
    }

    /// Source device.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Signal kind.
    #[must_use]
    pub fn signal_type(&self) -> SignalType {
        self.signal_type
    }

    /// Measured value.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Unit label, informational only.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Capture time in Unix milliseconds.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Device-reported quality in [0, 1].
    #[must_use]
    pub fn quality(&self) -> f64 {
        self.quality
    }

    /// Bytes a device proof signs: device id, signal type, value and timestamp.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalEncoder::new(purposes::DEVICE_PROOF)
            .str(&self.device_id)
            .u8(self.signal_type.tag())
            .f64(self.value)
            .u64(self.timestamp_ms)
            .finish()
    }

    /// Total order used when readings are aggregated.
    pub fn canonical_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp_ms
            .cmp(&other.timestamp_ms)
            .then_with(|| self.device_id.cmp(&other.device_id))
            .then_with(|| self.signal_type.cmp(&other.signal_type))
            .then_with(|| self.value.to_bits().cmp(&other.value.to_bits()))
            .then_with(|| self.quality.to_bits().cmp(&other.quality.to_bits()))
            .then_with(|| self.unit.cmp(&other.unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: u64 = 1_750_000_000_000;

    fn hr(value: f64) -> Reading {
        Reading::new("watch-1", SignalType::HeartRate, value, "bpm", TS, 0.95).unwrap()
    }

    #[test]
    fn test_valid_reading() {
        let r = hr(72.0);
        assert_eq!(r.device_id(), "watch-1");
        assert_eq!(r.signal_type(), SignalType::HeartRate);
        assert_eq!(r.value(), 72.0);
        assert_eq!(r.timestamp_ms(), TS);
    }

    #[test]
    fn test_rejects_bad_quality() {
        assert!(Reading::new("d", SignalType::Stress, 0.3, "", TS, 1.5).is_err());
        assert!(Reading::new("d", SignalType::Stress, 0.3, "", TS, -0.1).is_err());
        assert!(Reading::new("d", SignalType::Stress, 0.3, "", TS, f64::NAN).is_err());
    }

    #[test]
    fn test_rejects_non_finite_value() {
        assert!(Reading::new("d", SignalType::Gsr, f64::INFINITY, "uS", TS, 0.5).is_err());
    }

    #[test]
    fn test_rejects_bad_device_id() {
        assert!(Reading::new("", SignalType::Eeg, 1.0, "uV", TS, 0.5).is_err());
        let long = "x".repeat(MAX_DEVICE_ID_LEN + 1);
        assert!(Reading::new(long, SignalType::Eeg, 1.0, "uV", TS, 0.5).is_err());
    }

    #[test]
    fn test_canonical_bytes_sensitive_to_value() {
        assert_ne!(hr(72.0).canonical_bytes(), hr(73.0).canonical_bytes());
        assert_eq!(hr(72.0).canonical_bytes(), hr(72.0).canonical_bytes());
    }

    #[test]
    fn test_signal_type_names() {
        for t in SignalType::ALL {
            assert_eq!(t.as_str().parse::<SignalType>().unwrap(), t);
        }
        assert!("pulse".parse::<SignalType>().is_err());
        assert_eq!(
            serde_json::to_string(&SignalType::HeartRate).unwrap(),
            "\"heart_rate\""
        );
    }

    #[test]
    fn test_canonical_order() {
        let a = hr(72.0);
        let b = Reading::new("watch-1", SignalType::HeartRate, 72.0, "bpm", TS + 1, 0.95).unwrap();
        assert_eq!(a.canonical_cmp(&b), std::cmp::Ordering::Less);
        assert_eq!(a.canonical_cmp(&a), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_deserialized_reading_can_be_revalidated() {
        let json = r#"{"device_id":"d","signal_type":"focus","value":0.5,"unit":"","timestamp_ms":1,"quality":7.0}"#;
        let reading: Reading = serde_json::from_str(json).unwrap();
        assert!(reading.validate().is_err());
    }
}
