//! # biogate-anomaly
//!
//! Behavioral risk scoring for BIOGATE validators.
//!
//! The detector keeps a bounded reading history per validator and scores it
//! on four independent dimensions. The highest score picks a severity
//! bucket and a recommended [`AnomalyAction`]. An anomaly is a verdict for
//! downstream logic to act on, not an error.
//!
//! Histories shorter than the configured minimum produce a low-confidence
//! `Monitor` verdict flagged `insufficient_data`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod detector;
pub mod error;
pub mod verdict;

#[cfg(test)]
mod proptests;

pub use config::AnomalyConfig;
pub use detector::{
    analyze_readings, device_tampering, pattern_deviation, temporal_inconsistency,
    value_manipulation, AnomalyDetector,
};
pub use error::{AnomalyError, Result};
pub use verdict::{AnomalyAction, AnomalyDimension, AnomalyVerdict, DimensionScores, Severity};
