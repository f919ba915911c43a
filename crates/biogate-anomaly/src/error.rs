//! Error types for anomaly detection.

use thiserror::Error;

/// Errors raised by the anomaly detector.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnomalyError {
    /// Invalid configuration value.
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result type for anomaly operations.
pub type Result<T> = std::result::Result<T, AnomalyError>;
