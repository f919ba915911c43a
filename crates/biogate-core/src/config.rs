//! Aggregated configuration for the integrity service.
//!
//! # Example
//!
//! ```
//! use biogate_core::config::IntegrityConfigBuilder;
//!
//! let config = IntegrityConfigBuilder::new()
//!     .with_rate_limit(50, 60_000)
//!     .with_jitter_amplitude(0.0)
//!     .build_validated()
//!     .unwrap();
//! assert_eq!(config.reputation.rate_limit_max_requests, 50);
//! ```

use std::path::Path;

use biogate_anomaly::AnomalyConfig;
use biogate_proof::ProofConfig;
use biogate_protocol::limits::{MAX_ENVELOPE_PAYLOAD_BYTES, NONCE_WINDOW_MS};
use biogate_protocol::ReplayConfig;
use biogate_reputation::ReputationConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Future skew tolerated on envelope timestamps.
pub const DEFAULT_ENVELOPE_SKEW_MS: u64 = 30 * 1000;

/// Envelope boundary limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Largest accepted payload.
    pub max_payload_bytes: usize,
    /// Oldest accepted envelope timestamp, relative to now.
    pub max_age_ms: u64,
    /// How far in the future an envelope timestamp may be.
    pub max_clock_skew_ms: u64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: MAX_ENVELOPE_PAYLOAD_BYTES,
            max_age_ms: NONCE_WINDOW_MS - DEFAULT_ENVELOPE_SKEW_MS,
            max_clock_skew_ms: DEFAULT_ENVELOPE_SKEW_MS,
        }
    }
}

/// Everything the integrity service needs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Proof generation and verification.
    pub proof: ProofConfig,
    /// Nonce registry.
    pub replay: ReplayConfig,
    /// Anomaly scoring.
    pub anomaly: AnomalyConfig,
    /// Reputation and DoS guard.
    pub reputation: ReputationConfig,
    /// Envelope limits.
    pub envelope: EnvelopeConfig,
}

impl IntegrityConfig {
    /// Create a configuration builder.
    pub fn builder() -> IntegrityConfigBuilder {
        IntegrityConfigBuilder::new()
    }

    /// Parse JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Validate every section and their interaction.
    ///
    /// A nonce must stay in the registry for as long as an envelope carrying
    /// it could still pass the freshness check.
    pub fn validate(&self) -> Result<()> {
        self.proof.validate()?;
        self.replay.validate()?;
        self.anomaly.validate()?;
        self.reputation.validate()?;

        if self.envelope.max_payload_bytes == 0 {
            return Err(CoreError::Configuration(
                "envelope.max_payload_bytes must be greater than zero".into(),
            ));
        }
        if self.envelope.max_age_ms == 0 {
            return Err(CoreError::Configuration(
                "envelope.max_age_ms must be greater than zero".into(),
            ));
        }
        let acceptance = self
            .envelope
            .max_age_ms
            .saturating_add(self.envelope.max_clock_skew_ms);
        if self.replay.window_ms < acceptance {
            return Err(CoreError::Configuration(format!(
                "replay.window_ms ({}) must cover envelope max age plus skew ({acceptance})",
                self.replay.window_ms
            )));
        }
        Ok(())
    }
}

/// Fluent builder for [`IntegrityConfig`].
#[derive(Clone, Debug, Default)]
pub struct IntegrityConfigBuilder {
    config: IntegrityConfig,
}

impl IntegrityConfigBuilder {
    /// Start from defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build without validation.
    pub fn build(self) -> IntegrityConfig {
        self.config
    }

    /// Build and validate.
    pub fn build_validated(self) -> Result<IntegrityConfig> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }

    // ===== Proofs =====

    /// Replace the proof section.
    pub fn with_proof(mut self, proof: ProofConfig) -> Self {
        self.config.proof = proof;
        self
    }

    /// Set the maximum proof age.
    pub fn with_max_proof_age_ms(mut self, max_age_ms: u64) -> Self {
        self.config.proof.max_age_ms = max_age_ms;
        self
    }

    /// Set the score jitter amplitude. Zero disables it.
    pub fn with_jitter_amplitude(mut self, amplitude: f64) -> Self {
        self.config.proof.jitter_amplitude = amplitude;
        self
    }

    // ===== Replay =====

    /// Replace the replay section.
    pub fn with_replay(mut self, replay: ReplayConfig) -> Self {
        self.config.replay = replay;
        self
    }

    /// Set the nonce registry ceiling.
    pub fn with_max_tracked_nonces(mut self, max_entries: usize) -> Self {
        self.config.replay.max_entries = max_entries;
        self
    }

    // ===== Anomaly =====

    /// Replace the anomaly section.
    pub fn with_anomaly(mut self, anomaly: AnomalyConfig) -> Self {
        self.config.anomaly = anomaly;
        self
    }

    // ===== Reputation =====

    /// Replace the reputation section.
    pub fn with_reputation(mut self, reputation: ReputationConfig) -> Self {
        self.config.reputation = reputation;
        self
    }

    /// Set the DoS ceiling.
    pub fn with_rate_limit(mut self, max_requests: usize, window_ms: u64) -> Self {
        self.config.reputation.rate_limit_max_requests = max_requests;
        self.config.reputation.rate_limit_window_ms = window_ms;
        self
    }

    /// Set the quarantine length.
    pub fn with_quarantine_duration_ms(mut self, duration_ms: u64) -> Self {
        self.config.reputation.quarantine_duration_ms = duration_ms;
        self
    }

    // ===== Envelopes =====

    /// Set the largest accepted payload.
    pub fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.config.envelope.max_payload_bytes = max;
        self
    }

    /// Set envelope freshness bounds.
    pub fn with_envelope_freshness(mut self, max_age_ms: u64, max_clock_skew_ms: u64) -> Self {
        self.config.envelope.max_age_ms = max_age_ms;
        self.config.envelope.max_clock_skew_ms = max_clock_skew_ms;
        self
    }
}
