//! Reputation manager settings.

use serde::{Deserialize, Serialize};

use crate::error::{ReputationError, Result};
use crate::score::limits::{
    REPUTATION_BLACKLIST, REPUTATION_QUARANTINE, REPUTATION_SOFT_CAP, REPUTATION_START,
};

/// Tunables for scoring, escalation and rate limiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    /// Score on first contact.
    pub initial_score: u32,
    /// Gains stop here.
    pub soft_cap: u32,
    /// Below this the peer is blacklisted.
    pub blacklist_threshold: u32,
    /// Below this the peer is quarantined.
    pub quarantine_threshold: u32,

    /// Gain per valid message.
    pub valid_message_gain: u32,
    /// Gain per consensus participation.
    pub participation_gain: u32,
    /// Loss per invalid message.
    pub invalid_message_penalty: u32,
    /// Loss per confirmed Byzantine behavior.
    pub byzantine_penalty: u32,

    /// Trailing window for the burst rule.
    pub burst_window_ms: u64,
    /// Entries in the window that trigger the burst rule.
    pub burst_min_entries: usize,
    /// Summed severity above which a burst blacklists.
    pub burst_severity_threshold: u32,
    /// Suspicious entries kept per peer.
    pub suspicious_log_capacity: usize,

    /// Quarantine length.
    pub quarantine_duration_ms: u64,

    /// DoS guard window.
    pub rate_limit_window_ms: u64,
    /// Requests allowed per window.
    pub rate_limit_max_requests: usize,

    /// Latency samples kept per peer.
    pub latency_window: usize,

    /// Share of excluded or quarantined peers that raises a partition alert.
    pub partition_alert_fraction: f64,

    /// Buffered events before new ones are dropped.
    pub event_channel_capacity: usize,

    /// Disconnected peers remembered at most. Blacklisted peers are evicted last.
    pub archive_capacity: usize,
    /// How long a disconnected, non-blacklisted peer is remembered.
    pub archive_retention_ms: u64,
    /// Connected peers silent this long are archived on the next tick.
    pub idle_timeout_ms: u64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            initial_score: REPUTATION_START,
            soft_cap: REPUTATION_SOFT_CAP,
            blacklist_threshold: REPUTATION_BLACKLIST,
            quarantine_threshold: REPUTATION_QUARANTINE,
            valid_message_gain: 2,
            participation_gain: 5,
            invalid_message_penalty: 10,
            byzantine_penalty: 50,
            burst_window_ms: 5 * 60 * 1000,
            burst_min_entries: 6,
            burst_severity_threshold: 50,
            suspicious_log_capacity: 100,
            quarantine_duration_ms: 10 * 60 * 1000,
            rate_limit_window_ms: 60 * 1000,
            rate_limit_max_requests: 100,
            latency_window: 100,
            partition_alert_fraction: 1.0 / 3.0,
            event_channel_capacity: 1024,
            archive_capacity: 10_000,
            archive_retention_ms: 24 * 60 * 60 * 1000,
            idle_timeout_ms: 6 * 60 * 60 * 1000,
        }
    }
}

impl ReputationConfig {
    /// Set the DoS ceiling.
    pub fn with_rate_limit(mut self, max_requests: usize, window_ms: u64) -> Self {
        self.rate_limit_max_requests = max_requests;
        self.rate_limit_window_ms = window_ms;
        self
    }

    /// Set the quarantine length.
    pub fn with_quarantine_duration_ms(mut self, duration_ms: u64) -> Self {
        self.quarantine_duration_ms = duration_ms;
        self
    }

    /// Set the event buffer size.
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Set the partition alert fraction.
    pub fn with_partition_alert_fraction(mut self, fraction: f64) -> Self {
        self.partition_alert_fraction = fraction;
        self
    }

    /// Bound the archive of disconnected peers.
    pub fn with_archive_limits(mut self, capacity: usize, retention_ms: u64) -> Self {
        self.archive_capacity = capacity;
        self.archive_retention_ms = retention_ms;
        self
    }

    /// Set how long a silent peer stays in the live set.
    pub fn with_idle_timeout_ms(mut self, idle_timeout_ms: u64) -> Self {
        self.idle_timeout_ms = idle_timeout_ms;
        self
    }

    /// Check that thresholds are ordered and windows non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.blacklist_threshold > self.quarantine_threshold {
            return Err(invalid("blacklist_threshold", "must not exceed quarantine_threshold"));
        }
        if self.quarantine_threshold >= self.initial_score {
            return Err(invalid("quarantine_threshold", "must be below initial_score"));
        }
        if self.initial_score > self.soft_cap {
            return Err(invalid("initial_score", "must not exceed soft_cap"));
        }
        if self.burst_min_entries == 0 || self.burst_min_entries > self.suspicious_log_capacity {
            return Err(invalid(
                "burst_min_entries",
                "must be within [1, suspicious_log_capacity]",
            ));
        }
        if self.burst_window_ms == 0 || self.rate_limit_window_ms == 0 {
            return Err(invalid("window", "windows must be greater than zero"));
        }
        if self.rate_limit_max_requests == 0 {
            return Err(invalid("rate_limit_max_requests", "must be greater than zero"));
        }
        if self.latency_window == 0 {
            return Err(invalid("latency_window", "must be greater than zero"));
        }
        if self.event_channel_capacity == 0 {
            return Err(invalid("event_channel_capacity", "must be greater than zero"));
        }
        if self.archive_capacity == 0 {
            return Err(invalid("archive_capacity", "must be greater than zero"));
        }
        if self.archive_retention_ms == 0 || self.idle_timeout_ms == 0 {
            return Err(invalid("archive", "retention and idle timeout must be greater than zero"));
        }
        if !(self.partition_alert_fraction > 0.0 && self.partition_alert_fraction < 1.0) {
            return Err(invalid("partition_alert_fraction", "must be within (0, 1)"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ReputationError {
    ReputationError::InvalidConfig {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_valid() {
        assert!(ReputationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let mut cfg = ReputationConfig::default();
        cfg.blacklist_threshold = 60;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_rate_limit() {
        assert!(ReputationConfig::default()
            .with_rate_limit(0, 60_000)
            .validate()
            .is_err());
        assert!(ReputationConfig::default()
            .with_event_channel_capacity(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_rejects_zero_archive_limits() {
        assert!(ReputationConfig::default()
            .with_archive_limits(0, 1_000)
            .validate()
            .is_err());
        assert!(ReputationConfig::default()
            .with_archive_limits(10, 0)
            .validate()
            .is_err());
        assert!(ReputationConfig::default()
            .with_idle_timeout_ms(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_json_overrides() {
        let cfg: ReputationConfig =
            serde_json::from_str(r#"{"rate_limit_max_requests": 10}"#).unwrap();
        assert_eq!(cfg.rate_limit_max_requests, 10);
        assert_eq!(cfg.initial_score, REPUTATION_START);
    }
}
