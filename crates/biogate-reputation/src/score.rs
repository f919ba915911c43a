//! Reputation score tracking.

use serde::{Deserialize, Serialize};

/// Reputation score limits and thresholds.
pub mod limits {
    /// Score on first contact.
    pub const REPUTATION_START: u32 = 100;

    /// Gains stop at this score.
    pub const REPUTATION_SOFT_CAP: u32 = 150;

    /// Minimum score.
    pub const REPUTATION_MIN: u32 = 0;

    /// Below this the peer is quarantined.
    pub const REPUTATION_QUARANTINE: u32 = 40;

    /// Below this the peer is blacklisted.
    pub const REPUTATION_BLACKLIST: u32 = 20;
}

pub use limits::*;

/// A peer's score with lifetime gain and loss totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationScore {
    current_score: u32,
    total_gained: u32,
    total_lost: u32,
}

impl Default for ReputationScore {
    fn default() -> Self {
        Self::with_score(REPUTATION_START)
    }
}

impl ReputationScore {
    /// Start at `score`.
    #[must_use]
    pub fn with_score(score: u32) -> Self {
        Self {
            current_score: score,
            total_gained: 0,
            total_lost: 0,
        }
    }

    /// Current score.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.current_score
    }

    /// Lifetime gain.
    #[must_use]
    pub fn total_gained(&self) -> u32 {
        self.total_gained
    }

    /// Lifetime loss.
    #[must_use]
    pub fn total_lost(&self) -> u32 {
        self.total_lost
    }

    /// Add points up to `cap`. A score already above the cap is left alone.
    ///
    /// Returns the amount actually gained.
    pub fn gain(&mut self, amount: u32, cap: u32) -> u32 {
        let old = self.current_score;
        if old >= cap {
            return 0;
        }
        self.current_score = old.saturating_add(amount).min(cap);
        let gained = self.current_score - old;
        self.total_gained = self.total_gained.saturating_add(gained);
        gained
    }

    /// Remove points, flooring at zero.
    ///
    /// Returns the amount actually lost.
    pub fn lose(&mut self, amount: u32) -> u32 {
        let old = self.current_score;
        self.current_score = old.saturating_sub(amount).max(REPUTATION_MIN);
        let lost = old - self.current_score;
        self.total_lost = self.total_lost.saturating_add(lost);
        lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_default() {
        assert_eq!(ReputationScore::default().current(), REPUTATION_START);
    }

    #[test]
    fn test_gain_capped() {
        let mut score = ReputationScore::with_score(148);
        assert_eq!(score.gain(5, REPUTATION_SOFT_CAP), 2);
        assert_eq!(score.current(), REPUTATION_SOFT_CAP);
        assert_eq!(score.gain(5, REPUTATION_SOFT_CAP), 0);
        assert_eq!(score.total_gained(), 2);
    }

    #[test]
    fn test_lose_floors_at_zero() {
        let mut score = ReputationScore::with_score(30);
        assert_eq!(score.lose(50), 30);
        assert_eq!(score.current(), 0);
        assert_eq!(score.lose(10), 0);
        assert_eq!(score.total_lost(), 30);
    }
}
