//! Sliding-window request limiting, independent of reputation.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Result of a rate limit check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request admitted.
    Allowed {
        /// Requests left in the current window.
        remaining: usize,
    },
    /// Window is full.
    Limited {
        /// Milliseconds until the oldest request leaves the window.
        retry_after_ms: u64,
    },
}

impl RateLimitResult {
    /// Check if the request is allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// Admitted request times for one peer over a trailing window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestWindow {
    admitted: VecDeque<u64>,
    max_requests: usize,
    window_ms: u64,
}

impl RequestWindow {
    /// Allow `max_requests` per `window_ms`.
    pub fn new(max_requests: usize, window_ms: u64) -> Self {
        Self {
            admitted: VecDeque::new(),
            max_requests,
            window_ms,
        }
    }

    fn expire(&mut self, now_ms: u64) {
        while self
            .admitted
            .front()
            .is_some_and(|&t| t.saturating_add(self.window_ms) <= now_ms)
        {
            self.admitted.pop_front();
        }
    }

    /// Try to admit a request at `now_ms`. Rejected requests are not counted.
    pub fn check(&mut self, now_ms: u64) -> RateLimitResult {
        self.expire(now_ms);
        if self.admitted.len() >= self.max_requests {
            let oldest = self.admitted.front().copied().unwrap_or(now_ms);
            return RateLimitResult::Limited {
                retry_after_ms: (oldest + self.window_ms).saturating_sub(now_ms),
            };
        }
        self.admitted.push_back(now_ms);
        RateLimitResult::Allowed {
            remaining: self.max_requests - self.admitted.len(),
        }
    }

    /// Requests counted in the current window.
    #[must_use]
    pub fn in_window(&self) -> usize {
        self.admitted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let mut window = RequestWindow::new(3, 60_000);
        assert_eq!(window.check(0), RateLimitResult::Allowed { remaining: 2 });
        assert!(window.check(1).is_allowed());
        assert!(window.check(2).is_allowed());
        assert_eq!(
            window.check(3),
            RateLimitResult::Limited { retry_after_ms: 59_997 }
        );
    }

    #[test]
    fn test_window_slides() {
        let mut window = RequestWindow::new(2, 60_000);
        assert!(window.check(0).is_allowed());
        assert!(window.check(30_000).is_allowed());
        assert!(!window.check(59_999).is_allowed());
        assert!(window.check(60_000).is_allowed());
        assert_eq!(window.in_window(), 2);
    }

    #[test]
    fn test_default_ceiling() {
        let mut window = RequestWindow::new(100, 60_000);
        let admitted = (0..150).filter(|i| window.check(*i * 10).is_allowed()).count();
        assert_eq!(admitted, 100);
    }
}
