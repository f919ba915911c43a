//! Trusted time validation.
//!
//! All times are Unix milliseconds. Operations that depend on time take an
//! explicit `now_ms` so tests and replays are deterministic; [`now_ms`] is
//! only called at the outer edges.
//!
//! ## Security
//!
//! - Stale timestamps are rejected so captured proofs cannot be replayed
//!   after the freshness window closes
//! - Future timestamps beyond the clock skew allowance are rejected so an
//!   attacker cannot pre-date data to extend its lifetime
//! - Timestamps before protocol inception are garbage

use chrono::Utc;

use crate::error::{ProtocolError, Result};
use crate::limits::{MAX_CLOCK_SKEW_MS, MIN_VALID_TIMESTAMP_MS};

/// Current Unix time in milliseconds.
///
/// A clock set before the epoch reads as `MIN_VALID_TIMESTAMP_MS`, which
/// makes everything look old rather than fresh.
pub fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(MIN_VALID_TIMESTAMP_MS)
}

/// Check that `timestamp_ms` is neither older than `max_age_ms` nor further
/// ahead of `now_ms` than `max_skew_ms`.
pub fn check_freshness(
    timestamp_ms: u64,
    now_ms: u64,
    max_age_ms: u64,
    max_skew_ms: u64,
) -> Result<()> {
    if timestamp_ms < MIN_VALID_TIMESTAMP_MS {
        return Err(ProtocolError::malformed(
            "timestamp",
            format!("{timestamp_ms} predates protocol inception"),
        ));
    }
    if timestamp_ms > now_ms {
        let ahead_ms = timestamp_ms - now_ms;
        if ahead_ms > max_skew_ms {
            return Err(ProtocolError::FromFuture {
                ahead_ms,
                max_skew_ms,
            });
        }
        return Ok(());
    }
    let age_ms = now_ms - timestamp_ms;
    if age_ms > max_age_ms {
        return Err(ProtocolError::Stale { age_ms, max_age_ms });
    }
    Ok(())
}

/// [`check_freshness`] with the default clock skew allowance.
pub fn validate_timestamp(timestamp_ms: u64, now_ms: u64, max_age_ms: u64) -> Result<()> {
    check_freshness(timestamp_ms, now_ms, max_age_ms, MAX_CLOCK_SKEW_MS)
}
