//! Protocol limits and constants.
//!
//! All limits are defined here for consistent enforcement. Times are in
//! milliseconds since the Unix epoch unless the name says otherwise.

// === Nonces ===

/// Nonce size in bytes.
pub const NONCE_SIZE: usize = 32;

/// Nonce length on the wire (lowercase hex).
pub const NONCE_HEX_LEN: usize = NONCE_SIZE * 2;

/// How long a consumed nonce is remembered (5 minutes).
pub const NONCE_WINDOW_MS: u64 = 5 * 60 * 1000;

/// Registry size that triggers a sweep.
pub const MAX_TRACKED_NONCES: usize = 100_000;

/// Width of one nonce time bucket.
pub const NONCE_BUCKET_MS: u64 = 10_000;

// === Freshness ===

/// Default maximum proof age (5 minutes).
pub const DEFAULT_MAX_PROOF_AGE_MS: u64 = 5 * 60 * 1000;

/// Allowed clock skew for timestamps ahead of local time (5 minutes).
pub const MAX_CLOCK_SKEW_MS: u64 = 5 * 60 * 1000;

/// Earliest timestamp accepted at all (2024-01-01 00:00:00 UTC).
pub const MIN_VALID_TIMESTAMP_MS: u64 = 1_704_067_200_000;

// === Readings ===

/// Maximum readings bundled in one aggregate proof.
pub const MAX_READINGS_PER_PROOF: usize = 256;

/// Maximum device id length in bytes.
pub const MAX_DEVICE_ID_LEN: usize = 64;

/// Maximum unit string length in bytes.
pub const MAX_UNIT_LEN: usize = 16;

// === Envelopes ===

/// Maximum envelope payload size (256 KiB).
pub const MAX_ENVELOPE_PAYLOAD_BYTES: usize = 256 * 1024;

/// Maximum peer id length in bytes.
pub const MAX_PEER_ID_LEN: usize = 128;
