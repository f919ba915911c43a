//! Canonical byte encoding and score rounding.
//!
//! Everything that gets signed is produced by [`CanonicalEncoder`]. Its
//! format is `"BIOGATE-v1." || purpose || "."` followed by fields, each
//! tagged with its length as a 4-byte big-endian integer. Floats are
//! encoded by their IEEE-754 bit pattern, so `-0.0` and `0.0` differ.

/// Protocol prefix for every domain label.
pub const DOMAIN_PREFIX: &[u8] = b"BIOGATE-v1.";

/// Well-known signing and hashing purposes.
pub mod purposes {
    /// Per-reading device proof.
    pub const DEVICE_PROOF: &str = "DEVICE-PROOF";
    /// Aggregate proof payload.
    pub const AGGREGATE_PROOF: &str = "AGGREGATE-PROOF";
    /// Freshness binding of an aggregate proof.
    pub const FRESHNESS: &str = "FRESHNESS";
    /// Anti-tamper digest.
    pub const ANTI_TAMPER: &str = "ANTI-TAMPER";
    /// Value commitment.
    pub const COMMITMENT: &str = "COMMITMENT";
    /// Threshold proof attached to a commitment.
    pub const THRESHOLD_PROOF: &str = "THRESHOLD-PROOF";
    /// Inbound envelope signature.
    pub const ENVELOPE: &str = "ENVELOPE";
    /// Quorum attestation statement.
    pub const QUORUM: &str = "QUORUM";
    /// Per-signer nonce namespace in the replay guard.
    pub const REPLAY_SCOPE: &str = "REPLAY-SCOPE";
}

/// Build a domain label: `"BIOGATE-v1." || purpose || "." || len(context) || context`.
pub fn build_domain_label(purpose: &str, context: &[u8]) -> Vec<u8> {
    let mut label = Vec::with_capacity(DOMAIN_PREFIX.len() + purpose.len() + 5 + context.len());
    label.extend_from_slice(DOMAIN_PREFIX);
    label.extend_from_slice(purpose.as_bytes());
    label.push(b'.');
    label.extend_from_slice(&(context.len() as u32).to_be_bytes());
    label.extend_from_slice(context);
    label
}

/// Append-only builder for canonical signing payloads.
#[derive(Debug, Clone)]
pub struct CanonicalEncoder {
    buf: Vec<u8>,
}

impl CanonicalEncoder {
    /// Start a payload for `purpose`.
    pub fn new(purpose: &str) -> Self {
        Self {
            buf: build_domain_label(purpose, &[]),
        }
    }

    /// Length-prefixed raw bytes.
    pub fn bytes(mut self, field: &[u8]) -> Self {
        self.buf.extend_from_slice(&(field.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(field);
        self
    }

    /// UTF-8 string field.
    pub fn str(self, field: &str) -> Self {
        self.bytes(field.as_bytes())
    }

    /// Big-endian u64 field.
    pub fn u64(self, field: u64) -> Self {
        self.bytes(&field.to_be_bytes())
    }

    /// Single byte field.
    pub fn u8(self, field: u8) -> Self {
        self.bytes(&[field])
    }

    /// f64 field by bit pattern.
    pub fn f64(self, field: f64) -> Self {
        self.bytes(&field.to_bits().to_be_bytes())
    }

    /// Finish and return the payload.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Round a score to two decimal places, as serialized on the wire.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
