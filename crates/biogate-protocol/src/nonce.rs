//! Single-use request nonces.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::limits::{NONCE_HEX_LEN, NONCE_SIZE};

/// A 32-byte random nonce. On the wire it is 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Draw a fresh nonce from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap raw bytes.
    pub fn from_array(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    /// Wire encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the wire encoding.
    ///
    /// Only exactly 64 lowercase hex characters are accepted, so each nonce
    /// has one textual form.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != NONCE_HEX_LEN {
            return Err(ProtocolError::MalformedNonce(format!(
                "expected {NONCE_HEX_LEN} hex chars, got {}",
                s.len()
            )));
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(ProtocolError::MalformedNonce(
                "not lowercase hex".to_string(),
            ));
        }
        let mut bytes = [0u8; NONCE_SIZE];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| ProtocolError::MalformedNonce(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({}..)", &self.to_hex()[..12])
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for Nonce {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_distinct() {
        assert_ne!(Nonce::generate(), Nonce::generate());
    }

    #[test]
    fn test_hex_roundtrip() {
        let nonce = Nonce::generate();
        let hex = nonce.to_hex();
        assert_eq!(hex.len(), NONCE_HEX_LEN);
        assert_eq!(Nonce::from_hex(&hex).unwrap(), nonce);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(Nonce::from_hex("abcd").is_err());
        assert!(Nonce::from_hex(&"a".repeat(65)).is_err());
        assert!(Nonce::from_hex("").is_err());
    }

    #[test]
    fn test_uppercase_rejected() {
        let upper = "A".repeat(NONCE_HEX_LEN);
        assert!(matches!(
            Nonce::from_hex(&upper),
            Err(ProtocolError::MalformedNonce(_))
        ));
    }

    #[test]
    fn test_non_hex_rejected() {
        let bad = format!("{}zz", "0".repeat(NONCE_HEX_LEN - 2));
        assert!(Nonce::from_hex(&bad).is_err());
    }

    #[test]
    fn test_multibyte_same_length_rejected() {
        // 32 two-byte characters is 64 bytes but not hex
        let s = "é".repeat(32);
        assert_eq!(s.len(), NONCE_HEX_LEN);
        assert!(Nonce::from_hex(&s).is_err());
    }
}
