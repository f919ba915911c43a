//! BLAKE3-256 digests.
//!
//! Every canonical encoding in BIOGATE goes through [`Hash256::hash_many`],
//! which length-prefixes each field so that `("ab", "c")` and `("a", "bc")`
//! never collide.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::{CryptoError, Result};

/// A 256-bit BLAKE3 digest.
#[derive(Clone, Copy, Default, Serialize, Deserialize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// Digest size in bytes.
    pub const SIZE: usize = 32;

    /// Wrap an existing 32-byte digest.
    pub const fn from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a digest from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHashLength` unless the slice is exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidHashLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    /// Borrow the raw digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Copy out the raw digest.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Hash a single byte string.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash an ordered list of fields, each prefixed by its length.
    pub fn hash_many(inputs: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for input in inputs {
            hasher.update(&(input.len() as u64).to_le_bytes());
            hasher.update(input);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Hash a list of fields under a domain separator.
    ///
    /// The domain is absorbed first as its own length-prefixed field.
    pub fn domain_hash(domain: &[u8], inputs: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for input in std::iter::once(&domain).chain(inputs.iter()) {
            hasher.update(&(input.len() as u64).to_le_bytes());
            hasher.update(input);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// True when every byte is zero. Constant time.
    pub fn is_zero(&self) -> bool {
        self.0.ct_eq(&[0u8; 32]).into()
    }

    /// Lowercase hex encoding (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex digest.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHashLength` for the wrong length and
    /// `InvalidHexFormat` for characters outside the hex alphabet.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != Self::SIZE * 2 {
            return Err(CryptoError::InvalidHashLength {
                expected: Self::SIZE * 2,
                actual: s.len(),
            });
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)
            .map_err(|e| CryptoError::InvalidHexFormat(e.to_string()))?;
        Ok(Self(out))
    }
}

impl ConstantTimeEq for Hash256 {
    fn ct_eq(&self, other: &Self) -> subtle::Choice {
        self.0.ct_eq(&other.0)
    }
}

impl PartialEq for Hash256 {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for Hash256 {}

impl std::hash::Hash for Hash256 {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl std::fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash256({}..)", &self.to_hex()[..16])
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Free-function form of [`Hash256::hash`].
pub fn hash(data: &[u8]) -> Hash256 {
    Hash256::hash(data)
}
