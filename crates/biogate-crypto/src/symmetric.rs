//! XChaCha20-Poly1305 authenticated encryption.
//!
//! Used to seal raw reading batches before they leave the device boundary.
//! Nonces are 192-bit and drawn from `OsRng`, so random generation is safe
//! without a counter. A nonce must still never be reused under one key.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, Result};

/// Key size in bytes.
pub const KEY_SIZE: usize = 32;

/// Nonce size in bytes.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// A 256-bit sealing key, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SealingKey {
    bytes: [u8; KEY_SIZE],
}

impl SealingKey {
    /// Fresh random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeyLength` unless `bytes` is 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self { bytes })
    }

    fn cipher(&self) -> Result<XChaCha20Poly1305> {
        XChaCha20Poly1305::new_from_slice(&self.bytes).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: self.bytes.len(),
        })
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SealingKey([REDACTED])")
    }
}

/// Ciphertext plus the nonce it was sealed under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    /// Random per-message nonce.
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the tag appended.
    pub ciphertext: Vec<u8>,
}

impl SealedPayload {
    /// Wire encoding: `nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the wire encoding.
    ///
    /// # Errors
    ///
    /// Returns `InvalidNonceLength` when the input cannot hold a nonce and a tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::InvalidNonceLength {
                expected: NONCE_SIZE + TAG_SIZE,
                actual: bytes.len(),
            });
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let mut n = [0u8; NONCE_SIZE];
        n.copy_from_slice(nonce);
        Ok(Self {
            nonce: n,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Seal `plaintext` with no associated data.
pub fn encrypt(key: &SealingKey, plaintext: &[u8]) -> Result<SealedPayload> {
    encrypt_with_aad(key, plaintext, &[])
}

/// Seal `plaintext`, binding `aad` into the tag.
pub fn encrypt_with_aad(key: &SealingKey, plaintext: &[u8], aad: &[u8]) -> Result<SealedPayload> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = key
        .cipher()?
        .encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    Ok(SealedPayload { nonce, ciphertext })
}

/// Open a payload sealed without associated data.
pub fn decrypt(key: &SealingKey, sealed: &SealedPayload) -> Result<Vec<u8>> {
    decrypt_with_aad(key, sealed, &[])
}

/// Open a payload; `aad` must match what was sealed.
///
/// # Errors
///
/// `Decryption` on a wrong key, altered ciphertext, nonce or AAD.
pub fn decrypt_with_aad(key: &SealingKey, sealed: &SealedPayload, aad: &[u8]) -> Result<Vec<u8>> {
    key.cipher()?
        .decrypt(
            XNonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let key = SealingKey::generate();
        let sealed = encrypt(&key, b"hr=72;stress=0.3").unwrap();
        assert_eq!(sealed.ciphertext.len(), 16 + TAG_SIZE);
        assert_eq!(decrypt(&key, &sealed).unwrap(), b"hr=72;stress=0.3");
    }

    #[test]
    fn test_ciphertext_hides_plaintext() {
        let key = SealingKey::generate();
        let sealed = encrypt(&key, b"heart_rate").unwrap();
        assert!(!sealed
            .ciphertext
            .windows(b"heart_rate".len())
            .any(|w| w == b"heart_rate"));
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = encrypt(&SealingKey::generate(), b"data").unwrap();
        assert_eq!(
            decrypt(&SealingKey::generate(), &sealed),
            Err(CryptoError::Decryption)
        );
    }

    #[test]
    fn test_tamper_detected() {
        let key = SealingKey::generate();
        let mut sealed = encrypt(&key, b"data").unwrap();
        sealed.ciphertext[0] ^= 0x80;
        assert!(decrypt(&key, &sealed).is_err());
    }

    #[test]
    fn test_aad_must_match() {
        let key = SealingKey::generate();
        let sealed = encrypt_with_aad(&key, b"data", b"validator-1").unwrap();
        assert!(decrypt_with_aad(&key, &sealed, b"validator-1").is_ok());
        assert!(decrypt_with_aad(&key, &sealed, b"validator-2").is_err());
        assert!(decrypt(&key, &sealed).is_err());
    }

    #[test]
    fn test_wire_roundtrip() {
        let key = SealingKey::generate();
        let sealed = encrypt(&key, b"abc").unwrap();
        let parsed = SealedPayload::from_bytes(&sealed.to_bytes()).unwrap();
        assert_eq!(parsed, sealed);
        assert!(SealedPayload::from_bytes(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_key_length_checked() {
        assert!(SealingKey::from_bytes(&[0u8; 16]).is_err());
        assert!(SealingKey::from_bytes(&[0u8; 32]).is_ok());
    }
}
