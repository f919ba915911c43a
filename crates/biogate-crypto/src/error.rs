//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
///
/// Signature *verification* never produces one of these: it answers with a
/// plain `bool`. Errors are reserved for decoding and sealing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key bytes had the wrong length.
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length.
        expected: usize,
        /// Actual key length.
        actual: usize,
    },

    /// Public key bytes do not decode to a curve point.
    #[error("Invalid public key encoding")]
    InvalidPublicKey,

    /// Signature bytes had the wrong length.
    #[error("Invalid signature length: expected {expected}, got {actual}")]
    InvalidSignatureLength {
        /// Expected signature length.
        expected: usize,
        /// Actual signature length.
        actual: usize,
    },

    /// Invalid hash length.
    #[error("Invalid hash length: expected {expected}, got {actual}")]
    InvalidHashLength {
        /// Expected hash length.
        expected: usize,
        /// Actual hash length.
        actual: usize,
    },

    /// Invalid nonce length for sealing.
    #[error("Invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Expected nonce length.
        expected: usize,
        /// Actual nonce length.
        actual: usize,
    },

    /// Hex input was not valid.
    #[error("Invalid hex string: {0}")]
    InvalidHexFormat(String),

    /// Sealing a payload failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Opening a sealed payload failed (wrong key, tampered data or AAD).
    #[error("Decryption failed: invalid ciphertext or key")]
    Decryption,
}

/// Result type for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
