//! # biogate-crypto
//!
//! Cryptographic primitives for BIOGATE.
//!
//! - **Ed25519** (`ed25519-dalek`) for signing readings and proofs
//! - **BLAKE3** for hashing and canonical encodings
//! - **XChaCha20-Poly1305** for sealing raw reading batches
//! - Address derivation by truncated hash of the public key
//!
//! ## Security
//!
//! Secret keys zeroize on drop. Digest comparisons are constant time via
//! `subtle`. Signature verification reports `false` on any malformed input
//! and never panics.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod signing;
pub mod symmetric;

#[cfg(test)]
mod proptests;

pub use error::{CryptoError, Result};
pub use hash::{hash, Hash256};
pub use signing::{
    derive_address, sign, verify, verify_raw, Address, PublicKey, Signature, SigningKeyPair,
    ADDRESS_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE, SIGNATURE_SIZE,
};
pub use symmetric::{
    decrypt, decrypt_with_aad, encrypt, encrypt_with_aad, SealedPayload, SealingKey,
};
