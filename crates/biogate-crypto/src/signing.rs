//! Ed25519 signing and verification.
//!
//! ## Contract
//!
//! - [`SigningKeyPair::sign`] is deterministic for a given key and message.
//! - [`verify`] and [`verify_raw`] never panic and never return an error:
//!   wrong lengths, non-canonical points and corrupted signatures all
//!   answer `false`.
//! - Verification is strict (`verify_strict`), rejecting small-order keys
//!   and malleable signatures.
//!
//! Every function here is pure. There is no shared state, so signing and
//! verification may run on any number of threads at once.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{CryptoError, Hash256, Result};

/// Size of an encoded public key.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an encoded secret key.
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of a compact signature encoding.
pub const SIGNATURE_SIZE: usize = 64;

/// Size of a derived address.
pub const ADDRESS_SIZE: usize = 20;

const ADDRESS_DOMAIN: &[u8] = b"BIOGATE-v1.ADDRESS";

/// An Ed25519 key pair.
///
/// The secret scalar is wiped on drop. Deliberately not `Clone`.
pub struct SigningKeyPair {
    signing: SigningKey,
}

impl SigningKeyPair {
    /// Generate a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild a key pair from its 32-byte secret.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeyLength` unless `bytes` is exactly 32 bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret: Zeroizing<[u8; SECRET_KEY_SIZE]> =
            Zeroizing::new(bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: SECRET_KEY_SIZE,
                actual: bytes.len(),
            })?);
        Ok(Self {
            signing: SigningKey::from_bytes(&secret),
        })
    }

    /// Export the secret. Avoid logging or persisting it unencrypted.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_SIZE]> {
        Zeroizing::new(self.signing.to_bytes())
    }

    /// The matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key())
    }

    /// Address derived from the public key.
    pub fn address(&self) -> Address {
        derive_address(&self.public_key())
    }

    /// Sign `message`.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing.sign(message))
    }
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("public", &self.public_key())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// An Ed25519 public key. Always a valid curve point once constructed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Decode a 32-byte compressed point.
    ///
    /// # Errors
    ///
    /// `InvalidKeyLength` for the wrong size, `InvalidPublicKey` if the bytes
    /// do not decompress to a point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; PUBLIC_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            })?;
        VerifyingKey::from_bytes(&arr)
            .map(Self)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Encoded key bytes.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Hex encoding of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse a hex-encoded key.
    ///
    /// # Errors
    ///
    /// Fails on non-hex input or an invalid point.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidHexFormat(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Verify `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.0.verify_strict(message, &signature.0).is_ok()
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({}..)", &self.to_hex()[..16])
    }
}

/// A compact 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    /// Parse a compact signature.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignatureLength` unless `bytes` is 64 bytes long.
    /// Whether the scalar is canonical is decided at verification time.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SIGNATURE_SIZE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidSignatureLength {
                    expected: SIGNATURE_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&arr)))
    }

    /// Compact encoding.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        self.0.to_bytes()
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}..)", &hex::encode(self.to_bytes())[..16])
    }
}

/// Sign `message` with `key`.
pub fn sign(message: &[u8], key: &SigningKeyPair) -> Signature {
    key.sign(message)
}

/// Verify a typed signature against a typed key.
pub fn verify(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    public_key.verify(message, signature)
}

/// Verify from raw wire bytes. Any decoding failure yields `false`.
pub fn verify_raw(message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    let Ok(public_key) = PublicKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_bytes(signature) else {
        return false;
    };
    public_key.verify(message, &signature)
}

/// A stable, non-reversible 20-byte identifier for a public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Parse the `0x`-prefixed form produced by `Display`.
    ///
    /// # Errors
    ///
    /// Fails on a missing prefix, wrong length or non-hex characters.
    pub fn parse(s: &str) -> Result<Self> {
        let body = s
            .strip_prefix("0x")
            .ok_or_else(|| CryptoError::InvalidHexFormat("missing 0x prefix".into()))?;
        if body.len() != ADDRESS_SIZE * 2 {
            return Err(CryptoError::InvalidHashLength {
                expected: ADDRESS_SIZE * 2,
                actual: body.len(),
            });
        }
        let mut out = [0u8; ADDRESS_SIZE];
        hex::decode_to_slice(body, &mut out)
            .map_err(|e| CryptoError::InvalidHexFormat(e.to_string()))?;
        Ok(Self(out))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({self})")
    }
}

/// Map a public key to its address by truncating a domain-separated hash.
pub fn derive_address(public_key: &PublicKey) -> Address {
    let digest = Hash256::domain_hash(ADDRESS_DOMAIN, &[&public_key.to_bytes()]);
    let mut out = [0u8; ADDRESS_SIZE];
    out.copy_from_slice(&digest.as_bytes()[..ADDRESS_SIZE]);
    Address(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let key = SigningKeyPair::generate();
        let sig = key.sign(b"hr=72");
        assert!(verify(b"hr=72", &sig, &key.public_key()));
        assert!(!verify(b"hr=73", &sig, &key.public_key()));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let key = SigningKeyPair::generate();
        assert_eq!(key.sign(b"m"), key.sign(b"m"));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let a = SigningKeyPair::generate();
        let b = SigningKeyPair::generate();
        let sig = a.sign(b"payload");
        assert!(!b.public_key().verify(b"payload", &sig));
    }

    #[test]
    fn test_verify_raw_malformed_inputs_return_false() {
        let key = SigningKeyPair::generate();
        let sig = key.sign(b"x").to_bytes();
        let pk = key.public_key().to_bytes();

        assert!(verify_raw(b"x", &sig, &pk));
        assert!(!verify_raw(b"x", &sig[..63], &pk));
        assert!(!verify_raw(b"x", &sig, &pk[..31]));
        assert!(!verify_raw(b"x", &[], &[]));
        assert!(!verify_raw(b"x", &[0xff; 64], &pk));

        let mut corrupted = sig;
        corrupted[10] ^= 0x01;
        assert!(!verify_raw(b"x", &corrupted, &pk));
    }

    #[test]
    fn test_public_key_length_checked() {
        assert!(matches!(
            PublicKey::from_bytes(&[0u8; 31]),
            Err(CryptoError::InvalidKeyLength { .. })
        ));
    }

    #[test]
    fn test_secret_roundtrip() {
        let key = SigningKeyPair::generate();
        let restored = SigningKeyPair::from_secret_bytes(&key.secret_bytes()[..]).unwrap();
        assert_eq!(key.public_key(), restored.public_key());
        assert!(SigningKeyPair::from_secret_bytes(&[1u8; 31]).is_err());
    }

    #[test]
    fn test_address_stable_and_distinct() {
        let a = SigningKeyPair::generate();
        let b = SigningKeyPair::generate();
        assert_eq!(a.address(), derive_address(&a.public_key()));
        assert_ne!(a.address(), b.address());

        let text = a.address().to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 2 + ADDRESS_SIZE * 2);
        assert_eq!(Address::parse(&text).unwrap(), a.address());
        assert!(Address::parse(&text[2..]).is_err());
    }

    #[test]
    fn test_serde_encoding_roundtrip() {
        let key = SigningKeyPair::generate();
        let sig = key.sign(b"wire");
        let pk: PublicKey =
            bincode::deserialize(&bincode::serialize(&key.public_key()).unwrap()).unwrap();
        let sig2: Signature = bincode::deserialize(&bincode::serialize(&sig).unwrap()).unwrap();
        assert!(pk.verify(b"wire", &sig2));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let key = SigningKeyPair::generate();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains(&hex::encode(&key.secret_bytes()[..])));
    }
}
