//! Cryptographic primitives for HopeNet
//!
//! Key generation, signing and verification sit behind [`CryptoProvider`] so the
//! rest of the protocol only ever handles opaque key and signature bytes.
//! [`Ed25519Provider`] is the default implementation.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::{CryptoRng, OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::errors::CryptoError;
use crate::types::Fingerprint;

// ----------------------------------------------------------------------------
// Key Material
// ----------------------------------------------------------------------------

/// Opaque public/private key pair produced by a crypto provider
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
}

impl core::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(&self.public_key))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Crypto Provider Trait
// ----------------------------------------------------------------------------

/// Asymmetric crypto operations consumed by the protocol
pub trait CryptoProvider: Send + Sync {
    /// Key size used when the caller has no preference
    fn default_key_bits(&self) -> u32;

    /// Generate a new key pair of the requested size
    fn generate_keypair(&self, bits: u32) -> Result<KeyPair, CryptoError>;

    /// Sign a message with a private key
    fn sign(&self, private_key: &[u8], message: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verify a signature; malformed keys or signatures simply fail verification
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool;
}

// ----------------------------------------------------------------------------
// Ed25519 Provider
// ----------------------------------------------------------------------------

/// Ed25519 signature scheme (32-byte keys, 64-byte signatures)
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Provider;

impl Ed25519Provider {
    pub const KEY_BITS: u32 = 256;
    pub const SIGNATURE_LEN: usize = 64;

    pub fn new() -> Self {
        Self
    }

    /// Generate a key pair with a caller-supplied RNG
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> KeyPair {
        let mut secret_bytes = [0u8; 32];
        rng.fill_bytes(&mut secret_bytes);

        let signing_key = SigningKey::from_bytes(&secret_bytes);
        KeyPair {
            public_key: signing_key.verifying_key().to_bytes().to_vec(),
            private_key: signing_key.to_bytes().to_vec(),
        }
    }

    fn signing_key(private_key: &[u8]) -> Result<SigningKey, CryptoError> {
        let bytes: [u8; 32] = private_key
            .try_into()
            .map_err(|_| CryptoError::InvalidKey)?;
        Ok(SigningKey::from_bytes(&bytes))
    }
}

impl CryptoProvider for Ed25519Provider {
    fn default_key_bits(&self) -> u32 {
        Self::KEY_BITS
    }

    fn generate_keypair(&self, bits: u32) -> Result<KeyPair, CryptoError> {
        if bits != Self::KEY_BITS {
            return Err(CryptoError::UnsupportedKeySize { bits });
        }

        let mut secret_bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut secret_bytes)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

        let signing_key = SigningKey::from_bytes(&secret_bytes);
        Ok(KeyPair {
            public_key: signing_key.verifying_key().to_bytes().to_vec(),
            private_key: signing_key.to_bytes().to_vec(),
        })
    }

    fn sign(&self, private_key: &[u8], message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let signing_key = Self::signing_key(private_key)?;
        Ok(signing_key.sign(message).to_bytes().to_vec())
    }

    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };

        verifying_key
            .verify(message, &Signature::from_bytes(&sig_bytes))
            .is_ok()
    }
}

// ----------------------------------------------------------------------------
// Fingerprint Generation
// ----------------------------------------------------------------------------

/// Generate SHA-256 fingerprint from a public key
pub fn generate_fingerprint<T: AsRef<[u8]>>(public_key: T) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(public_key.as_ref());
    let hash = hasher.finalize();

    let mut fingerprint = [0u8; 32];
    fingerprint.copy_from_slice(&hash);
    Fingerprint::new(fingerprint)
}

/// Fill a buffer with OS randomness (challenge nonces)
pub fn random_nonce(len: usize) -> Vec<u8> {
    let mut nonce = vec![0u8; len];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let provider = Ed25519Provider::new();
        let keys = provider.generate_keypair(256).unwrap();

        let signature = provider.sign(&keys.private_key, b"hello mesh").unwrap();
        assert_eq!(signature.len(), Ed25519Provider::SIGNATURE_LEN);
        assert!(provider.verify(&keys.public_key, b"hello mesh", &signature));
        assert!(!provider.verify(&keys.public_key, b"tampered", &signature));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let provider = Ed25519Provider::new();
        let keys = provider.generate_keypair(256).unwrap();
        assert!(!provider.verify(&keys.public_key, b"m", &[0u8; 10]));
        assert!(!provider.verify(&[1, 2, 3], b"m", &[0u8; 64]));
    }

    #[test]
    fn test_unsupported_key_size() {
        let provider = Ed25519Provider::new();
        assert_eq!(
            provider.generate_keypair(2048),
            Err(CryptoError::UnsupportedKeySize { bits: 2048 })
        );
    }

    #[test]
    fn test_sign_with_invalid_private_key() {
        let provider = Ed25519Provider::new();
        assert_eq!(provider.sign(&[0u8; 5], b"m"), Err(CryptoError::InvalidKey));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = generate_fingerprint([7u8; 32]);
        let b = generate_fingerprint([7u8; 32]);
        assert_eq!(a, b);
        assert_ne!(a, generate_fingerprint([8u8; 32]));
        assert_eq!(a.to_string().len(), 64);
    }

    #[test]
    fn test_random_nonce_length() {
        assert_eq!(random_nonce(32).len(), 32);
    }
}
