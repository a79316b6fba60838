//! Challenge-response identity verification
//!
//! The challenger sends a random nonce. The responder signs it with its private
//! key and returns its full public key. The challenger accepts the key only if
//! it hashes to the fingerprint the peer has been advertising and the signature
//! over the nonce verifies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::crypto::{generate_fingerprint, random_nonce, CryptoProvider};
use crate::errors::{CryptoError, VerificationError};
use crate::identity::Identity;
use crate::types::{Fingerprint, PeerId};
use crate::Result;

/// Nonce width used by the discovery engine
pub const NONCE_LEN: usize = 32;

/// Prefix of every challenge signature; a response can never pass as a beacon
pub const CHALLENGE_SIGNING_DOMAIN: &[u8] = b"HN-CHALLENGE-v1";

// ----------------------------------------------------------------------------
// Wire Messages
// ----------------------------------------------------------------------------

/// Proof-of-key request sent to a discovered peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub challenger: PeerId,
    pub target: PeerId,
    pub nonce: Vec<u8>,
}

impl Challenge {
    pub fn new(challenger: PeerId, target: PeerId, nonce: impl Into<Vec<u8>>) -> Self {
        Self {
            challenger,
            target,
            nonce: nonce.into(),
        }
    }

    /// Challenge with a fresh random nonce
    pub fn random(challenger: PeerId, target: PeerId) -> Self {
        Self::new(challenger, target, random_nonce(NONCE_LEN))
    }

    /// Bytes the responder signs: `"HN-CHALLENGE-v1" || challenger || target || nonce`
    pub fn signed_message(&self) -> Vec<u8> {
        let mut message = Vec::with_capacity(
            CHALLENGE_SIGNING_DOMAIN.len() + 2 * PeerId::LEN + self.nonce.len(),
        );
        message.extend_from_slice(CHALLENGE_SIGNING_DOMAIN);
        message.extend_from_slice(self.challenger.as_bytes());
        message.extend_from_slice(self.target.as_bytes());
        message.extend_from_slice(&self.nonce);
        message
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Signed answer to a [`Challenge`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub responder: PeerId,
    pub nonce: Vec<u8>,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl ChallengeResponse {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

// ----------------------------------------------------------------------------
// Protocol Steps
// ----------------------------------------------------------------------------

/// Answer a challenge with this device's identity
pub fn respond_to_challenge(
    identity: &Identity,
    crypto: &dyn CryptoProvider,
    challenge: &Challenge,
) -> core::result::Result<ChallengeResponse, CryptoError> {
    let signature = crypto.sign(identity.private_key(), &challenge.signed_message())?;
    Ok(ChallengeResponse {
        responder: identity.id(),
        nonce: challenge.nonce.clone(),
        public_key: identity.public_key().to_vec(),
        signature,
    })
}

/// Check a response against the challenge and the advertised fingerprint.
///
/// Returns the confirmed public key.
pub fn verify_response(
    crypto: &dyn CryptoProvider,
    challenge: &Challenge,
    response: &ChallengeResponse,
    expected_fingerprint: &Fingerprint,
) -> core::result::Result<Vec<u8>, VerificationError> {
    if response.nonce != challenge.nonce {
        return Err(VerificationError::NonceMismatch);
    }
    if generate_fingerprint(&response.public_key) != *expected_fingerprint {
        return Err(VerificationError::FingerprintMismatch);
    }
    if !crypto.verify(
        &response.public_key,
        &challenge.signed_message(),
        &response.signature,
    ) {
        return Err(VerificationError::SignatureMismatch);
    }
    Ok(response.public_key.clone())
}

// ----------------------------------------------------------------------------
// Responder
// ----------------------------------------------------------------------------

/// Something that answers challenges addressed to a device
pub trait ChallengeResponder: Send + Sync {
    /// `None` means the challenge is ignored (wrong target or no key)
    fn respond(&self, challenge: &Challenge) -> Option<ChallengeResponse>;
}

/// Responder backed by this device's identity
#[derive(Clone)]
pub struct IdentityResponder {
    identity: Arc<Identity>,
    crypto: Arc<dyn CryptoProvider>,
}

impl IdentityResponder {
    pub fn new(identity: Arc<Identity>, crypto: Arc<dyn CryptoProvider>) -> Self {
        Self { identity, crypto }
    }
}

impl ChallengeResponder for IdentityResponder {
    fn respond(&self, challenge: &Challenge) -> Option<ChallengeResponse> {
        if challenge.target != self.identity.id() {
            return None;
        }
        match respond_to_challenge(&self.identity, self.crypto.as_ref(), challenge) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("Failed to answer challenge from {}: {}", challenge.challenger, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Provider;

    fn identity(handle: &str) -> Identity {
        Identity::generate(handle, &Ed25519Provider::new(), 256).unwrap()
    }

    #[test]
    fn test_valid_response_verifies() {
        let crypto = Ed25519Provider::new();
        let alice = identity("alice");
        let challenge = Challenge::new(PeerId::new([2; 16]), alice.id(), b"abc123".to_vec());

        let response = respond_to_challenge(&alice, &crypto, &challenge).unwrap();
        let key = verify_response(&crypto, &challenge, &response, &alice.fingerprint()).unwrap();
        assert_eq!(key, alice.public_key());
    }

    #[test]
    fn test_impostor_key_fails_fingerprint_check() {
        let crypto = Ed25519Provider::new();
        let alice = identity("alice");
        let mallory = identity("mallory");
        let challenge = Challenge::random(PeerId::new([2; 16]), alice.id());

        // Mallory answers with a valid key pair of their own
        let response = respond_to_challenge(&mallory, &crypto, &challenge).unwrap();
        assert_eq!(
            verify_response(&crypto, &challenge, &response, &alice.fingerprint()),
            Err(VerificationError::FingerprintMismatch)
        );
    }

    #[test]
    fn test_forged_signature_fails() {
        let crypto = Ed25519Provider::new();
        let alice = identity("alice");
        let challenge = Challenge::random(PeerId::new([2; 16]), alice.id());

        let mut response = respond_to_challenge(&alice, &crypto, &challenge).unwrap();
        response.signature[0] ^= 0xFF;
        assert_eq!(
            verify_response(&crypto, &challenge, &response, &alice.fingerprint()),
            Err(VerificationError::SignatureMismatch)
        );
    }

    #[test]
    fn test_replayed_response_fails_nonce_check() {
        let crypto = Ed25519Provider::new();
        let alice = identity("alice");
        let old = Challenge::random(PeerId::new([2; 16]), alice.id());
        let fresh = Challenge::random(PeerId::new([2; 16]), alice.id());

        let replay = respond_to_challenge(&alice, &crypto, &old).unwrap();
        assert_eq!(
            verify_response(&crypto, &fresh, &replay, &alice.fingerprint()),
            Err(VerificationError::NonceMismatch)
        );
    }

    #[test]
    fn test_responder_ignores_foreign_target() {
        let alice = Arc::new(identity("alice"));
        let responder = IdentityResponder::new(alice.clone(), Arc::new(Ed25519Provider::new()));

        let foreign = Challenge::random(PeerId::new([2; 16]), PeerId::new([3; 16]));
        assert!(responder.respond(&foreign).is_none());

        let mine = Challenge::random(PeerId::new([2; 16]), alice.id());
        assert!(responder.respond(&mine).is_some());
    }

    #[test]
    fn test_signature_binds_both_parties() {
        let crypto = Ed25519Provider::new();
        let alice = identity("alice");
        let challenge = Challenge::new(PeerId::new([2; 16]), alice.id(), b"abc123".to_vec());
        let response = respond_to_challenge(&alice, &crypto, &challenge).unwrap();

        // Same nonce, different challenger: the signature no longer fits
        let redirected = Challenge::new(PeerId::new([4; 16]), alice.id(), b"abc123".to_vec());
        assert_eq!(
            verify_response(&crypto, &redirected, &response, &alice.fingerprint()),
            Err(VerificationError::SignatureMismatch)
        );
    }

    #[test]
    fn test_response_cannot_be_passed_off_as_beacon() {
        use crate::codec::{signed_message, Advertisement, BEACON_VERSION};

        let crypto = Ed25519Provider::new();
        let victim = identity("+15550001111");
        let responder = IdentityResponder::new(Arc::new(victim.clone()), Arc::new(crypto));

        // Ask the victim to sign what a renamed, far-future beacon would sign
        let wanted = signed_message(&victim.id(), "EVIL", u64::MAX);
        let challenge = Challenge::new(PeerId::new([9; 16]), victim.id(), wanted);
        let response = responder.respond(&challenge).unwrap();

        let forged = Advertisement {
            version: BEACON_VERSION,
            sender_id: victim.id(),
            display_handle: "EVIL".to_string(),
            public_key_fingerprint: victim.fingerprint(),
            sequence: u64::MAX,
            signature: response.signature.clone(),
        };
        assert!(!forged.verify_signature(&crypto, victim.public_key()));

        // And a real beacon signature does not answer a challenge
        assert!(!crypto.verify(
            victim.public_key(),
            &challenge.signed_message(),
            &crypto
                .sign(victim.private_key(), &signed_message(&victim.id(), "EVIL", 1))
                .unwrap()
        ));
    }

    #[test]
    fn test_wire_encoding() {
        let challenge = Challenge::new(PeerId::new([1; 16]), PeerId::new([2; 16]), vec![9, 9]);
        let bytes = challenge.to_bytes().unwrap();
        assert_eq!(Challenge::from_bytes(&bytes).unwrap(), challenge);
        assert!(ChallengeResponse::from_bytes(&[0xFF]).is_err());
    }
}
