//! Beacon wire codec
//!
//! Version 1 beacons are a fixed 150-byte big-endian layout:
//!
//! ```text
//! 0   2  magic "HN"
//! 2   1  version
//! 3   1  flags (reserved)
//! 4   16 sender id
//! 20  8  sequence
//! 28  1  display handle length
//! 29  16 display handle (UTF-8, zero padded)
//! 45  32 public key fingerprint
//! 77  1  signature length
//! 78  72 signature (zero padded)
//! ```
//!
//! Decoding is structural only. Signatures are checked later by the discovery
//! engine, once the sender's full public key is known.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::crypto::CryptoProvider;
use crate::errors::CodecError;
use crate::identity::{Identity, MAX_HANDLE_LEN};
use crate::types::{Fingerprint, PeerId};

// ----------------------------------------------------------------------------
// Layout
// ----------------------------------------------------------------------------

pub const BEACON_MAGIC: [u8; 2] = *b"HN";
pub const BEACON_VERSION: u8 = 1;
pub const BEACON_LEN: usize = 150;

/// Prefix of every beacon signature; keeps beacon and challenge signatures apart
pub const BEACON_SIGNING_DOMAIN: &[u8] = b"HN-BEACON-v1";

/// Signature width the codec treats as fully formed
pub const CANONICAL_SIGNATURE_LEN: usize = 64;
pub const SIGNATURE_CAPACITY: usize = 72;

const VERSION_OFFSET: usize = 2;
const FLAGS_OFFSET: usize = 3;
const SENDER_OFFSET: usize = 4;
const SEQUENCE_OFFSET: usize = SENDER_OFFSET + PeerId::LEN;
const HANDLE_LEN_OFFSET: usize = SEQUENCE_OFFSET + 8;
const HANDLE_OFFSET: usize = HANDLE_LEN_OFFSET + 1;
const FINGERPRINT_OFFSET: usize = HANDLE_OFFSET + MAX_HANDLE_LEN;
const SIGNATURE_LEN_OFFSET: usize = FINGERPRINT_OFFSET + Fingerprint::LEN;
const SIGNATURE_OFFSET: usize = SIGNATURE_LEN_OFFSET + 1;

/// Encoded beacon buffer
pub type Beacon = [u8; BEACON_LEN];

// ----------------------------------------------------------------------------
// Advertisement
// ----------------------------------------------------------------------------

/// Decoded beacon contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    pub version: u8,
    pub sender_id: PeerId,
    pub display_handle: String,
    pub public_key_fingerprint: Fingerprint,
    pub sequence: u64,
    pub signature: Vec<u8>,
}

impl Advertisement {
    /// Bytes covered by the beacon signature
    pub fn signed_message(&self) -> Vec<u8> {
        signed_message(&self.sender_id, &self.display_handle, self.sequence)
    }

    /// Check the beacon signature against a known public key
    pub fn verify_signature(&self, crypto: &dyn CryptoProvider, public_key: &[u8]) -> bool {
        crypto.verify(public_key, &self.signed_message(), &self.signature)
    }
}

/// `"HN-BEACON-v1" || sender_id || display_handle || sequence (BE)`
pub fn signed_message(sender_id: &PeerId, display_handle: &str, sequence: u64) -> Vec<u8> {
    let mut message = Vec::with_capacity(
        BEACON_SIGNING_DOMAIN.len() + PeerId::LEN + display_handle.len() + 8,
    );
    message.extend_from_slice(BEACON_SIGNING_DOMAIN);
    message.extend_from_slice(sender_id.as_bytes());
    message.extend_from_slice(display_handle.as_bytes());
    message.extend_from_slice(&sequence.to_be_bytes());
    message
}

// ----------------------------------------------------------------------------
// Codec
// ----------------------------------------------------------------------------

/// Builds this device's beacons and parses received ones
#[derive(Clone)]
pub struct AdvertisementCodec {
    crypto: Arc<dyn CryptoProvider>,
}

impl core::fmt::Debug for AdvertisementCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdvertisementCodec").finish_non_exhaustive()
    }
}

impl AdvertisementCodec {
    pub fn new(crypto: Arc<dyn CryptoProvider>) -> Self {
        Self { crypto }
    }

    /// Encode a signed beacon. Identical inputs produce identical bytes.
    pub fn encode(&self, identity: &Identity, sequence: u64) -> Result<Beacon, CodecError> {
        let handle = identity.display_handle().as_bytes();
        if handle.len() > MAX_HANDLE_LEN {
            return Err(CodecError::HandleTooLong {
                len: handle.len(),
                max: MAX_HANDLE_LEN,
            });
        }

        let message = signed_message(&identity.id(), identity.display_handle(), sequence);
        let signature = self
            .crypto
            .sign(identity.private_key(), &message)
            .map_err(|e| CodecError::Signing(e.to_string()))?;
        if signature.is_empty() || signature.len() > SIGNATURE_CAPACITY {
            return Err(CodecError::Signing(format!(
                "signature is {} bytes (slot holds {})",
                signature.len(),
                SIGNATURE_CAPACITY
            )));
        }

        let mut buf = [0u8; BEACON_LEN];
        buf[..2].copy_from_slice(&BEACON_MAGIC);
        buf[VERSION_OFFSET] = BEACON_VERSION;
        buf[FLAGS_OFFSET] = 0;
        buf[SENDER_OFFSET..SEQUENCE_OFFSET].copy_from_slice(identity.id().as_bytes());
        buf[SEQUENCE_OFFSET..HANDLE_LEN_OFFSET].copy_from_slice(&sequence.to_be_bytes());
        buf[HANDLE_LEN_OFFSET] = handle.len() as u8;
        buf[HANDLE_OFFSET..HANDLE_OFFSET + handle.len()].copy_from_slice(handle);
        buf[FINGERPRINT_OFFSET..SIGNATURE_LEN_OFFSET]
            .copy_from_slice(identity.fingerprint().as_bytes());
        buf[SIGNATURE_LEN_OFFSET] = signature.len() as u8;
        buf[SIGNATURE_OFFSET..SIGNATURE_OFFSET + signature.len()].copy_from_slice(&signature);

        Ok(buf)
    }

    /// Structurally decode a received beacon.
    ///
    /// Fails with `Malformed` for anything that is not a beacon, and with the soft
    /// `Untrusted` error when the signature has a non-canonical width.
    pub fn decode(buf: &[u8]) -> Result<Advertisement, CodecError> {
        if buf.len() < BEACON_LEN {
            return Err(CodecError::malformed(format!(
                "expected at least {} bytes, got {}",
                BEACON_LEN,
                buf.len()
            )));
        }
        if buf[..2] != BEACON_MAGIC {
            return Err(CodecError::malformed("bad magic"));
        }

        let version = buf[VERSION_OFFSET];
        if version == 0 {
            return Err(CodecError::malformed("version 0"));
        }
        // Later versions may append fields; version 1 is exact.
        if version == BEACON_VERSION && buf.len() != BEACON_LEN {
            return Err(CodecError::malformed(format!(
                "version 1 beacon must be {} bytes, got {}",
                BEACON_LEN,
                buf.len()
            )));
        }

        let mut sender = [0u8; PeerId::LEN];
        sender.copy_from_slice(&buf[SENDER_OFFSET..SEQUENCE_OFFSET]);

        let mut sequence = [0u8; 8];
        sequence.copy_from_slice(&buf[SEQUENCE_OFFSET..HANDLE_LEN_OFFSET]);

        let handle_len = buf[HANDLE_LEN_OFFSET] as usize;
        if handle_len == 0 || handle_len > MAX_HANDLE_LEN {
            return Err(CodecError::malformed(format!(
                "display handle length {}",
                handle_len
            )));
        }
        let display_handle =
            core::str::from_utf8(&buf[HANDLE_OFFSET..HANDLE_OFFSET + handle_len])
                .map_err(|_| CodecError::malformed("display handle is not UTF-8"))?
                .to_string();

        let mut fingerprint = [0u8; Fingerprint::LEN];
        fingerprint.copy_from_slice(&buf[FINGERPRINT_OFFSET..SIGNATURE_LEN_OFFSET]);

        let signature_len = buf[SIGNATURE_LEN_OFFSET] as usize;
        if signature_len == 0 || signature_len > SIGNATURE_CAPACITY {
            return Err(CodecError::malformed(format!(
                "signature length {}",
                signature_len
            )));
        }

        let advertisement = Advertisement {
            version,
            sender_id: PeerId::new(sender),
            display_handle,
            public_key_fingerprint: Fingerprint::new(fingerprint),
            sequence: u64::from_be_bytes(sequence),
            signature: buf[SIGNATURE_OFFSET..SIGNATURE_OFFSET + signature_len].to_vec(),
        };

        if signature_len != CANONICAL_SIGNATURE_LEN {
            return Err(CodecError::Untrusted(Box::new(advertisement)));
        }
        Ok(advertisement)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Provider;
    use crate::types::Timestamp;
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn fixed_identity() -> Identity {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let keys = Ed25519Provider::generate_with_rng(&mut rng);
        Identity::from_parts(
            PeerId::new([0x11; 16]),
            "+919876543210",
            keys.public_key,
            keys.private_key,
            Timestamp::new(0),
        )
        .unwrap()
    }

    fn codec() -> AdvertisementCodec {
        AdvertisementCodec::new(Arc::new(Ed25519Provider::new()))
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let identity = fixed_identity();
        let a = codec().encode(&identity, 42).unwrap();
        let b = codec().encode(&identity, 42).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, codec().encode(&identity, 43).unwrap());
    }

    #[test]
    fn test_decode_recovers_fields() {
        let identity = fixed_identity();
        let beacon = codec().encode(&identity, 1).unwrap();
        let ad = AdvertisementCodec::decode(&beacon).unwrap();

        assert_eq!(ad.version, BEACON_VERSION);
        assert_eq!(ad.sender_id, identity.id());
        assert_eq!(ad.display_handle, "+919876543210");
        assert_eq!(ad.public_key_fingerprint, identity.fingerprint());
        assert_eq!(ad.sequence, 1);
        assert!(ad.verify_signature(&Ed25519Provider::new(), identity.public_key()));
    }

    #[test]
    fn test_signature_binds_sequence() {
        let identity = fixed_identity();
        let beacon = codec().encode(&identity, 5).unwrap();
        let mut ad = AdvertisementCodec::decode(&beacon).unwrap();
        ad.sequence = 6;
        assert!(!ad.verify_signature(&Ed25519Provider::new(), identity.public_key()));
    }

    #[test]
    fn test_bare_fields_signature_is_not_a_beacon_signature() {
        let crypto = Ed25519Provider::new();
        let identity = fixed_identity();
        let message = signed_message(&identity.id(), identity.display_handle(), 5);
        assert!(message.starts_with(BEACON_SIGNING_DOMAIN));

        let mut ad = AdvertisementCodec::decode(&codec().encode(&identity, 5).unwrap()).unwrap();
        ad.signature = crypto
            .sign(identity.private_key(), &message[BEACON_SIGNING_DOMAIN.len()..])
            .unwrap();
        assert!(!ad.verify_signature(&crypto, identity.public_key()));
    }

    #[test]
    fn test_wrong_length_is_malformed() {
        let beacon = codec().encode(&fixed_identity(), 1).unwrap();
        assert!(matches!(
            AdvertisementCodec::decode(&beacon[..100]),
            Err(CodecError::Malformed(_))
        ));

        let mut long = beacon.to_vec();
        long.push(0);
        assert!(matches!(
            AdvertisementCodec::decode(&long),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let beacon = codec().encode(&fixed_identity(), 1).unwrap();

        let mut bad_magic = beacon;
        bad_magic[0] = b'X';
        assert!(matches!(
            AdvertisementCodec::decode(&bad_magic),
            Err(CodecError::Malformed(_))
        ));

        let mut bad_version = beacon;
        bad_version[VERSION_OFFSET] = 0;
        assert!(matches!(
            AdvertisementCodec::decode(&bad_version),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_future_version_ignores_trailing_fields() {
        let beacon = codec().encode(&fixed_identity(), 9).unwrap();
        let mut v2 = beacon.to_vec();
        v2[VERSION_OFFSET] = 2;
        v2.extend_from_slice(&[0xEE; 20]);

        let ad = AdvertisementCodec::decode(&v2).unwrap();
        assert_eq!(ad.version, 2);
        assert_eq!(ad.sequence, 9);
    }

    #[test]
    fn test_bad_handle_and_signature_lengths() {
        let beacon = codec().encode(&fixed_identity(), 1).unwrap();

        let mut handle = beacon;
        handle[HANDLE_LEN_OFFSET] = 17;
        assert!(matches!(
            AdvertisementCodec::decode(&handle),
            Err(CodecError::Malformed(_))
        ));

        let mut utf8 = beacon;
        utf8[HANDLE_OFFSET] = 0xFF;
        assert!(matches!(
            AdvertisementCodec::decode(&utf8),
            Err(CodecError::Malformed(_))
        ));

        let mut no_sig = beacon;
        no_sig[SIGNATURE_LEN_OFFSET] = 0;
        assert!(matches!(
            AdvertisementCodec::decode(&no_sig),
            Err(CodecError::Malformed(_))
        ));

        let mut oversized = beacon;
        oversized[SIGNATURE_LEN_OFFSET] = 73;
        assert!(matches!(
            AdvertisementCodec::decode(&oversized),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_canonical_signature_is_untrusted() {
        let identity = fixed_identity();
        let mut beacon = codec().encode(&identity, 3).unwrap();
        beacon[SIGNATURE_LEN_OFFSET] = 70;

        match AdvertisementCodec::decode(&beacon) {
            Err(CodecError::Untrusted(ad)) => {
                assert_eq!(ad.sender_id, identity.id());
                assert_eq!(ad.signature.len(), 70);
            }
            other => panic!("expected untrusted beacon, got {:?}", other),
        }
    }
}
