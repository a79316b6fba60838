//! HopeNet Core Protocol Implementation
//!
//! This crate provides the foundational types for offline peer discovery and
//! identity verification over short-range radio: device identity, the beacon
//! wire codec, the bounded peer table, the challenge-response handshake, and
//! the interfaces through which radio hardware and crypto are consumed.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod codec;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod handshake;
pub mod identity;
pub mod peer_table;
pub mod radio;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use codec::{
    signed_message, Advertisement, AdvertisementCodec, Beacon, BEACON_LEN,
    BEACON_SIGNING_DOMAIN, BEACON_VERSION,
};
pub use config::DiscoveryConfig;
pub use crypto::{generate_fingerprint, CryptoProvider, Ed25519Provider, KeyPair};
pub use errors::{
    CodecError, ConfigError, CryptoError, HopenetError, IdentityError, RadioError, Result,
    TableError, VerificationError,
};
pub use handshake::{
    respond_to_challenge, verify_response, Challenge, ChallengeResponder, ChallengeResponse,
    IdentityResponder, CHALLENGE_SIGNING_DOMAIN,
};
pub use identity::{
    Identity, IdentityPersistence, IdentityStore, MemoryIdentityPersistence, Registration,
};
pub use peer_table::{PeerRecord, PeerTable, RejectReason, UpsertOutcome, VerificationState};
pub use radio::{ChallengeTransport, RadioCapability, RawAdvertisement, ScanStream};
pub use types::{Fingerprint, ManualTimeSource, PeerId, SystemTimeSource, TimeSource, Timestamp};
