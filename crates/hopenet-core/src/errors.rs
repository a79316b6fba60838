//! Error types for the HopeNet protocol
//!
//! Each subsystem has its own error enum; `HopenetError` unifies them for
//! callers that cross subsystem boundaries.

use thiserror::Error;

use crate::codec::Advertisement;
use crate::peer_table::VerificationState;

// ----------------------------------------------------------------------------
// Radio Errors
// ----------------------------------------------------------------------------

/// Failures reported by a radio capability
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    /// The hardware or platform cannot perform this role at all
    #[error("Radio operation not supported: {operation}")]
    Unsupported { operation: String },

    /// The operation failed but may succeed later
    #[error("Transient radio failure: {0}")]
    Transient(String),
}

impl RadioError {
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient(reason.into())
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

// ----------------------------------------------------------------------------
// Codec Errors
// ----------------------------------------------------------------------------

/// Beacon encoding and decoding failures
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("Malformed beacon: {0}")]
    Malformed(String),

    /// Structurally valid beacon whose signature cannot be classified by the codec.
    /// The decoded advertisement is carried along; verification is left to the engine.
    #[error("Untrusted beacon from {}", .0.sender_id)]
    Untrusted(Box<Advertisement>),

    #[error("Display handle too long: {len} bytes (max: {max})")]
    HandleTooLong { len: usize, max: usize },

    #[error("Failed to sign beacon: {0}")]
    Signing(String),
}

impl CodecError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}

// ----------------------------------------------------------------------------
// Verification Errors
// ----------------------------------------------------------------------------

/// Reasons a challenge-response handshake did not verify a peer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("Verification timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Challenge signature does not verify")]
    SignatureMismatch,

    #[error("Public key does not match advertised fingerprint")]
    FingerprintMismatch,

    #[error("Response does not echo the challenge nonce")]
    NonceMismatch,

    #[error("Peer unreachable: {0}")]
    Unreachable(String),
}

// ----------------------------------------------------------------------------
// Peer Table Errors
// ----------------------------------------------------------------------------

/// Peer table operation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Invalid verification transition: {from} -> {to}")]
    InvalidTransition {
        from: VerificationState,
        to: VerificationState,
    },

    #[error("Peer table is full and no record can be evicted")]
    CapacityAndNotEvictable,

    #[error("Peer not found")]
    PeerNotFound,

    #[error("No matching challenge outstanding")]
    StaleChallenge,
}

// ----------------------------------------------------------------------------
// Crypto Errors
// ----------------------------------------------------------------------------

/// Crypto provider failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Unsupported key size: {bits} bits")]
    UnsupportedKeySize { bits: u32 },

    #[error("Invalid key format")]
    InvalidKey,

    #[error("Signing failed: {0}")]
    Signing(String),
}

// ----------------------------------------------------------------------------
// Identity Errors
// ----------------------------------------------------------------------------

/// Registration and identity persistence failures
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    #[error("Invalid display handle: {0}")]
    InvalidHandle(String),

    #[error("Key pair generation failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Identity storage error: {0}")]
    Storage(String),

    #[error("No identity registered on this device")]
    NotRegistered,

    #[error("Already registered as {0}; reset first")]
    AlreadyRegistered(String),
}

impl IdentityError {
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage(reason.into())
    }
}

// ----------------------------------------------------------------------------
// Config Errors
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ----------------------------------------------------------------------------
// Unified Error
// ----------------------------------------------------------------------------

/// Core error type for the HopeNet protocol
#[derive(Debug, Error)]
pub enum HopenetError {
    #[error(transparent)]
    Radio(#[from] RadioError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl HopenetError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }
}

pub type Result<T> = core::result::Result<T, HopenetError>;
