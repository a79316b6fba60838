//! Interfaces to the radio hardware
//!
//! The protocol consumes the radio as a capability-constrained peripheral:
//! it can broadcast a beacon, listen for beacons, and carry challenges to a
//! specific peer. Any of these may be unsupported on a given device.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::RadioError;
use crate::handshake::{Challenge, ChallengeResponse};
use crate::types::{PeerId, Timestamp};

/// One frame heard by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAdvertisement {
    pub bytes: Vec<u8>,
    pub signal_strength: Option<i16>,
    pub timestamp: Timestamp,
}

/// Endless stream of received frames
pub type ScanStream = BoxStream<'static, RawAdvertisement>;

/// Broadcast and listen roles of the local radio
#[async_trait]
pub trait RadioCapability: Send + Sync {
    /// Start (or replace) the broadcast payload
    async fn advertise(&self, payload: &[u8]) -> Result<(), RadioError>;

    /// Stop broadcasting
    async fn stop_advertising(&self) -> Result<(), RadioError>;

    /// Begin listening; the stream ends when the radio stops scanning
    async fn scan(&self) -> Result<ScanStream, RadioError>;
}

/// Point-to-point carrier for verification challenges
#[async_trait]
pub trait ChallengeTransport: Send + Sync {
    /// Deliver a challenge to `target` and wait for its answer
    async fn send_challenge(
        &self,
        target: PeerId,
        challenge: Challenge,
    ) -> Result<ChallengeResponse, RadioError>;
}
