//! Upward events and engine status types

use std::fmt;

use hopenet_core::PeerRecord;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Status
// ----------------------------------------------------------------------------

/// Device-level discovery session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    /// Advertising (when supported) and scanning
    Running,
}

/// Sub-state of the broadcast role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvertiseStatus {
    /// Session not running
    Inactive,
    Advertising,
    /// The radio reported it cannot broadcast; retried only on foreground re-entry
    Unsupported,
}

impl AdvertiseStatus {
    pub fn is_supported(self) -> bool {
        self != AdvertiseStatus::Unsupported
    }
}

impl fmt::Display for AdvertiseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvertiseStatus::Inactive => f.write_str("inactive"),
            AdvertiseStatus::Advertising => f.write_str("advertising"),
            AdvertiseStatus::Unsupported => f.write_str("scan-only"),
        }
    }
}

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// Events published to UI subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// The peer table changed; `snapshot` is ordered most recently seen first
    PeerTableChanged { snapshot: Vec<PeerRecord> },
    /// Whether this device is broadcasting its beacon
    AdvertiseStatusChanged { supported: bool },
}
