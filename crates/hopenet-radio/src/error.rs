//! Error types for radio implementations

use hopenet_core::RadioError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised by the concrete radios before they are folded into [`RadioError`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioTransportError {
    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("Failed to create BLE manager: {0}")]
    ManagerFailed(String),

    #[error("Failed to start scan: {0}")]
    ScanFailed(String),

    #[error("Failed to get BLE events: {0}")]
    EventStreamFailed(String),

    #[error("Payload too large: {size} bytes (max: {max_size})")]
    PayloadTooLarge { size: usize, max_size: usize },

    #[error("Peer unreachable: {peer}")]
    PeerUnreachable { peer: String },

    #[error("Radio operation not supported: {operation}")]
    NotSupported { operation: String },
}

impl From<RadioTransportError> for RadioError {
    fn from(err: RadioTransportError) -> Self {
        match err {
            RadioTransportError::NotSupported { operation } => RadioError::unsupported(operation),
            RadioTransportError::AdapterNotAvailable => RadioError::unsupported("bluetooth"),
            other => RadioError::transient(other.to_string()),
        }
    }
}
