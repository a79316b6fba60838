//! Radio capability implementations for HopeNet
//!
//! This crate provides implementations of the `RadioCapability` and
//! `ChallengeTransport` traits from `hopenet-core`.
//!
//! ## Architecture
//!
//! - [`config`] - Radio configuration and settings
//! - [`error`] - Error types specific to the concrete radios
//! - [`protocol`] - Service UUID and device naming
//! - [`simulated`] - In-process medium for tests and demos
//! - `ble` - Scan-only BLE central (feature `ble`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hopenet_core::RadioCapability;
//! use hopenet_radio::{RadioConfig, SimulatedMedium};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let medium = SimulatedMedium::new(RadioConfig::default());
//! let phone = medium.radio();
//! let samsung_a12 = medium.radio().scan_only();
//!
//! phone.advertise(&[0u8; 150]).await?;
//! assert!(samsung_a12.advertise(&[0u8; 150]).await.is_err());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod protocol;
mod simulated;

#[cfg(feature = "ble")]
mod ble;

// Public API exports
pub use config::RadioConfig;
pub use error::RadioTransportError;
pub use protocol::{
    extract_handle_from_name, generate_device_name, DEVICE_NAME_PREFIX, HOPENET_SERVICE_UUID,
    MAX_ADVERTISING_PAYLOAD,
};
pub use simulated::{SilentResponder, SimulatedMedium, SimulatedRadio};

#[cfg(feature = "ble")]
pub use ble::BleRadio;
