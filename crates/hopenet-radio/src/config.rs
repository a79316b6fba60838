//! Radio configuration

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hopenet_core::ConfigError;

use crate::protocol::{DEVICE_NAME_PREFIX, HOPENET_SERVICE_UUID, MAX_ADVERTISING_PAYLOAD};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration shared by the radio implementations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Device name prefix for HopeNet peers
    pub device_name_prefix: String,
    /// Service UUID carrying the beacon payload
    pub service_uuid: Uuid,
    /// Largest payload the radio will put on air
    pub max_payload_size: usize,
    /// Signal strength reported for frames heard on the simulated medium
    pub simulated_signal_strength: Option<i16>,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            device_name_prefix: DEVICE_NAME_PREFIX.to_string(),
            service_uuid: HOPENET_SERVICE_UUID,
            max_payload_size: MAX_ADVERTISING_PAYLOAD,
            simulated_signal_strength: Some(-60),
        }
    }
}

impl RadioConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set device name prefix
    pub fn with_device_name_prefix(mut self, prefix: String) -> Self {
        self.device_name_prefix = prefix;
        self
    }

    /// Set service UUID
    pub fn with_service_uuid(mut self, uuid: Uuid) -> Self {
        self.service_uuid = uuid;
        self
    }

    /// Set maximum payload size
    pub fn with_max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    /// Set the signal strength reported by the simulated medium
    pub fn with_simulated_signal_strength(mut self, rssi: Option<i16>) -> Self {
        self.simulated_signal_strength = rssi;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "device_name_prefix cannot be empty".to_string(),
            ));
        }
        if self.max_payload_size < hopenet_core::BEACON_LEN {
            return Err(ConfigError::Validation(format!(
                "max_payload_size ({}) cannot hold a {}-byte beacon",
                self.max_payload_size,
                hopenet_core::BEACON_LEN
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RadioConfig::default();
        assert_eq!(config.device_name_prefix, "HN");
        assert_eq!(
            config.service_uuid.to_string(),
            "12345678-1234-1234-1234-1234567890ab"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_payload_must_fit_beacon() {
        let config = RadioConfig::new().with_max_payload_size(31);
        assert!(config.validate().is_err());
    }
}
