//! Discovery configuration
//!
//! Durations are stored as integer milliseconds so the structure reads
//! naturally from TOML; accessors return [`Duration`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Timing and sizing knobs for the discovery engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Interval between beacon refreshes (each carries a new sequence)
    pub advertise_interval_ms: u64,
    /// Interval between expiry sweeps of the peer table
    pub sweep_interval_ms: u64,
    /// Age after which an unseen peer is evicted
    pub peer_ttl_ms: u64,
    /// Maximum number of peer records
    pub table_capacity: usize,
    /// Upper bound on a single verification handshake
    pub handshake_timeout_ms: u64,
    /// Wait before re-challenging a peer that failed verification
    pub failed_retry_backoff_ms: u64,
    /// Frames buffered between the scanner and the decoder; overflow is dropped
    pub scan_queue_capacity: usize,
    /// Delay before reopening a scan stream after a transient failure
    pub scan_restart_interval_ms: u64,
    /// Buffered upward events per subscriber
    pub event_channel_capacity: usize,
    /// Key size requested at registration
    pub key_bits: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            advertise_interval_ms: 5_000,
            sweep_interval_ms: 10_000,
            peer_ttl_ms: 60_000,
            table_capacity: 128,
            handshake_timeout_ms: 3_000,
            failed_retry_backoff_ms: 30_000,
            scan_queue_capacity: 256,
            scan_restart_interval_ms: 5_000,
            event_channel_capacity: 64,
            key_bits: 256,
        }
    }
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advertise_interval(&self) -> Duration {
        Duration::from_millis(self.advertise_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn peer_ttl(&self) -> Duration {
        Duration::from_millis(self.peer_ttl_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn failed_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.failed_retry_backoff_ms)
    }

    pub fn scan_restart_interval(&self) -> Duration {
        Duration::from_millis(self.scan_restart_interval_ms)
    }

    /// Set beacon refresh interval
    pub fn with_advertise_interval(mut self, interval: Duration) -> Self {
        self.advertise_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set expiry sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set peer time-to-live
    pub fn with_peer_ttl(mut self, ttl: Duration) -> Self {
        self.peer_ttl_ms = ttl.as_millis() as u64;
        self
    }

    /// Set peer table capacity
    pub fn with_table_capacity(mut self, capacity: usize) -> Self {
        self.table_capacity = capacity;
        self
    }

    /// Set handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set failed-peer retry backoff
    pub fn with_failed_retry_backoff(mut self, backoff: Duration) -> Self {
        self.failed_retry_backoff_ms = backoff.as_millis() as u64;
        self
    }

    /// Set scan queue capacity
    pub fn with_scan_queue_capacity(mut self, capacity: usize) -> Self {
        self.scan_queue_capacity = capacity;
        self
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("advertise_interval_ms", self.advertise_interval_ms),
            ("sweep_interval_ms", self.sweep_interval_ms),
            ("peer_ttl_ms", self.peer_ttl_ms),
            ("handshake_timeout_ms", self.handshake_timeout_ms),
            ("scan_restart_interval_ms", self.scan_restart_interval_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.table_capacity == 0 {
            return Err(ConfigError::Validation(
                "table_capacity must be greater than 0".to_string(),
            ));
        }
        if self.scan_queue_capacity == 0 || self.event_channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "queue capacities must be greater than 0".to_string(),
            ));
        }
        // A peer must survive at least one missed beacon
        if self.peer_ttl_ms <= self.advertise_interval_ms {
            return Err(ConfigError::Validation(format!(
                "peer_ttl_ms ({}) must exceed advertise_interval_ms ({})",
                self.peer_ttl_ms, self.advertise_interval_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DiscoveryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.peer_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_builders() {
        let config = DiscoveryConfig::new()
            .with_advertise_interval(Duration::from_millis(50))
            .with_peer_ttl(Duration::from_millis(400))
            .with_table_capacity(4);
        assert_eq!(config.advertise_interval_ms, 50);
        assert_eq!(config.peer_ttl_ms, 400);
        assert_eq!(config.table_capacity, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let zero_capacity = DiscoveryConfig::default().with_table_capacity(0);
        assert!(zero_capacity.validate().is_err());

        let short_ttl = DiscoveryConfig::default()
            .with_advertise_interval(Duration::from_secs(10))
            .with_peer_ttl(Duration::from_secs(5));
        assert!(short_ttl.validate().is_err());

        let mut zero_sweep = DiscoveryConfig::default();
        zero_sweep.sweep_interval_ms = 0;
        assert!(zero_sweep.validate().is_err());
    }
}
