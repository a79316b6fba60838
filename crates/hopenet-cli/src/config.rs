//! HopeNet CLI Configuration Management
//!
//! Configuration is read from a TOML file (`--config`) layered over defaults.
//! Every section is optional; missing keys fall back to their defaults.
//!
//! ```toml
//! [discovery]
//! advertise_interval_ms = 5000
//!
//! [radio]
//! device_name_prefix = "HN"
//!
//! [cli]
//! sim_peers = 3
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hopenet_core::{ConfigError, DiscoveryConfig};
use hopenet_radio::RadioConfig;

use crate::error::Result;

/// File name of the persisted identity inside the data directory
pub const IDENTITY_FILE: &str = "identity.json";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the HopeNet CLI application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Discovery engine timing and sizing
    pub discovery: DiscoveryConfig,

    /// Radio naming and payload limits
    pub radio: RadioConfig,

    /// CLI-specific configuration
    pub cli: CliConfig,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Where the identity lives (defaults to the platform data dir)
    pub data_dir: Option<PathBuf>,

    /// Default run time of `discover`, in seconds
    pub discover_duration_secs: u64,

    /// Default number of simulated neighbours for `discover`
    pub sim_peers: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            discover_duration_secs: 30,
            sim_peers: 3,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::Loading(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::FileSystem(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), toml_string)
            .map_err(|e| ConfigError::FileSystem(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.discovery.validate()?;
        self.radio.validate()?;

        if self.cli.discover_duration_secs == 0 {
            return Err(ConfigError::Validation(
                "discover_duration_secs must be greater than 0".to_string(),
            ));
        }
        if self.cli.sim_peers > self.discovery.table_capacity {
            return Err(ConfigError::Validation(format!(
                "sim_peers ({}) exceeds table_capacity ({})",
                self.cli.sim_peers, self.discovery.table_capacity
            )));
        }
        Ok(())
    }

    /// Effective data directory
    pub fn data_dir(&self) -> std::result::Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.cli.data_dir {
            return Ok(dir.clone());
        }
        Self::default_data_dir()
    }

    /// Path of the persisted identity record
    pub fn identity_path(&self) -> std::result::Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join(IDENTITY_FILE))
    }

    fn default_data_dir() -> std::result::Result<PathBuf, ConfigError> {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .map(|dir| dir.join("hopenet"))
            .ok_or_else(|| ConfigError::FileSystem("No data or home directory available".to_string()))
    }

    /// Create example configuration file content
    pub fn example_config() -> String {
        let example_config = AppConfig {
            cli: CliConfig {
                data_dir: Some(PathBuf::from("/var/lib/hopenet")),
                discover_duration_secs: 60,
                sim_peers: 5,
            },
            ..Default::default()
        };

        toml::to_string_pretty(&example_config)
            .unwrap_or_else(|_| "# Failed to generate example config".to_string())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
