//! Error handling for the HopeNet CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Identity error: {0}")]
    Identity(#[from] hopenet_core::IdentityError),

    #[error("Discovery engine error: {0}")]
    Engine(#[from] hopenet_runtime::EngineError),

    #[error("Radio error: {0}")]
    Radio(#[from] hopenet_radio::RadioTransportError),

    #[error(transparent)]
    Config(#[from] hopenet_core::ConfigError),

    #[error("This device is already registered as {0}; run `hopenet reset --yes` first")]
    AlreadyRegistered(String),

    #[error("Refusing to {0} without --yes")]
    NotConfirmed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    #[error("Feature not available: {0}")]
    FeatureNotAvailable(String),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
