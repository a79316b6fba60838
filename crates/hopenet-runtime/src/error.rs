//! Engine errors

use hopenet_core::{ConfigError, HopenetError};
use thiserror::Error;

/// Failures of engine lifecycle operations
///
/// Radio, codec and verification failures never surface here; they are
/// absorbed by the running tasks.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Discovery session already running")]
    AlreadyRunning,

    #[error("Missing engine component: {0}")]
    MissingComponent(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] HopenetError),
}

pub type EngineResult<T> = Result<T, EngineError>;
