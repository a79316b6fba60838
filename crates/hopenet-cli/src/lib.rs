//! HopeNet CLI library
//!
//! This library provides the components behind the `hopenet` binary:
//! argument parsing, configuration, file-backed identity storage and the
//! discovery session.

pub mod cli;
pub mod commands;
pub mod config;
pub mod discover;
pub mod error;
pub mod storage;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::AppConfig;
pub use discover::{DiscoverOptions, DiscoverySummary};
pub use error::{CliError, Result};
pub use storage::FileIdentityPersistence;
