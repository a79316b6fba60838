//! HopeNet Runtime Engine
//!
//! This crate contains the discovery engine for the HopeNet protocol:
//! - `DiscoveryEngine`: orchestrates advertising, scanning, expiry and
//!   per-peer verification handshakes
//! - `DiscoveryEngineBuilder`: wires the engine to a radio, a challenge
//!   transport, a crypto provider and a clock
//! - Upward events for UI layers
//!
//! `hopenet-core` provides the protocol types; this crate runs them.

pub mod builder;
mod engine;
pub mod error;
pub mod events;
mod handshakes;
pub mod stats;
mod tasks;

pub use builder::DiscoveryEngineBuilder;
pub use engine::DiscoveryEngine;
pub use error::{EngineError, EngineResult};
pub use events::{AdvertiseStatus, DiscoveryEvent, SessionState};
pub use stats::EngineStats;

// Re-export core types for convenience
pub use hopenet_core::{
    DiscoveryConfig, HopenetError, PeerId, PeerRecord, Result as HopenetResult,
    VerificationState,
};
