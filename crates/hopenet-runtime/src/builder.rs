//! Engine builder
//!
//! Collects the consumed collaborators (radio, challenge transport, crypto,
//! clock) and validates configuration before an engine is created.

use std::sync::Arc;

use hopenet_core::{
    ChallengeTransport, CryptoProvider, DiscoveryConfig, Ed25519Provider, Identity,
    IdentityStore, RadioCapability, SystemTimeSource, TimeSource,
};
use tracing::debug;

use crate::engine::{DiscoveryEngine, Shared};
use crate::error::{EngineError, EngineResult};

// ----------------------------------------------------------------------------
// Engine Builder
// ----------------------------------------------------------------------------

/// Builder for a [`DiscoveryEngine`]
pub struct DiscoveryEngineBuilder {
    identity: Arc<Identity>,
    config: DiscoveryConfig,
    crypto: Option<Arc<dyn CryptoProvider>>,
    radio: Option<Arc<dyn RadioCapability>>,
    transport: Option<Arc<dyn ChallengeTransport>>,
    clock: Option<Arc<dyn TimeSource>>,
}

impl DiscoveryEngineBuilder {
    pub fn new(store: &IdentityStore) -> Self {
        Self {
            identity: store.handle(),
            config: DiscoveryConfig::default(),
            crypto: None,
            radio: None,
            transport: None,
            clock: None,
        }
    }

    /// Set the discovery configuration
    pub fn with_config(mut self, config: DiscoveryConfig) -> Self {
        self.config = config;
        self
    }

    /// Crypto provider used for beacons and handshakes (default: Ed25519)
    pub fn with_crypto(mut self, crypto: Arc<dyn CryptoProvider>) -> Self {
        self.crypto = Some(crypto);
        self
    }

    pub fn with_radio(mut self, radio: Arc<dyn RadioCapability>) -> Self {
        self.radio = Some(radio);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn ChallengeTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use one device for both beacons and challenges
    pub fn with_radio_and_transport<R>(self, radio: Arc<R>) -> Self
    where
        R: RadioCapability + ChallengeTransport + 'static,
    {
        let transport: Arc<dyn ChallengeTransport> = radio.clone();
        self.with_radio(radio).with_transport(transport)
    }

    /// Clock for peer timestamps and expiry (default: system clock)
    pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> EngineResult<DiscoveryEngine> {
        self.config.validate()?;
        let radio = self.radio.ok_or(EngineError::MissingComponent("radio"))?;
        let transport = self
            .transport
            .ok_or(EngineError::MissingComponent("challenge transport"))?;
        let crypto: Arc<dyn CryptoProvider> = match self.crypto {
            Some(crypto) => crypto,
            None => Arc::new(Ed25519Provider::new()),
        };
        let clock: Arc<dyn TimeSource> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemTimeSource::new()),
        };

        debug!("Building discovery engine for {}", self.identity.id().short());
        Ok(DiscoveryEngine::from_shared(Shared::new(
            self.identity,
            crypto,
            radio,
            transport,
            self.config,
            clock,
        )))
    }
}
