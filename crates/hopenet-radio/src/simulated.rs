//! In-process radio medium
//!
//! Every [`SimulatedRadio`] attached to a [`SimulatedMedium`] hears every frame
//! put on air, its own included unless echo is disabled. Challenges travel
//! through the medium as bincode frames to whichever responder serves the
//! target peer id.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace};

use hopenet_core::{
    Challenge, ChallengeResponder, ChallengeResponse, ChallengeTransport, PeerId,
    RadioCapability, RadioError, RawAdvertisement, ScanStream, SystemTimeSource, TimeSource,
};

use crate::config::RadioConfig;
use crate::error::RadioTransportError;

/// Frames buffered on air before slow listeners start lagging
const AIR_CAPACITY: usize = 1024;

// ----------------------------------------------------------------------------
// Medium
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Frame {
    /// `None` for frames injected from outside any radio
    origin: Option<u64>,
    bytes: Vec<u8>,
}

#[derive(Clone)]
struct Route {
    responder: Arc<dyn ChallengeResponder>,
    delay: Option<Duration>,
}

/// Shared air between simulated radios
pub struct SimulatedMedium {
    air: broadcast::Sender<Frame>,
    routes: DashMap<PeerId, Route>,
    next_node: AtomicU64,
    time_source: Arc<dyn TimeSource>,
    config: RadioConfig,
}

impl SimulatedMedium {
    /// Create a medium stamped by the system clock
    pub fn new(config: RadioConfig) -> Arc<Self> {
        Self::with_time_source(config, Arc::new(SystemTimeSource::new()))
    }

    /// Create a medium stamped by the given clock
    pub fn with_time_source(config: RadioConfig, time_source: Arc<dyn TimeSource>) -> Arc<Self> {
        let (air, _) = broadcast::channel(AIR_CAPACITY);
        Arc::new(Self {
            air,
            routes: DashMap::new(),
            next_node: AtomicU64::new(0),
            time_source,
            config,
        })
    }

    /// Attach a new radio with full broadcast and listen support
    pub fn radio(self: &Arc<Self>) -> SimulatedRadio {
        SimulatedRadio {
            medium: Arc::clone(self),
            node: self.next_node.fetch_add(1, Ordering::Relaxed),
            can_advertise: true,
            can_scan: true,
            hear_own_frames: true,
            signal_strength: self.config.simulated_signal_strength,
            advertising: AtomicBool::new(false),
            pending_failures: AtomicUsize::new(0),
        }
    }

    /// Put raw bytes on air as if sent by an unknown transmitter
    pub fn inject(&self, bytes: impl Into<Vec<u8>>) -> usize {
        self.air
            .send(Frame {
                origin: None,
                bytes: bytes.into(),
            })
            .unwrap_or(0)
    }

    /// Number of radios currently listening
    pub fn listeners(&self) -> usize {
        self.air.receiver_count()
    }

    /// Route challenges for `peer_id` to `responder`
    pub fn attach_responder(&self, peer_id: PeerId, responder: Arc<dyn ChallengeResponder>) {
        self.routes.insert(
            peer_id,
            Route {
                responder,
                delay: None,
            },
        );
    }

    /// Route challenges for `peer_id` to `responder`, answering after `delay`
    pub fn attach_delayed_responder(
        &self,
        peer_id: PeerId,
        responder: Arc<dyn ChallengeResponder>,
        delay: Duration,
    ) {
        self.routes.insert(
            peer_id,
            Route {
                responder,
                delay: Some(delay),
            },
        );
    }

    /// Stop routing challenges for `peer_id`
    pub fn detach_responder(&self, peer_id: &PeerId) {
        self.routes.remove(peer_id);
    }

    pub fn config(&self) -> &RadioConfig {
        &self.config
    }
}

impl std::fmt::Debug for SimulatedMedium {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedMedium")
            .field("listeners", &self.listeners())
            .field("routes", &self.routes.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Responders
// ----------------------------------------------------------------------------

/// Responder that never answers; the challenger only learns by timing out
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentResponder;

impl ChallengeResponder for SilentResponder {
    fn respond(&self, _challenge: &Challenge) -> Option<ChallengeResponse> {
        None
    }
}

// ----------------------------------------------------------------------------
// Radio
// ----------------------------------------------------------------------------

/// One device's radio on a [`SimulatedMedium`]
#[derive(Debug)]
pub struct SimulatedRadio {
    medium: Arc<SimulatedMedium>,
    node: u64,
    can_advertise: bool,
    can_scan: bool,
    hear_own_frames: bool,
    signal_strength: Option<i16>,
    advertising: AtomicBool,
    pending_failures: AtomicUsize,
}

impl SimulatedRadio {
    /// Hardware that can listen but not broadcast
    pub fn scan_only(mut self) -> Self {
        self.can_advertise = false;
        self
    }

    /// Hardware that can broadcast but not listen
    pub fn advertise_only(mut self) -> Self {
        self.can_scan = false;
        self
    }

    /// Do not deliver this radio's own frames back to its scanner
    pub fn without_echo(mut self) -> Self {
        self.hear_own_frames = false;
        self
    }

    pub fn with_signal_strength(mut self, rssi: Option<i16>) -> Self {
        self.signal_strength = rssi;
        self
    }

    /// Make the next `count` advertise calls fail transiently
    pub fn fail_next_advertisements(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising.load(Ordering::SeqCst)
    }

    pub fn medium(&self) -> &Arc<SimulatedMedium> {
        &self.medium
    }

    fn take_injected_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RadioCapability for SimulatedRadio {
    async fn advertise(&self, payload: &[u8]) -> Result<(), RadioError> {
        if !self.can_advertise {
            return Err(RadioTransportError::NotSupported {
                operation: "advertise".to_string(),
            }
            .into());
        }
        if self.take_injected_failure() {
            return Err(RadioError::transient("simulated advertiser busy"));
        }
        let max_size = self.medium.config.max_payload_size;
        if payload.len() > max_size {
            return Err(RadioTransportError::PayloadTooLarge {
                size: payload.len(),
                max_size,
            }
            .into());
        }

        self.advertising.store(true, Ordering::SeqCst);
        let receivers = self
            .medium
            .air
            .send(Frame {
                origin: Some(self.node),
                bytes: payload.to_vec(),
            })
            .unwrap_or(0);
        trace!("node {} broadcast {} bytes to {} listeners", self.node, payload.len(), receivers);
        Ok(())
    }

    async fn stop_advertising(&self) -> Result<(), RadioError> {
        self.advertising.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn scan(&self) -> Result<ScanStream, RadioError> {
        if !self.can_scan {
            return Err(RadioTransportError::NotSupported {
                operation: "scan".to_string(),
            }
            .into());
        }

        let node = self.node;
        let hear_own_frames = self.hear_own_frames;
        let signal_strength = self.signal_strength;
        let time_source = Arc::clone(&self.medium.time_source);
        let receiver = self.medium.air.subscribe();
        debug!("node {} listening", node);

        let stream = futures::stream::unfold(receiver, move |mut receiver| {
            let time_source = Arc::clone(&time_source);
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(frame) => {
                            if frame.origin == Some(node) && !hear_own_frames {
                                continue;
                            }
                            let raw = RawAdvertisement {
                                bytes: frame.bytes,
                                signal_strength,
                                timestamp: time_source.now(),
                            };
                            return Some((raw, receiver));
                        }
                        Err(RecvError::Lagged(missed)) => {
                            trace!("node {} missed {} frames", node, missed);
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        });
        Ok(stream.boxed())
    }
}

#[async_trait]
impl ChallengeTransport for SimulatedRadio {
    async fn send_challenge(
        &self,
        target: PeerId,
        challenge: Challenge,
    ) -> Result<ChallengeResponse, RadioError> {
        let route = self
            .medium
            .routes
            .get(&target)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RadioTransportError::PeerUnreachable {
                peer: target.short(),
            })?;

        // Both directions cross the air as encoded frames
        let request = challenge
            .to_bytes()
            .map_err(|e| RadioError::transient(e.to_string()))?;
        if let Some(delay) = route.delay {
            tokio::time::sleep(delay).await;
        }
        let received =
            Challenge::from_bytes(&request).map_err(|e| RadioError::transient(e.to_string()))?;

        match route.responder.respond(&received) {
            Some(response) => {
                let reply = response
                    .to_bytes()
                    .map_err(|e| RadioError::transient(e.to_string()))?;
                ChallengeResponse::from_bytes(&reply)
                    .map_err(|e| RadioError::transient(e.to_string()))
            }
            None => {
                trace!("peer {} ignored challenge", target.short());
                futures::future::pending().await
            }
        }
    }
}
