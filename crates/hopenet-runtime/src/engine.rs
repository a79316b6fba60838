//! Discovery engine
//!
//! Orchestrates the advertise and scan roles, feeds decoded beacons into the
//! peer table, drives per-peer verification handshakes and publishes table
//! and advertise-status changes to subscribers.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hopenet_core::{IdentityStore, MemoryIdentityPersistence, Registration, Ed25519Provider};
//! use hopenet_radio::{RadioConfig, SimulatedMedium};
//! use hopenet_runtime::{DiscoveryEngine, DiscoveryEvent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let persistence = MemoryIdentityPersistence::new();
//! let store = IdentityStore::register(
//!     &persistence,
//!     &Ed25519Provider::new(),
//!     &Registration::new("+1", "5551234567"),
//!     256,
//! )?;
//!
//! let medium = SimulatedMedium::new(RadioConfig::default());
//! let engine = DiscoveryEngine::builder(&store)
//!     .with_radio_and_transport(Arc::new(medium.radio()))
//!     .build()?;
//!
//! let mut events = engine.subscribe();
//! engine.start().await?;
//! while let Ok(event) = events.recv().await {
//!     if let DiscoveryEvent::PeerTableChanged { snapshot } = event {
//!         println!("{} peers nearby", snapshot.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hopenet_core::{
    verify_response, AdvertisementCodec, Challenge, ChallengeTransport, CodecError,
    CryptoProvider, DiscoveryConfig, Fingerprint, Identity, IdentityResponder, IdentityStore,
    PeerId, PeerRecord, PeerTable, RadioCapability, RadioError, RawAdvertisement, TimeSource,
    UpsertOutcome, VerificationError, VerificationState,
};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::builder::DiscoveryEngineBuilder;
use crate::error::{EngineError, EngineResult};
use crate::events::{AdvertiseStatus, DiscoveryEvent, SessionState};
use crate::handshakes::HandshakeTracker;
use crate::stats::{Counters, EngineStats};
use crate::tasks;

// ----------------------------------------------------------------------------
// Shared State
// ----------------------------------------------------------------------------

/// State shared by the engine handle and its tasks
pub(crate) struct Shared {
    pub identity: Arc<Identity>,
    pub crypto: Arc<dyn CryptoProvider>,
    pub codec: AdvertisementCodec,
    pub radio: Arc<dyn RadioCapability>,
    pub transport: Arc<dyn ChallengeTransport>,
    pub table: PeerTable,
    pub config: DiscoveryConfig,
    pub clock: Arc<dyn TimeSource>,
    pub counters: Counters,
    sequence: AtomicU64,
    advertise_status: Mutex<AdvertiseStatus>,
    handshakes: HandshakeTracker,
    events: broadcast::Sender<DiscoveryEvent>,
}

impl Shared {
    pub fn new(
        identity: Arc<Identity>,
        crypto: Arc<dyn CryptoProvider>,
        radio: Arc<dyn RadioCapability>,
        transport: Arc<dyn ChallengeTransport>,
        config: DiscoveryConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let table = PeerTable::new(
            identity.id(),
            config.table_capacity,
            config.peer_ttl(),
            Arc::clone(&clock),
        );
        let (events, _) = broadcast::channel(config.event_channel_capacity);
        // Seeded from the clock so a restarted device keeps beating its old sequence
        let sequence = AtomicU64::new(clock.now().as_millis());

        Self {
            codec: AdvertisementCodec::new(Arc::clone(&crypto)),
            identity,
            crypto,
            radio,
            transport,
            table,
            config,
            clock,
            counters: Counters::default(),
            sequence,
            advertise_status: Mutex::new(AdvertiseStatus::Inactive),
            handshakes: HandshakeTracker::new(),
            events,
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ---- Advertising ----

    pub fn advertise_status(&self) -> AdvertiseStatus {
        *self.advertise_status.lock()
    }

    fn set_advertise_status(&self, status: AdvertiseStatus) {
        let previous = std::mem::replace(&mut *self.advertise_status.lock(), status);
        let changed = previous == AdvertiseStatus::Inactive
            || previous.is_supported() != status.is_supported();
        if status != AdvertiseStatus::Inactive && changed {
            let _ = self.events.send(DiscoveryEvent::AdvertiseStatusChanged {
                supported: status.is_supported(),
            });
        }
    }

    /// Broadcast a fresh beacon and update the advertise sub-state
    pub async fn advertise_once(&self) -> AdvertiseStatus {
        let sequence = self.next_sequence();
        let beacon = match self.codec.encode(&self.identity, sequence) {
            Ok(beacon) => beacon,
            Err(e) => {
                error!("Failed to build beacon: {}", e);
                Counters::bump(&self.counters.advertise_failures);
                return self.advertise_status();
            }
        };

        match self.radio.advertise(&beacon).await {
            Ok(()) => {
                trace!("Advertised sequence {}", sequence);
                self.set_advertise_status(AdvertiseStatus::Advertising);
            }
            Err(RadioError::Unsupported { operation }) => {
                warn!(
                    "Radio cannot {}; continuing in scan-only mode",
                    operation
                );
                Counters::bump(&self.counters.advertise_failures);
                self.set_advertise_status(AdvertiseStatus::Unsupported);
            }
            Err(e) => {
                // Transient: status unchanged, the next refresh tries again
                warn!("Advertise failed: {}", e);
                Counters::bump(&self.counters.advertise_failures);
            }
        }
        self.advertise_status()
    }

    // ---- Frame Processing ----

    /// Decode one received frame and apply it to the table
    pub fn process_frame(self: &Arc<Self>, raw: RawAdvertisement) {
        let advertisement = match AdvertisementCodec::decode(&raw.bytes) {
            Ok(advertisement) => advertisement,
            Err(CodecError::Untrusted(advertisement)) => {
                Counters::bump(&self.counters.frames_untrusted);
                *advertisement
            }
            Err(e) => {
                Counters::bump(&self.counters.frames_malformed);
                trace!("Dropping frame: {}", e);
                return;
            }
        };
        Counters::bump(&self.counters.frames_decoded);

        let peer_id = advertisement.sender_id;
        let fingerprint = advertisement.public_key_fingerprint;

        // Once a key is confirmed, beacons claiming the same key must be signed by it
        if let Some(record) = self.table.get(&peer_id) {
            if let Some(key) = record.full_public_key.as_deref() {
                if record.public_key_fingerprint == fingerprint
                    && !advertisement.verify_signature(self.crypto.as_ref(), key)
                {
                    Counters::bump(&self.counters.bad_signatures);
                    debug!("Dropping beacon from {} with bad signature", peer_id.short());
                    return;
                }
            }
        }

        match self
            .table
            .upsert(&advertisement, raw.timestamp, raw.signal_strength)
        {
            UpsertOutcome::Rejected(reason) => {
                Counters::bump(&self.counters.frames_rejected);
                trace!("Beacon from {} rejected: {:?}", peer_id.short(), reason);
                return;
            }
            UpsertOutcome::Inserted { evicted } => {
                if let Some(victim) = evicted {
                    self.handshakes.cancel(&victim);
                }
                self.start_handshake(peer_id, fingerprint);
            }
            UpsertOutcome::Updated {
                fingerprint_changed: true,
                ..
            } => {
                self.handshakes.cancel(&peer_id);
                self.start_handshake(peer_id, fingerprint);
            }
            UpsertOutcome::Updated {
                verification: VerificationState::Failed,
                ..
            } => self.retry_failed(peer_id, fingerprint),
            UpsertOutcome::Updated {
                verification: VerificationState::Unverified,
                ..
            } => {
                if !self.handshakes.is_running(&peer_id) {
                    self.start_handshake(peer_id, fingerprint);
                }
            }
            UpsertOutcome::Updated { .. } => {}
        }
        self.publish_snapshot();
    }

    /// Re-challenge a failed peer once the backoff has passed
    fn retry_failed(self: &Arc<Self>, peer_id: PeerId, fingerprint: Fingerprint) {
        let Some(record) = self.table.get(&peer_id) else {
            return;
        };
        let waited = self
            .clock
            .now()
            .duration_since(record.verification_changed_at);
        if waited < self.config.failed_retry_backoff() {
            return;
        }
        if self
            .table
            .mark_verification(&peer_id, VerificationState::Unverified)
            .is_ok()
        {
            debug!("Retrying verification of {}", peer_id.short());
            self.start_handshake(peer_id, fingerprint);
        }
    }

    // ---- Verification ----

    fn start_handshake(self: &Arc<Self>, peer_id: PeerId, fingerprint: Fingerprint) {
        let challenge = Challenge::random(self.identity.id(), peer_id);
        if let Err(e) = self
            .table
            .begin_challenge(&peer_id, challenge.nonce.clone())
        {
            debug!("Not challenging {}: {}", peer_id.short(), e);
            return;
        }
        Counters::bump(&self.counters.handshakes_started);
        debug!("Challenging {}", peer_id.short());

        let shared = Arc::clone(self);
        let nonce = challenge.nonce.clone();
        self.handshakes.spawn(peer_id, nonce, move |generation| async move {
            shared.run_handshake(peer_id, challenge, fingerprint).await;
            shared.handshakes.finish(&peer_id, generation);
        });
    }

    async fn run_handshake(&self, peer_id: PeerId, challenge: Challenge, fingerprint: Fingerprint) {
        let nonce = challenge.nonce.clone();
        let attempt = tokio::time::timeout(
            self.config.handshake_timeout(),
            self.transport.send_challenge(peer_id, challenge.clone()),
        )
        .await;

        let result = match attempt {
            Err(_) => Err(VerificationError::Timeout {
                after_ms: self.config.handshake_timeout_ms,
            }),
            Ok(Err(e)) => Err(VerificationError::Unreachable(e.to_string())),
            Ok(Ok(response)) => {
                verify_response(self.crypto.as_ref(), &challenge, &response, &fingerprint)
            }
        };
        self.settle(peer_id, &nonce, result);
    }

    fn settle(&self, peer_id: PeerId, nonce: &[u8], result: Result<Vec<u8>, VerificationError>) {
        match self.table.complete_challenge(&peer_id, nonce, result) {
            Ok(VerificationState::Verified) => {
                Counters::bump(&self.counters.handshakes_verified);
                info!("Verified peer {}", peer_id.short());
            }
            Ok(state) => {
                Counters::bump(&self.counters.handshakes_failed);
                debug!("Verification of {} ended {}", peer_id.short(), state);
            }
            Err(e) => {
                Counters::bump(&self.counters.late_results_discarded);
                trace!("Discarding handshake result for {}: {}", peer_id.short(), e);
                return;
            }
        }
        self.publish_snapshot();
    }

    /// Fail every in-flight handshake; they can be retried after the backoff
    fn abandon_handshakes(&self) {
        for (peer_id, nonce) in self.handshakes.cancel_all() {
            self.settle(
                peer_id,
                &nonce,
                Err(VerificationError::Unreachable("discovery stopped".to_string())),
            );
        }
    }

    // ---- Expiry ----

    pub fn sweep(&self) {
        let expired = self.table.sweep_expired(self.clock.now());
        if expired.is_empty() {
            return;
        }
        for peer_id in &expired {
            self.handshakes.cancel(peer_id);
        }
        debug!("Swept {} expired peer(s)", expired.len());
        self.publish_snapshot();
    }

    fn publish_snapshot(&self) {
        if self.events.receiver_count() == 0 {
            return;
        }
        let _ = self.events.send(DiscoveryEvent::PeerTableChanged {
            snapshot: self.table.snapshot(),
        });
    }
}

// ----------------------------------------------------------------------------
// Discovery Engine
// ----------------------------------------------------------------------------

/// Handle to a device's discovery session
pub struct DiscoveryEngine {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    session: Mutex<SessionState>,
}

impl DiscoveryEngine {
    /// Start building an engine for a registered identity
    pub fn builder(store: &IdentityStore) -> DiscoveryEngineBuilder {
        DiscoveryEngineBuilder::new(store)
    }

    pub(crate) fn from_shared(shared: Shared) -> Self {
        Self {
            shared: Arc::new(shared),
            tasks: Mutex::new(Vec::new()),
            session: Mutex::new(SessionState::Idle),
        }
    }

    /// Begin advertising and scanning.
    ///
    /// The first advertise attempt completes before this returns, so the
    /// advertise status is already known to the caller.
    pub async fn start(&self) -> EngineResult<()> {
        {
            let mut session = self.session.lock();
            if *session == SessionState::Running {
                return Err(EngineError::AlreadyRunning);
            }
            *session = SessionState::Running;
        }

        let shared = &self.shared;
        info!(
            "Starting discovery as {} ({})",
            shared.identity.display_handle(),
            shared.identity.id().short()
        );

        if shared.advertise_once().await == AdvertiseStatus::Unsupported {
            info!("Advertising unavailable; discovering in scan-only mode");
        }

        let (frame_tx, frame_rx) = mpsc::channel(shared.config.scan_queue_capacity);
        let handles = vec![
            tokio::spawn(tasks::frame_processor(Arc::clone(shared), frame_rx)),
            tokio::spawn(tasks::scan_reader(Arc::clone(shared), frame_tx)),
            tokio::spawn(tasks::advertise_refresh(Arc::clone(shared))),
            tokio::spawn(tasks::expiry_sweep(Arc::clone(shared))),
        ];
        self.tasks.lock().extend(handles);
        Ok(())
    }

    /// Stop all roles. The peer table is kept.
    pub async fn stop(&self) -> EngineResult<()> {
        {
            let mut session = self.session.lock();
            if *session == SessionState::Idle {
                return Ok(());
            }
            *session = SessionState::Idle;
        }

        let handles = std::mem::take(&mut *self.tasks.lock());
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            let _ = handle.await;
        }

        self.shared.abandon_handshakes();
        if let Err(e) = self.shared.radio.stop_advertising().await {
            warn!("Failed to stop advertising: {}", e);
        }
        self.shared.set_advertise_status(AdvertiseStatus::Inactive);
        info!("Discovery stopped");
        Ok(())
    }

    /// Foreground re-entry: the only point where an unsupported advertiser is retried
    pub async fn on_foreground(&self) -> AdvertiseStatus {
        if *self.session.lock() != SessionState::Running {
            return self.advertise_status();
        }
        if self.advertise_status() == AdvertiseStatus::Unsupported {
            debug!("Retrying advertise after foreground re-entry");
            return self.shared.advertise_once().await;
        }
        self.advertise_status()
    }

    /// Subscribe to table and advertise-status changes
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.shared.events.subscribe()
    }

    /// Current peers, most recently seen first
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.shared.table.snapshot()
    }

    pub fn peer(&self, peer_id: &PeerId) -> Option<PeerRecord> {
        self.shared.table.get(peer_id)
    }

    pub fn stats(&self) -> EngineStats {
        self.shared.counters.snapshot()
    }

    pub fn advertise_status(&self) -> AdvertiseStatus {
        self.shared.advertise_status()
    }

    pub fn session_state(&self) -> SessionState {
        *self.session.lock()
    }

    pub fn local_id(&self) -> PeerId {
        self.shared.identity.id()
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.shared.config
    }

    /// Answers challenges addressed to this device
    pub fn responder(&self) -> IdentityResponder {
        IdentityResponder::new(
            Arc::clone(&self.shared.identity),
            Arc::clone(&self.shared.crypto),
        )
    }
}

impl Drop for DiscoveryEngine {
    fn drop(&mut self) {
        for handle in self.tasks.get_mut().drain(..) {
            handle.abort();
        }
        self.shared.handshakes.cancel_all();
    }
}

impl std::fmt::Debug for DiscoveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryEngine")
            .field("local_id", &self.local_id())
            .field("session", &self.session_state())
            .field("advertise", &self.advertise_status())
            .field("peers", &self.shared.table.len())
            .finish()
    }
}
