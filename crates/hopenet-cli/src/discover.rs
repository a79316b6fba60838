//! The `discover` session
//!
//! Runs the local engine on the chosen radio until the duration elapses or
//! the user interrupts, printing peer table changes as they happen. On the
//! simulated medium a configurable number of neighbour engines share the air
//! with the local device.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hopenet_core::{Ed25519Provider, IdentityStore, MemoryIdentityPersistence, Registration};
use hopenet_radio::SimulatedMedium;
use hopenet_runtime::{
    AdvertiseStatus, DiscoveryEngine, DiscoveryEvent, EngineStats, PeerId, PeerRecord,
    VerificationState,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::cli::RadioKind;
use crate::config::AppConfig;
use crate::error::Result;

// ----------------------------------------------------------------------------
// Options and Summary
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub duration: Duration,
    pub sim_peers: usize,
    pub scan_only: bool,
    pub radio: RadioKind,
}

/// What the session ended with
#[derive(Debug, Clone)]
pub struct DiscoverySummary {
    pub peers: Vec<PeerRecord>,
    pub stats: EngineStats,
    /// Whether this device could advertise during the session
    pub advertise_supported: bool,
}

impl DiscoverySummary {
    pub fn verified(&self) -> usize {
        self.peers
            .iter()
            .filter(|peer| peer.verification.is_verified())
            .count()
    }
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// Run one discovery session and return the final table
pub async fn run(
    config: &AppConfig,
    store: &IdentityStore,
    options: &DiscoverOptions,
) -> Result<DiscoverySummary> {
    let (engine, neighbours) = match options.radio {
        RadioKind::Sim => simulated_session(config, store, options).await?,
        RadioKind::Ble => (ble_engine(config, store, options).await?, Vec::new()),
    };

    let mut events = engine.subscribe();
    engine.start().await?;

    let mut advertise_supported = engine.advertise_status().is_supported();
    println!(
        "Discovering as {} for {}s ({})",
        store.identity().display_handle(),
        options.duration.as_secs(),
        mode_label(engine.advertise_status())
    );

    let mut printer = TablePrinter::default();
    let deadline = tokio::time::sleep(options.duration);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(deadline);
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = &mut interrupt => {
                info!("Interrupted, stopping discovery");
                break;
            }
            event = events.recv() => match event {
                Ok(DiscoveryEvent::PeerTableChanged { snapshot }) => {
                    for line in printer.changes(&snapshot) {
                        println!("{}", line);
                    }
                }
                Ok(DiscoveryEvent::AdvertiseStatusChanged { supported }) => {
                    advertise_supported = supported;
                    if supported {
                        println!("Advertising");
                    } else {
                        println!("Advertising unsupported on this device: scan-only mode");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} discovery events", skipped);
                    for line in printer.changes(&engine.snapshot()) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    engine.stop().await?;
    for neighbour in &neighbours {
        neighbour.stop().await?;
    }

    Ok(DiscoverySummary {
        peers: engine.snapshot(),
        stats: engine.stats(),
        advertise_supported,
    })
}

fn mode_label(status: AdvertiseStatus) -> &'static str {
    match status {
        AdvertiseStatus::Unsupported => "scan-only",
        _ => "advertising and scanning",
    }
}

// ---- Simulated medium ----

async fn simulated_session(
    config: &AppConfig,
    store: &IdentityStore,
    options: &DiscoverOptions,
) -> Result<(DiscoveryEngine, Vec<DiscoveryEngine>)> {
    let medium = SimulatedMedium::new(config.radio.clone());

    let mut radio = medium.radio();
    if options.scan_only {
        radio = radio.scan_only();
    }
    let engine = DiscoveryEngine::builder(store)
        .with_config(config.discovery.clone())
        .with_radio_and_transport(Arc::new(radio))
        .build()?;
    medium.attach_responder(engine.local_id(), Arc::new(engine.responder()));

    let mut neighbours = Vec::with_capacity(options.sim_peers);
    for index in 0..options.sim_peers {
        let neighbour = simulated_identity(index, config.discovery.key_bits)?;
        let neighbour_engine = DiscoveryEngine::builder(&neighbour)
            .with_config(config.discovery.clone())
            .with_radio_and_transport(Arc::new(medium.radio()))
            .build()?;
        medium.attach_responder(
            neighbour_engine.local_id(),
            Arc::new(neighbour_engine.responder()),
        );
        neighbour_engine.start().await?;
        neighbours.push(neighbour_engine);
    }
    info!("Spawned {} simulated neighbours", neighbours.len());

    Ok((engine, neighbours))
}

/// Throwaway identity for a simulated neighbour (+1 555 xxx xxxx)
fn simulated_identity(index: usize, key_bits: u32) -> Result<IdentityStore> {
    let registration = Registration::new("+1", format!("555{:07}", index));
    Ok(IdentityStore::register(
        &MemoryIdentityPersistence::new(),
        &Ed25519Provider::new(),
        &registration,
        key_bits,
    )?)
}

// ---- Host Bluetooth ----

#[cfg(feature = "ble")]
async fn ble_engine(
    config: &AppConfig,
    store: &IdentityStore,
    options: &DiscoverOptions,
) -> Result<DiscoveryEngine> {
    if options.sim_peers > 0 {
        warn!("Simulated neighbours are ignored on the BLE radio");
    }
    let radio = hopenet_radio::BleRadio::connect(config.radio.clone()).await?;
    Ok(DiscoveryEngine::builder(store)
        .with_config(config.discovery.clone())
        .with_radio_and_transport(Arc::new(radio))
        .build()?)
}

#[cfg(not(feature = "ble"))]
async fn ble_engine(
    _config: &AppConfig,
    _store: &IdentityStore,
    _options: &DiscoverOptions,
) -> Result<DiscoveryEngine> {
    Err(crate::error::CliError::FeatureNotAvailable(
        "BLE radio support; rebuild with `--features ble`".to_string(),
    ))
}

// ----------------------------------------------------------------------------
// Table Printer
// ----------------------------------------------------------------------------

/// Turns successive snapshots into one line per change
#[derive(Debug, Default)]
pub struct TablePrinter {
    seen: HashMap<PeerId, VerificationState>,
}

impl TablePrinter {
    pub fn changes(&mut self, snapshot: &[PeerRecord]) -> Vec<String> {
        let mut lines = Vec::new();

        for record in snapshot {
            match self.seen.insert(record.peer_id, record.verification) {
                None => lines.push(format!(
                    "+ {} {} [{}] rssi {}",
                    record.peer_id.short(),
                    record.display_handle,
                    record.verification,
                    format_rssi(record.signal_strength)
                )),
                Some(previous) if previous != record.verification => lines.push(format!(
                    "~ {} {} {} -> {}",
                    record.peer_id.short(),
                    record.display_handle,
                    previous,
                    record.verification
                )),
                Some(_) => {}
            }
        }

        let gone: Vec<PeerId> = self
            .seen
            .keys()
            .filter(|id| !snapshot.iter().any(|record| record.peer_id == **id))
            .copied()
            .collect();
        for id in gone {
            self.seen.remove(&id);
            lines.push(format!("- {} expired", id.short()));
        }

        lines
    }
}

pub fn format_rssi(rssi: Option<i16>) -> String {
    match rssi {
        Some(value) => format!("{} dBm", value),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopenet_core::{Fingerprint, Timestamp};

    fn record(byte: u8, verification: VerificationState) -> PeerRecord {
        PeerRecord {
            peer_id: PeerId::new([byte; 16]),
            display_handle: format!("+1555000000{}", byte),
            public_key_fingerprint: Fingerprint::new([byte; 32]),
            last_seen: Timestamp::new(1_000),
            signal_strength: Some(-60),
            verification,
            verification_changed_at: Timestamp::new(1_000),
            full_public_key: None,
            sequence: 1,
        }
    }

    #[test]
    fn test_printer_reports_new_changed_and_expired_peers() {
        let mut printer = TablePrinter::default();

        let lines = printer.changes(&[record(1, VerificationState::Unverified)]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("+ 01010101"));
        assert!(lines[0].contains("-60 dBm"));

        // Unchanged snapshot prints nothing
        assert!(printer
            .changes(&[record(1, VerificationState::Unverified)])
            .is_empty());

        let lines = printer.changes(&[record(1, VerificationState::Verified)]);
        assert_eq!(lines, vec!["~ 01010101 +15550000001 unverified -> verified"]);

        let lines = printer.changes(&[]);
        assert_eq!(lines, vec!["- 01010101 expired"]);
    }

    #[test]
    fn test_simulated_identities_are_distinct() {
        let a = simulated_identity(0, 256).unwrap();
        let b = simulated_identity(1, 256).unwrap();
        assert_eq!(a.identity().display_handle(), "+15550000000");
        assert_eq!(b.identity().display_handle(), "+15550000001");
        assert_ne!(a.identity().id(), b.identity().id());
    }

    #[test]
    fn test_mode_label() {
        assert_eq!(mode_label(AdvertiseStatus::Unsupported), "scan-only");
        assert_eq!(
            mode_label(AdvertiseStatus::Advertising),
            "advertising and scanning"
        );
    }
}
