//! Long-lived engine tasks
//!
//! One scan reader, one frame processor, one advertise refresh timer and one
//! expiry sweep timer. None of them holds the peer table lock across an await.

use std::sync::Arc;

use futures::StreamExt;
use hopenet_core::{RadioError, RawAdvertisement};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::engine::Shared;
use crate::events::AdvertiseStatus;
use crate::stats::Counters;

// ----------------------------------------------------------------------------
// Scan Reader
// ----------------------------------------------------------------------------

/// Pull frames off the radio and hand them to the processor without blocking.
///
/// Overflow is dropped and counted. Transient radio failures reopen the scan
/// after `scan_restart_interval`; an unsupported scanner ends the task.
pub(crate) async fn scan_reader(shared: Arc<Shared>, frames: mpsc::Sender<RawAdvertisement>) {
    loop {
        match shared.radio.scan().await {
            Ok(mut stream) => {
                info!("Scanning for HopeNet beacons");
                while let Some(raw) = stream.next().await {
                    Counters::bump(&shared.counters.frames_received);
                    match frames.try_send(raw) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            Counters::bump(&shared.counters.frames_dropped);
                            trace!("Decode queue full, dropping frame");
                        }
                        Err(TrySendError::Closed(_)) => return,
                    }
                }
                warn!("Scan stream ended, reopening");
            }
            Err(RadioError::Unsupported { operation }) => {
                warn!("Radio cannot {}; this device will not discover peers", operation);
                return;
            }
            Err(e) => {
                warn!("Scan failed: {}", e);
            }
        }
        sleep(shared.config.scan_restart_interval()).await;
    }
}

// ----------------------------------------------------------------------------
// Frame Processor
// ----------------------------------------------------------------------------

pub(crate) async fn frame_processor(
    shared: Arc<Shared>,
    mut frames: mpsc::Receiver<RawAdvertisement>,
) {
    while let Some(raw) = frames.recv().await {
        shared.process_frame(raw);
    }
    debug!("Frame processor stopped");
}

// ----------------------------------------------------------------------------
// Timers
// ----------------------------------------------------------------------------

/// Refresh the beacon with a new sequence every advertise interval
pub(crate) async fn advertise_refresh(shared: Arc<Shared>) {
    let mut ticker = interval(shared.config.advertise_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; start() already advertised
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if shared.advertise_status() == AdvertiseStatus::Unsupported {
            continue;
        }
        shared.advertise_once().await;
    }
}

/// Evict expired peers every sweep interval
pub(crate) async fn expiry_sweep(shared: Arc<Shared>) {
    let mut ticker = interval(shared.config.sweep_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        shared.sweep();
    }
}
