//! Engine counters
//!
//! Radio noise is absorbed rather than surfaced, so these counters are the only
//! place dropped and malformed frames become visible.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub frames_received: u64,
    /// Dropped because the decode queue was full
    pub frames_dropped: u64,
    pub frames_decoded: u64,
    pub frames_malformed: u64,
    /// Decoded with a non-canonical signature width
    pub frames_untrusted: u64,
    /// Stale, self or capacity rejections from the peer table
    pub frames_rejected: u64,
    /// Beacon signature did not verify against a confirmed key
    pub bad_signatures: u64,
    pub handshakes_started: u64,
    pub handshakes_verified: u64,
    pub handshakes_failed: u64,
    /// Handshake results that arrived after the record moved on
    pub late_results_discarded: u64,
    pub advertise_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub frames_received: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub frames_decoded: AtomicU64,
    pub frames_malformed: AtomicU64,
    pub frames_untrusted: AtomicU64,
    pub frames_rejected: AtomicU64,
    pub bad_signatures: AtomicU64,
    pub handshakes_started: AtomicU64,
    pub handshakes_verified: AtomicU64,
    pub handshakes_failed: AtomicU64,
    pub late_results_discarded: AtomicU64,
    pub advertise_failures: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        EngineStats {
            frames_received: load(&self.frames_received),
            frames_dropped: load(&self.frames_dropped),
            frames_decoded: load(&self.frames_decoded),
            frames_malformed: load(&self.frames_malformed),
            frames_untrusted: load(&self.frames_untrusted),
            frames_rejected: load(&self.frames_rejected),
            bad_signatures: load(&self.bad_signatures),
            handshakes_started: load(&self.handshakes_started),
            handshakes_verified: load(&self.handshakes_verified),
            handshakes_failed: load(&self.handshakes_failed),
            late_results_discarded: load(&self.late_results_discarded),
            advertise_failures: load(&self.advertise_failures),
        }
    }
}
