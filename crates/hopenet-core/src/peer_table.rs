//! Bounded registry of discovered peers
//!
//! The table is the single piece of shared mutable state in the discovery
//! engine. Every operation takes the internal lock exactly once and never
//! across I/O, so each call is atomic with respect to the others.

use core::fmt;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::codec::Advertisement;
use crate::errors::{TableError, VerificationError};
use crate::types::{Fingerprint, PeerId, TimeSource, Timestamp};

// ----------------------------------------------------------------------------
// Verification State
// ----------------------------------------------------------------------------

/// Identity verification progress for a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationState {
    Unverified,
    ChallengeSent,
    Verified,
    Failed,
}

impl VerificationState {
    /// Whether `self -> next` is one of the permitted edges
    pub fn can_transition_to(self, next: VerificationState) -> bool {
        use VerificationState::*;
        matches!(
            (self, next),
            (Unverified, ChallengeSent)
                | (ChallengeSent, Verified)
                | (ChallengeSent, Failed)
                | (Failed, Unverified)
        )
    }

    pub fn is_verified(self) -> bool {
        self == VerificationState::Verified
    }
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerificationState::Unverified => "unverified",
            VerificationState::ChallengeSent => "challenge-sent",
            VerificationState::Verified => "verified",
            VerificationState::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Peer Record
// ----------------------------------------------------------------------------

/// What this device knows about one discovered peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub peer_id: PeerId,
    pub display_handle: String,
    pub public_key_fingerprint: Fingerprint,
    pub last_seen: Timestamp,
    pub signal_strength: Option<i16>,
    pub verification: VerificationState,
    /// When `verification` last changed
    pub verification_changed_at: Timestamp,
    /// Present only once a handshake has confirmed the key
    pub full_public_key: Option<Vec<u8>>,
    /// Highest accepted beacon sequence
    pub sequence: u64,
}

// ----------------------------------------------------------------------------
// Upsert Outcome
// ----------------------------------------------------------------------------

/// Why an advertisement was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    StaleSequence,
    CapacityAndNotEvictable,
    SelfAdvertisement,
}

/// Result of applying an advertisement to the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New record; `evicted` names the record dropped to make room
    Inserted { evicted: Option<PeerId> },
    /// Existing record refreshed. A fingerprint change resets verification.
    Updated {
        fingerprint_changed: bool,
        verification: VerificationState,
    },
    Rejected(RejectReason),
}

// ----------------------------------------------------------------------------
// Peer Table
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct Entry {
    record: PeerRecord,
    /// Nonce of the outstanding challenge while in `ChallengeSent`
    pending_nonce: Option<Vec<u8>>,
}

/// Concurrent, capacity-bounded peer registry with TTL expiry
pub struct PeerTable {
    local_id: PeerId,
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn TimeSource>,
    entries: RwLock<HashMap<PeerId, Entry>>,
}

impl fmt::Debug for PeerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerTable")
            .field("local_id", &self.local_id)
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .finish()
    }
}

impl PeerTable {
    pub fn new(
        local_id: PeerId,
        capacity: usize,
        ttl: Duration,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            local_id,
            capacity,
            ttl,
            clock,
            entries: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    pub fn local_id(&self) -> PeerId {
        self.local_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.entries.read().contains_key(peer_id)
    }

    /// Copy of a single record
    pub fn get(&self, peer_id: &PeerId) -> Option<PeerRecord> {
        self.entries.read().get(peer_id).map(|e| e.record.clone())
    }

    /// Apply a received advertisement
    pub fn upsert(
        &self,
        advertisement: &Advertisement,
        observed_at: Timestamp,
        signal_strength: Option<i16>,
    ) -> UpsertOutcome {
        let peer_id = advertisement.sender_id;
        if peer_id == self.local_id {
            trace!("Ignoring own beacon echo");
            return UpsertOutcome::Rejected(RejectReason::SelfAdvertisement);
        }

        let mut entries = self.entries.write();

        if let Some(entry) = entries.get_mut(&peer_id) {
            let record = &mut entry.record;
            if advertisement.sequence <= record.sequence {
                trace!(
                    "Stale beacon from {} (seq {} <= {})",
                    peer_id.short(),
                    advertisement.sequence,
                    record.sequence
                );
                return UpsertOutcome::Rejected(RejectReason::StaleSequence);
            }

            let fingerprint_changed =
                record.public_key_fingerprint != advertisement.public_key_fingerprint;

            record.display_handle = advertisement.display_handle.clone();
            record.public_key_fingerprint = advertisement.public_key_fingerprint;
            record.sequence = advertisement.sequence;
            record.last_seen = record.last_seen.max(observed_at);
            if signal_strength.is_some() {
                record.signal_strength = signal_strength;
            }

            if fingerprint_changed {
                debug!(
                    "Peer {} changed key fingerprint, resetting verification",
                    peer_id.short()
                );
                record.verification = VerificationState::Unverified;
                record.verification_changed_at = self.clock.now();
                record.full_public_key = None;
                entry.pending_nonce = None;
            }

            return UpsertOutcome::Updated {
                fingerprint_changed,
                verification: record.verification,
            };
        }

        let mut evicted = None;
        if entries.len() >= self.capacity {
            match Self::eviction_candidate(&entries) {
                Some(victim) => {
                    entries.remove(&victim);
                    debug!("Peer table full, evicted {}", victim.short());
                    evicted = Some(victim);
                }
                None => {
                    return UpsertOutcome::Rejected(RejectReason::CapacityAndNotEvictable);
                }
            }
        }

        let record = PeerRecord {
            peer_id,
            display_handle: advertisement.display_handle.clone(),
            public_key_fingerprint: advertisement.public_key_fingerprint,
            last_seen: observed_at,
            signal_strength,
            verification: VerificationState::Unverified,
            verification_changed_at: self.clock.now(),
            full_public_key: None,
            sequence: advertisement.sequence,
        };
        entries.insert(
            peer_id,
            Entry {
                record,
                pending_nonce: None,
            },
        );
        debug!(
            "Discovered peer {} ({})",
            peer_id.short(),
            advertisement.display_handle
        );

        UpsertOutcome::Inserted { evicted }
    }

    /// Least-recently-seen record that is not verified, else least-recently-seen overall
    fn eviction_candidate(entries: &HashMap<PeerId, Entry>) -> Option<PeerId> {
        let oldest = |verified_allowed: bool| {
            entries
                .values()
                .filter(|e| verified_allowed || !e.record.verification.is_verified())
                .min_by_key(|e| (e.record.last_seen, e.record.peer_id))
                .map(|e| e.record.peer_id)
        };
        oldest(false).or_else(|| oldest(true))
    }

    /// Move a record along the verification state machine
    pub fn mark_verification(
        &self,
        peer_id: &PeerId,
        new_state: VerificationState,
    ) -> Result<(), TableError> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(peer_id).ok_or(TableError::PeerNotFound)?;
        self.transition(entry, new_state)
    }

    fn transition(&self, entry: &mut Entry, new_state: VerificationState) -> Result<(), TableError> {
        let from = entry.record.verification;
        if !from.can_transition_to(new_state) {
            return Err(TableError::InvalidTransition {
                from,
                to: new_state,
            });
        }

        entry.record.verification = new_state;
        entry.record.verification_changed_at = self.clock.now();
        if new_state != VerificationState::ChallengeSent {
            entry.pending_nonce = None;
        }
        trace!(
            "Peer {} verification {} -> {}",
            entry.record.peer_id.short(),
            from,
            new_state
        );
        Ok(())
    }

    /// Record an outgoing challenge: `Unverified -> ChallengeSent` with its nonce
    pub fn begin_challenge(&self, peer_id: &PeerId, nonce: Vec<u8>) -> Result<(), TableError> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(peer_id).ok_or(TableError::PeerNotFound)?;
        self.transition(entry, VerificationState::ChallengeSent)?;
        entry.pending_nonce = Some(nonce);
        Ok(())
    }

    /// Settle an outstanding challenge.
    ///
    /// Late results are refused with `StaleChallenge` when the record has been
    /// evicted, has moved on, or is waiting on a different nonce.
    pub fn complete_challenge(
        &self,
        peer_id: &PeerId,
        nonce: &[u8],
        result: Result<Vec<u8>, VerificationError>,
    ) -> Result<VerificationState, TableError> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(peer_id).ok_or(TableError::PeerNotFound)?;

        let outstanding = entry.record.verification == VerificationState::ChallengeSent
            && entry.pending_nonce.as_deref() == Some(nonce);
        if !outstanding {
            return Err(TableError::StaleChallenge);
        }

        match result {
            Ok(public_key) => {
                self.transition(entry, VerificationState::Verified)?;
                entry.record.full_public_key = Some(public_key);
            }
            Err(reason) => {
                debug!(
                    "Verification of {} failed: {}",
                    entry.record.peer_id.short(),
                    reason
                );
                self.transition(entry, VerificationState::Failed)?;
            }
        }
        Ok(entry.record.verification)
    }

    /// Remove every record with `now - last_seen > ttl`
    pub fn sweep_expired(&self, now: Timestamp) -> BTreeSet<PeerId> {
        let mut entries = self.entries.write();
        let expired: BTreeSet<PeerId> = entries
            .values()
            .filter(|e| now.duration_since(e.record.last_seen) > self.ttl)
            .map(|e| e.record.peer_id)
            .collect();

        for peer_id in &expired {
            entries.remove(peer_id);
        }
        if !expired.is_empty() {
            debug!("Expired {} peer(s)", expired.len());
        }
        expired
    }

    /// Immutable copy of all records, most recently seen first
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        let mut records: Vec<PeerRecord> = self
            .entries
            .read()
            .values()
            .map(|e| e.record.clone())
            .collect();
        records.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| a.peer_id.cmp(&b.peer_id))
        });
        records
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
