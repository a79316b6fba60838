//! Property-based tests for peer table invariants
//!
//! These tests verify uniqueness of records, sequence-ordered updates, expiry
//! exactness and the capacity bound under arbitrary advertisement streams.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hopenet_core::{
    Advertisement, Fingerprint, ManualTimeSource, PeerId, PeerTable, RejectReason, Timestamp,
    UpsertOutcome,
};
use proptest::prelude::*;

const TTL_MS: u64 = 5_000;

fn local_id() -> PeerId {
    PeerId::new([0xFF; 16])
}

fn new_table(capacity: usize) -> PeerTable {
    PeerTable::new(
        local_id(),
        capacity,
        Duration::from_millis(TTL_MS),
        Arc::new(ManualTimeSource::new(Timestamp::new(0))),
    )
}

fn advertisement(sender: u8, sequence: u64, handle: &str) -> Advertisement {
    Advertisement {
        version: 1,
        sender_id: PeerId::new([sender; 16]),
        display_handle: handle.to_string(),
        public_key_fingerprint: Fingerprint::new([sender; 32]),
        sequence,
        signature: vec![0; 64],
    }
}

/// (sender index, sequence increment, time increment, handle)
fn arb_event() -> impl Strategy<Value = (u8, u64, u64, String)> {
    (
        0u8..8,
        1u64..5,
        0u64..1_000,
        prop::string::string_regex("[a-z]{1,8}").unwrap(),
    )
}

proptest! {
    /// Property: increasing sequences per peer leave exactly one record per peer with the latest fields
    #[test]
    fn one_record_per_peer_with_latest_fields(events in prop::collection::vec(arb_event(), 1..64)) {
        let table = new_table(64);
        let mut sequences: HashMap<u8, u64> = HashMap::new();
        let mut latest: HashMap<u8, (u64, Timestamp, String)> = HashMap::new();
        let mut now = 0u64;

        for (sender, step, dt, handle) in events {
            now += dt;
            let seq = sequences.entry(sender).or_insert(0);
            *seq += step;

            let outcome = table.upsert(&advertisement(sender, *seq, &handle), Timestamp::new(now), None);
            prop_assert!(!matches!(outcome, UpsertOutcome::Rejected(_)));
            latest.insert(sender, (*seq, Timestamp::new(now), handle));
        }

        let snapshot = table.snapshot();
        prop_assert_eq!(snapshot.len(), latest.len());
        for record in snapshot {
            let sender = record.peer_id.as_bytes()[0];
            let (seq, seen, handle) = &latest[&sender];
            prop_assert_eq!(record.sequence, *seq);
            prop_assert_eq!(record.last_seen, *seen);
            prop_assert_eq!(&record.display_handle, handle);
        }
    }

    /// Property: a replayed or older sequence never changes the record
    #[test]
    fn stale_frames_are_inert(first in 1u64..1_000, back in 0u64..1_000, t in 1u64..10_000) {
        let table = new_table(8);
        table.upsert(&advertisement(1, first, "orig"), Timestamp::new(t), Some(-50));
        let before = table.get(&PeerId::new([1; 16])).unwrap();

        let stale = first.saturating_sub(back);
        let outcome = table.upsert(&advertisement(1, stale, "replay"), Timestamp::new(t + 1), Some(-10));
        prop_assert_eq!(outcome, UpsertOutcome::Rejected(RejectReason::StaleSequence));
        prop_assert_eq!(table.get(&PeerId::new([1; 16])).unwrap(), before);
    }

    /// Property: sweep removes exactly the records older than TTL, and only once
    #[test]
    fn sweep_is_exact_and_idempotent(
        seen in prop::collection::vec(0u64..20_000, 1..16),
        now in 0u64..30_000,
    ) {
        let table = new_table(64);
        for (i, t) in seen.iter().enumerate() {
            table.upsert(&advertisement(i as u8, 1, "p"), Timestamp::new(*t), None);
        }

        let expected: Vec<PeerId> = {
            let mut ids: Vec<PeerId> = seen
                .iter()
                .enumerate()
                .filter(|(_, t)| now.saturating_sub(**t) > TTL_MS)
                .map(|(i, _)| PeerId::new([i as u8; 16]))
                .collect();
            ids.sort();
            ids
        };

        let evicted: Vec<PeerId> = table.sweep_expired(Timestamp::new(now)).into_iter().collect();
        prop_assert_eq!(&evicted, &expected);
        prop_assert!(table.sweep_expired(Timestamp::new(now)).is_empty());
        prop_assert_eq!(table.len(), seen.len() - expected.len());
    }

    /// Property: the table never grows past its capacity
    #[test]
    fn capacity_is_never_exceeded(
        capacity in 1usize..6,
        senders in prop::collection::vec(0u8..32, 1..64),
    ) {
        let table = new_table(capacity);
        for (t, sender) in senders.into_iter().enumerate() {
            let outcome = table.upsert(&advertisement(sender, t as u64 + 1, "p"), Timestamp::new(t as u64), None);
            prop_assert!(!matches!(outcome, UpsertOutcome::Rejected(RejectReason::CapacityAndNotEvictable)));
            prop_assert!(table.len() <= capacity);
        }
    }
}
