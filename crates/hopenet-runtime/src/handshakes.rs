//! Per-peer verification task tracking
//!
//! Each peer has at most one handshake in flight. Starting a new one aborts
//! the previous; a finishing task only clears its own slot, identified by the
//! generation it was spawned with.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hopenet_core::PeerId;
use tokio::task::AbortHandle;

struct InFlight {
    generation: u64,
    nonce: Vec<u8>,
    abort: AbortHandle,
}

/// Registry of running handshake tasks
#[derive(Default)]
pub(crate) struct HandshakeTracker {
    in_flight: DashMap<PeerId, InFlight>,
    generation: AtomicU64,
}

impl HandshakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the handshake built by `task`, replacing any running one for `peer_id`
    pub fn spawn<F, Fut>(&self, peer_id: PeerId, nonce: Vec<u8>, task: F)
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        // Hold the slot while spawning so the task cannot finish before it is registered
        let slot = self.in_flight.entry(peer_id);
        let abort = tokio::spawn(task(generation)).abort_handle();
        let in_flight = InFlight {
            generation,
            nonce,
            abort,
        };

        match slot {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(in_flight);
                previous.abort.abort();
            }
            Entry::Vacant(vacant) => {
                vacant.insert(in_flight);
            }
        }
    }

    /// Clear the slot of a task that ran to completion
    pub fn finish(&self, peer_id: &PeerId, generation: u64) {
        self.in_flight
            .remove_if(peer_id, |_, running| running.generation == generation);
    }

    /// Abort the handshake for `peer_id`, returning its nonce
    pub fn cancel(&self, peer_id: &PeerId) -> Option<Vec<u8>> {
        self.in_flight.remove(peer_id).map(|(_, running)| {
            running.abort.abort();
            running.nonce
        })
    }

    /// Abort every handshake, returning the abandoned peers and nonces
    pub fn cancel_all(&self) -> Vec<(PeerId, Vec<u8>)> {
        let peers: Vec<PeerId> = self.in_flight.iter().map(|e| *e.key()).collect();
        peers
            .into_iter()
            .filter_map(|peer_id| self.cancel(&peer_id).map(|nonce| (peer_id, nonce)))
            .collect()
    }

    pub fn is_running(&self, peer_id: &PeerId) -> bool {
        self.in_flight.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_replacing_aborts_previous() {
        let tracker = HandshakeTracker::new();
        let peer = PeerId::random();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let first = tx.clone();
        tracker.spawn(peer, vec![1], move |_| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            let _ = first.send("first");
        });
        let second = tx.clone();
        tracker.spawn(peer, vec![2], move |_| async move {
            let _ = second.send("second");
        });
        drop(tx);

        assert_eq!(rx.recv().await, Some("second"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_finish_only_clears_own_generation() {
        let tracker = HandshakeTracker::new();
        let peer = PeerId::random();

        tracker.spawn(peer, vec![1], |_| std::future::pending::<()>());
        tracker.finish(&peer, u64::MAX);
        assert!(tracker.is_running(&peer));

        tracker.finish(&peer, 0);
        assert!(!tracker.is_running(&peer));
    }

    #[tokio::test]
    async fn test_cancel_all_returns_nonces() {
        let tracker = HandshakeTracker::new();
        let a = PeerId::new([1; 16]);
        let b = PeerId::new([2; 16]);
        tracker.spawn(a, vec![0xA], |_| std::future::pending::<()>());
        tracker.spawn(b, vec![0xB], |_| std::future::pending::<()>());

        let mut abandoned = tracker.cancel_all();
        abandoned.sort();
        assert_eq!(abandoned, vec![(a, vec![0xA]), (b, vec![0xB])]);
        assert_eq!(tracker.len(), 0);
    }
}
