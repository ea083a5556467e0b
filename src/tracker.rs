//! First-call tracking.
//!
//! Records which request identities have already been forced to fail once
//! since the last reset. Backed by a `DashSet`, so concurrent callers with
//! different identities only ever contend on a shard lock for the duration of
//! a single insert, never across a decision.

use dashmap::DashSet;
use tracing::trace;

use crate::identity::RequestIdentity;

/// Concurrent "already failed once" membership set.
#[derive(Debug, Default)]
pub struct FirstCallTracker {
    seen: DashSet<RequestIdentity>,
}

impl FirstCallTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self { seen: DashSet::new() }
    }

    /// Atomic insert-if-absent.
    ///
    /// Returns `true` iff this call performed the insert, i.e. this is the
    /// first time `identity` has been observed since the last reset. Among
    /// concurrent first calls for the same identity exactly one gets `true`.
    pub fn mark_and_check_first(&self, identity: &RequestIdentity) -> bool {
        // Fast path skips the clone for identities already recorded.
        if self.seen.contains(identity) {
            return false;
        }
        let first = self.seen.insert(identity.clone());
        if first {
            trace!(identity = %identity, "First call recorded");
        }
        first
    }

    /// `true` when `identity` has been recorded since the last reset.
    #[must_use]
    pub fn has_seen(&self, identity: &RequestIdentity) -> bool {
        self.seen.contains(identity)
    }

    /// Number of identities recorded since the last reset.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// `true` when nothing has been recorded since the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forget every identity. Complete by the time this returns.
    pub fn reset(&self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;

    #[test]
    fn first_mark_returns_true_then_false() {
        // GIVEN: a fresh tracker
        let tracker = FirstCallTracker::new();
        let id = RequestIdentity::new("GET", "/a");
        // WHEN: the same identity is marked twice
        // THEN: only the first mark reports first
        assert!(tracker.mark_and_check_first(&id));
        assert!(!tracker.mark_and_check_first(&id));
        assert!(tracker.has_seen(&id));
    }

    #[test]
    fn distinct_identities_are_tracked_independently() {
        let tracker = FirstCallTracker::new();
        assert!(tracker.mark_and_check_first(&RequestIdentity::new("GET", "/a")));
        assert!(tracker.mark_and_check_first(&RequestIdentity::new("GET", "/b")));
        assert!(tracker.mark_and_check_first(&RequestIdentity::new("POST", "/a")));
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn reset_rearms_every_identity() {
        let tracker = FirstCallTracker::new();
        let id = RequestIdentity::new("GET", "/a");
        tracker.mark_and_check_first(&id);

        tracker.reset();

        assert!(tracker.is_empty());
        assert!(tracker.mark_and_check_first(&id));
    }

    #[test]
    fn concurrent_first_calls_yield_exactly_one_winner() {
        const THREADS: usize = 16;
        let tracker = Arc::new(FirstCallTracker::new());
        let barrier = Arc::new(Barrier::new(THREADS));
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                let barrier = Arc::clone(&barrier);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    let id = RequestIdentity::new("GET", "/race");
                    barrier.wait();
                    if tracker.mark_and_check_first(&id) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
