//! Decision statistics for the engine
//!
//! Tracks how many requests were evaluated and why each one was faulted or
//! passed through.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live decision counters
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Requests evaluated
    evaluated: AtomicU64,
    /// Requests outside the target set
    not_targeted: AtomicU64,
    /// Faults forced by the first-call rule
    first_call_faults: AtomicU64,
    /// Faults drawn by chance
    chance_faults: AtomicU64,
    /// Targeted requests that passed the chance draw
    chance_passes: AtomicU64,
    /// Reloads applied
    reloads: AtomicU64,
}

impl EngineStats {
    /// Create zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_not_targeted(&self) {
        self.evaluated.fetch_add(1, Ordering::Relaxed);
        self.not_targeted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_first_call_fault(&self) {
        self.evaluated.fetch_add(1, Ordering::Relaxed);
        self.first_call_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_chance_fault(&self) {
        self.evaluated.fetch_add(1, Ordering::Relaxed);
        self.chance_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_chance_pass(&self) {
        self.evaluated.fetch_add(1, Ordering::Relaxed);
        self.chance_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reload(&self) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current statistics
    pub fn snapshot(&self, tracked_identities: usize) -> StatsSnapshot {
        let evaluated = self.evaluated.load(Ordering::Relaxed);
        let first_call_faults = self.first_call_faults.load(Ordering::Relaxed);
        let chance_faults = self.chance_faults.load(Ordering::Relaxed);
        let faults = first_call_faults + chance_faults;

        #[allow(clippy::cast_precision_loss)]
        let fault_rate = if evaluated > 0 {
            faults as f64 / evaluated as f64
        } else {
            0.0
        };

        StatsSnapshot {
            evaluated,
            not_targeted: self.not_targeted.load(Ordering::Relaxed),
            first_call_faults,
            chance_faults,
            passthrough: evaluated.saturating_sub(faults),
            fault_rate,
            reloads: self.reloads.load(Ordering::Relaxed),
            tracked_identities,
        }
    }
}

/// Point-in-time view of [`EngineStats`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Requests evaluated
    pub evaluated: u64,
    /// Requests outside the target set
    pub not_targeted: u64,
    /// Faults forced by the first-call rule
    pub first_call_faults: u64,
    /// Faults drawn by chance
    pub chance_faults: u64,
    /// Requests answered with the planned response
    pub passthrough: u64,
    /// Share of evaluated requests that were faulted
    pub fault_rate: f64,
    /// Reloads applied
    pub reloads: u64,
    /// Identities currently in the first-call tracker
    pub tracked_identities: usize,
}
