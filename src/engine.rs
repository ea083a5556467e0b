//! Fault decision engine.
//!
//! Called once per intercepted request by the host server. For each request
//! the engine either hands the host's planned response back untouched or
//! replaces it with a simulated connection reset.
//!
//! # Decision protocol
//!
//! 1. Requests outside the target set pass through; the tracker is not touched.
//! 2. The first targeted call for an identity since the last reload always
//!    faults. The random source is not consulted.
//! 3. Later calls fault when a draw from the random source falls below the
//!    configured chance.
//!
//! # Concurrency
//!
//! The config is an immutable [`EngineConfig`] behind
//! `parking_lot::RwLock<Arc<_>>`. A decision holds the read lock only long
//! enough to clone the `Arc`, so matching, tracking and the random draw all
//! run lock-free against one consistent snapshot. Reload swaps the whole
//! `Arc` and clears the tracker while still holding the write lock, so once
//! `reload` returns every subsequent decision sees the new config paired with
//! an empty tracker. Observer callbacks run after the write lock is released,
//! so a [`ReloadObserver`] may read the engine without deadlocking.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::chance::{RandomSource, ThreadRandom, should_inject_by_chance};
use crate::config::{EngineConfig, Settings};
use crate::identity::{InterceptedRequest, RequestIdentity};
use crate::reload::{self, ReloadObserver, ReloadPayload, TracingObserver};
use crate::stats::{EngineStats, StatsSnapshot};
use crate::targets::{TargetSet, is_targeted};
use crate::tracker::FirstCallTracker;
use crate::Result;

/// Simulated network failure substituted for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Abrupt connection termination with no response body
    ConnectionResetByPeer,
}

/// Why a fault was injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultReason {
    /// First targeted call for this identity since the last reset
    FirstCall,
    /// Random draw fell below the configured chance
    Chance,
}

/// Raw engine verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Serve the planned response
    Passthrough,
    /// Replace the response with a fault
    InjectFault(FaultReason),
}

impl Verdict {
    /// `true` for [`Verdict::InjectFault`].
    #[must_use]
    pub fn is_fault(self) -> bool {
        matches!(self, Self::InjectFault(_))
    }
}

/// What the host should serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<R> {
    /// The planned response, returned verbatim
    Passthrough(R),
    /// A simulated failure in place of the response
    Fault(Fault),
}

impl<R> Decision<R> {
    /// `true` when the host should realize a fault.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }

    /// The planned response, if it survived.
    pub fn into_response(self) -> Option<R> {
        match self {
            Self::Passthrough(response) => Some(response),
            Self::Fault(_) => None,
        }
    }
}

/// Thread-safe fault decision engine.
pub struct FaultDecisionEngine {
    config: RwLock<Arc<EngineConfig>>,
    tracker: FirstCallTracker,
    random: Box<dyn RandomSource>,
    observer: Arc<dyn ReloadObserver>,
    stats: EngineStats,
}

impl fmt::Debug for FaultDecisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultDecisionEngine")
            .field("config", &*self.config.read())
            .field("tracked", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

impl Default for FaultDecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultDecisionEngine {
    /// Name the host registers the engine under.
    pub const NAME: &'static str = "UnstableNetworkResponseDefinitionTransformer";

    /// Engine with the thread RNG, default chance and no explicit targets.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Engine seeded from validated startup settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings contain an invalid target.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::builder().config(settings.to_config()?).build())
    }

    // ── Decision path ─────────────────────────────────────────────────────────

    /// Decide for a request and hand back either `planned` or a fault.
    ///
    /// Never fails and never blocks beyond a pointer-clone under a read lock.
    pub fn transform<Q, R>(&self, request: &Q, planned: R) -> Decision<R>
    where
        Q: InterceptedRequest + ?Sized,
    {
        let identity = RequestIdentity::from_request(request);
        match self.decide(&identity) {
            Verdict::Passthrough => Decision::Passthrough(planned),
            Verdict::InjectFault(_) => Decision::Fault(Fault::ConnectionResetByPeer),
        }
    }

    /// Raw verdict for an identity, updating tracker and statistics.
    pub fn decide(&self, identity: &RequestIdentity) -> Verdict {
        let config = self.config();

        if !is_targeted(identity, &config.targets) {
            trace!(identity = %identity, "Request not targeted");
            self.stats.record_not_targeted();
            return Verdict::Passthrough;
        }

        if self.tracker.mark_and_check_first(identity) {
            debug!(identity = %identity, "Injecting fault on first call");
            self.stats.record_first_call_fault();
            return Verdict::InjectFault(FaultReason::FirstCall);
        }

        if should_inject_by_chance(config.chance, self.random.as_ref()) {
            debug!(identity = %identity, chance = config.chance, "Injecting fault by chance");
            self.stats.record_chance_fault();
            Verdict::InjectFault(FaultReason::Chance)
        } else {
            trace!(identity = %identity, chance = config.chance, "Passing through");
            self.stats.record_chance_pass();
            Verdict::Passthrough
        }
    }

    // ── Reload ────────────────────────────────────────────────────────────────

    /// React to a host configuration change with `chance` / `targets` keys.
    ///
    /// Malformed fields fall back (see [`reload`](crate::reload)); the new
    /// config is installed and the tracker cleared on every call, even when
    /// nothing changed. Returns the installed config.
    pub fn reload(&self, raw: &Value) -> Arc<EngineConfig> {
        self.apply_payload(&ReloadPayload::parse(raw))
    }

    /// React to a host's extended-settings map.
    pub fn reload_extended(&self, extended: &Map<String, Value>) -> Arc<EngineConfig> {
        self.apply_payload(&ReloadPayload::from_extended(extended))
    }

    /// Install an already-parsed payload.
    pub fn apply_payload(&self, payload: &ReloadPayload) -> Arc<EngineConfig> {
        let mut current = self.config.write();
        let applied = reload::apply(&current, payload);
        let next = Arc::new(applied.config.clone());
        let old = std::mem::replace(&mut *current, Arc::clone(&next));

        let forgotten = self.tracker.len();
        self.tracker.reset();
        drop(current);

        // Observers may call back into the engine, so they only run unlocked.
        self.stats.record_reload();
        applied.report(self.observer.as_ref());
        self.observer.reloaded(&old, &next);
        self.observer.tracker_reset(forgotten);
        next
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Current config snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.config.read())
    }

    /// Current chance.
    #[must_use]
    pub fn chance(&self) -> f64 {
        self.config.read().chance
    }

    /// Replace the chance, keeping targets. Does not reset the tracker.
    pub fn set_chance(&self, chance: f64) {
        let mut current = self.config.write();
        *current = Arc::new(current.with_chance(chance));
    }

    /// Current targets.
    #[must_use]
    pub fn targets(&self) -> TargetSet {
        self.config.read().targets.clone()
    }

    /// Replace the targets, keeping chance. Does not reset the tracker.
    pub fn set_targets(&self, targets: TargetSet) {
        let mut current = self.config.write();
        *current = Arc::new(current.with_targets(targets));
    }

    /// `true` when `identity` has already had its first-call fault.
    #[must_use]
    pub fn has_seen(&self, identity: &RequestIdentity) -> bool {
        self.tracker.has_seen(identity)
    }

    /// Decision statistics.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.tracker.len())
    }
}

/// Builder for [`FaultDecisionEngine`].
pub struct EngineBuilder {
    config: EngineConfig,
    random: Box<dyn RandomSource>,
    observer: Arc<dyn ReloadObserver>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            random: Box::new(ThreadRandom),
            observer: Arc::new(TracingObserver),
        }
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Initial config.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Initial chance.
    #[must_use]
    pub fn chance(mut self, chance: f64) -> Self {
        self.config.chance = chance;
        self
    }

    /// Initial targets.
    #[must_use]
    pub fn targets(mut self, targets: TargetSet) -> Self {
        self.config.targets = targets;
        self
    }

    /// Random source for chance draws.
    #[must_use]
    pub fn random_source(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Box::new(random);
        self
    }

    /// Diagnostic sink for reload events.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn ReloadObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Build the engine with an empty tracker.
    #[must_use]
    pub fn build(self) -> FaultDecisionEngine {
        FaultDecisionEngine {
            config: RwLock::new(Arc::new(self.config)),
            tracker: FirstCallTracker::new(),
            random: self.random,
            observer: self.observer,
            stats: EngineStats::new(),
        }
    }
}
