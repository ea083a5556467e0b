//! Unstable Network
//!
//! Fault-injection decision engine for programmable mock servers. For every
//! intercepted request the host asks the engine whether to serve its planned
//! response or to simulate an abrupt connection reset, so client retry and
//! timeout logic can be exercised against a reproducible failure rate.
//!
//! # Features
//!
//! - **Targeting**: restrict faults to specific `(method, path)` identities;
//!   an empty target set means every request
//! - **First-call rule**: the first targeted call per identity always fails
//! - **Chance**: later calls fail with a configurable probability drawn from
//!   an injectable random source
//! - **Live reload**: chance and targets swap atomically, re-arming the
//!   first-call rule on every reload
//!
//! # Example
//!
//! ```
//! use unstable_network::{Decision, FaultDecisionEngine, FixedRandom, RequestIdentity};
//!
//! let engine = FaultDecisionEngine::builder()
//!     .chance(0.25)
//!     .random_source(FixedRandom(0.5))
//!     .build();
//! let request = RequestIdentity::new("GET", "/a");
//!
//! assert!(engine.transform(&request, "ok").is_fault());
//! assert_eq!(engine.transform(&request, "ok"), Decision::Passthrough("ok"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chance;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod reload;
pub mod stats;
pub mod targets;
pub mod tracker;

pub use chance::{FixedRandom, RandomSource, ThreadRandom, should_inject_by_chance};
pub use config::{DEFAULT_CHANCE, EngineConfig, Settings};
pub use engine::{Decision, EngineBuilder, Fault, FaultDecisionEngine, FaultReason, Verdict};
pub use error::{Error, Result, ValidationError};
pub use identity::{InterceptedRequest, RequestIdentity, TargetRecord};
pub use reload::{Applied, Fallback, ReloadObserver, ReloadPayload, TracingObserver};
pub use stats::StatsSnapshot;
pub use targets::{TargetSet, is_targeted};
pub use tracker::FirstCallTracker;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// For hosts that do not install their own subscriber.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber
                .with(fmt::layer().json())
                .try_init()
                .map_err(|e| Error::Config(e.to_string()))?;
        }
        _ => {
            subscriber
                .with(fmt::layer())
                .try_init()
                .map_err(|e| Error::Config(e.to_string()))?;
        }
    }

    Ok(())
}
