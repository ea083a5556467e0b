//! Probabilistic gate and injectable random sources.

use rand::RngExt;

/// Source of uniformly distributed values in `[0.0, 1.0)`.
///
/// Injectable so decisions can be made reproducible: tests swap the thread
/// RNG for a fixed or scripted source. Any `Fn() -> f64` closure qualifies.
pub trait RandomSource: Send + Sync {
    /// Draw the next value.
    fn next_f64(&self) -> f64;
}

impl<F> RandomSource for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn next_f64(&self) -> f64 {
        self()
    }
}

/// Thread-local RNG backed source; the production default.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Source that always yields the same value.
///
/// `FixedRandom(0.0)` makes every non-zero chance inject a fault.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

/// Draw once from `random` and inject when the draw falls below `chance`.
///
/// No range clamping: a chance of `1.0` or more always injects, `0.0` or less
/// never does.
#[must_use]
pub fn should_inject_by_chance(chance: f64, random: &dyn RandomSource) -> bool {
    random.next_f64() < chance
}
