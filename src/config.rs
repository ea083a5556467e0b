//! Configuration management
//!
//! Two layers live here:
//!
//! - [`EngineConfig`]: the immutable `{chance, targets}` snapshot the engine
//!   swaps as a whole on every reload.
//! - [`Settings`]: the startup view an embedding host can load from a YAML
//!   file and `UNSTABLE_NETWORK_*` environment variables.

use std::fmt;
use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::identity::{RequestIdentity, TargetRecord};
use crate::targets::TargetSet;
use crate::{Error, Result};

/// Chance used when none is configured, and the fallback for a malformed one.
pub const DEFAULT_CHANCE: f64 = 0.25;

/// Environment variable prefix merged over the settings file.
pub const ENV_PREFIX: &str = "UNSTABLE_NETWORK_";

/// Immutable engine configuration snapshot.
///
/// `chance` is intended to lie in `[0.0, 1.0]` but is not clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Probability of a fault on calls after the first
    pub chance: f64,
    /// Requests eligible for faults (empty = all)
    pub targets: TargetSet,
}

impl EngineConfig {
    /// Create a config from its two parts
    #[must_use]
    pub fn new(chance: f64, targets: TargetSet) -> Self {
        Self { chance, targets }
    }

    /// Copy of this config with a different chance
    #[must_use]
    pub fn with_chance(&self, chance: f64) -> Self {
        Self {
            chance,
            targets: self.targets.clone(),
        }
    }

    /// Copy of this config with different targets
    #[must_use]
    pub fn with_targets(&self, targets: TargetSet) -> Self {
        Self {
            chance: self.chance,
            targets,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chance: DEFAULT_CHANCE,
            targets: TargetSet::all(),
        }
    }
}

impl fmt::Display for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chance={} targets={}", self.chance, self.targets)
    }
}

/// Startup settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Initial fault chance for calls after the first
    pub chance: f64,
    /// Initial targets (empty = all requests)
    pub targets: Vec<TargetRecord>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chance: DEFAULT_CHANCE,
            targets: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Settings file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate into an engine config
    ///
    /// # Errors
    ///
    /// Returns an error for a target with an empty method or path, the same
    /// rule reload applies. At startup there is no previous config to fall
    /// back to, so the failure is returned instead.
    pub fn to_config(&self) -> Result<EngineConfig> {
        for (index, target) in self.targets.iter().enumerate() {
            target
                .validate(index)
                .map_err(|issue| Error::Config(issue.to_string()))?;
        }

        let targets = self.targets.iter().map(RequestIdentity::from).collect();
        Ok(EngineConfig::new(self.chance, targets))
    }
}
