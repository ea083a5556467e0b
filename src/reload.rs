//! Configuration reload: payload parsing, validation and fallback.
//!
//! Reload is split into two steps:
//!
//! 1. [`ReloadPayload::parse`] turns a loosely-typed JSON value into typed
//!    per-field updates. A malformed field becomes
//!    [`FieldUpdate::Invalid`] carrying a [`ValidationError`]; nothing panics
//!    and nothing is thrown.
//! 2. [`apply`] folds those updates over the previous [`EngineConfig`],
//!    taking the documented fallback branch for every invalid field. The
//!    fallbacks come back in [`Applied`] and are reported to a
//!    [`ReloadObserver`] separately, once no lock is held.
//!
//! Fallbacks are deliberately asymmetric: a malformed `chance` reverts to
//! [`DEFAULT_CHANCE`], a malformed `targets` keeps the previous targets.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::{DEFAULT_CHANCE, EngineConfig};
use crate::error::ValidationError;
use crate::identity::{json_kind, parse_target_list};
use crate::targets::TargetSet;
use crate::{Error, Result};

/// Payload key for the chance field.
pub const CHANCE_KEY: &str = "chance";
/// Payload key for the targets field.
pub const TARGETS_KEY: &str = "targets";
/// Chance key inside a host's flat extended-settings map.
pub const EXTENDED_CHANCE_KEY: &str = "unstableNetworkDefinitionChance";
/// Targets key inside a host's flat extended-settings map.
pub const EXTENDED_TARGETS_KEY: &str = "unstableNetworkDefinitionTargets";

/// Outcome of parsing one optional payload field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate<T> {
    /// Field absent (or `null`): keep the current value
    Absent,
    /// Field present and well-formed
    Valid(T),
    /// Field present but malformed
    Invalid(ValidationError),
}

/// Typed view of a configuration-change payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadPayload {
    /// Update for `chance`
    pub chance: FieldUpdate<f64>,
    /// Update for `targets`
    pub targets: FieldUpdate<TargetSet>,
    /// Set when the payload root was not an object at all
    pub malformed_root: Option<ValidationError>,
}

impl ReloadPayload {
    /// Payload with no fields; reloading it only re-arms the tracker.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            chance: FieldUpdate::Absent,
            targets: FieldUpdate::Absent,
            malformed_root: None,
        }
    }

    /// Parse a payload with `chance` / `targets` keys.
    ///
    /// A root that is not an object is recorded in `malformed_root` and
    /// otherwise treated as a payload with no fields.
    #[must_use]
    pub fn parse(raw: &Value) -> Self {
        match raw {
            Value::Object(map) => Self::from_map(map, CHANCE_KEY, TARGETS_KEY),
            other => Self {
                malformed_root: Some(ValidationError::PayloadNotObject {
                    found: json_kind(other),
                }),
                ..Self::empty()
            },
        }
    }

    /// Parse a host's extended-settings map.
    #[must_use]
    pub fn from_extended(extended: &Map<String, Value>) -> Self {
        Self::from_map(extended, EXTENDED_CHANCE_KEY, EXTENDED_TARGETS_KEY)
    }

    /// Strictly parse payload text.
    ///
    /// # Errors
    ///
    /// Returns an error when the text is not JSON or its root is not an
    /// object. Field-level problems are still reported as [`FieldUpdate::Invalid`].
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(text)?;
        let payload = Self::parse(&raw);
        match payload.malformed_root {
            Some(issue) => Err(Error::InvalidPayload(issue)),
            None => Ok(payload),
        }
    }

    /// `true` when any field failed validation.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        self.malformed_root.is_some()
            || matches!(self.chance, FieldUpdate::Invalid(_))
            || matches!(self.targets, FieldUpdate::Invalid(_))
    }

    fn from_map(map: &Map<String, Value>, chance_key: &str, targets_key: &str) -> Self {
        Self {
            chance: parse_chance(map.get(chance_key)),
            targets: parse_targets(map.get(targets_key)),
            malformed_root: None,
        }
    }
}

fn parse_chance(value: Option<&Value>) -> FieldUpdate<f64> {
    match value {
        None | Some(Value::Null) => FieldUpdate::Absent,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(chance) => FieldUpdate::Valid(chance),
            None => FieldUpdate::Invalid(ValidationError::ChanceNotNumeric { found: "number" }),
        },
        Some(other) => FieldUpdate::Invalid(ValidationError::ChanceNotNumeric {
            found: json_kind(other),
        }),
    }
}

fn parse_targets(value: Option<&Value>) -> FieldUpdate<TargetSet> {
    match value {
        None | Some(Value::Null) => FieldUpdate::Absent,
        Some(Value::Array(items)) => match parse_target_list(items) {
            Ok(identities) => FieldUpdate::Valid(identities.into_iter().collect()),
            Err(issue) => FieldUpdate::Invalid(issue),
        },
        Some(other) => FieldUpdate::Invalid(ValidationError::TargetsNotList {
            found: json_kind(other),
        }),
    }
}

/// Value adopted in place of a malformed field.
#[derive(Debug, Clone, PartialEq)]
pub enum Fallback {
    /// Chance reverted to the compiled-in default
    DefaultChance(f64),
    /// Targets kept from the previous config
    PreviousTargets(TargetSet),
    /// Payload ignored; config carried over unchanged
    PreviousConfig,
}

/// Diagnostic sink for reload events.
///
/// Decoupled from the decision path: only reload reports here. Every method
/// has a no-op default so a sink can listen to just what it needs.
pub trait ReloadObserver: Send + Sync {
    /// A field failed validation and `fallback` was used instead.
    fn invalid_field(&self, _issue: &ValidationError, _fallback: &Fallback) {}

    /// A new config was installed.
    fn reloaded(&self, _old: &EngineConfig, _new: &EngineConfig) {}

    /// The first-call tracker was cleared, forgetting `forgotten` identities.
    fn tracker_reset(&self, _forgotten: usize) {}
}

/// Observer that reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ReloadObserver for TracingObserver {
    fn invalid_field(&self, issue: &ValidationError, fallback: &Fallback) {
        match fallback {
            Fallback::DefaultChance(chance) => {
                warn!(%issue, fallback_chance = chance, "Malformed chance, falling back to default");
            }
            Fallback::PreviousTargets(targets) => {
                warn!(%issue, fallback_targets = %targets, "Malformed targets, keeping previous targets");
            }
            Fallback::PreviousConfig => {
                warn!(%issue, "Malformed payload, keeping previous config");
            }
        }
    }

    fn reloaded(&self, old: &EngineConfig, new: &EngineConfig) {
        info!(
            old_chance = old.chance,
            old_targets = %old.targets,
            new_chance = new.chance,
            new_targets = %new.targets,
            "Fault injection config reloaded"
        );
    }

    fn tracker_reset(&self, forgotten: usize) {
        info!(forgotten, "First call tracker reset due to config update");
    }
}

/// Config produced by [`apply`], with every fallback taken along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Config to install
    pub config: EngineConfig,
    /// Invalid fields, in payload order, paired with the value used instead
    pub fallbacks: Vec<(ValidationError, Fallback)>,
}

impl Applied {
    /// Hand every recorded fallback to `observer`.
    pub fn report(&self, observer: &dyn ReloadObserver) {
        for (issue, fallback) in &self.fallbacks {
            observer.invalid_field(issue, fallback);
        }
    }
}

/// Fold `payload` over `old`, taking the fallback branch for invalid fields.
///
/// Pure: nothing is reported here, so callers holding a lock can finish the
/// swap first and call [`Applied::report`] afterwards.
#[must_use]
pub fn apply(old: &EngineConfig, payload: &ReloadPayload) -> Applied {
    let mut fallbacks = Vec::new();

    if let Some(issue) = &payload.malformed_root {
        fallbacks.push((issue.clone(), Fallback::PreviousConfig));
    }

    let chance = match &payload.chance {
        FieldUpdate::Absent => old.chance,
        FieldUpdate::Valid(chance) => *chance,
        FieldUpdate::Invalid(issue) => {
            fallbacks.push((issue.clone(), Fallback::DefaultChance(DEFAULT_CHANCE)));
            DEFAULT_CHANCE
        }
    };

    let targets = match &payload.targets {
        FieldUpdate::Absent => old.targets.clone(),
        FieldUpdate::Valid(targets) => targets.clone(),
        FieldUpdate::Invalid(issue) => {
            fallbacks.push((issue.clone(), Fallback::PreviousTargets(old.targets.clone())));
            old.targets.clone()
        }
    };

    Applied {
        config: EngineConfig::new(chance, targets),
        fallbacks,
    }
}

/// Parse `raw`, fold it over `old` and report any fallbacks to `observer`.
#[must_use]
pub fn reload(old: &EngineConfig, raw: &Value, observer: &dyn ReloadObserver) -> EngineConfig {
    let applied = apply(old, &ReloadPayload::parse(raw));
    applied.report(observer);
    applied.config
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::identity::RequestIdentity;

    #[derive(Default)]
    struct Recorder {
        fallbacks: Mutex<Vec<Fallback>>,
    }

    impl ReloadObserver for Recorder {
        fn invalid_field(&self, _issue: &ValidationError, fallback: &Fallback) {
            self.fallbacks.lock().push(fallback.clone());
        }
    }

    fn targets(entries: &[(&str, &str)]) -> TargetSet {
        entries.iter().map(|(m, p)| RequestIdentity::new(m, p)).collect()
    }

    fn base() -> EngineConfig {
        EngineConfig::new(0.9, targets(&[("GET", "/old")]))
    }

    // ── parse ────────────────────────────────────────────────────────────────

    #[test]
    fn empty_object_has_no_updates() {
        assert_eq!(ReloadPayload::parse(&json!({})), ReloadPayload::empty());
    }

    #[test]
    fn null_fields_count_as_absent() {
        let payload = ReloadPayload::parse(&json!({"chance": null, "targets": null}));
        assert_eq!(payload, ReloadPayload::empty());
    }

    #[test]
    fn integer_chance_is_numeric() {
        let payload = ReloadPayload::parse(&json!({"chance": 1}));
        assert_eq!(payload.chance, FieldUpdate::Valid(1.0));
    }

    #[test]
    fn string_chance_is_invalid() {
        let payload = ReloadPayload::parse(&json!({"chance": "0.5"}));
        assert_eq!(
            payload.chance,
            FieldUpdate::Invalid(ValidationError::ChanceNotNumeric { found: "string" })
        );
    }

    #[test]
    fn targets_object_is_not_a_list() {
        let payload = ReloadPayload::parse(&json!({"targets": {"method": "GET", "path": "/a"}}));
        assert_eq!(
            payload.targets,
            FieldUpdate::Invalid(ValidationError::TargetsNotList { found: "object" })
        );
    }

    #[test]
    fn extended_keys_are_read_from_host_map() {
        let raw = json!({
            "unstableNetworkDefinitionChance": 0.6,
            "unstableNetworkDefinitionTargets": [{"method": "PUT", "path": "/x"}],
            "chance": "ignored"
        });
        let payload = ReloadPayload::from_extended(raw.as_object().unwrap());
        assert_eq!(payload.chance, FieldUpdate::Valid(0.6));
        assert_eq!(payload.targets, FieldUpdate::Valid(targets(&[("PUT", "/x")])));
        assert!(!payload.has_issues());
    }

    #[test]
    fn non_object_root_is_recorded() {
        let payload = ReloadPayload::parse(&json!([1, 2]));
        assert_eq!(
            payload.malformed_root,
            Some(ValidationError::PayloadNotObject { found: "array" })
        );
        assert!(payload.has_issues());
    }

    #[test]
    fn strict_text_parse_rejects_bad_json_and_non_objects() {
        assert!(matches!(ReloadPayload::from_json_str("{"), Err(Error::Json(_))));
        assert!(matches!(
            ReloadPayload::from_json_str("42"),
            Err(Error::InvalidPayload(ValidationError::PayloadNotObject { .. }))
        ));
        assert!(ReloadPayload::from_json_str(r#"{"chance": 0.1}"#).is_ok());
    }

    // ── apply ────────────────────────────────────────────────────────────────

    #[test]
    fn absent_fields_keep_current_values() {
        let next = reload(&base(), &json!({}), &TracingObserver);
        assert_eq!(next, base());
    }

    #[test]
    fn numeric_chance_is_adopted_verbatim() {
        let next = reload(&base(), &json!({"chance": 1.5}), &TracingObserver);
        assert!((next.chance - 1.5).abs() < f64::EPSILON);
        assert_eq!(next.targets, base().targets);
    }

    #[test]
    fn malformed_chance_falls_back_to_default_not_previous() {
        let recorder = Recorder::default();
        let next = reload(&base(), &json!({"chance": "not-a-number"}), &recorder);
        assert!((next.chance - DEFAULT_CHANCE).abs() < f64::EPSILON);
        assert_eq!(next.targets, base().targets);
        assert_eq!(*recorder.fallbacks.lock(), vec![Fallback::DefaultChance(DEFAULT_CHANCE)]);
    }

    #[test]
    fn valid_target_list_replaces_targets() {
        let next = reload(
            &base(),
            &json!({"targets": [{"method": "GET", "path": "/a"}, {"method": "POST", "path": "/b"}]}),
            &TracingObserver,
        );
        assert_eq!(next.targets, targets(&[("GET", "/a"), ("POST", "/b")]));
        assert!((next.chance - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_target_list_targets_everything() {
        let next = reload(&base(), &json!({"targets": []}), &TracingObserver);
        assert!(next.targets.is_empty());
    }

    #[test]
    fn one_bad_target_discards_whole_list() {
        let recorder = Recorder::default();
        let next = reload(
            &base(),
            &json!({"targets": [{"method": "GET", "path": "/a"}, {"path": "/b"}]}),
            &recorder,
        );
        assert_eq!(next.targets, base().targets);
        assert_eq!(*recorder.fallbacks.lock(), vec![Fallback::PreviousTargets(base().targets)]);
    }

    #[test]
    fn empty_method_and_path_are_rejected_like_at_startup() {
        let recorder = Recorder::default();
        let next = reload(&base(), &json!({"targets": [{"method": "", "path": ""}]}), &recorder);
        assert_eq!(next.targets, base().targets);
        assert_eq!(*recorder.fallbacks.lock(), vec![Fallback::PreviousTargets(base().targets)]);
    }

    #[test]
    fn both_fields_malformed_report_twice() {
        let recorder = Recorder::default();
        let next = reload(&base(), &json!({"chance": [], "targets": "GET /a"}), &recorder);
        assert!((next.chance - DEFAULT_CHANCE).abs() < f64::EPSILON);
        assert_eq!(next.targets, base().targets);
        assert_eq!(recorder.fallbacks.lock().len(), 2);
    }

    #[test]
    fn non_object_payload_keeps_config() {
        let recorder = Recorder::default();
        let next = reload(&base(), &json!("chance=1"), &recorder);
        assert_eq!(next, base());
        assert_eq!(*recorder.fallbacks.lock(), vec![Fallback::PreviousConfig]);
    }

    #[test]
    fn apply_collects_fallbacks_without_reporting() {
        // GIVEN: a payload with both fields malformed
        let payload = ReloadPayload::parse(&json!({"chance": "high", "targets": 7}));
        // WHEN: it is applied directly
        let applied = apply(&base(), &payload);
        // THEN: fallbacks are returned in field order for the caller to report
        assert_eq!(
            applied.fallbacks,
            vec![
                (
                    ValidationError::ChanceNotNumeric { found: "string" },
                    Fallback::DefaultChance(DEFAULT_CHANCE)
                ),
                (
                    ValidationError::TargetsNotList { found: "number" },
                    Fallback::PreviousTargets(base().targets)
                ),
            ]
        );
        assert_eq!(applied.config, EngineConfig::new(DEFAULT_CHANCE, base().targets));

        let recorder = Recorder::default();
        applied.report(&recorder);
        assert_eq!(recorder.fallbacks.lock().len(), 2);
    }

    #[test]
    fn clean_payload_has_no_fallbacks() {
        let applied = apply(&base(), &ReloadPayload::parse(&json!({"chance": 0.3})));
        assert!(applied.fallbacks.is_empty());
    }
}
