//! Global subscriber installation. Kept in its own test binary because the
//! subscriber can only be installed once per process.

use serde_json::json;

use unstable_network::{Error, FaultDecisionEngine, setup_tracing};

#[test]
fn setup_installs_once_and_then_refuses() {
    // GIVEN: no subscriber installed yet in this process
    setup_tracing("debug", None).expect("first install succeeds");

    // WHEN: the engine logs through the installed subscriber
    let engine = FaultDecisionEngine::new();
    engine.reload(&json!({"chance": "bad"}));

    // THEN: a second install is refused instead of replacing the first
    let err = setup_tracing("info", Some("json")).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "unexpected error: {err:?}");
}
