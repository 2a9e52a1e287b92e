//! Integration tests for configuration and scenario files on disk.
//!
//! Run with: `cargo test --test config_integration`

use std::fs;
use std::time::Duration;

use geoverify::engine::scripted::EngineCall;
use geoverify::scenario::{Scenario, ScenarioError};
use geoverify::{ConfigError, SessionHandle, VerificationResult, VerifierConfig};

const CONFIG: &str = "\
[verification]
debounce = 3

[cadence]
initial_interval_ms = 500
max_polls = 20

[fallback]
primary_stale_cycles = 3
";

const SCENARIO: &str = r#"{
    "name": "three good frames",
    "availability": "supported",
    "frames": [
        { "earth_state": "initializing" },
        { "pose": { "latitude": 48.8584, "longitude": 2.2945, "horizontal_accuracy_m": 7.5 }, "repeat": 5 }
    ]
}"#;

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.ini");
    fs::write(&path, CONFIG).unwrap();

    let config = VerifierConfig::load(&path).unwrap();
    assert_eq!(config.decision.debounce, 3);
    assert_eq!(config.cadence.initial_interval, Duration::from_millis(500));
    assert_eq!(config.cadence.max_polls, 20);
    assert_eq!(config.merge.primary_stale_cycles, 3);
    assert_eq!(config.classifier.fair_max_m, 20.0);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.ini");

    assert!(matches!(
        VerifierConfig::load(&path),
        Err(ConfigError::Read { .. })
    ));
    assert_eq!(
        VerifierConfig::load_or_default(&path).unwrap(),
        VerifierConfig::default()
    );
}

#[test]
fn test_scenario_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    assert!(matches!(
        Scenario::load(&missing),
        Err(ScenarioError::Read { .. })
    ));

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ not json").unwrap();
    assert!(matches!(
        Scenario::load(&broken),
        Err(ScenarioError::Parse(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_scenario_runs_with_loaded_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.ini");
    let scenario_path = dir.path().join("scenario.json");
    fs::write(&config_path, CONFIG).unwrap();
    fs::write(&scenario_path, SCENARIO).unwrap();

    let config = VerifierConfig::load(&config_path).unwrap();
    let scenario = Scenario::load(&scenario_path).unwrap();
    let rig = scenario.build();
    let log = rig.engine.call_log();

    let (handle, _streams) =
        SessionHandle::spawn(rig.engine, rig.location, rig.capabilities, config);
    handle.activate();
    let outcome = handle.wait_for_outcome().await.expect("outcome");

    // One localizing frame, then three Good frames for debounce 3.
    assert_eq!(outcome.result, VerificationResult::Verified);
    assert_eq!(log.count(&EngineCall::Poll), 4);
    assert!(outcome.elapsed >= Duration::from_millis(2000));
    assert!(outcome.elapsed < Duration::from_millis(2500));
}

#[test]
fn test_demo_scenarios_parse() {
    let demos = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos");
    let mut parsed = 0;
    for entry in fs::read_dir(&demos).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let scenario = Scenario::load(&path)
            .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
        assert!(scenario.name.is_some(), "{} has no name", path.display());
        parsed += 1;
    }
    assert!(parsed >= 5);
}
