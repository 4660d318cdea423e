//! Persistence and recovery tests.
//!
//! These tests verify that the trained artifact, the registry, and the config
//! survive a restart, and that a damaged artifact degrades to "no model".

use chrono::NaiveDate;

use furha::config::FurhaConfig;
use furha::record::RiskAssessment;
use furha::registry::MotherRegistry;
use furha::risk::artifact::ArtifactStore;
use furha::risk::{RiskEngine, RiskEngineConfig};
use furha::synth::synthetic_cohort;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
}

fn engine_in(dir: &std::path::Path) -> RiskEngine {
    let mut config = RiskEngineConfig {
        models_dir: dir.join("models"),
        ..Default::default()
    };
    config.forest.n_trees = 20;
    RiskEngine::new(config)
}

fn registry_in(dir: &std::path::Path) -> MotherRegistry {
    let mut registry = MotherRegistry::empty(dir.join("mothers.csv"));
    registry.extend(synthetic_cohort(150, 21, today())).unwrap();
    registry
}

#[test]
fn model_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let registry = registry_in(dir.path());

    // First session: train and persist.
    let before: Vec<RiskAssessment> = {
        let engine = engine_in(dir.path());
        engine.train(registry.path()).unwrap();
        registry.iter().map(|m| engine.predict_risk(m)).collect()
    };

    // Second session: load explicitly and compare.
    let engine = engine_in(dir.path());
    assert!(engine.load_model().unwrap());
    let after: Vec<RiskAssessment> = registry.iter().map(|m| engine.predict_risk(m)).collect();
    assert_eq!(before, after);
}

#[test]
fn retraining_replaces_the_artifact() {
    let dir = tempfile::TempDir::new().unwrap();
    let registry = registry_in(dir.path());
    let engine = engine_in(dir.path());

    let first = engine.train(registry.path()).unwrap();
    let second = engine.train(registry.path()).unwrap();
    assert_ne!(first.artifact_id, second.artifact_id);
    assert_eq!(first.train_accuracy, second.train_accuracy);

    let loaded = ArtifactStore::new(dir.path().join("models"))
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(loaded.artifact_id, second.artifact_id);
}

#[test]
fn half_an_artifact_means_no_model() {
    let dir = tempfile::TempDir::new().unwrap();
    let registry = registry_in(dir.path());
    engine_in(dir.path()).train(registry.path()).unwrap();

    let store = ArtifactStore::new(dir.path().join("models"));
    std::fs::remove_file(store.model_path()).unwrap();

    let engine = engine_in(dir.path());
    assert!(!engine.load_model().unwrap());
    let first = &registry.mothers()[0];
    assert_eq!(engine.predict_risk(first), RiskAssessment::Unknown);
}

#[test]
fn mixed_training_runs_mean_no_model() {
    let dir = tempfile::TempDir::new().unwrap();
    let registry = registry_in(dir.path());
    let engine = engine_in(dir.path());

    engine.train(registry.path()).unwrap();
    let stale = std::fs::read(engine.store().encoder_path()).unwrap();
    engine.train(registry.path()).unwrap();
    std::fs::write(engine.store().encoder_path(), stale).unwrap();

    let fresh = engine_in(dir.path());
    assert!(!fresh.load_model().unwrap());
    assert_eq!(
        fresh.predict_risk(&registry.mothers()[0]),
        RiskAssessment::Unknown
    );
}

#[test]
fn registry_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let original = registry_in(dir.path());

    let reopened = MotherRegistry::open(original.path()).unwrap();
    assert_eq!(reopened.len(), original.len());
    assert_eq!(reopened.mothers(), original.mothers());
}

#[test]
fn missing_registry_is_seeded() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("data").join("mothers.csv");
    let registry = MotherRegistry::open(&path).unwrap();
    assert_eq!(registry.len(), 2);
    assert!(path.exists());
}

#[test]
fn config_round_trips_through_toml() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("furha.toml");

    let mut config = FurhaConfig::default();
    config.forest.n_trees = 7;
    config.risk.high_age_threshold = 37;
    config.save(&path).unwrap();

    let loaded = FurhaConfig::load(&path).unwrap();
    assert_eq!(loaded.forest, config.forest);
    assert_eq!(loaded.risk, config.risk);
}
