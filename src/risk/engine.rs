//! Risk engine facade: training pipeline and prediction service.
//!
//! The trained artifact moves through a two-state lifecycle,
//! `Unloaded → Loaded`, held behind an `RwLock`. The lock is only taken to
//! clone the current `Arc` or to swap in a fully built artifact, so a
//! prediction never runs under the lock and never sees a half-loaded pair.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{ForestConfig, FurhaConfig, RiskRules};
use crate::error::{DataError, FurhaResult, ModelResult};
use crate::record::{Mother, RiskAssessment, RiskLevel};
use crate::registry::MotherRegistry;

use super::artifact::{ArtifactStore, ModelArtifact};
use super::dataset::TrainingSet;
use super::encoder::LabelEncoder;
use super::features::FeatureVector;
use super::forest::{RandomForest, Sample};
use super::labels;

/// Configuration for a [`RiskEngine`].
#[derive(Debug, Clone)]
pub struct RiskEngineConfig {
    /// Directory holding the artifact pair.
    pub models_dir: PathBuf,
    pub rules: RiskRules,
    pub forest: ForestConfig,
}

impl Default for RiskEngineConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            rules: RiskRules::default(),
            forest: ForestConfig::default(),
        }
    }
}

impl From<&FurhaConfig> for RiskEngineConfig {
    fn from(cfg: &FurhaConfig) -> Self {
        Self {
            models_dir: cfg.paths.models_dir.clone(),
            rules: cfg.risk.clone(),
            forest: cfg.forest.clone(),
        }
    }
}

#[derive(Debug, Default)]
enum ModelState {
    #[default]
    Unloaded,
    Loaded(Arc<ModelArtifact>),
}

/// Diagnostics from one training run. Accuracies are informational only.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    /// Rule-generated label counts over the whole batch.
    pub label_counts: BTreeMap<RiskLevel, usize>,
    pub artifact_id: u64,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Model trained. Train accuracy: {:.2}, Test accuracy: {:.2} ({} train / {} test rows)",
            self.train_accuracy, self.test_accuracy, self.train_rows, self.test_rows
        )
    }
}

/// Trains, persists and serves the risk classifier.
pub struct RiskEngine {
    config: RiskEngineConfig,
    store: ArtifactStore,
    state: RwLock<ModelState>,
}

impl fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiskEngine")
            .field("models_dir", &self.config.models_dir)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl RiskEngine {
    /// Create an engine with nothing loaded. No disk access happens here.
    pub fn new(config: RiskEngineConfig) -> Self {
        let store = ArtifactStore::new(config.models_dir.clone());
        Self {
            config,
            store,
            state: RwLock::new(ModelState::Unloaded),
        }
    }

    pub fn config(&self) -> &RiskEngineConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// The loaded artifact, if any.
    pub fn current(&self) -> Option<Arc<ModelArtifact>> {
        match &*self.state.read().expect("model state lock poisoned") {
            ModelState::Loaded(artifact) => Some(Arc::clone(artifact)),
            ModelState::Unloaded => None,
        }
    }

    fn install(&self, artifact: Arc<ModelArtifact>) {
        *self.state.write().expect("model state lock poisoned") = ModelState::Loaded(artifact);
    }

    /// Load the persisted artifact into memory, replacing whatever is loaded.
    ///
    /// Returns `Ok(false)` when no complete artifact exists on disk.
    pub fn load_model(&self) -> ModelResult<bool> {
        match self.store.load()? {
            Some(artifact) => {
                self.install(Arc::new(artifact));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Current artifact, loading it from disk on first use.
    ///
    /// A disk read that races a training run must not replace the freshly
    /// trained artifact, so the loaded pair is only installed while the
    /// state is still `Unloaded`.
    fn artifact(&self) -> Option<Arc<ModelArtifact>> {
        if let Some(artifact) = self.current() {
            return Some(artifact);
        }
        match self.store.load() {
            Ok(Some(artifact)) => Some(self.install_if_unloaded(Arc::new(artifact))),
            Ok(None) => {
                tracing::debug!(dir = %self.store.dir().display(), "no trained risk model available");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load risk model");
                None
            }
        }
    }

    fn install_if_unloaded(&self, artifact: Arc<ModelArtifact>) -> Arc<ModelArtifact> {
        let mut state = self.state.write().expect("model state lock poisoned");
        match &*state {
            ModelState::Loaded(existing) => Arc::clone(existing),
            ModelState::Unloaded => {
                *state = ModelState::Loaded(Arc::clone(&artifact));
                artifact
            }
        }
    }

    /// Train on the CSV at `data_file`, persist the artifact and load it.
    pub fn train(&self, data_file: &Path) -> FurhaResult<TrainingReport> {
        tracing::info!(data_file = %data_file.display(), "training risk model");
        let set = TrainingSet::from_csv(data_file)?;
        self.train_on(&set)
    }

    /// Train on already derived features.
    pub fn train_on(&self, set: &TrainingSet) -> FurhaResult<TrainingReport> {
        let rows = set.len();
        if rows < 2 {
            return Err(DataError::TooFewRows { rows, required: 2 }.into());
        }

        let labels = labels::label_batch(&set.features, &self.config.rules);
        let encoder = LabelEncoder::fit(&labels);
        let y = encoder.encode_all(&labels)?;
        let x: Vec<Sample> = set.features.iter().map(FeatureVector::as_array).collect();

        let (train_idx, test_idx) = split_indices(
            rows,
            self.config.forest.test_fraction,
            self.config.forest.seed,
        );
        let gather = |idx: &[usize]| -> (Vec<Sample>, Vec<usize>) {
            idx.iter().map(|&i| (x[i], y[i])).unzip()
        };
        let (x_train, y_train) = gather(&train_idx);
        let (x_test, y_test) = gather(&test_idx);

        let forest = RandomForest::fit(&x_train, &y_train, encoder.len(), &self.config.forest)?;
        let train_accuracy = forest.score(&x_train, &y_train);
        let test_accuracy = forest.score(&x_test, &y_test);

        let mut label_counts = BTreeMap::new();
        for level in &labels {
            *label_counts.entry(*level).or_insert(0) += 1;
        }

        let artifact = ModelArtifact::new(forest, encoder);
        self.store.save(&artifact)?;
        let artifact_id = artifact.artifact_id;
        self.install(Arc::new(artifact));

        let report = TrainingReport {
            rows,
            train_rows: train_idx.len(),
            test_rows: test_idx.len(),
            train_accuracy,
            test_accuracy,
            label_counts,
            artifact_id,
        };
        tracing::info!(
            rows,
            train_accuracy,
            test_accuracy,
            "risk model trained"
        );
        Ok(report)
    }

    /// Predict from a feature vector. Never fails: without a usable model the
    /// answer is [`RiskAssessment::Unknown`].
    pub fn predict_features(&self, features: &FeatureVector) -> RiskAssessment {
        let Some(artifact) = self.artifact() else {
            return RiskAssessment::Unknown;
        };
        match artifact.predict(features) {
            Ok(level) => RiskAssessment::Level(level),
            Err(e) => {
                tracing::warn!(error = %e, "risk prediction failed");
                RiskAssessment::Unknown
            }
        }
    }

    /// Predict the risk category of one record.
    pub fn predict_risk(&self, mother: &Mother) -> RiskAssessment {
        self.predict_features(&FeatureVector::from_mother(mother))
    }

    /// Every record predicted `high`, in input order. Each record is
    /// evaluated independently.
    pub fn identify_high_risk<'a>(&self, mothers: &'a [Mother]) -> Vec<&'a Mother> {
        mothers
            .par_iter()
            .filter(|m| self.predict_risk(m).is_high())
            .collect()
    }

    /// Predict for a registered mother and store the category on her record.
    ///
    /// `Ok(None)` if the phone number is not registered. An `Unknown` result
    /// leaves the stored category untouched.
    pub fn assess_and_record(
        &self,
        registry: &mut MotherRegistry,
        phone_number: &str,
    ) -> FurhaResult<Option<RiskAssessment>> {
        let Some(mother) = registry.get(phone_number) else {
            return Ok(None);
        };
        let assessment = self.predict_risk(mother);
        if let Some(level) = assessment.level() {
            registry.update(phone_number, |m| m.risk_level = level)?;
        }
        Ok(Some(assessment))
    }
}

/// Seeded shuffle split into `(train, test)` row indices.
///
/// The held-out side gets `ceil(n * test_fraction)` rows, kept within
/// `1..n` so neither side is empty.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(&mut StdRng::seed_from_u64(seed));

    let n_test = ((n as f64) * test_fraction).ceil() as usize;
    let n_test = n_test.clamp(1, n.saturating_sub(1).max(1));
    let train = idx.split_off(n_test);
    (train, idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::synthetic_cohort;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    fn engine_in(dir: &Path) -> RiskEngine {
        RiskEngine::new(RiskEngineConfig {
            models_dir: dir.join("models"),
            forest: ForestConfig {
                n_trees: 25,
                ..ForestConfig::default()
            },
            ..RiskEngineConfig::default()
        })
    }

    fn cohort_set(n: usize) -> (Vec<Mother>, TrainingSet) {
        let cohort = synthetic_cohort(n, 11, today());
        let set = TrainingSet::new(cohort.iter().map(FeatureVector::from_mother).collect());
        (cohort, set)
    }

    #[test]
    fn fresh_engine_predicts_unknown() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(dir.path());
        let (cohort, _) = cohort_set(1);
        assert_eq!(engine.predict_risk(&cohort[0]), RiskAssessment::Unknown);
        assert_eq!(engine.predict_risk(&cohort[0]).as_str(), "unknown");
        assert!(!engine.is_loaded());
    }

    #[test]
    fn training_loads_and_reports() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(dir.path());
        let (_, set) = cohort_set(300);

        let report = engine.train_on(&set).unwrap();
        assert!(engine.is_loaded());
        assert!(engine.store().exists());
        assert_eq!(report.rows, 300);
        assert_eq!(report.test_rows, 60);
        assert_eq!(report.train_rows, 240);
        assert_eq!(report.label_counts.values().sum::<usize>(), 300);
        assert!(report.train_accuracy > 0.9, "{report}");
        assert!((0.0..=1.0).contains(&report.test_accuracy));
    }

    #[test]
    fn predictions_track_rule_labels() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(dir.path());
        let (cohort, set) = cohort_set(400);
        engine.train_on(&set).unwrap();

        let rules = RiskRules::default();
        let agree = cohort
            .iter()
            .filter(|m| {
                let expected = labels::label(&FeatureVector::from_mother(m), &rules);
                engine.predict_risk(m) == RiskAssessment::Level(expected)
            })
            .count();
        assert!(agree as f64 / cohort.len() as f64 > 0.9);
    }

    #[test]
    fn second_engine_lazily_loads_artifact() {
        let dir = TempDir::new().unwrap();
        let (cohort, set) = cohort_set(200);
        let trained = engine_in(dir.path());
        trained.train_on(&set).unwrap();

        let fresh = engine_in(dir.path());
        assert!(!fresh.is_loaded());
        let prediction = fresh.predict_risk(&cohort[0]);
        assert!(fresh.is_loaded());
        assert_eq!(prediction, trained.predict_risk(&cohort[0]));
    }

    #[test]
    fn torn_artifact_predicts_unknown() {
        let dir = TempDir::new().unwrap();
        let (cohort, set) = cohort_set(100);
        engine_in(dir.path()).train_on(&set).unwrap();

        let fresh = engine_in(dir.path());
        std::fs::remove_file(fresh.store().encoder_path()).unwrap();
        assert_eq!(fresh.predict_risk(&cohort[0]), RiskAssessment::Unknown);
        assert!(!fresh.is_loaded());
    }

    #[test]
    fn high_risk_filter_matches_individual_predictions() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(dir.path());
        let (cohort, set) = cohort_set(250);
        engine.train_on(&set).unwrap();

        let expected: Vec<&Mother> = cohort
            .iter()
            .filter(|m| engine.predict_risk(m).is_high())
            .collect();
        let first = engine.identify_high_risk(&cohort);
        let second = engine.identify_high_risk(&cohort);
        assert_eq!(first, expected);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn malformed_artifact_predicts_unknown() {
        use crate::risk::forest::malformed;

        let dir = TempDir::new().unwrap();
        let engine = engine_in(dir.path());
        let (cohort, set) = cohort_set(60);
        engine.train_on(&set).unwrap();

        for forest in [malformed::empty_tree(3), malformed::split_on_missing_feature(3)] {
            let mut artifact = (*engine.current().unwrap()).clone();
            artifact.forest = forest;
            engine.store().save(&artifact).unwrap();

            let fresh = engine_in(dir.path());
            assert_eq!(fresh.predict_risk(&cohort[0]), RiskAssessment::Unknown);
            assert!(fresh.identify_high_risk(&cohort).is_empty());
            assert!(!fresh.is_loaded());
        }
    }

    #[test]
    fn lazy_load_never_replaces_a_newer_model() {
        let dir = TempDir::new().unwrap();
        let (cohort, set) = cohort_set(80);
        let stale = engine_in(dir.path()).train_on(&set).unwrap();

        for _ in 0..5 {
            let engine = engine_in(dir.path());
            let report = std::thread::scope(|s| {
                for _ in 0..4 {
                    s.spawn(|| engine.identify_high_risk(&cohort).len());
                }
                let trainer = s.spawn(|| engine.train_on(&set).unwrap());
                trainer.join().unwrap()
            });
            assert_ne!(report.artifact_id, stale.artifact_id);
            assert_eq!(engine.current().unwrap().artifact_id, report.artifact_id);
        }
    }

    #[test]
    fn high_risk_without_model_is_empty() {
        let dir = TempDir::new().unwrap();
        let (cohort, _) = cohort_set(20);
        assert!(engine_in(dir.path()).identify_high_risk(&cohort).is_empty());
    }

    #[test]
    fn same_seed_same_predictions() {
        let (cohort, set) = cohort_set(200);
        let a_dir = TempDir::new().unwrap();
        let b_dir = TempDir::new().unwrap();
        let a = engine_in(a_dir.path());
        let b = engine_in(b_dir.path());
        let ra = a.train_on(&set).unwrap();
        let rb = b.train_on(&set).unwrap();
        assert_eq!(ra.train_accuracy, rb.train_accuracy);
        assert_eq!(ra.test_accuracy, rb.test_accuracy);
        for m in &cohort {
            assert_eq!(a.predict_risk(m), b.predict_risk(m));
        }
    }

    #[test]
    fn too_few_rows_is_a_data_error() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(dir.path());
        let set = TrainingSet::new(vec![FeatureVector::new(30, 0, false, 0, 0)]);
        let err = engine.train_on(&set).unwrap_err();
        assert!(matches!(
            err,
            crate::error::FurhaError::Data(DataError::TooFewRows { rows: 1, .. })
        ));
        assert!(!engine.store().exists());
    }

    #[test]
    fn missing_training_file_is_a_data_error() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(dir.path());
        let err = engine.train(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, crate::error::FurhaError::Data(DataError::Io { .. })));
    }

    #[test]
    fn assess_and_record_writes_back() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(dir.path());
        let (cohort, set) = cohort_set(200);
        engine.train_on(&set).unwrap();

        let mut registry = MotherRegistry::empty(dir.path().join("mothers.csv"));
        registry.add(cohort[0].clone()).unwrap();

        let phone = cohort[0].phone_number.clone();
        let assessment = engine.assess_and_record(&mut registry, &phone).unwrap().unwrap();
        assert_eq!(Some(registry.get(&phone).unwrap().risk_level), assessment.level());
        assert_eq!(engine.assess_and_record(&mut registry, "+0").unwrap(), None);
    }

    #[test]
    fn split_is_seeded_and_disjoint() {
        let (train, test) = split_indices(10, 0.2, 42);
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);
        let mut all: Vec<_> = train.iter().chain(&test).copied().collect();
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
        assert_eq!(split_indices(10, 0.2, 42), (train, test));
    }

    #[test]
    fn tiny_split_keeps_both_sides() {
        let (train, test) = split_indices(2, 0.2, 42);
        assert_eq!((train.len(), test.len()), (1, 1));
    }
}
