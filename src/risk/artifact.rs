//! Persistence of the trained artifact: classifier + label encoder.
//!
//! The pair lives in two files under the models directory, `risk_model.bin`
//! and `label_encoder.bin`. Both are bincode blobs stamped with the same
//! random `artifact_id`. A load only succeeds when both files are present,
//! their ids agree, and the classifier's class count matches the encoder
//! table; anything else is reported as "no artifact" rather than a half-usable one.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::record::RiskLevel;

use super::encoder::LabelEncoder;
use super::features::{FeatureVector, FEATURE_NAMES};
use super::forest::RandomForest;

pub const MODEL_FILE: &str = "risk_model.bin";
pub const ENCODER_FILE: &str = "label_encoder.bin";

#[derive(Serialize, Deserialize)]
struct ModelBlob {
    artifact_id: u64,
    trained_at: DateTime<Utc>,
    feature_names: Vec<String>,
    forest: RandomForest,
}

#[derive(Serialize, Deserialize)]
struct EncoderBlob {
    artifact_id: u64,
    encoder: LabelEncoder,
}

/// An immutable (classifier, encoder) pair from one training run.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub artifact_id: u64,
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub forest: RandomForest,
    pub encoder: LabelEncoder,
}

impl ModelArtifact {
    /// Wrap a freshly fitted pair under a new random id.
    pub fn new(forest: RandomForest, encoder: LabelEncoder) -> Self {
        Self {
            artifact_id: rand::random(),
            trained_at: Utc::now(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            forest,
            encoder,
        }
    }

    /// Classify one feature vector and decode it through the encoder table.
    pub fn predict(&self, features: &FeatureVector) -> ModelResult<RiskLevel> {
        let class = self.forest.predict(&features.as_array());
        self.encoder.decode(class)
    }

    /// Whether the classifier and encoder describe the same class set, the
    /// classifier was trained on the features this build derives, and every
    /// tree can be walked without leaving its node table.
    pub fn is_consistent(&self) -> bool {
        self.forest.n_classes() == self.encoder.len()
            && self.feature_names.iter().map(String::as_str).eq(FEATURE_NAMES)
            && self.forest.is_well_formed()
    }
}

/// Filesystem location of the artifact pair.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn encoder_path(&self) -> PathBuf {
        self.dir.join(ENCODER_FILE)
    }

    /// Both halves are present on disk.
    pub fn exists(&self) -> bool {
        self.model_path().exists() && self.encoder_path().exists()
    }

    /// Write both halves, replacing any previous artifact.
    pub fn save(&self, artifact: &ModelArtifact) -> ModelResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ModelError::Io {
            path: self.dir.display().to_string(),
            source: e,
        })?;

        let model = ModelBlob {
            artifact_id: artifact.artifact_id,
            trained_at: artifact.trained_at,
            feature_names: artifact.feature_names.clone(),
            forest: artifact.forest.clone(),
        };
        let encoder = EncoderBlob {
            artifact_id: artifact.artifact_id,
            encoder: artifact.encoder.clone(),
        };

        write_blob(&self.model_path(), &model)?;
        write_blob(&self.encoder_path(), &encoder)?;

        tracing::info!(
            dir = %self.dir.display(),
            artifact_id = artifact.artifact_id,
            trees = artifact.forest.trees().len(),
            "saved risk model artifact"
        );
        Ok(())
    }

    /// Load the pair. `Ok(None)` when nothing usable is on disk, including a
    /// torn or mismatched pair.
    pub fn load(&self) -> ModelResult<Option<ModelArtifact>> {
        let (model_path, encoder_path) = (self.model_path(), self.encoder_path());

        match (model_path.exists(), encoder_path.exists()) {
            (false, false) => return Ok(None),
            (true, false) | (false, true) => {
                tracing::warn!(
                    dir = %self.dir.display(),
                    "only one half of the risk model artifact is present; ignoring it"
                );
                return Ok(None);
            }
            (true, true) => {}
        }

        let model: ModelBlob = read_blob(&model_path)?;
        let encoder: EncoderBlob = read_blob(&encoder_path)?;

        if model.artifact_id != encoder.artifact_id {
            tracing::warn!(
                model_id = model.artifact_id,
                encoder_id = encoder.artifact_id,
                "risk model and label encoder come from different training runs; ignoring them"
            );
            return Ok(None);
        }

        let artifact = ModelArtifact {
            artifact_id: model.artifact_id,
            trained_at: model.trained_at,
            feature_names: model.feature_names,
            forest: model.forest,
            encoder: encoder.encoder,
        };
        if !artifact.is_consistent() {
            tracing::warn!(
                classes = artifact.forest.n_classes(),
                encoder_classes = artifact.encoder.len(),
                well_formed = artifact.forest.is_well_formed(),
                "risk model artifact is internally inconsistent; ignoring it"
            );
            return Ok(None);
        }

        tracing::debug!(artifact_id = artifact.artifact_id, "loaded risk model artifact");
        Ok(Some(artifact))
    }

    /// Remove both halves if present.
    pub fn clear(&self) -> ModelResult<()> {
        for path in [self.model_path(), self.encoder_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(ModelError::Io {
                        path: path.display().to_string(),
                        source: e,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Serialize to a sibling temp file, then rename over the target.
fn write_blob<T: Serialize>(path: &Path, value: &T) -> ModelResult<()> {
    let bytes = bincode::serialize(value).map_err(|e| ModelError::Serialization {
        message: format!("failed to serialize {}: {e}", path.display()),
    })?;
    let tmp = path.with_extension("bin.tmp");
    std::fs::write(&tmp, bytes).map_err(|e| ModelError::Io {
        path: tmp.display().to_string(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| ModelError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

fn read_blob<T: DeserializeOwned>(path: &Path) -> ModelResult<T> {
    let bytes = std::fs::read(path).map_err(|e| ModelError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    bincode::deserialize(&bytes).map_err(|e| ModelError::Serialization {
        message: format!("failed to deserialize {}: {e}", path.display()),
    })
}
