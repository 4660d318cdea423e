//! Runtime configuration, persisted as TOML.
//!
//! Every field carries a serde default, so a partial (or missing) config file
//! resolves to the prototype's stock settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Top-level configuration for the furha binaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FurhaConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub risk: RiskRules,
    #[serde(default)]
    pub forest: ForestConfig,
    #[serde(default)]
    pub ussd: UssdConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl FurhaConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Reject settings the training pipeline cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        let f = &self.forest;
        if f.n_trees == 0 {
            return Err(ConfigError::Invalid {
                message: "forest.n_trees must be > 0".into(),
            });
        }
        if !(f.test_fraction > 0.0 && f.test_fraction < 1.0) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "forest.test_fraction must lie strictly between 0 and 1, got {}",
                    f.test_fraction
                ),
            });
        }
        if f.min_samples_split < 2 {
            return Err(ConfigError::Invalid {
                message: "forest.min_samples_split must be >= 2".into(),
            });
        }
        if self.ussd.languages.is_empty() {
            return Err(ConfigError::Invalid {
                message: "ussd.languages must offer at least one language".into(),
            });
        }
        Ok(())
    }
}

/// File locations for the record registry and the model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("sample_data/sample_mothers.csv")
}
fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            models_dir: default_models_dir(),
        }
    }
}

/// Thresholds for the rule cascade that synthesizes training labels.
///
/// Every comparison is strict: `age < low_age_threshold`,
/// `missed_anc > missed_anc_medium_threshold`, and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRules {
    /// Medium if younger than this.
    #[serde(default = "default_low_age")]
    pub low_age_threshold: u32,
    /// Medium if older than this.
    #[serde(default = "default_high_age")]
    pub high_age_threshold: u32,
    /// High if younger than this.
    #[serde(default = "default_extreme_low_age")]
    pub extreme_low_age_threshold: u32,
    /// High if older than this.
    #[serde(default = "default_extreme_high_age")]
    pub extreme_high_age_threshold: u32,
    #[serde(default = "default_missed_anc_medium")]
    pub missed_anc_medium_threshold: u32,
    #[serde(default = "default_missed_anc_high")]
    pub missed_anc_high_threshold: u32,
    #[serde(default)]
    pub symptom_count_medium_threshold: u32,
    #[serde(default = "default_symptom_high")]
    pub symptom_count_high_threshold: u32,
}

fn default_low_age() -> u32 {
    18
}
fn default_high_age() -> u32 {
    35
}
fn default_extreme_low_age() -> u32 {
    16
}
fn default_extreme_high_age() -> u32 {
    40
}
fn default_missed_anc_medium() -> u32 {
    1
}
fn default_missed_anc_high() -> u32 {
    2
}
fn default_symptom_high() -> u32 {
    2
}

impl Default for RiskRules {
    fn default() -> Self {
        Self {
            low_age_threshold: default_low_age(),
            high_age_threshold: default_high_age(),
            extreme_low_age_threshold: default_extreme_low_age(),
            extreme_high_age_threshold: default_extreme_high_age(),
            missed_anc_medium_threshold: default_missed_anc_medium(),
            missed_anc_high_threshold: default_missed_anc_high(),
            symptom_count_medium_threshold: 0,
            symptom_count_high_threshold: default_symptom_high(),
        }
    }
}

/// Hyperparameters for the random-forest classifier and the held-out split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,
    /// Seed for the train/test shuffle and for every tree's bootstrap.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// `None` grows trees until leaves are pure.
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    /// Features considered per split. `None` means floor(sqrt(n_features)).
    #[serde(default)]
    pub max_features: Option<usize>,
}

fn default_n_trees() -> usize {
    100
}
fn default_seed() -> u64 {
    42
}
fn default_test_fraction() -> f64 {
    0.2
}
fn default_min_samples_split() -> usize {
    2
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: default_n_trees(),
            seed: default_seed(),
            test_fraction: default_test_fraction(),
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            max_features: None,
        }
    }
}

/// USSD front-end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UssdConfig {
    #[serde(default = "default_ussd_code")]
    pub code: String,
    /// Menu key → language name, shown in key order.
    #[serde(default = "default_languages")]
    pub languages: BTreeMap<String, String>,
}

fn default_ussd_code() -> String {
    "*555#".into()
}
fn default_languages() -> BTreeMap<String, String> {
    [("1", "Rendille"), ("2", "Samburu"), ("3", "Swahili")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Default for UssdConfig {
    fn default() -> Self {
        Self {
            code: default_ussd_code(),
            languages: default_languages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    5000
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_prototype() {
        let cfg = FurhaConfig::default();
        assert_eq!(cfg.ussd.code, "*555#");
        assert_eq!(cfg.dashboard.port, 5000);
        assert_eq!(cfg.forest.n_trees, 100);
        assert_eq!(cfg.forest.seed, 42);
        assert_eq!(cfg.risk.low_age_threshold, 18);
        assert_eq!(cfg.risk.extreme_high_age_threshold, 40);
        assert_eq!(cfg.ussd.languages.get("2").map(String::as_str), Some("Samburu"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: FurhaConfig = toml::from_str(
            "[risk]\nhigh_age_threshold = 37\n\n[forest]\nn_trees = 10\n",
        )
        .unwrap();
        assert_eq!(cfg.risk.high_age_threshold, 37);
        assert_eq!(cfg.risk.low_age_threshold, 18);
        assert_eq!(cfg.forest.n_trees, 10);
        assert_eq!(cfg.forest.seed, 42);
        assert_eq!(cfg.paths.models_dir, PathBuf::from("models"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("conf/furha.toml");
        let mut cfg = FurhaConfig::default();
        cfg.dashboard.port = 8080;
        cfg.save(&path).unwrap();

        let loaded = FurhaConfig::load(&path).unwrap();
        assert_eq!(loaded.dashboard.port, 8080);
        assert_eq!(loaded.risk, cfg.risk);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = FurhaConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.forest.test_fraction, 0.2);
    }

    #[test]
    fn rejects_degenerate_split() {
        let mut cfg = FurhaConfig::default();
        cfg.forest.test_fraction = 1.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })));
    }
}
