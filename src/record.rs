//! Core data model: the registered mother and her risk category.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Severity-ordered risk category. The only valid engine outputs besides
/// [`RiskAssessment::Unknown`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// All categories in ascending severity.
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level \"{other}\"")),
        }
    }
}

/// Result of a prediction: a category, or `Unknown` when no usable model exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskAssessment {
    Level(RiskLevel),
    Unknown,
}

impl RiskAssessment {
    /// One of `"low"`, `"medium"`, `"high"`, `"unknown"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskAssessment::Level(level) => level.as_str(),
            RiskAssessment::Unknown => "unknown",
        }
    }

    pub fn level(&self) -> Option<RiskLevel> {
        match self {
            RiskAssessment::Level(level) => Some(*level),
            RiskAssessment::Unknown => None,
        }
    }

    pub fn is_high(&self) -> bool {
        *self == RiskAssessment::Level(RiskLevel::High)
    }
}

impl fmt::Display for RiskAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RiskLevel> for RiskAssessment {
    fn from(level: RiskLevel) -> Self {
        RiskAssessment::Level(level)
    }
}

/// A registered pregnant individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mother {
    pub phone_number: String,
    pub national_id: String,
    pub language: String,
    /// Expected due date.
    pub edd: NaiveDate,
    /// Last menstrual period.
    pub lmp: NaiveDate,
    pub age: u32,
    pub prev_pregnancies: u32,
    pub prev_complications: bool,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub anc_visits: u32,
    /// Missed antenatal-care visits.
    #[serde(default)]
    pub missed_anc: u32,
    #[serde(default)]
    pub last_contact: Option<NaiveDate>,
    #[serde(default)]
    pub symptoms: Vec<String>,
}

/// Days from LMP to EDD under Naegele's rule.
pub const GESTATION_DAYS: i64 = 280;

impl Mother {
    /// Minimal record as produced by USSD registration: LMP is derived from the EDD
    /// and every clinical counter starts at zero.
    pub fn registered(
        phone_number: impl Into<String>,
        national_id: impl Into<String>,
        language: impl Into<String>,
        age: u32,
        edd: NaiveDate,
    ) -> Self {
        Self {
            phone_number: phone_number.into(),
            national_id: national_id.into(),
            language: language.into(),
            edd,
            lmp: edd - chrono::Duration::days(GESTATION_DAYS),
            age,
            prev_pregnancies: 0,
            prev_complications: false,
            risk_level: RiskLevel::Low,
            anc_visits: 0,
            missed_anc: 0,
            last_contact: None,
            symptoms: Vec::new(),
        }
    }

    /// Completed weeks since LMP as of `today`; zero if LMP lies in the future.
    pub fn weeks_pregnant(&self, today: NaiveDate) -> u32 {
        let days = (today - self.lmp).num_days().max(0);
        (days / 7) as u32
    }

    /// Symptoms in their stored, comma-joined form.
    pub fn symptoms_joined(&self) -> String {
        self.symptoms.join(",")
    }
}

/// Split a comma-joined symptom field.
///
/// An empty or whitespace-only field yields no symptoms; otherwise every
/// comma-separated token counts, so `len()` equals the token count.
pub fn split_symptoms(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|s| s.trim().to_string()).collect()
}
